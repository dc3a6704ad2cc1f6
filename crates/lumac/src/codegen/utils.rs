//! Small reusable lowering helpers.

use inkwell::basic_block::BasicBlock;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, PointerValue};

use crate::diagnostics::{CgResult, Diagnostic};

use super::CodeGen;

impl<'ctx> CodeGen<'ctx> {
    /// Alloca-and-store pattern for locals and parameters.
    pub(crate) fn alloca_and_store(
        &self,
        ty: BasicTypeEnum<'ctx>,
        value: BasicValueEnum<'ctx>,
        name: &str,
    ) -> CgResult<PointerValue<'ctx>> {
        let slot = self.builder.build_alloca(ty, name)?;
        self.builder.build_store(slot, value)?;
        Ok(slot)
    }

    /// Branch to `target` only if the current block has no terminator,
    /// guarding against duplicate branches after early returns.
    pub(crate) fn branch_if_no_terminator(&self, target: BasicBlock<'ctx>) -> CgResult<()> {
        if let Some(block) = self.builder.get_insert_block() {
            if block.get_terminator().is_none() {
                self.builder.build_unconditional_branch(target)?;
            }
        }
        Ok(())
    }

    /// Whether the block currently being built already ends in a
    /// terminator instruction.
    pub(crate) fn block_has_terminator(&self) -> bool {
        self.builder
            .get_insert_block()
            .map(|b| b.get_terminator().is_some())
            .unwrap_or(false)
    }
}

/// Decode the escape sequences of a string literal into raw bytes.
///
/// Supported escapes: `\n \r \t \\ \" \0 \xHH`. Anything else is copied
/// verbatim, backslash included, and reported through a warning so source
/// that relied on the old silent behavior keeps building.
pub fn process_escape_sequences(input: &str) -> (Vec<u8>, Vec<Diagnostic>) {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut warnings = Vec::new();

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        match bytes[i + 1] {
            b'n' => {
                out.push(b'\n');
                i += 2;
            }
            b'r' => {
                out.push(b'\r');
                i += 2;
            }
            b't' => {
                out.push(b'\t');
                i += 2;
            }
            b'\\' => {
                out.push(b'\\');
                i += 2;
            }
            b'"' => {
                out.push(b'"');
                i += 2;
            }
            b'0' => {
                out.push(0);
                i += 2;
            }
            b'x' => {
                let hex = bytes.get(i + 2..i + 4).and_then(|pair| {
                    let s = std::str::from_utf8(pair).ok()?;
                    u8::from_str_radix(s, 16).ok()
                });
                match hex {
                    Some(value) => {
                        out.push(value);
                        i += 4;
                    }
                    None => {
                        warnings.push(Diagnostic::warning(format!(
                            "invalid hex escape in string literal at byte {}; emitting verbatim",
                            i
                        )));
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            other => {
                warnings.push(Diagnostic::warning(format!(
                    "unknown escape sequence `\\{}` in string literal; emitting verbatim",
                    other as char
                )));
                out.push(bytes[i]);
                out.push(other);
                i += 2;
            }
        }
    }

    (out, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_escapes_decode() {
        let (out, warnings) = process_escape_sequences(r#"a\nb\tc\\d\"e\rf"#);
        assert_eq!(out, b"a\nb\tc\\d\"e\rf");
        assert!(warnings.is_empty());
    }

    #[test]
    fn nul_and_hex_escapes_decode() {
        let (out, warnings) = process_escape_sequences(r"x\0y\x41\x7a");
        assert_eq!(out, b"x\0yAz");
        assert!(warnings.is_empty());
    }

    #[test]
    fn unknown_escape_copies_verbatim_with_warning() {
        let (out, warnings) = process_escape_sequences(r"a\qb");
        assert_eq!(out, br"a\qb");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn truncated_hex_escape_copies_verbatim() {
        let (out, warnings) = process_escape_sequences(r"\xZ9 and \x4");
        assert_eq!(out[0], b'\\');
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn trailing_backslash_is_kept() {
        let (out, _) = process_escape_sequences("ab\\");
        assert_eq!(out, b"ab\\");
    }

    // Encoder for the supported escape set, so decoding can be checked
    // against arbitrary byte sequences.
    fn encode(bytes: &[u8]) -> String {
        let mut out = String::new();
        for &b in bytes {
            match b {
                b'\n' => out.push_str(r"\n"),
                b'\r' => out.push_str(r"\r"),
                b'\t' => out.push_str(r"\t"),
                b'\\' => out.push_str(r"\\"),
                b'"' => out.push_str("\\\""),
                0 => out.push_str(r"\0"),
                b if b.is_ascii_graphic() || b == b' ' => out.push(b as char),
                other => out.push_str(&format!(r"\x{:02x}", other)),
            }
        }
        out
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let samples: [&[u8]; 4] = [
            b"plain text",
            b"line\none\r\ttabbed \\ \"quoted\"",
            &[0, 1, 2, 0x7f, 0x80, 0xff, b'a', 0],
            b"\x1b[31mansi\x1b[0m",
        ];
        for sample in samples {
            let (decoded, warnings) = process_escape_sequences(&encode(sample));
            assert_eq!(decoded, sample);
            assert!(warnings.is_empty());
        }
    }
}
