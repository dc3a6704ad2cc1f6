//! Diagnostic reporting for the Luma code generator.
//!
//! Lightweight, rustc-style messages on stderr. A diagnostic carries a
//! severity, a message, and the name of the module being lowered when one
//! is known. Structural and translation errors abort the current
//! compilation; warnings (self-import, unknown escape sequence) do not.
//!
//! Tests can silence output with [`suppress`], which returns a guard that
//! restores reporting when dropped.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic produced during code generation.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Name of the module that was current when the diagnostic arose.
    pub module: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            module: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            module: None,
        }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(m) => write!(f, "{} (module `{}`)", self.message, m),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

impl From<inkwell::builder::BuilderError> for Diagnostic {
    fn from(err: inkwell::builder::BuilderError) -> Self {
        Diagnostic::error(format!("IR builder error: {}", err))
    }
}

/// Result alias used throughout the lowering code.
pub type CgResult<T> = Result<T, Diagnostic>;

// Nesting depth of active suppression guards; > 0 means silent.
static SUPPRESS_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Guard that suppresses diagnostic output until dropped.
pub struct SuppressGuard(());

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        SUPPRESS_DEPTH.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Suppress diagnostic output to stderr, typically for the duration of a
/// test. Guards nest.
pub fn suppress() -> SuppressGuard {
    SUPPRESS_DEPTH.fetch_add(1, Ordering::SeqCst);
    SuppressGuard(())
}

fn suppressed() -> bool {
    SUPPRESS_DEPTH.load(Ordering::SeqCst) > 0
}

/// Print a diagnostic to stderr with ANSI severity coloring.
///
/// The whole line is written with a single `eprintln!` so concurrent
/// writers cannot interleave within a message.
pub fn emit_diagnostic(diag: &Diagnostic) {
    if suppressed() {
        return;
    }
    let reset = "\x1b[0m";
    match diag.severity {
        Severity::Error => {
            let red = "\x1b[31m";
            match &diag.module {
                Some(m) => eprintln!("{}error{}: {}\n  --> module `{}`", red, reset, diag.message, m),
                None => eprintln!("{}error{}: {}", red, reset, diag.message),
            }
        }
        Severity::Warning => {
            let yellow = "\x1b[33m";
            match &diag.module {
                Some(m) => eprintln!("{}warning{}: {} (module `{}`)", yellow, reset, diag.message, m),
                None => eprintln!("{}warning{}: {}", yellow, reset, diag.message),
            }
        }
    }
}

/// Emit the diagnostic and convert it into an `anyhow::Error` for early
/// termination at orchestration boundaries.
pub fn report_and_bail<T>(diag: Diagnostic) -> anyhow::Result<T> {
    emit_diagnostic(&diag);
    Err(anyhow::anyhow!("{}", diag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_context_shows_in_display() {
        let d = Diagnostic::error("symbol `x` not found").in_module("main");
        assert_eq!(d.to_string(), "symbol `x` not found (module `main`)");
    }

    #[test]
    fn suppress_guard_nests() {
        let _outer = suppress();
        {
            let _inner = suppress();
            assert!(suppressed());
        }
        assert!(suppressed());
    }
}
