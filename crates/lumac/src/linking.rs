//! Linker invocation.
//!
//! The final executable is produced by the system C compiler driver:
//! `cc` first, `gcc` as the fallback. On macOS the link is
//! position-independent with `-Wl,-dead_strip` and the binary is stripped
//! with `strip -x`; elsewhere the primary attempt links `-pie` and the
//! fallback retries with `-no-pie`. Both attempts failing is fatal.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Result};

use crate::objects::object_paths;

/// Flags that differ between the primary and fallback link attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PieMode {
    Pie,
    NoPie,
}

/// Compose the argument list for one link attempt.
fn link_args(
    opt_level: u8,
    pie: PieMode,
    exe_name: &str,
    objects: &[PathBuf],
) -> Vec<String> {
    let mut args = Vec::new();
    if opt_level > 0 {
        args.push(format!("-O{}", opt_level));
    }
    if cfg!(target_os = "macos") {
        args.push("-Wl,-dead_strip".to_string());
    } else {
        match pie {
            PieMode::Pie => args.push("-pie".to_string()),
            PieMode::NoPie => args.push("-no-pie".to_string()),
        }
    }
    args.push("-o".to_string());
    args.push(exe_name.to_string());
    for obj in objects {
        args.push(obj.display().to_string());
    }
    args
}

fn run_linker(compiler: &str, args: &[String]) -> bool {
    match Command::new(compiler).args(args).status() {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

/// Link the object files of the given modules into an executable in the
/// working directory.
pub fn link_objects(
    module_names: &[String],
    out_dir: &Path,
    exe_name: &str,
    opt_level: u8,
) -> Result<PathBuf> {
    let objects = object_paths(module_names, out_dir);

    let primary = link_args(opt_level, PieMode::Pie, exe_name, &objects);
    if !run_linker("cc", &primary) {
        let fallback = link_args(opt_level, PieMode::NoPie, exe_name, &objects);
        if !run_linker("gcc", &fallback) {
            bail!(
                "failed to link executable `{}` with both `cc` and `gcc`",
                exe_name
            );
        }
    }

    if cfg!(target_os = "macos") {
        // Best effort; a missing strip does not fail the build.
        let _ = Command::new("strip").arg("-x").arg(exe_name).status();
    }

    Ok(PathBuf::from(exe_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_level_zero_omits_o_flag() {
        let args = link_args(0, PieMode::Pie, "out", &[PathBuf::from("obj/main.o")]);
        assert!(!args.iter().any(|a| a.starts_with("-O")));
        assert!(args.contains(&"obj/main.o".to_string()));
    }

    #[test]
    fn opt_level_is_forwarded() {
        let args = link_args(2, PieMode::Pie, "out", &[]);
        assert!(args.contains(&"-O2".to_string()));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn fallback_switches_to_no_pie() {
        let primary = link_args(0, PieMode::Pie, "out", &[]);
        let fallback = link_args(0, PieMode::NoPie, "out", &[]);
        assert!(primary.contains(&"-pie".to_string()));
        assert!(fallback.contains(&"-no-pie".to_string()));
    }

    #[test]
    fn output_name_follows_dash_o() {
        let args = link_args(0, PieMode::Pie, "hello", &[]);
        let pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[pos + 1], "hello");
    }
}
