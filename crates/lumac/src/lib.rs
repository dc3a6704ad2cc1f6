//! Multi-module code generation and linking core of the Luma compiler.
//!
//! The front end hands this crate a fully parsed and type-checked
//! [`luma_ast::Program`]; the output is a linked native executable. The
//! pipeline is: create one compilation unit per module, process `use`
//! directives, lower module bodies in dependency order, emit one object
//! file per module in parallel, and invoke the system linker.
//!
//! ```no_run
//! use luma_ast::{Expr, FnDecl, Module, Program, Stmt, TypeAnn};
//!
//! let main = Module::new(
//!     "main",
//!     vec![Stmt::FnDecl(FnDecl {
//!         name: "main".to_string(),
//!         params: vec![],
//!         return_type: TypeAnn::I32,
//!         body: vec![Stmt::Return(Some(Expr::Int(0)))],
//!         is_public: true,
//!     })],
//! );
//! let program = Program::new(vec![main]);
//! let exe = lumac::build(&program, &lumac::BuildConfig::new("output")).unwrap();
//! assert_eq!(exe, std::path::PathBuf::from("output"));
//! ```

use std::path::PathBuf;

pub mod builder;
pub mod codegen;
pub mod diagnostics;
pub mod linking;
pub mod objects;

/// Build parameters handed to the core by the surrounding tool.
///
/// Follows the rustc model: the compiler accepts explicit options rather
/// than discovering project structure. Flag parsing lives outside this
/// crate.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Optimization level forwarded to the linker driver, 0..=3.
    pub opt_level: u8,
    /// Also write per-module `.ll` and `.s` files next to the objects.
    pub save_intermediates: bool,
    /// Base name of the produced executable, placed in the working
    /// directory.
    pub exe_name: String,
    /// Object output directory override. Defaults to `obj`, or `output`
    /// when intermediates are saved.
    pub out_dir: Option<PathBuf>,
}

impl BuildConfig {
    pub fn new(exe_name: impl Into<String>) -> Self {
        BuildConfig {
            opt_level: 0,
            save_intermediates: false,
            exe_name: exe_name.into(),
            out_dir: None,
        }
    }

    /// The directory object files (and intermediates) are written to.
    pub fn output_dir(&self) -> PathBuf {
        match &self.out_dir {
            Some(dir) => dir.clone(),
            None if self.save_intermediates => PathBuf::from("output"),
            None => PathBuf::from("obj"),
        }
    }
}

/// Compile a program to a native executable. See [`builder::build_program`].
pub fn build(program: &luma_ast::Program, config: &BuildConfig) -> anyhow::Result<PathBuf> {
    builder::build_program(program, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_defaults_depend_on_save_flag() {
        let mut config = BuildConfig::new("out");
        assert_eq!(config.output_dir(), PathBuf::from("obj"));
        config.save_intermediates = true;
        assert_eq!(config.output_dir(), PathBuf::from("output"));
        config.out_dir = Some(PathBuf::from("custom"));
        assert_eq!(config.output_dir(), PathBuf::from("custom"));
    }
}
