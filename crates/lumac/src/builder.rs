//! Build orchestration: the complete pipeline from a parsed program to a
//! linked executable.

use std::path::PathBuf;

use anyhow::Result;
use inkwell::context::Context;

use crate::codegen::CodeGen;
use crate::diagnostics;
use crate::{linking, objects, BuildConfig};
use luma_ast as ast;

/// Compile `program` to a native executable according to `config`.
///
/// Runs the three lowering passes, warms the lookup caches, optionally
/// dumps per-module IR and assembly, emits object files in parallel, and
/// invokes the system linker. Returns the path to the executable.
pub fn build_program(program: &ast::Program, config: &BuildConfig) -> Result<PathBuf> {
    let context = Context::create();
    let mut cg = CodeGen::new(&context);

    if let Err(diag) = cg.compile_program(program) {
        return diagnostics::report_and_bail(diag);
    }

    // Re-warm so symbols created during lowering are indexed too; the
    // registry is frozen from here on.
    cg.warm_caches();

    let out_dir = config.output_dir();
    if config.save_intermediates {
        objects::save_intermediate_files(&cg, &out_dir)?;
    }

    objects::emit_objects(&cg, &out_dir)?;

    let module_names: Vec<String> = cg.units.iter().map(|u| u.name.clone()).collect();
    linking::link_objects(&module_names, &out_dir, &config.exe_name, config.opt_level)
}
