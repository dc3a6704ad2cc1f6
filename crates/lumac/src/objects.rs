//! Parallel object emission.
//!
//! Each populated module is lowered to a native object file on a worker
//! thread. Workers run in batches of the configured pool size and every
//! worker in a batch is joined before the next batch launches. Worker
//! count comes from `LUMA_COMPILE_THREADS` when set and within bounds,
//! else the detected CPU count, else a fixed default, and is always
//! capped at the module count.
//!
//! Concurrency contract: the registry, struct infos, and caches are
//! frozen before emission starts. Each task touches only its own backend
//! module and creates (and drops) its own target machine; the shared
//! builder and context are not used during this phase. Workers return
//! errors instead of writing to stderr, so diagnostics stay line-atomic.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context as _, Result};
use inkwell::module::Module;
use inkwell::targets::{CodeModel, FileType, RelocMode, Target, TargetMachine};
use inkwell::OptimizationLevel;

use crate::codegen::CodeGen;

/// Upper bound honored for `LUMA_COMPILE_THREADS`.
pub const MAX_COMPILE_THREADS: usize = 64;
const DEFAULT_COMPILE_THREADS: usize = 4;

/// Resolve the worker-pool size for this emission run.
fn compile_thread_count() -> usize {
    if let Ok(raw) = std::env::var("LUMA_COMPILE_THREADS") {
        if let Ok(n) = raw.parse::<usize>() {
            if (1..=MAX_COMPILE_THREADS).contains(&n) {
                return n;
            }
        }
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_COMPILE_THREADS)
}

/// A module reference handed to an emission worker.
///
/// Invariant: every task in a batch holds a distinct module, nothing
/// mutates the registry while workers run, and per-module emission through
/// a task-private target machine is the only backend API the worker
/// calls.
struct WorkerModule<'m, 'ctx>(&'m Module<'ctx>);

unsafe impl Send for WorkerModule<'_, '_> {}

/// Create a task-private target machine: default triple, host CPU and
/// features, PIC relocation, small code model, no optimization.
fn create_target_machine() -> Result<TargetMachine, String> {
    let triple = TargetMachine::get_default_triple();
    let target = Target::from_triple(&triple)
        .map_err(|e| format!("failed to resolve target from triple: {}", e))?;
    let cpu = TargetMachine::get_host_cpu_name();
    let features = TargetMachine::get_host_cpu_features();

    target
        .create_target_machine(
            &triple,
            cpu.to_str().unwrap_or_default(),
            features.to_str().unwrap_or_default(),
            OptimizationLevel::None,
            RelocMode::PIC,
            CodeModel::Small,
        )
        .ok_or_else(|| "failed to create target machine".to_string())
}

/// Emit one module to `path` through a freshly created target machine.
fn emit_module_object(module: WorkerModule<'_, '_>, path: &Path) -> Result<(), String> {
    let machine = create_target_machine()?;

    module.0.set_triple(&TargetMachine::get_default_triple());
    module
        .0
        .set_data_layout(&machine.get_target_data().get_data_layout());

    if cfg!(debug_assertions) {
        module
            .0
            .verify()
            .map_err(|e| format!("module verification failed: {}", e))?;
    }

    machine
        .write_to_file(module.0, FileType::Object, path)
        .map_err(|e| format!("failed to emit object file: {}", e))
}

/// Compile every registered module to `<out_dir>/<module>.o`, in
/// parallel batches. Fails if any single emission fails, after all
/// in-flight workers have been joined.
pub fn emit_objects(cg: &CodeGen<'_>, out_dir: &Path) -> Result<()> {
    create_output_dir(out_dir)?;

    if cg.units.is_empty() {
        bail!("no modules to compile");
    }

    let workers = compile_thread_count().min(cg.units.len());
    let indices: Vec<usize> = (0..cg.units.len()).collect();
    let mut results: Vec<Option<Result<(), String>>> = vec![None; cg.units.len()];

    for batch in indices.chunks(workers) {
        let batch_results: Vec<(usize, Result<(), String>)> = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(batch.len());
            for &i in batch {
                let unit = &cg.units[i];
                let worker_module = WorkerModule(&unit.module);
                let path = out_dir.join(format!("{}.o", unit.name));

                let spawned = std::thread::Builder::new()
                    .name(format!("emit-{}", unit.name))
                    .spawn_scoped(scope, move || emit_module_object(worker_module, &path));
                handles.push((i, spawned));
            }

            // Join the whole batch before reporting, so one failure
            // cannot leave sibling workers detached.
            handles
                .into_iter()
                .map(|(i, spawned)| match spawned {
                    Ok(handle) => match handle.join() {
                        Ok(result) => (i, result),
                        Err(_) => (i, Err("emission worker panicked".to_string())),
                    },
                    Err(e) => (i, Err(format!("failed to spawn emission worker: {}", e))),
                })
                .collect()
        });

        for (i, result) in batch_results {
            results[i] = Some(result);
        }
    }

    for (i, result) in results.into_iter().enumerate() {
        if let Some(Err(message)) = result {
            bail!(
                "failed to compile module `{}`: {}",
                cg.units[i].name,
                message
            );
        }
    }
    Ok(())
}

/// Write per-module textual IR (`.ll`) and assembly (`.s`) files.
/// Single-threaded; runs before object emission when intermediates are
/// requested.
pub fn save_intermediate_files(cg: &CodeGen<'_>, out_dir: &Path) -> Result<()> {
    create_output_dir(out_dir)?;

    for unit in &cg.units {
        let ir_path = out_dir.join(format!("{}.ll", unit.name));
        unit.module
            .print_to_file(&ir_path)
            .map_err(|e| anyhow!("failed to write IR for module `{}`: {}", unit.name, e))?;

        let machine = create_target_machine()
            .map_err(|e| anyhow!("module `{}`: {}", unit.name, e))?;
        unit.module.set_triple(&TargetMachine::get_default_triple());
        unit.module
            .set_data_layout(&machine.get_target_data().get_data_layout());
        let asm_path = out_dir.join(format!("{}.s", unit.name));
        machine
            .write_to_file(&unit.module, FileType::Assembly, &asm_path)
            .map_err(|e| anyhow!("failed to write assembly for module `{}`: {}", unit.name, e))?;
    }
    Ok(())
}

#[cfg(unix)]
fn create_output_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .with_context(|| format!("failed to create output directory {}", path.display()))
}

#[cfg(not(unix))]
fn create_output_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create output directory {}", path.display()))
}

/// Object file paths for the given module names, in registry order.
pub fn object_paths(module_names: &[String], out_dir: &Path) -> Vec<PathBuf> {
    module_names
        .iter()
        .map(|name| out_dir.join(format!("{}.o", name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths_follow_registry_order() {
        let names = vec!["util".to_string(), "main".to_string()];
        let paths = object_paths(&names, Path::new("obj"));
        assert_eq!(paths[0], Path::new("obj/util.o"));
        assert_eq!(paths[1], Path::new("obj/main.o"));
    }
}
