//! Parallel object emission: outputs, determinism, intermediates.

mod common;

use common::*;
use inkwell::context::Context;
use luma_ast::{Module, Program, TypeAnn};
use lumac::codegen::CodeGen;
use lumac::objects;

/// Eight single-function modules plus a main that references them all.
fn eight_module_program() -> Program {
    let mut modules = Vec::new();
    let mut uses = Vec::new();
    let mut sum = int(0);
    for i in 0..8 {
        let name = format!("m{}", i);
        let fn_name = format!("f{}", i);
        modules.push(Module::new(
            name.clone(),
            vec![pub_fn(&fn_name, vec![], TypeAnn::I32, vec![ret(int(i))])],
        ));
        uses.push(use_mod(&name));
        sum = binary(
            luma_ast::BinaryOp::Add,
            sum,
            qualified_call(&name, &fn_name, vec![]),
        );
    }
    let mut body = uses;
    body.push(main_fn(vec![ret(sum)]));
    modules.push(Module::new("main", body));
    Program::new(modules)
}

fn compile_and_emit(program: &Program, out_dir: &std::path::Path) {
    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    cg.compile_program(program).unwrap();
    cg.warm_caches();
    objects::emit_objects(&cg, out_dir).unwrap();
}

#[test]
fn emission_writes_one_object_per_module() {
    let dir = tempfile::tempdir().unwrap();
    compile_and_emit(&eight_module_program(), dir.path());

    for i in 0..8 {
        let path = dir.path().join(format!("m{}.o", i));
        assert!(path.exists(), "missing {}", path.display());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
    assert!(dir.path().join("main.o").exists());
}

/// Worker counts 1 and 8 must produce byte-identical objects. The env
/// override is process-global, so every thread-count variation lives in
/// this single test.
#[test]
fn emission_is_deterministic_across_worker_counts() {
    let program = eight_module_program();

    let serial_dir = tempfile::tempdir().unwrap();
    std::env::set_var("LUMA_COMPILE_THREADS", "1");
    compile_and_emit(&program, serial_dir.path());

    let parallel_dir = tempfile::tempdir().unwrap();
    std::env::set_var("LUMA_COMPILE_THREADS", "8");
    compile_and_emit(&program, parallel_dir.path());

    // Out-of-range overrides fall back to detection and still succeed.
    let fallback_dir = tempfile::tempdir().unwrap();
    std::env::set_var("LUMA_COMPILE_THREADS", "100");
    compile_and_emit(&program, fallback_dir.path());
    std::env::remove_var("LUMA_COMPILE_THREADS");

    for i in 0..8 {
        let name = format!("m{}.o", i);
        let serial = std::fs::read(serial_dir.path().join(&name)).unwrap();
        let parallel = std::fs::read(parallel_dir.path().join(&name)).unwrap();
        assert_eq!(serial, parallel, "object {} differs across worker counts", name);
    }
}

#[test]
fn intermediates_are_written_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let program = two_module_program();

    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    cg.compile_program(&program).unwrap();
    objects::save_intermediate_files(&cg, dir.path()).unwrap();

    for name in ["util", "main"] {
        let ll = dir.path().join(format!("{}.ll", name));
        let asm = dir.path().join(format!("{}.s", name));
        assert!(ll.exists(), "missing {}", ll.display());
        assert!(asm.exists(), "missing {}", asm.display());
        let ir = std::fs::read_to_string(&ll).unwrap();
        assert!(ir.contains("ModuleID"), "IR dump looks empty: {}", ir);
    }
}

#[test]
fn emission_with_no_modules_fails() {
    let dir = tempfile::tempdir().unwrap();
    let context = Context::create();
    let cg = CodeGen::new(&context);
    assert!(objects::emit_objects(&cg, dir.path()).is_err());
}
