//! Registry, symbol table, and cache behavior.

mod common;

use common::*;
use inkwell::context::Context;
use inkwell::module::Linkage;
use luma_ast::{Module, Program};
use lumac::codegen::CodeGen;

#[test]
fn duplicate_module_name_is_fatal() {
    let _quiet = lumac::diagnostics::suppress();
    let program = Program::new(vec![util_module(), util_module()]);

    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    let err = cg.compile_program(&program).unwrap_err();
    assert!(
        err.message.contains("duplicate module definition"),
        "unexpected message: {}",
        err.message
    );
    assert!(err.message.contains("util"));
}

#[test]
fn duplicate_module_produces_no_object_files() {
    let _quiet = lumac::diagnostics::suppress();
    let program = Program::new(vec![util_module(), util_module()]);

    let dir = tempfile::tempdir().unwrap();
    let mut config = lumac::BuildConfig::new(
        dir.path().join("out").display().to_string(),
    );
    config.out_dir = Some(dir.path().to_path_buf());

    assert!(lumac::build(&program, &config).is_err());
    let objects: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "o"))
        .collect();
    assert!(objects.is_empty(), "expected no object files");
}

#[test]
fn main_module_is_flagged() {
    let program = two_module_program();
    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    cg.compile_program(&program).unwrap();

    let main_idx = cg.find_unit("main").unwrap();
    let util_idx = cg.find_unit("util").unwrap();
    assert!(cg.units[main_idx].is_main);
    assert!(!cg.units[util_idx].is_main);
}

#[test]
fn main_symbol_has_external_linkage() {
    let program = two_module_program();
    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    cg.compile_program(&program).unwrap();

    let main_idx = cg.find_unit("main").unwrap();
    let sym = cg.find_symbol_in_unit(main_idx, "main").unwrap();
    assert_eq!(sym.linkage(), Linkage::External);
}

#[test]
fn private_functions_get_internal_linkage() {
    let program = Program::new(vec![Module::new(
        "main",
        vec![
            private_fn(
                "helper",
                luma_ast::TypeAnn::I32,
                vec![ret(int(7))],
            ),
            main_fn(vec![ret(call("helper", vec![]))]),
        ],
    )]);

    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    cg.compile_program(&program).unwrap();

    let idx = cg.find_unit("main").unwrap();
    let sym = cg.find_symbol_in_unit(idx, "helper").unwrap();
    assert_eq!(sym.linkage(), Linkage::Internal);
}

/// After warm-up, a cached lookup and a linear search of the registry
/// return the same referent for every symbol.
#[test]
fn cached_symbol_lookups_agree_with_linear_search() {
    let program = two_module_program();
    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    cg.compile_program(&program).unwrap();
    cg.warm_caches();

    for idx in 0..cg.units.len() {
        let unit_name = cg.units[idx].name.clone();
        let symbol_names: Vec<String> = cg.units[idx]
            .symbols
            .borrow()
            .iter()
            .map(|s| s.name.clone())
            .collect();

        for name in symbol_names {
            let cached = cg.find_symbol(&name, Some(&unit_name)).unwrap();
            let linear = cg
                .units[idx]
                .symbols
                .borrow()
                .iter()
                .find(|s| s.name == name)
                .cloned()
                .unwrap();
            assert_eq!(
                cached.value, linear.value,
                "cache disagrees with linear search for `{}:{}`",
                unit_name, name
            );
        }
    }
}

/// Unqualified lookup prefers the current unit, then scans the registry
/// in insertion order.
#[test]
fn unqualified_lookup_prefers_current_unit() {
    let program = two_module_program();
    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    cg.compile_program(&program).unwrap();

    let main_idx = cg.find_unit("main").unwrap();
    cg.set_current_unit(main_idx);
    let sym = cg.find_symbol("main", None).unwrap();
    assert_eq!(sym.name, "main");

    // `add` lives only in util and is still reachable without a module.
    let sym = cg.find_symbol("add", None).unwrap();
    assert!(sym.is_function());
}

#[test]
fn empty_module_name_is_rejected() {
    let _quiet = lumac::diagnostics::suppress();
    let program = Program::new(vec![Module::new("", vec![])]);
    let context = Context::create();
    let mut cg = CodeGen::new(&context);
    assert!(cg.compile_program(&program).is_err());
}
