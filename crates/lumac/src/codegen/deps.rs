//! Dependency-ordered code emission.
//!
//! One dependency record is built per module from its `use` directives,
//! fresh for every emission pass. The scheduler then walks each module
//! depth-first, lowering dependencies before dependents; modules at the
//! same depth are visited in program order. A module's record is marked
//! `Done` only after its body has been lowered, and re-entering a module
//! that is still `Visiting` is a dependency cycle, reported with every
//! module on the cycle named.

use std::cell::Cell;

use crate::diagnostics::{CgResult, Diagnostic};

use super::CodeGen;
use luma_ast as ast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    /// On the current depth-first path; seeing this again means a cycle.
    Visiting,
    Done,
}

/// Per-module scheduling record for one emission pass.
#[derive(Debug)]
pub struct DependencyRecord {
    pub module_name: String,
    /// Direct dependencies in `use`-directive order.
    pub dependencies: Vec<String>,
    pub state: Cell<VisitState>,
}

/// Build one record per module, extracting `use` targets from the body.
pub fn build_dependency_records(program: &ast::Program) -> Vec<DependencyRecord> {
    program
        .modules
        .iter()
        .map(|module| DependencyRecord {
            module_name: module.name.clone(),
            // Self-imports are skipped with a warning during linking and
            // are not real dependencies.
            dependencies: module
                .use_targets()
                .into_iter()
                .filter(|target| *target != module.name)
                .map(str::to_string)
                .collect(),
            state: Cell::new(VisitState::Unvisited),
        })
        .collect()
}

/// Lower `name` and, first, everything it depends on.
pub fn lower_module_ordered<'ctx>(
    cg: &CodeGen<'ctx>,
    name: &str,
    program: &ast::Program,
    records: &[DependencyRecord],
) -> CgResult<()> {
    let mut path = Vec::new();
    lower_recursive(cg, name, program, records, &mut path)
}

fn lower_recursive<'ctx>(
    cg: &CodeGen<'ctx>,
    name: &str,
    program: &ast::Program,
    records: &[DependencyRecord],
    path: &mut Vec<String>,
) -> CgResult<()> {
    let record = records
        .iter()
        .find(|r| r.module_name == name)
        .ok_or_else(|| {
            Diagnostic::error(format!("module `{}` not found in dependency info", name))
        })?;

    match record.state.get() {
        VisitState::Done => return Ok(()),
        VisitState::Visiting => {
            let start = path.iter().position(|m| m == name).unwrap_or(0);
            let mut cycle: Vec<&str> = path[start..].iter().map(String::as_str).collect();
            cycle.push(name);
            return Err(Diagnostic::error(format!(
                "cycle in module dependency graph: {}",
                cycle.join(" -> ")
            )));
        }
        VisitState::Unvisited => {}
    }

    record.state.set(VisitState::Visiting);
    path.push(name.to_string());

    for dep in &record.dependencies {
        lower_recursive(cg, dep, program, records, path)?;
    }

    let module_ast = program
        .modules
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| Diagnostic::error(format!("module `{}` has no AST node", name)))?;
    let idx = cg
        .find_unit(name)
        .ok_or_else(|| Diagnostic::error(format!("module unit not found: `{}`", name)))?;
    cg.lower_module_body(idx, module_ast)?;

    path.pop();
    record.state.set(VisitState::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use luma_ast::{Module, Program, Stmt, UseDecl};

    fn use_stmt(target: &str) -> Stmt {
        Stmt::Use(UseDecl {
            module: target.to_string(),
            alias: None,
        })
    }

    #[test]
    fn records_follow_program_order() {
        let program = Program::new(vec![
            Module::new("util", vec![]),
            Module::new("main", vec![use_stmt("util")]),
        ]);
        let records = build_dependency_records(&program);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].module_name, "util");
        assert!(records[0].dependencies.is_empty());
        assert_eq!(records[1].dependencies, vec!["util".to_string()]);
        assert_eq!(records[1].state.get(), VisitState::Unvisited);
    }

    #[test]
    fn use_order_is_preserved() {
        let program = Program::new(vec![Module::new(
            "main",
            vec![use_stmt("b"), use_stmt("a"), use_stmt("c")],
        )]);
        let records = build_dependency_records(&program);
        assert_eq!(records[0].dependencies, vec!["b", "a", "c"]);
    }

    #[test]
    fn self_references_are_not_dependencies() {
        let program = Program::new(vec![Module::new(
            "main",
            vec![use_stmt("main"), use_stmt("util")],
        )]);
        let records = build_dependency_records(&program);
        assert_eq!(records[0].dependencies, vec!["util"]);
    }
}
