//! `use`-directive symbol import machinery.
//!
//! Importing a module creates external declarations in the current unit
//! for every source symbol with external linkage: functions via an
//! add-function with the source's function type, globals via an
//! add-global with the source's value type. The LLVM-level declaration
//! always carries the source symbol's real name so the linker can resolve
//! it; the symbol-table binding uses `alias.name` when the directive gave
//! an alias. Calling conventions and per-parameter alignment attributes
//! are preserved so struct-ABI calls agree across modules.

use inkwell::attributes::{Attribute, AttributeLoc};
use inkwell::module::Linkage;
use inkwell::values::FunctionValue;

use crate::diagnostics::{emit_diagnostic, CgResult, Diagnostic};

use super::{CodeGen, Symbol, SymbolType, SymbolValue};
use luma_ast as ast;

impl<'ctx> CodeGen<'ctx> {
    /// Pass-2 handler for a single `use` directive. Unknown modules are
    /// fatal; a module importing itself warns and is skipped.
    pub(crate) fn lower_use(&self, use_decl: &ast::UseDecl) -> CgResult<()> {
        let current_idx = self.current_unit_index()?;
        let source_idx = self.find_unit(&use_decl.module).ok_or_else(|| {
            self.error_here(format!(
                "cannot import module `{}`: module not found",
                use_decl.module
            ))
        })?;

        if source_idx == current_idx {
            emit_diagnostic(
                &Diagnostic::warning(format!(
                    "module `{}` trying to import itself; skipping",
                    use_decl.module
                ))
                .in_module(self.units[current_idx].name.clone()),
            );
            return Ok(());
        }

        self.import_module_symbols(source_idx, use_decl.alias.as_deref())
    }

    /// Import every externally-linked symbol of `source_idx` into the
    /// current unit. Duplicate imports (binding name already present) are
    /// no-ops.
    pub fn import_module_symbols(&self, source_idx: usize, alias: Option<&str>) -> CgResult<()> {
        // Snapshot the source list; importing only touches the current
        // unit's tables.
        let source_symbols: Vec<Symbol<'ctx>> = self.units[source_idx].symbols.borrow().clone();

        for sym in &source_symbols {
            if sym.linkage() != Linkage::External {
                continue;
            }
            if sym.is_function() {
                self.import_function_symbol(sym, alias)?;
            } else {
                self.import_variable_symbol(sym, alias)?;
            }
        }
        Ok(())
    }

    /// Create an external function declaration for `source_sym` in the
    /// current unit and bind it under `alias.name` (or `name`).
    pub(crate) fn import_function_symbol(
        &self,
        source_sym: &Symbol<'ctx>,
        alias: Option<&str>,
    ) -> CgResult<()> {
        let current_idx = self.current_unit_index()?;
        let binding = binding_name(alias, &source_sym.name);
        if self.find_symbol_in_unit(current_idx, &binding).is_some() {
            return Ok(());
        }

        let source_fn = source_sym.function_value().ok_or_else(|| {
            self.error_here(format!("symbol `{}` is not a function", source_sym.name))
        })?;
        let fn_type = source_fn.get_type();

        let module = &self.units[current_idx].module;
        let external = match module.get_function(&source_sym.name) {
            Some(f) => f,
            None => {
                let f = module.add_function(&source_sym.name, fn_type, Some(Linkage::External));
                self.copy_function_abi(source_fn, f);
                f
            }
        };

        self.add_symbol_to_unit(
            current_idx,
            Symbol {
                name: binding,
                value: SymbolValue::Function(external),
                ty: SymbolType::Function(fn_type),
                shape: source_sym.shape,
            },
        );
        Ok(())
    }

    /// Create an external global declaration for `source_sym` in the
    /// current unit and bind it under `alias.name` (or `name`).
    pub(crate) fn import_variable_symbol(
        &self,
        source_sym: &Symbol<'ctx>,
        alias: Option<&str>,
    ) -> CgResult<()> {
        let current_idx = self.current_unit_index()?;
        let binding = binding_name(alias, &source_sym.name);
        if self.find_symbol_in_unit(current_idx, &binding).is_some() {
            return Ok(());
        }

        let value_ty = match source_sym.ty {
            SymbolType::Value(ty) => ty,
            SymbolType::Function(_) => {
                return Err(self.error_here(format!(
                    "symbol `{}` is a function, not a variable",
                    source_sym.name
                )))
            }
        };

        let module = &self.units[current_idx].module;
        let external = match module.get_global(&source_sym.name) {
            Some(g) => g,
            None => {
                let g = module.add_global(value_ty, None, &source_sym.name);
                g.set_linkage(Linkage::External);
                g
            }
        };

        self.add_symbol_to_unit(
            current_idx,
            Symbol {
                name: binding,
                value: SymbolValue::Global(external),
                ty: SymbolType::Value(value_ty),
                shape: source_sym.shape,
            },
        );
        Ok(())
    }

    /// Propagate the calling convention and per-parameter `align`
    /// attributes from a source function to its external declaration.
    pub(crate) fn copy_function_abi(&self, source: FunctionValue<'ctx>, dest: FunctionValue<'ctx>) {
        dest.set_call_conventions(source.get_call_conventions());

        let align_kind = Attribute::get_named_enum_kind_id("align");
        for i in 0..source.count_params() {
            if let Some(attr) = source.get_enum_attribute(AttributeLoc::Param(i), align_kind) {
                dest.add_attribute(AttributeLoc::Param(i), attr);
            }
        }
    }
}

pub(crate) fn binding_name(alias: Option<&str>, name: &str) -> String {
    match alias {
        Some(a) => format!("{}.{}", a, name),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_uses_alias_when_given() {
        assert_eq!(binding_name(Some("io"), "println"), "io.println");
        assert_eq!(binding_name(None, "println"), "println");
    }
}
