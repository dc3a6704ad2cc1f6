//! Compile-time (`::`) qualified symbol resolution.
//!
//! `A::B` resolves against the symbol tables at compile time:
//! the qualified binding `A.B` in the current unit wins, then every other
//! unit is searched for `B`. Functions found elsewhere gain an external
//! declaration in the current unit (calling convention preserved) and are
//! recorded under both `B` and `A.B`, so resolving the same name twice
//! returns the same declaration. Non-function symbols are imported as
//! variables and loaded. Chained `A::B::C` resolves the type-qualified
//! name `B.C` to an enum constant's initializer.

use inkwell::values::{BasicValueEnum, FunctionValue};

use crate::diagnostics::CgResult;

use super::{CodeGen, Symbol, SymbolType, SymbolValue};
use luma_ast as ast;

impl<'ctx> CodeGen<'ctx> {
    /// Resolve a compile-time member access to a value. `object` is the
    /// left side of `::`; chained access nests another compile-time
    /// member node there.
    pub fn resolve_qualified(
        &self,
        object: &ast::Expr,
        member: &str,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        // Chained compile-time access: Module::Type::member.
        if let ast::Expr::Member {
            object: inner,
            member: type_name,
            is_compiletime: true,
        } = object
        {
            let module_name = match inner.as_ref() {
                ast::Expr::Ident(name) => name,
                _ => {
                    return Err(
                        self.error_here("expected identifier in chained compile-time access")
                    )
                }
            };
            return self.resolve_enum_member(module_name, type_name, member);
        }

        let object_name = match object {
            ast::Expr::Ident(name) => name,
            _ => {
                return Err(self.error_here(
                    "expected identifier on the left of compile-time access",
                ))
            }
        };

        let qualified = format!("{}.{}", object_name, member);
        let current_idx = self.current_unit_index()?;

        // Already bound in the current unit, typically by a `use` import.
        if let Some(sym) = self.find_symbol_in_unit(current_idx, &qualified) {
            return self.symbol_as_value(&sym);
        }

        // Search the other units and create declarations on demand.
        for idx in 0..self.units.len() {
            if idx == current_idx {
                continue;
            }
            let found = self.find_symbol_in_unit(idx, member);
            let Some(sym) = found else { continue };

            if sym.is_function() {
                let f = self.declare_qualified_function(&sym, member, &qualified)?;
                return Ok(f.as_global_value().as_pointer_value().into());
            }
            if sym.is_enum_constant() {
                return self.enum_initializer(&sym);
            }

            // Module-level variable: import it under the qualified name
            // and load through the new declaration.
            self.import_variable_symbol(&sym, Some(object_name))?;
            if let Some(imported) = self.find_symbol_in_unit(current_idx, &qualified) {
                return self.symbol_as_value(&imported);
            }
        }

        Err(self.error_here(format!(
            "no compile-time symbol `{}::{}` found (`{}` is unresolved)",
            object_name, member, member
        )))
    }

    /// Resolve a compile-time access used as a call target. Returns the
    /// function to call.
    pub fn resolve_qualified_callee(
        &self,
        object: &ast::Expr,
        member: &str,
    ) -> CgResult<FunctionValue<'ctx>> {
        let object_name = match object {
            ast::Expr::Ident(name) => name,
            _ => {
                return Err(self.error_here(
                    "expected identifier on the left of compile-time access",
                ))
            }
        };

        let qualified = format!("{}.{}", object_name, member);
        let current_idx = self.current_unit_index()?;

        if let Some(sym) = self.find_symbol_in_unit(current_idx, &qualified) {
            return sym.function_value().ok_or_else(|| {
                self.error_here(format!("`{}::{}` is not callable", object_name, member))
            });
        }

        for idx in 0..self.units.len() {
            if idx == current_idx {
                continue;
            }
            if let Some(sym) = self.find_symbol_in_unit(idx, member) {
                if sym.is_function() {
                    return self.declare_qualified_function(&sym, member, &qualified);
                }
            }
        }

        Err(self.error_here(format!(
            "no compile-time symbol `{}::{}` found (`{}` is unresolved)",
            object_name, member, member
        )))
    }

    /// Chained `Module::Type::Member` lookup of the type-qualified name
    /// `Type.Member`: the named module first, then the current unit, then
    /// every other unit. Only enum constants resolve this way.
    fn resolve_enum_member(
        &self,
        module_name: &str,
        type_name: &str,
        member: &str,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        let type_qualified = format!("{}.{}", type_name, member);

        let source_idx = self.find_unit(module_name);
        if let Some(idx) = source_idx {
            if let Some(sym) = self.find_symbol_in_unit(idx, &type_qualified) {
                if sym.is_enum_constant() {
                    return self.enum_initializer(&sym);
                }
            }
        }

        let current_idx = self.current_unit_index()?;
        if let Some(sym) = self.find_symbol_in_unit(current_idx, &type_qualified) {
            if sym.is_enum_constant() {
                return self.enum_initializer(&sym);
            }
        }

        for idx in 0..self.units.len() {
            if idx == current_idx || Some(idx) == source_idx {
                continue;
            }
            if let Some(sym) = self.find_symbol_in_unit(idx, &type_qualified) {
                if sym.is_enum_constant() {
                    return self.enum_initializer(&sym);
                }
            }
        }

        Err(self.error_here(format!(
            "enum member `{}::{}::{}` not found (`{}` is unresolved)",
            module_name, type_name, member, type_qualified
        )))
    }

    /// Create (or reuse) the external declaration for a cross-module
    /// function and record it under both its plain and qualified name.
    fn declare_qualified_function(
        &self,
        source_sym: &Symbol<'ctx>,
        member: &str,
        qualified: &str,
    ) -> CgResult<FunctionValue<'ctx>> {
        let current_idx = self.current_unit_index()?;
        let source_fn = source_sym
            .function_value()
            .ok_or_else(|| self.error_here(format!("symbol `{}` is not a function", member)))?;
        let fn_type = source_fn.get_type();

        let module = &self.units[current_idx].module;
        if let Some(existing) = module.get_function(member) {
            return Ok(existing);
        }

        let external = module.add_function(member, fn_type, Some(inkwell::module::Linkage::External));
        self.copy_function_abi(source_fn, external);

        for name in [member, qualified] {
            self.add_symbol_to_unit(
                current_idx,
                Symbol {
                    name: name.to_string(),
                    value: SymbolValue::Function(external),
                    ty: SymbolType::Function(fn_type),
                    shape: source_sym.shape,
                },
            );
        }
        Ok(external)
    }

    /// Turn a resolved symbol into an expression value: functions become
    /// their address, enum constants their initializer, globals a load.
    pub(crate) fn symbol_as_value(&self, sym: &Symbol<'ctx>) -> CgResult<BasicValueEnum<'ctx>> {
        match sym.value {
            SymbolValue::Function(f) => Ok(f.as_global_value().as_pointer_value().into()),
            SymbolValue::Global(g) => {
                if sym.is_enum_constant() {
                    return self.enum_initializer(sym);
                }
                match sym.ty {
                    SymbolType::Value(_) => {}
                    SymbolType::Function(_) => {
                        return Err(self.error_here(format!(
                            "symbol `{}` has no loadable value",
                            sym.name
                        )))
                    }
                };
                Ok(self.builder.build_load(g.as_pointer_value(), "load")?)
            }
        }
    }

    fn enum_initializer(&self, sym: &Symbol<'ctx>) -> CgResult<BasicValueEnum<'ctx>> {
        sym.global_value()
            .and_then(|g| g.get_initializer())
            .ok_or_else(|| {
                self.error_here(format!("enum constant `{}` has no initializer", sym.name))
            })
    }
}
