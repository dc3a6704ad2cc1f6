//! Top-level item lowering.
//!
//! The dependency scheduler hands each module body here once its
//! dependencies are lowered. Every non-`use` statement dispatches to the
//! matching lowerer: functions, structs, enums, and module-level
//! variables. Function linkage follows visibility, except `main`, which
//! is always external.

use inkwell::module::Linkage;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum};

use crate::diagnostics::CgResult;

use super::{CodeGen, FnCtx, LocalSlot, Symbol, SymbolType, SymbolValue, ValueShape};
use luma_ast as ast;

impl<'ctx> CodeGen<'ctx> {
    /// Lower every non-`use` statement of a module body. `use`
    /// directives were consumed by the link pass.
    pub(crate) fn lower_module_body(&self, idx: usize, module: &ast::Module) -> CgResult<()> {
        self.set_current_unit(idx);
        for stmt in &module.body {
            match stmt {
                ast::Stmt::Use(_) => {}
                other => self.lower_top_stmt(other)?,
            }
        }
        Ok(())
    }

    fn lower_top_stmt(&self, stmt: &ast::Stmt) -> CgResult<()> {
        match stmt {
            ast::Stmt::FnDecl(decl) => self.lower_fn_decl(decl),
            ast::Stmt::StructDecl(decl) => self.lower_struct_decl(decl),
            ast::Stmt::EnumDecl(decl) => self.lower_enum_decl(decl),
            ast::Stmt::VarDecl(decl) => self.lower_global_var(decl),
            _ => Err(self.error_here("statement not allowed at module scope")),
        }
    }

    // --- Functions ---

    fn lower_fn_decl(&self, decl: &ast::FnDecl) -> CgResult<()> {
        let current_idx = self.current_unit_index()?;
        if self.find_symbol_in_unit(current_idx, &decl.name).is_some() {
            return Err(self.error_here(format!(
                "symbol `{}` is already defined in this module",
                decl.name
            )));
        }

        let mut param_types: Vec<BasicTypeEnum<'ctx>> = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let ty = self.map_type(&param.ty)?.ok_or_else(|| {
                self.error_here(format!(
                    "parameter `{}` of `{}` cannot have void type",
                    param.name, decl.name
                ))
            })?;
            param_types.push(ty);
        }
        let ret_ty = self.map_type(&decl.return_type)?;

        let param_meta: Vec<BasicMetadataTypeEnum<'ctx>> =
            param_types.iter().map(|&t| t.into()).collect();
        let fn_type = match ret_ty {
            Some(t) => t.fn_type(&param_meta, false),
            None => self.context.void_type().fn_type(&param_meta, false),
        };

        // `main` must always be external so the C runtime can find it.
        let linkage = if decl.is_public || decl.name == "main" {
            Linkage::External
        } else {
            Linkage::Internal
        };
        let function = self.units[current_idx]
            .module
            .add_function(&decl.name, fn_type, Some(linkage));

        // Register before lowering the body so recursive calls resolve.
        self.add_symbol(Symbol {
            name: decl.name.clone(),
            value: SymbolValue::Function(function),
            ty: SymbolType::Function(fn_type),
            shape: ValueShape::Direct,
        })?;

        self.current_function.set(Some(function));
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        let mut fcx = FnCtx::new(ret_ty);
        for (i, param) in decl.params.iter().enumerate() {
            let arg = function.get_nth_param(i as u32).ok_or_else(|| {
                self.error_here(format!("missing parameter {} of `{}`", i, decl.name))
            })?;
            let ty = param_types[i];
            let slot = self.alloca_and_store(ty, arg, &param.name)?;
            fcx.insert(
                param.name.clone(),
                LocalSlot {
                    ptr: slot,
                    ty,
                    nominal: Self::nominal_name(&param.ty),
                },
            );
        }

        for stmt in &decl.body {
            self.lower_stmt(&mut fcx, stmt)?;
        }

        if !self.block_has_terminator() {
            match fcx.ret_ty {
                None => {
                    self.run_deferred(&mut fcx)?;
                    self.builder.build_return(None)?;
                }
                Some(_) => {
                    return Err(self.error_here(format!(
                        "function `{}` is missing a return statement",
                        decl.name
                    )))
                }
            }
        }

        self.current_function.set(None);
        Ok(())
    }

    // --- Enums ---

    /// Enum members become internal constant globals named
    /// `Enum.Member`; qualified access returns their initializers.
    fn lower_enum_decl(&self, decl: &ast::EnumDecl) -> CgResult<()> {
        self.enum_names.borrow_mut().insert(decl.name.clone());

        let mut next_value: i64 = 0;
        for member in &decl.members {
            let value = member.value.unwrap_or(next_value);
            next_value = value + 1;

            let qualified = format!("{}.{}", decl.name, member.name);
            let global = self
                .current_unit()?
                .module
                .add_global(self.i32_t, None, &qualified);
            global.set_initializer(&self.i32_t.const_int(value as u64, true));
            global.set_constant(true);
            global.set_linkage(Linkage::Internal);

            self.add_symbol(Symbol {
                name: qualified,
                value: SymbolValue::Global(global),
                ty: SymbolType::Value(self.i32_t.into()),
                shape: ValueShape::Direct,
            })?;
        }
        Ok(())
    }

    // --- Module-level variables ---

    fn lower_global_var(&self, decl: &ast::VarDecl) -> CgResult<()> {
        let current_idx = self.current_unit_index()?;
        if self.find_symbol_in_unit(current_idx, &decl.name).is_some() {
            return Err(self.error_here(format!(
                "symbol `{}` is already defined in this module",
                decl.name
            )));
        }

        let ty = match &decl.ty {
            Some(ann) => self.map_type(ann)?.ok_or_else(|| {
                self.error_here(format!("variable `{}` cannot have void type", decl.name))
            })?,
            None => match &decl.init {
                Some(init) => self.literal_type(init).ok_or_else(|| {
                    self.error_here(format!(
                        "cannot infer a type for `{}`; add an annotation",
                        decl.name
                    ))
                })?,
                None => {
                    return Err(self.error_here(format!(
                        "variable `{}` needs a type annotation or an initializer",
                        decl.name
                    )))
                }
            },
        };

        let initializer = match &decl.init {
            Some(init) => self.lower_const_expr(init, ty)?,
            None => ty.const_zero(),
        };

        let global = self.units[current_idx]
            .module
            .add_global(ty, None, &decl.name);
        global.set_initializer(&initializer);
        global.set_linkage(if decl.is_public {
            Linkage::External
        } else {
            Linkage::Internal
        });

        let shape = match &decl.ty {
            Some(ann) => match self.pointee_type(ann)? {
                Some(pointee) => ValueShape::PointerTo(pointee),
                None => ValueShape::Direct,
            },
            None => ValueShape::Direct,
        };

        self.add_symbol(Symbol {
            name: decl.name.clone(),
            value: SymbolValue::Global(global),
            ty: SymbolType::Value(ty),
            shape,
        })?;
        Ok(())
    }

    /// The LLVM type of a literal, for globals without annotations.
    pub(crate) fn literal_type(&self, expr: &ast::Expr) -> Option<BasicTypeEnum<'ctx>> {
        match expr {
            ast::Expr::Int(_) => Some(self.i32_t.into()),
            ast::Expr::Float(_) => Some(self.f64_t.into()),
            ast::Expr::Bool(_) => Some(self.bool_t.into()),
            ast::Expr::Str(_) => Some(self.ptr_t.into()),
            _ => None,
        }
    }
}
