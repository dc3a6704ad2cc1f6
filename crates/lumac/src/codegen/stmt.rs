//! Statement lowering inside function bodies.
//!
//! Statements after a terminator are dead and silently skipped, which
//! keeps block construction simple: `return`, `break`, and `continue`
//! terminate the current block and whatever follows them in the same
//! block never lowers.

use crate::diagnostics::CgResult;

use super::{CodeGen, FnCtx, LocalSlot, LoopContext};
use luma_ast as ast;

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn lower_stmt(&self, fcx: &mut FnCtx<'ctx>, stmt: &ast::Stmt) -> CgResult<()> {
        if self.block_has_terminator() {
            return Ok(());
        }

        match stmt {
            ast::Stmt::VarDecl(decl) => self.lower_local_var(fcx, decl),
            ast::Stmt::Return(value) => self.lower_return(fcx, value.as_ref()),
            ast::Stmt::ExprStmt(expr) => {
                self.lower_expr(fcx, expr)?;
                Ok(())
            }
            ast::Stmt::If(if_stmt) => self.lower_if(fcx, if_stmt),
            ast::Stmt::While(while_stmt) => self.lower_while(fcx, while_stmt),
            ast::Stmt::Block(stmts) => {
                fcx.locals.push(Default::default());
                for s in stmts {
                    self.lower_stmt(fcx, s)?;
                }
                fcx.locals.pop();
                Ok(())
            }
            ast::Stmt::Break => {
                let target = self
                    .loop_stack
                    .borrow()
                    .last()
                    .map(|ctx| ctx.break_block)
                    .ok_or_else(|| self.error_here("`break` outside of a loop"))?;
                self.builder.build_unconditional_branch(target)?;
                Ok(())
            }
            ast::Stmt::Continue => {
                let target = self
                    .loop_stack
                    .borrow()
                    .last()
                    .map(|ctx| ctx.continue_block)
                    .ok_or_else(|| self.error_here("`continue` outside of a loop"))?;
                self.builder.build_unconditional_branch(target)?;
                Ok(())
            }
            ast::Stmt::Defer(inner) => {
                fcx.deferred.push((**inner).clone());
                Ok(())
            }
            ast::Stmt::Use(_) => Err(self.error_here("`use` is only allowed at module scope")),
            ast::Stmt::FnDecl(_) | ast::Stmt::StructDecl(_) | ast::Stmt::EnumDecl(_) => {
                Err(self.error_here("declaration not allowed inside a function body"))
            }
        }
    }

    fn lower_local_var(&self, fcx: &mut FnCtx<'ctx>, decl: &ast::VarDecl) -> CgResult<()> {
        let annotated = match &decl.ty {
            Some(ann) => self.map_type(ann)?,
            None => None,
        };
        if decl.ty.is_some() && annotated.is_none() {
            return Err(self.error_here(format!(
                "variable `{}` cannot have void type",
                decl.name
            )));
        }

        let init = match &decl.init {
            Some(expr) => Some(self.lower_value(fcx, expr)?),
            None => None,
        };

        let ty = match (annotated, init) {
            (Some(t), _) => t,
            (None, Some(v)) => v.get_type(),
            (None, None) => {
                return Err(self.error_here(format!(
                    "variable `{}` needs a type annotation or an initializer",
                    decl.name
                )))
            }
        };

        let slot = self.builder.build_alloca(ty, &decl.name)?;
        if let Some(value) = init {
            let value = self.coerce(value, ty)?;
            self.builder.build_store(slot, value)?;
        }

        let nominal = decl
            .ty
            .as_ref()
            .and_then(Self::nominal_name)
            .or_else(|| self.struct_name_of_expr(decl.init.as_ref()));
        fcx.insert(decl.name.clone(), LocalSlot { ptr: slot, ty, nominal });
        Ok(())
    }

    fn lower_return(&self, fcx: &mut FnCtx<'ctx>, value: Option<&ast::Expr>) -> CgResult<()> {
        match (value, fcx.ret_ty) {
            (Some(expr), Some(ret_ty)) => {
                let raw = self.lower_value(fcx, expr)?;
                let coerced = self.coerce(raw, ret_ty)?;
                self.run_deferred(fcx)?;
                self.builder.build_return(Some(&coerced))?;
            }
            (None, None) => {
                self.run_deferred(fcx)?;
                self.builder.build_return(None)?;
            }
            (Some(_), None) => {
                return Err(self.error_here("returning a value from a void function"))
            }
            (None, Some(_)) => {
                return Err(self.error_here("missing value in return from non-void function"))
            }
        }
        Ok(())
    }

    /// Run deferred statements last-in first-out. Called before every
    /// return; the list is not drained so each exit path sees all of it.
    pub(crate) fn run_deferred(&self, fcx: &mut FnCtx<'ctx>) -> CgResult<()> {
        let deferred = fcx.deferred.clone();
        for stmt in deferred.iter().rev() {
            self.lower_stmt(fcx, stmt)?;
        }
        Ok(())
    }

    fn lower_if(&self, fcx: &mut FnCtx<'ctx>, if_stmt: &ast::IfStmt) -> CgResult<()> {
        let cond = self.lower_condition(fcx, &if_stmt.cond)?;
        let function = self
            .current_function
            .get()
            .ok_or_else(|| self.error_here("`if` outside of a function"))?;

        let then_bb = self.context.append_basic_block(function, "then");
        let merge_bb = self.context.append_basic_block(function, "ifcont");
        let else_bb = match if_stmt.else_body {
            Some(_) => self.context.append_basic_block(function, "else"),
            None => merge_bb,
        };
        self.builder.build_conditional_branch(cond, then_bb, else_bb)?;

        self.builder.position_at_end(then_bb);
        fcx.locals.push(Default::default());
        for s in &if_stmt.then_body {
            self.lower_stmt(fcx, s)?;
        }
        fcx.locals.pop();
        self.branch_if_no_terminator(merge_bb)?;

        if let Some(else_body) = &if_stmt.else_body {
            self.builder.position_at_end(else_bb);
            fcx.locals.push(Default::default());
            for s in else_body {
                self.lower_stmt(fcx, s)?;
            }
            fcx.locals.pop();
            self.branch_if_no_terminator(merge_bb)?;
        }

        self.builder.position_at_end(merge_bb);
        Ok(())
    }

    fn lower_while(&self, fcx: &mut FnCtx<'ctx>, while_stmt: &ast::WhileStmt) -> CgResult<()> {
        let function = self
            .current_function
            .get()
            .ok_or_else(|| self.error_here("loop outside of a function"))?;
        let cond_bb = self.context.append_basic_block(function, "loop.cond");
        let body_bb = self.context.append_basic_block(function, "loop.body");
        let after_bb = self.context.append_basic_block(function, "loop.end");

        self.builder.build_unconditional_branch(cond_bb)?;
        self.builder.position_at_end(cond_bb);
        let cond = self.lower_condition(fcx, &while_stmt.cond)?;
        self.builder.build_conditional_branch(cond, body_bb, after_bb)?;

        self.loop_stack.borrow_mut().push(LoopContext {
            continue_block: cond_bb,
            break_block: after_bb,
        });

        self.builder.position_at_end(body_bb);
        fcx.locals.push(Default::default());
        for s in &while_stmt.body {
            self.lower_stmt(fcx, s)?;
        }
        fcx.locals.pop();
        self.branch_if_no_terminator(cond_bb)?;

        self.loop_stack.borrow_mut().pop();
        self.builder.position_at_end(after_bb);
        Ok(())
    }

    /// Lower an expression used as a branch condition to an i1.
    fn lower_condition(
        &self,
        fcx: &mut FnCtx<'ctx>,
        expr: &ast::Expr,
    ) -> CgResult<inkwell::values::IntValue<'ctx>> {
        let value = self.lower_value(fcx, expr)?;
        match value {
            inkwell::values::BasicValueEnum::IntValue(v) => {
                if v.get_type().get_bit_width() == 1 {
                    Ok(v)
                } else {
                    Ok(self.builder.build_int_compare(
                        inkwell::IntPredicate::NE,
                        v,
                        v.get_type().const_zero(),
                        "tobool",
                    )?)
                }
            }
            _ => Err(self.error_here("condition must be a boolean or integer expression")),
        }
    }

    /// Struct name of an initializer, so field access works on locals
    /// bound from struct literals or struct-returning calls.
    fn struct_name_of_expr(&self, expr: Option<&ast::Expr>) -> Option<String> {
        match expr? {
            ast::Expr::StructLit { name, .. } => Some(name.clone()),
            _ => None,
        }
    }
}
