//! Expression lowering.
//!
//! `lower_expr` returns `None` for void-valued expressions (calls to void
//! functions); `lower_value` is the strict variant used anywhere a value
//! is required. Cross-module references resolve lazily: an unqualified
//! name found in another unit is imported into the current unit on first
//! use, so external declarations exist only for symbols actually
//! referenced.

use inkwell::module::Linkage;
use inkwell::types::{BasicMetadataTypeEnum, BasicTypeEnum};
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

use crate::diagnostics::{emit_diagnostic, CgResult};

use super::{CodeGen, FnCtx, StructInfo, SymbolType, SymbolValue};
use luma_ast as ast;
use luma_ast::BinaryOp;

impl<'ctx> CodeGen<'ctx> {
    /// Lower an expression that must produce a value.
    pub(crate) fn lower_value(
        &self,
        fcx: &mut FnCtx<'ctx>,
        expr: &ast::Expr,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        self.lower_expr(fcx, expr)?
            .ok_or_else(|| self.error_here("void expression used where a value is required"))
    }

    pub(crate) fn lower_expr(
        &self,
        fcx: &mut FnCtx<'ctx>,
        expr: &ast::Expr,
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        match expr {
            ast::Expr::Int(v) => Ok(Some(self.i32_t.const_int(*v as u64, true).into())),
            ast::Expr::Float(v) => Ok(Some(self.f64_t.const_float(*v).into())),
            ast::Expr::Bool(b) => Ok(Some(self.bool_t.const_int(*b as u64, false).into())),
            ast::Expr::Str(s) => Ok(Some(self.lower_string_literal(s)?.into())),
            ast::Expr::Ident(name) => self.lower_ident(fcx, name).map(Some),
            ast::Expr::Binary { op, lhs, rhs } => {
                self.lower_binary(fcx, *op, lhs, rhs).map(Some)
            }
            ast::Expr::Call { callee, args } => self.lower_call(fcx, callee, args),
            ast::Expr::Member {
                object,
                member,
                is_compiletime,
            } => {
                if *is_compiletime {
                    self.resolve_qualified(object, member).map(Some)
                } else {
                    self.lower_field_access(fcx, object, member).map(Some)
                }
            }
            ast::Expr::Assign { target, value } => {
                self.lower_assign(fcx, target, value).map(Some)
            }
            ast::Expr::StructLit { name, fields } => {
                self.lower_struct_literal(fcx, name, fields).map(Some)
            }
        }
    }

    pub(crate) fn lower_string_literal(&self, raw: &str) -> CgResult<PointerValue<'ctx>> {
        let (bytes, warnings) = super::utils::process_escape_sequences(raw);
        for warning in warnings {
            emit_diagnostic(&warning);
        }
        self.intern_string_literal(&bytes)
    }

    fn lower_ident(&self, fcx: &mut FnCtx<'ctx>, name: &str) -> CgResult<BasicValueEnum<'ctx>> {
        if let Some(slot) = fcx.lookup(name).cloned() {
            return Ok(self.builder.build_load(slot.ptr, name)?);
        }

        let sym = self.resolve_unqualified(name)?.ok_or_else(|| {
            self.error_here(format!("symbol `{}` not found", name))
        })?;
        self.symbol_as_value(&sym)
    }

    /// Resolve an unqualified name against the current unit first, then
    /// every other unit. A hit in another unit is imported into the
    /// current one so the returned symbol is always locally usable.
    pub(crate) fn resolve_unqualified(
        &self,
        name: &str,
    ) -> CgResult<Option<super::Symbol<'ctx>>> {
        let current_idx = self.current_unit_index()?;
        if let Some(sym) = self.lookup_symbol_cached(current_idx, name) {
            return Ok(Some(sym));
        }

        for idx in 0..self.units.len() {
            if idx == current_idx {
                continue;
            }
            if let Some(sym) = self.lookup_symbol_cached(idx, name) {
                if sym.linkage() != Linkage::External {
                    continue;
                }
                if sym.is_function() {
                    self.import_function_symbol(&sym, None)?;
                } else {
                    self.import_variable_symbol(&sym, None)?;
                }
                return Ok(self.find_symbol_in_unit(current_idx, name));
            }
        }
        Ok(None)
    }

    // --- Binary operators ---

    fn lower_binary(
        &self,
        fcx: &mut FnCtx<'ctx>,
        op: BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        let l = self.lower_value(fcx, lhs)?;
        let r = self.lower_value(fcx, rhs)?;
        let (l, r) = self.promote_pair(l, r)?;

        match (l, r) {
            (BasicValueEnum::IntValue(a), BasicValueEnum::IntValue(b)) => {
                let value: BasicValueEnum = match op {
                    BinaryOp::Add => self.builder.build_int_add(a, b, "add")?.into(),
                    BinaryOp::Sub => self.builder.build_int_sub(a, b, "sub")?.into(),
                    BinaryOp::Mul => self.builder.build_int_mul(a, b, "mul")?.into(),
                    BinaryOp::Div => self.builder.build_int_signed_div(a, b, "div")?.into(),
                    BinaryOp::Rem => self.builder.build_int_signed_rem(a, b, "rem")?.into(),
                    BinaryOp::Eq => self
                        .builder
                        .build_int_compare(IntPredicate::EQ, a, b, "cmp")?
                        .into(),
                    BinaryOp::Ne => self
                        .builder
                        .build_int_compare(IntPredicate::NE, a, b, "cmp")?
                        .into(),
                    BinaryOp::Lt => self
                        .builder
                        .build_int_compare(IntPredicate::SLT, a, b, "cmp")?
                        .into(),
                    BinaryOp::Le => self
                        .builder
                        .build_int_compare(IntPredicate::SLE, a, b, "cmp")?
                        .into(),
                    BinaryOp::Gt => self
                        .builder
                        .build_int_compare(IntPredicate::SGT, a, b, "cmp")?
                        .into(),
                    BinaryOp::Ge => self
                        .builder
                        .build_int_compare(IntPredicate::SGE, a, b, "cmp")?
                        .into(),
                };
                Ok(value)
            }
            (BasicValueEnum::FloatValue(a), BasicValueEnum::FloatValue(b)) => {
                let value: BasicValueEnum = match op {
                    BinaryOp::Add => self.builder.build_float_add(a, b, "fadd")?.into(),
                    BinaryOp::Sub => self.builder.build_float_sub(a, b, "fsub")?.into(),
                    BinaryOp::Mul => self.builder.build_float_mul(a, b, "fmul")?.into(),
                    BinaryOp::Div => self.builder.build_float_div(a, b, "fdiv")?.into(),
                    BinaryOp::Rem => self.builder.build_float_rem(a, b, "frem")?.into(),
                    BinaryOp::Eq => self
                        .builder
                        .build_float_compare(FloatPredicate::OEQ, a, b, "fcmp")?
                        .into(),
                    BinaryOp::Ne => self
                        .builder
                        .build_float_compare(FloatPredicate::ONE, a, b, "fcmp")?
                        .into(),
                    BinaryOp::Lt => self
                        .builder
                        .build_float_compare(FloatPredicate::OLT, a, b, "fcmp")?
                        .into(),
                    BinaryOp::Le => self
                        .builder
                        .build_float_compare(FloatPredicate::OLE, a, b, "fcmp")?
                        .into(),
                    BinaryOp::Gt => self
                        .builder
                        .build_float_compare(FloatPredicate::OGT, a, b, "fcmp")?
                        .into(),
                    BinaryOp::Ge => self
                        .builder
                        .build_float_compare(FloatPredicate::OGE, a, b, "fcmp")?
                        .into(),
                };
                Ok(value)
            }
            _ => Err(self.error_here("binary operands must be numeric")),
        }
    }

    /// Promote two numeric operands to a common type: the wider integer
    /// width, or a float type when either side is floating.
    fn promote_pair(
        &self,
        l: BasicValueEnum<'ctx>,
        r: BasicValueEnum<'ctx>,
    ) -> CgResult<(BasicValueEnum<'ctx>, BasicValueEnum<'ctx>)> {
        match (l, r) {
            (BasicValueEnum::IntValue(a), BasicValueEnum::IntValue(b)) => {
                let (aw, bw) = (a.get_type().get_bit_width(), b.get_type().get_bit_width());
                if aw == bw {
                    Ok((l, r))
                } else if aw < bw {
                    let widened = self.builder.build_int_s_extend(a, b.get_type(), "sext")?;
                    Ok((widened.into(), r))
                } else {
                    let widened = self.builder.build_int_s_extend(b, a.get_type(), "sext")?;
                    Ok((l, widened.into()))
                }
            }
            (BasicValueEnum::FloatValue(_), BasicValueEnum::FloatValue(_)) => {
                let target: BasicTypeEnum = self.f64_t.into();
                Ok((self.coerce(l, target)?, self.coerce(r, target)?))
            }
            (BasicValueEnum::IntValue(_), BasicValueEnum::FloatValue(b)) => {
                Ok((self.coerce(l, b.get_type().into())?, r))
            }
            (BasicValueEnum::FloatValue(a), BasicValueEnum::IntValue(_)) => {
                Ok((l, self.coerce(r, a.get_type().into())?))
            }
            _ => Err(self.error_here("binary operands must be numeric")),
        }
    }

    /// Convert `value` to `target`, widening, truncating, or switching
    /// between int and float representations as needed.
    pub(crate) fn coerce(
        &self,
        value: BasicValueEnum<'ctx>,
        target: BasicTypeEnum<'ctx>,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        if value.get_type() == target {
            return Ok(value);
        }
        match (value, target) {
            (BasicValueEnum::IntValue(v), BasicTypeEnum::IntType(t)) => {
                let (vw, tw) = (v.get_type().get_bit_width(), t.get_bit_width());
                if vw < tw {
                    Ok(self.builder.build_int_s_extend(v, t, "sext")?.into())
                } else {
                    Ok(self.builder.build_int_truncate(v, t, "trunc")?.into())
                }
            }
            (BasicValueEnum::IntValue(v), BasicTypeEnum::FloatType(t)) => Ok(self
                .builder
                .build_signed_int_to_float(v, t, "sitofp")?
                .into()),
            (BasicValueEnum::FloatValue(v), BasicTypeEnum::IntType(t)) => Ok(self
                .builder
                .build_float_to_signed_int(v, t, "fptosi")?
                .into()),
            (BasicValueEnum::FloatValue(v), BasicTypeEnum::FloatType(t)) => {
                if target == self.f64_t.into() {
                    Ok(self.builder.build_float_ext(v, t, "fpext")?.into())
                } else {
                    Ok(self.builder.build_float_trunc(v, t, "fptrunc")?.into())
                }
            }
            _ => Err(self.error_here(format!(
                "type mismatch: cannot convert `{:?}` to `{:?}`",
                value.get_type(),
                target
            ))),
        }
    }

    // --- Calls ---

    fn lower_call(
        &self,
        fcx: &mut FnCtx<'ctx>,
        callee: &ast::Expr,
        args: &[ast::Expr],
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        let function = match callee {
            ast::Expr::Ident(name) => match self.resolve_unqualified(name)? {
                Some(sym) => sym.function_value().ok_or_else(|| {
                    self.error_here(format!("`{}` is not a function", name))
                })?,
                None if name == "output" => return self.lower_output_builtin(fcx, args),
                None => {
                    return Err(self.error_here(format!("function `{}` not found", name)))
                }
            },
            ast::Expr::Member {
                object,
                member,
                is_compiletime: true,
            } => self.resolve_qualified_callee(object, member)?,
            ast::Expr::Member {
                object,
                member,
                is_compiletime: false,
            } => {
                if let ast::Expr::Ident(object_name) = object.as_ref() {
                    if self.find_unit(object_name).is_some() {
                        return Err(self.error_here(format!(
                            "cannot use runtime access `.` for a module function; did you mean `{}::{}`?",
                            object_name, member
                        )));
                    }
                }
                return Err(self.error_here("calls through field values are not supported"));
            }
            _ => return Err(self.error_here("call target must be a function name")),
        };

        let lowered = self.lower_call_args(fcx, function, args)?;
        let call = self.builder.build_call(function, &lowered, "call")?;
        Ok(call.try_as_basic_value().left())
    }

    fn lower_call_args(
        &self,
        fcx: &mut FnCtx<'ctx>,
        function: FunctionValue<'ctx>,
        args: &[ast::Expr],
    ) -> CgResult<Vec<BasicMetadataValueEnum<'ctx>>> {
        let param_types = function.get_type().get_param_types();
        if param_types.len() != args.len() {
            return Err(self.error_here(format!(
                "expected {} arguments, found {}",
                param_types.len(),
                args.len()
            )));
        }

        let mut lowered = Vec::with_capacity(args.len());
        for (arg, param_ty) in args.iter().zip(param_types) {
            let value = self.lower_value(fcx, arg)?;
            let value = match basic_from_metadata(param_ty.into()) {
                Some(basic) => self.coerce(value, basic)?,
                None => value,
            };
            lowered.push(value.into());
        }
        Ok(lowered)
    }

    /// The `output` builtin prints a string through libc:
    /// `printf("%s", s)`.
    fn lower_output_builtin(
        &self,
        fcx: &mut FnCtx<'ctx>,
        args: &[ast::Expr],
    ) -> CgResult<Option<BasicValueEnum<'ctx>>> {
        if args.len() != 1 {
            return Err(self.error_here("`output` takes exactly one argument"));
        }
        let value = self.lower_value(fcx, &args[0])?;
        if !value.is_pointer_value() {
            return Err(self.error_here("`output` takes a string argument"));
        }

        let printf = self.get_printf()?;
        let fmt = self.intern_string_literal(b"%s")?;
        self.builder
            .build_call(printf, &[fmt.into(), value.into()], "output")?;
        Ok(None)
    }

    // --- Runtime field access ---

    fn lower_field_access(
        &self,
        fcx: &mut FnCtx<'ctx>,
        object: &ast::Expr,
        member: &str,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        let (base_ptr, info) = self.field_access_base(fcx, object, member)?;
        let field_idx = info.field_index(member).ok_or_else(|| {
            self.error_here(format!(
                "struct `{}` has no field named `{}`",
                info.name, member
            ))
        })?;
        self.check_field_visibility(&info, field_idx)?;

        let gep = self
            .builder
            .build_struct_gep(base_ptr, field_idx as u32, "fieldptr")?;
        Ok(self.builder.build_load(gep, member)?)
    }

    fn lower_assign(
        &self,
        fcx: &mut FnCtx<'ctx>,
        target: &ast::Expr,
        value: &ast::Expr,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        match target {
            ast::Expr::Ident(name) => {
                if let Some(slot) = fcx.lookup(name).cloned() {
                    let raw = self.lower_value(fcx, value)?;
                    let coerced = self.coerce(raw, slot.ty)?;
                    self.builder.build_store(slot.ptr, coerced)?;
                    return Ok(coerced);
                }

                let sym = self
                    .resolve_unqualified(name)?
                    .ok_or_else(|| self.error_here(format!("symbol `{}` not found", name)))?;
                match (sym.value, sym.ty) {
                    (SymbolValue::Function(_), _) => {
                        Err(self.error_here(format!("cannot assign to function `{}`", name)))
                    }
                    (SymbolValue::Global(g), SymbolType::Value(ty)) => {
                        let raw = self.lower_value(fcx, value)?;
                        let coerced = self.coerce(raw, ty)?;
                        self.builder.build_store(g.as_pointer_value(), coerced)?;
                        Ok(coerced)
                    }
                    _ => Err(self.error_here(format!("cannot assign to `{}`", name))),
                }
            }
            ast::Expr::Member {
                object,
                member,
                is_compiletime: false,
            } => {
                let (base_ptr, info) = self.field_access_base(fcx, object, member)?;
                let field_idx = info.field_index(member).ok_or_else(|| {
                    self.error_here(format!(
                        "struct `{}` has no field named `{}`",
                        info.name, member
                    ))
                })?;
                self.check_field_visibility(&info, field_idx)?;

                let raw = self.lower_value(fcx, value)?;
                let coerced = self.coerce(raw, info.fields[field_idx].ty)?;
                let gep = self
                    .builder
                    .build_struct_gep(base_ptr, field_idx as u32, "fieldptr")?;
                self.builder.build_store(gep, coerced)?;
                Ok(coerced)
            }
            _ => Err(self.error_here("invalid assignment target")),
        }
    }

    /// Resolve the base pointer and layout for `object.member`. The
    /// object must name a struct-typed local or module variable.
    fn field_access_base(
        &self,
        fcx: &mut FnCtx<'ctx>,
        object: &ast::Expr,
        member: &str,
    ) -> CgResult<(PointerValue<'ctx>, StructInfo<'ctx>)> {
        let object_name = match object {
            ast::Expr::Ident(name) => name,
            _ => return Err(self.error_here("invalid member access syntax")),
        };

        if let Some(slot) = fcx.lookup(object_name).cloned() {
            let info = self.struct_info_for(slot.nominal.as_deref(), member, object_name)?;
            // Pointer-typed locals hold the struct behind one load.
            let base = if slot.ty.is_pointer_type() {
                self.builder
                    .build_load(slot.ptr, "deref")?
                    .into_pointer_value()
            } else {
                slot.ptr
            };
            return Ok((base, info));
        }

        let current_idx = self.current_unit_index()?;
        if let Some(sym) = self.find_symbol_in_unit(current_idx, object_name) {
            if sym.is_function() {
                return Err(self.error_here(format!(
                    "cannot use member access on function `{}`",
                    object_name
                )));
            }
            if let (SymbolValue::Global(g), SymbolType::Value(ty)) = (sym.value, sym.ty) {
                if ty.is_struct_type() {
                    let name = ty.into_struct_type().get_name().and_then(|n| n.to_str().ok()).map(str::to_string);
                    let info = self.struct_info_for(name.as_deref(), member, object_name)?;
                    return Ok((g.as_pointer_value(), info));
                }
            }
            return Err(self.error_here(format!(
                "member access on non-struct value `{}`",
                object_name
            )));
        }

        Err(self.error_here(format!(
            "undefined identifier `{}` in member access `{}.{}`",
            object_name, object_name, member
        )))
    }

    /// Find the struct layout for a member access: the declared nominal
    /// type when known, else the field-name reverse index.
    fn struct_info_for(
        &self,
        nominal: Option<&str>,
        member: &str,
        object_name: &str,
    ) -> CgResult<StructInfo<'ctx>> {
        if let Some(name) = nominal {
            return self.find_struct(name).ok_or_else(|| {
                self.error_here(format!(
                    "member access on non-struct value `{}`",
                    object_name
                ))
            });
        }
        self.find_struct_by_field(member).ok_or_else(|| {
            self.error_here(format!(
                "member access on non-struct value `{}`",
                object_name
            ))
        })
    }

    fn check_field_visibility(&self, info: &StructInfo<'ctx>, field_idx: usize) -> CgResult<()> {
        let field = &info.fields[field_idx];
        if field.is_public {
            return Ok(());
        }
        let current = self.current_unit()?;
        if current.name == info.module {
            return Ok(());
        }
        Err(self.error_here(format!(
            "field `{}` of struct `{}` is private to module `{}`",
            field.name, info.name, info.module
        )))
    }

    // --- Struct literals ---

    fn lower_struct_literal(
        &self,
        fcx: &mut FnCtx<'ctx>,
        name: &str,
        fields: &[(String, ast::Expr)],
    ) -> CgResult<BasicValueEnum<'ctx>> {
        let info = self
            .find_struct(name)
            .ok_or_else(|| self.error_here(format!("unknown struct `{}`", name)))?;
        if fields.len() != info.fields.len() {
            return Err(self.error_here(format!(
                "struct `{}` has {} fields, literal provides {}",
                name,
                info.fields.len(),
                fields.len()
            )));
        }

        let slot = self.builder.build_alloca(info.ty, name)?;
        for (field_name, expr) in fields {
            let field_idx = info.field_index(field_name).ok_or_else(|| {
                self.error_here(format!(
                    "struct `{}` has no field named `{}`",
                    name, field_name
                ))
            })?;
            let raw = self.lower_value(fcx, expr)?;
            let coerced = self.coerce(raw, info.fields[field_idx].ty)?;
            let gep = self
                .builder
                .build_struct_gep(slot, field_idx as u32, "fieldptr")?;
            self.builder.build_store(gep, coerced)?;
        }

        Ok(self.builder.build_load(slot, name)?)
    }

    // --- Constant initializers for module-level variables ---

    pub(crate) fn lower_const_expr(
        &self,
        expr: &ast::Expr,
        ty: BasicTypeEnum<'ctx>,
    ) -> CgResult<BasicValueEnum<'ctx>> {
        match (expr, ty) {
            (ast::Expr::Int(v), BasicTypeEnum::IntType(t)) => {
                Ok(t.const_int(*v as u64, true).into())
            }
            (ast::Expr::Int(v), BasicTypeEnum::FloatType(t)) => {
                Ok(t.const_float(*v as f64).into())
            }
            (ast::Expr::Float(v), BasicTypeEnum::FloatType(t)) => {
                Ok(t.const_float(*v).into())
            }
            (ast::Expr::Bool(b), BasicTypeEnum::IntType(t)) => {
                Ok(t.const_int(*b as u64, false).into())
            }
            (ast::Expr::Str(s), BasicTypeEnum::PointerType(_)) => {
                Ok(self.lower_string_literal(s)?.into())
            }
            _ => Err(self.error_here(
                "module-level variable initializers must be constant literals",
            )),
        }
    }
}

/// Parameter lists come back as metadata type enums; everything a call
/// can pass is basic.
fn basic_from_metadata(ty: BasicMetadataTypeEnum<'_>) -> Option<BasicTypeEnum<'_>> {
    match ty {
        BasicMetadataTypeEnum::ArrayType(t) => Some(t.into()),
        BasicMetadataTypeEnum::FloatType(t) => Some(t.into()),
        BasicMetadataTypeEnum::IntType(t) => Some(t.into()),
        BasicMetadataTypeEnum::PointerType(t) => Some(t.into()),
        BasicMetadataTypeEnum::StructType(t) => Some(t.into()),
        BasicMetadataTypeEnum::VectorType(t) => Some(t.into()),
        BasicMetadataTypeEnum::MetadataType(_) => None,
    }
}
