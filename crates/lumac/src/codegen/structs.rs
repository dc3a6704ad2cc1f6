//! Struct layout metadata and field lookup.
//!
//! Every lowered struct declaration registers a `StructInfo` describing
//! its backend type and field layout. Field index order matches the
//! in-memory layout used for GEPs. The field-to-struct cache is a
//! best-effort reverse index: it remembers the first struct known to
//! contain a field name and is consulted before the linear scan.

use inkwell::types::{BasicTypeEnum, StructType};

use crate::diagnostics::CgResult;

use super::CodeGen;
use luma_ast as ast;

#[derive(Clone)]
pub struct FieldInfo<'ctx> {
    pub name: String,
    pub ty: BasicTypeEnum<'ctx>,
    /// Pointee type when the field is pointer-valued.
    pub pointee: Option<BasicTypeEnum<'ctx>>,
    pub is_public: bool,
}

/// Layout description of a user-defined record.
#[derive(Clone)]
pub struct StructInfo<'ctx> {
    pub name: String,
    /// Module the struct was declared in; private fields are only
    /// accessible from here.
    pub module: String,
    pub ty: StructType<'ctx>,
    pub fields: Vec<FieldInfo<'ctx>>,
}

impl<'ctx> StructInfo<'ctx> {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl<'ctx> CodeGen<'ctx> {
    /// Lower a struct declaration into a named LLVM struct type and
    /// register its layout.
    pub(crate) fn lower_struct_decl(&self, decl: &ast::StructDecl) -> CgResult<()> {
        let module_name = self.current_unit()?.name.clone();

        let mut field_types = Vec::with_capacity(decl.fields.len());
        let mut fields = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            let ty = self.map_type(&field.ty)?.ok_or_else(|| {
                self.error_here(format!(
                    "field `{}.{}` cannot have void type",
                    decl.name, field.name
                ))
            })?;
            field_types.push(ty);
            fields.push(FieldInfo {
                name: field.name.clone(),
                ty,
                pointee: self.pointee_type(&field.ty)?,
                is_public: field.is_public,
            });
        }

        let struct_ty = self.context.opaque_struct_type(&decl.name);
        struct_ty.set_body(&field_types, false);

        self.struct_infos.borrow_mut().push(StructInfo {
            name: decl.name.clone(),
            module: module_name,
            ty: struct_ty,
            fields,
        });
        Ok(())
    }

    /// Look a struct up by name: cache first, then linear scan.
    pub fn find_struct(&self, name: &str) -> Option<StructInfo<'ctx>> {
        let infos = self.struct_infos.borrow();
        if let Some(&idx) = self.struct_cache.borrow().get(name) {
            if let Some(info) = infos.get(idx) {
                if info.name == name {
                    return Some(info.clone());
                }
            }
        }
        infos.iter().find(|info| info.name == name).cloned()
    }

    /// Reverse lookup: the first registered struct containing `field`.
    /// Hits are remembered so the next lookup skips the scan.
    pub fn find_struct_by_field(&self, field: &str) -> Option<StructInfo<'ctx>> {
        {
            let infos = self.struct_infos.borrow();
            if let Some(&idx) = self.field_struct_cache.borrow().get(field) {
                if let Some(info) = infos.get(idx) {
                    if info.field_index(field).is_some() {
                        return Some(info.clone());
                    }
                }
            }
        }

        let found = {
            let infos = self.struct_infos.borrow();
            infos
                .iter()
                .position(|info| info.field_index(field).is_some())
        };
        if let Some(idx) = found {
            self.field_struct_cache
                .borrow_mut()
                .insert(field.to_string(), idx);
            return Some(self.struct_infos.borrow()[idx].clone());
        }
        None
    }
}
