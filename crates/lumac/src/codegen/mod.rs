//! Top-level codegen module.
//!
//! `CodeGen` is the backend handle: it owns the LLVM builder, the
//! common-types cache, the module registry and its symbol tables, the
//! struct-info list, and the lookup caches. The lowering pipeline is
//! organized across submodules:
//! - `modules` : module compilation units, symbol tables, caches
//! - `deps`    : dependency records and the ordered-emission scheduler
//! - `imports` : `use`-directive symbol import machinery
//! - `member_access` : compile-time (`::`) qualified resolution
//! - `emit`    : top-level item lowering (functions, structs, enums, globals)
//! - `stmt`    : statement lowering
//! - `expr`    : expression lowering
//! - `structs` : struct layout metadata and field access helpers
//! - `utils`   : string escapes and small builder helpers
//!
//! Compilation is three deterministic passes over the program: create all
//! units, process all `use` directives, then lower statements in
//! dependency order. The caches are warmed between the second and third
//! pass. Everything here is single-threaded; only object emission
//! (`crate::objects`) runs on multiple threads, and it starts after the
//! registry is frozen.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::types::{BasicTypeEnum, FloatType, IntType, PointerType};
use inkwell::values::{FunctionValue, IntValue, PointerValue};
use inkwell::AddressSpace;

use crate::diagnostics::{CgResult, Diagnostic};
use luma_ast as ast;

pub mod deps;
pub mod emit;
pub mod expr;
pub mod imports;
pub mod member_access;
pub mod modules;
pub mod stmt;
pub mod structs;
pub mod utils;

pub use modules::{ModuleUnit, Symbol, SymbolType, SymbolValue, ValueShape};
pub use structs::{FieldInfo, StructInfo};

/// Context for loop control flow (break/continue).
#[derive(Clone, Copy)]
pub struct LoopContext<'ctx> {
    /// Target block for `continue` statements.
    pub continue_block: BasicBlock<'ctx>,
    /// Target block for `break` statements.
    pub break_block: BasicBlock<'ctx>,
}

/// A named local slot backed by an alloca.
#[derive(Clone)]
pub struct LocalSlot<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: BasicTypeEnum<'ctx>,
    /// Struct or enum name when the declared type was nominal; used by
    /// runtime field access.
    pub nominal: Option<String>,
}

/// Per-function lowering state, threaded through statement and expression
/// lowering. The function itself lives in the handle's `current_function`
/// slot, which block creation and loop targets hang off.
pub struct FnCtx<'ctx> {
    /// `None` for void functions.
    pub ret_ty: Option<BasicTypeEnum<'ctx>>,
    /// Lexical scopes, innermost last.
    pub locals: Vec<HashMap<String, LocalSlot<'ctx>>>,
    /// Statements deferred to function exit, run last-in first-out before
    /// every return.
    pub deferred: Vec<ast::Stmt>,
}

impl<'ctx> FnCtx<'ctx> {
    pub fn new(ret_ty: Option<BasicTypeEnum<'ctx>>) -> Self {
        FnCtx {
            ret_ty,
            locals: vec![HashMap::new()],
            deferred: Vec::new(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&LocalSlot<'ctx>> {
        self.locals.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn insert(&mut self, name: impl Into<String>, slot: LocalSlot<'ctx>) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.into(), slot);
        }
    }
}

/// Main code generation context holding LLVM state and caches.
///
/// See module-level documentation for the architecture overview.
pub struct CodeGen<'ctx> {
    // Units are declared before the builder so module disposal precedes
    // builder disposal on drop; the context outlives the handle.
    /// Module registry in creation order.
    pub units: Vec<ModuleUnit<'ctx>>,
    /// LLVM context.
    pub context: &'ctx Context,
    /// Shared IR builder, thread-confined to the lowering passes.
    pub builder: Builder<'ctx>,

    // --- Common-types cache ---
    pub bool_t: IntType<'ctx>,
    pub i8_t: IntType<'ctx>,
    pub i16_t: IntType<'ctx>,
    pub i32_t: IntType<'ctx>,
    pub i64_t: IntType<'ctx>,
    pub f32_t: FloatType<'ctx>,
    pub f64_t: FloatType<'ctx>,
    pub ptr_t: PointerType<'ctx>,
    pub const_i32_0: IntValue<'ctx>,
    pub const_i32_1: IntValue<'ctx>,
    pub const_i64_0: IntValue<'ctx>,
    pub const_i64_1: IntValue<'ctx>,

    /// Index of the unit that symbol insertion currently targets.
    pub(crate) current: Cell<Option<usize>>,
    /// Function being lowered; break/continue block creation hangs off it.
    pub(crate) current_function: Cell<Option<FunctionValue<'ctx>>>,
    pub(crate) loop_stack: RefCell<Vec<LoopContext<'ctx>>>,

    /// Struct layout metadata in registration order.
    pub(crate) struct_infos: RefCell<Vec<StructInfo<'ctx>>>,
    /// Names of lowered enums; `Named` annotations resolve to i32 through
    /// this set.
    pub(crate) enum_names: RefCell<HashSet<String>>,

    // --- Lookup caches, owned by the handle and warmed between the link
    // and lower passes. Keys hold indices into the registry, which is
    // append-only until the handle is dropped. ---
    pub(crate) symbol_cache: RefCell<HashMap<String, (usize, usize)>>,
    pub(crate) struct_cache: RefCell<HashMap<String, usize>>,
    pub(crate) field_struct_cache: RefCell<HashMap<String, usize>>,

    /// Interned string literals, keyed by owning unit and processed bytes.
    pub(crate) string_literals: RefCell<HashMap<(usize, Vec<u8>), PointerValue<'ctx>>>,
    pub(crate) next_str_id: Cell<u32>,
}

impl<'ctx> CodeGen<'ctx> {
    /// Create a backend handle. Initializes LLVM targets, asm parsers and
    /// printers once; subsequent calls are no-ops inside LLVM.
    pub fn new(context: &'ctx Context) -> Self {
        Target::initialize_all(&InitializationConfig::default());

        let i32_t = context.i32_type();
        let i64_t = context.i64_type();

        CodeGen {
            units: Vec::new(),
            context,
            builder: context.create_builder(),
            bool_t: context.bool_type(),
            i8_t: context.i8_type(),
            i16_t: context.i16_type(),
            i32_t,
            i64_t,
            f32_t: context.f32_type(),
            f64_t: context.f64_type(),
            ptr_t: context.i8_type().ptr_type(AddressSpace::default()),
            const_i32_0: i32_t.const_int(0, false),
            const_i32_1: i32_t.const_int(1, false),
            const_i64_0: i64_t.const_int(0, false),
            const_i64_1: i64_t.const_int(1, false),
            current: Cell::new(None),
            current_function: Cell::new(None),
            loop_stack: RefCell::new(Vec::new()),
            struct_infos: RefCell::new(Vec::new()),
            enum_names: RefCell::new(HashSet::new()),
            symbol_cache: RefCell::new(HashMap::new()),
            struct_cache: RefCell::new(HashMap::new()),
            field_struct_cache: RefCell::new(HashMap::new()),
            string_literals: RefCell::new(HashMap::new()),
            next_str_id: Cell::new(0),
        }
    }

    /// Run the three compilation passes over `program`.
    ///
    /// Pass 1 creates one compilation unit per module (duplicates are
    /// fatal). Pass 2 processes every `use` directive. Pass 3 lowers each
    /// module body in dependency order. Caches are warmed between passes
    /// 2 and 3.
    pub fn compile_program(&mut self, program: &ast::Program) -> CgResult<()> {
        self.clear_caches();

        // Pass 1: create all module units.
        for module in &program.modules {
            if module.name.is_empty() {
                return Err(Diagnostic::error("module name must not be empty"));
            }
            self.create_unit(&module.name)?;
        }

        // Pass 2: process all `use` directives.
        for module in &program.modules {
            let idx = self
                .find_unit(&module.name)
                .ok_or_else(|| Diagnostic::error(format!("module unit not found: `{}`", module.name)))?;
            self.set_current_unit(idx);

            for stmt in &module.body {
                if let ast::Stmt::Use(use_decl) = stmt {
                    self.lower_use(use_decl)?;
                }
            }
        }

        // Warm the lookup caches before lowering begins.
        self.warm_caches();

        // Pass 3: generate code in dependency order.
        let records = deps::build_dependency_records(program);
        for module in &program.modules {
            deps::lower_module_ordered(self, &module.name, program, &records)?;
        }

        Ok(())
    }

    // --- Type mapping ---

    /// Map a source type annotation to an LLVM type. `Ok(None)` is void.
    pub(crate) fn map_type(&self, ann: &ast::TypeAnn) -> CgResult<Option<BasicTypeEnum<'ctx>>> {
        Ok(Some(match ann {
            ast::TypeAnn::I8 => self.i8_t.into(),
            ast::TypeAnn::I16 => self.i16_t.into(),
            ast::TypeAnn::I32 => self.i32_t.into(),
            ast::TypeAnn::I64 => self.i64_t.into(),
            ast::TypeAnn::F32 => self.f32_t.into(),
            ast::TypeAnn::F64 => self.f64_t.into(),
            ast::TypeAnn::Bool => self.bool_t.into(),
            ast::TypeAnn::Str => self.ptr_t.into(),
            ast::TypeAnn::Void => return Ok(None),
            ast::TypeAnn::Named(name) => {
                if let Some(info) = self.find_struct(name) {
                    info.ty.into()
                } else if self.enum_names.borrow().contains(name) {
                    self.i32_t.into()
                } else {
                    return Err(self.error_here(format!("unknown type `{}`", name)));
                }
            }
            ast::TypeAnn::Ptr(_) => self.ptr_t.into(),
        }))
    }

    /// The pointee type recorded for pointer-valued annotations, `None`
    /// otherwise. This is the side channel later lookups use to know what
    /// an opaque pointer points to.
    pub(crate) fn pointee_type(&self, ann: &ast::TypeAnn) -> CgResult<Option<BasicTypeEnum<'ctx>>> {
        match ann {
            ast::TypeAnn::Ptr(inner) => self.map_type(inner),
            _ => Ok(None),
        }
    }

    /// The nominal name behind an annotation, for struct field access.
    pub(crate) fn nominal_name(ann: &ast::TypeAnn) -> Option<String> {
        match ann {
            ast::TypeAnn::Named(name) => Some(name.clone()),
            ast::TypeAnn::Ptr(inner) => Self::nominal_name(inner),
            _ => None,
        }
    }

    // --- Helper extern getters ---

    /// Lazily declare `printf` in the current unit's module. The `output`
    /// builtin lowers to `printf("%s", s)`.
    pub(crate) fn get_printf(&self) -> CgResult<FunctionValue<'ctx>> {
        let idx = self.current_unit_index()?;
        let module = &self.units[idx].module;
        if let Some(f) = module.get_function("printf") {
            return Ok(f);
        }
        let fn_type = self.i32_t.fn_type(&[self.ptr_t.into()], true);
        Ok(module.add_function("printf", fn_type, None))
    }

    /// Intern a processed string literal in the current unit and return a
    /// pointer to its data. Identical literals share one global.
    pub(crate) fn intern_string_literal(&self, bytes: &[u8]) -> CgResult<PointerValue<'ctx>> {
        let idx = self.current_unit_index()?;
        let key = (idx, bytes.to_vec());
        if let Some(ptr) = self.string_literals.borrow().get(&key) {
            return Ok(*ptr);
        }

        let id = self.next_str_id.get();
        self.next_str_id.set(id.wrapping_add(1));
        let initializer = self.context.const_string(bytes, true);
        let global = self
            .units[idx]
            .module
            .add_global(initializer.get_type(), None, &format!(".str.{}", id));
        global.set_initializer(&initializer);
        global.set_constant(true);
        global.set_linkage(inkwell::module::Linkage::Private);

        let ptr = global.as_pointer_value().const_cast(self.ptr_t);
        self.string_literals.borrow_mut().insert(key, ptr);
        Ok(ptr)
    }

    /// Build an error diagnostic tagged with the current module.
    pub(crate) fn error_here(&self, message: impl Into<String>) -> Diagnostic {
        let diag = Diagnostic::error(message);
        match self.current.get() {
            Some(idx) => diag.in_module(self.units[idx].name.clone()),
            None => diag,
        }
    }
}
