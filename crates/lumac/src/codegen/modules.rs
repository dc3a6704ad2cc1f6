//! Module compilation units, symbol tables, and lookup caches.
//!
//! Each source module gets a `ModuleUnit` owning its backend module and an
//! ordered symbol list. The registry is the `CodeGen::units` vector in
//! creation order; all lookups iterate it in that order, so resolution is
//! deterministic. The caches are plain hash maps owned by the handle:
//! symbol lookups key on `"module:symbol"`, struct lookups on the struct
//! name, and the field-to-struct map is a best-effort reverse index used
//! as a fast path before linear search.

use std::cell::RefCell;

use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicTypeEnum, FunctionType};
use inkwell::values::{FunctionValue, GlobalValue};

use crate::diagnostics::{CgResult, Diagnostic};

use super::CodeGen;

/// The backend value a symbol binds to. The variant doubles as the
/// is-function flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolValue<'ctx> {
    Function(FunctionValue<'ctx>),
    Global(GlobalValue<'ctx>),
}

/// The backend type recorded for a symbol.
#[derive(Debug, Clone, Copy)]
pub enum SymbolType<'ctx> {
    Function(FunctionType<'ctx>),
    Value(BasicTypeEnum<'ctx>),
}

/// What a symbol's value is, shape-wise. Pointer-valued symbols carry
/// their pointee so later lookups know what the opaque pointer points to.
#[derive(Debug, Clone, Copy)]
pub enum ValueShape<'ctx> {
    Direct,
    PointerTo(BasicTypeEnum<'ctx>),
}

/// A binding exported or defined by a module unit.
#[derive(Clone)]
pub struct Symbol<'ctx> {
    pub name: String,
    pub value: SymbolValue<'ctx>,
    pub ty: SymbolType<'ctx>,
    pub shape: ValueShape<'ctx>,
}

impl<'ctx> Symbol<'ctx> {
    pub fn is_function(&self) -> bool {
        matches!(self.value, SymbolValue::Function(_))
    }

    /// Linkage is inferred from the backend value rather than stored.
    pub fn linkage(&self) -> Linkage {
        match self.value {
            SymbolValue::Function(f) => f.get_linkage(),
            SymbolValue::Global(g) => g.get_linkage(),
        }
    }

    /// Enum members are lowered as constant globals with initializers;
    /// nothing else matches that shape.
    pub fn is_enum_constant(&self) -> bool {
        match self.value {
            SymbolValue::Global(g) => g.is_constant() && g.get_initializer().is_some(),
            SymbolValue::Function(_) => false,
        }
    }

    pub fn function_value(&self) -> Option<FunctionValue<'ctx>> {
        match self.value {
            SymbolValue::Function(f) => Some(f),
            SymbolValue::Global(_) => None,
        }
    }

    pub fn global_value(&self) -> Option<GlobalValue<'ctx>> {
        match self.value {
            SymbolValue::Global(g) => Some(g),
            SymbolValue::Function(_) => None,
        }
    }
}

/// Per-module container owning the backend module and its symbol list.
pub struct ModuleUnit<'ctx> {
    pub name: String,
    pub module: Module<'ctx>,
    /// Symbols in insertion order. Interior mutability keeps symbol
    /// insertion possible while the registry itself is only borrowed.
    pub symbols: RefCell<Vec<Symbol<'ctx>>>,
    pub is_main: bool,
}

impl<'ctx> CodeGen<'ctx> {
    /// Create a new compilation unit and its backing LLVM module.
    /// Duplicate module names are a caller-observable error.
    pub fn create_unit(&mut self, name: &str) -> CgResult<usize> {
        if self.find_unit(name).is_some() {
            return Err(Diagnostic::error(format!(
                "duplicate module definition: `{}`",
                name
            )));
        }

        let unit = ModuleUnit {
            name: name.to_string(),
            module: self.context.create_module(name),
            symbols: RefCell::new(Vec::new()),
            is_main: name == "main",
        };
        self.units.push(unit);
        let idx = self.units.len() - 1;
        self.current.set(Some(idx));
        Ok(idx)
    }

    /// Linear search by byte equality.
    pub fn find_unit(&self, name: &str) -> Option<usize> {
        self.units.iter().position(|u| u.name == name)
    }

    /// Retarget subsequent symbol insertion.
    pub fn set_current_unit(&self, idx: usize) {
        self.current.set(Some(idx));
    }

    pub(crate) fn current_unit_index(&self) -> CgResult<usize> {
        self.current
            .get()
            .ok_or_else(|| Diagnostic::error("no current module"))
    }

    pub(crate) fn current_unit(&self) -> CgResult<&ModuleUnit<'ctx>> {
        Ok(&self.units[self.current_unit_index()?])
    }

    /// Append a symbol to a unit's symbol list. Within a unit, the first
    /// binding for a name wins on lookup, so re-registration is harmless.
    pub fn add_symbol_to_unit(&self, idx: usize, symbol: Symbol<'ctx>) {
        self.units[idx].symbols.borrow_mut().push(symbol);
    }

    /// Append a symbol to the current unit.
    pub(crate) fn add_symbol(&self, symbol: Symbol<'ctx>) -> CgResult<()> {
        let idx = self.current_unit_index()?;
        self.add_symbol_to_unit(idx, symbol);
        Ok(())
    }

    /// Exact lookup within one unit. Returns a clone; symbols are small
    /// and the backend handles they carry are plain pointers.
    pub fn find_symbol_in_unit(&self, idx: usize, name: &str) -> Option<Symbol<'ctx>> {
        self.units[idx]
            .symbols
            .borrow()
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    /// Global lookup. With a module name, delegate to that unit only.
    /// Without one, search the current unit first and then every other
    /// unit in registry order.
    pub fn find_symbol(&self, name: &str, module: Option<&str>) -> Option<Symbol<'ctx>> {
        if let Some(module_name) = module {
            let idx = self.find_unit(module_name)?;
            return self.lookup_symbol_cached(idx, name);
        }

        let current = self.current.get();
        if let Some(idx) = current {
            if let Some(sym) = self.lookup_symbol_cached(idx, name) {
                return Some(sym);
            }
        }

        for idx in 0..self.units.len() {
            if Some(idx) == current {
                continue;
            }
            if let Some(sym) = self.lookup_symbol_cached(idx, name) {
                return Some(sym);
            }
        }
        None
    }

    // --- Caches ---

    /// Cache-first lookup that falls back to linear search, so a hit and
    /// a scan always agree. The cache is only written by `warm_caches`.
    pub(crate) fn lookup_symbol_cached(&self, idx: usize, name: &str) -> Option<Symbol<'ctx>> {
        let key = cache_key(&self.units[idx].name, name);
        if let Some(&(unit_idx, sym_idx)) = self.symbol_cache.borrow().get(&key) {
            let symbols = self.units[unit_idx].symbols.borrow();
            if let Some(sym) = symbols.get(sym_idx) {
                if sym.name == name {
                    return Some(sym.clone());
                }
            }
        }
        self.find_symbol_in_unit(idx, name)
    }

    /// Populate the symbol, struct, and field caches from every unit.
    /// Called between the link and lower passes, and again after lowering
    /// so the frozen registry is fully indexed before emission.
    pub fn warm_caches(&self) {
        {
            let mut cache = self.symbol_cache.borrow_mut();
            for (unit_idx, unit) in self.units.iter().enumerate() {
                for (sym_idx, sym) in unit.symbols.borrow().iter().enumerate() {
                    let key = cache_key(&unit.name, &sym.name);
                    // First binding wins, matching linear lookup order.
                    cache.entry(key).or_insert((unit_idx, sym_idx));
                }
            }
        }

        let mut struct_cache = self.struct_cache.borrow_mut();
        let mut field_cache = self.field_struct_cache.borrow_mut();
        for (info_idx, info) in self.struct_infos.borrow().iter().enumerate() {
            struct_cache.entry(info.name.clone()).or_insert(info_idx);
            for field in &info.fields {
                field_cache.entry(field.name.clone()).or_insert(info_idx);
            }
        }
    }

    /// Drop every cache entry. Runs at the start of each compilation; the
    /// caches borrow into the registry, so they must never outlive it.
    pub fn clear_caches(&self) {
        self.symbol_cache.borrow_mut().clear();
        self.struct_cache.borrow_mut().clear();
        self.field_struct_cache.borrow_mut().clear();
    }
}

pub(crate) fn cache_key(module: &str, symbol: &str) -> String {
    format!("{}:{}", module, symbol)
}
