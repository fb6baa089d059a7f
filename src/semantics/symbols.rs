//! Scope-table and registry plumbing shared by the three analyzers.
//!
//! Bindings live in an arena and are addressed by stable `BindingId`s;
//! scopes are a strict stack of name → id maps. Pushing and popping follows
//! block and function entry/exit exactly, so an early diagnostic can never
//! leave a stale scope behind.

use std::collections::HashMap;

use crate::ast::Pos;
use crate::types::{Ty, TyId};

/// Stable handle of a binding record, valid for one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u32);

/// Where a binding's value lives relative to the current function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimeTag {
    /// Declared in a block at the given scope depth.
    Local(usize),
    /// Came in as a function parameter; outlives the whole body.
    Parameter,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub ty: TyId,
    pub mutable: bool,
    pub lifetime: LifetimeTag,
    /// For reference-typed bindings: scope depth of the referent.
    pub referent_depth: Option<usize>,
    pub declared_at: Pos,
}

/// Hierarchical symbol table: an arena of bindings plus a scope stack
/// mapping visible names to binding ids.
#[derive(Debug, Default)]
pub struct SymbolTable {
    arena: Vec<Binding>,
    scopes: Vec<HashMap<String, BindingId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        // The root scope is never popped; a malformed walk must not be able
        // to underflow the stack.
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Current nesting depth; the root scope is depth 0.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Defines a binding in the current scope. Shadowing an ancestor is
    /// allowed; a duplicate in the same scope returns the earlier binding.
    pub fn define(&mut self, binding: Binding) -> Result<BindingId, BindingId> {
        if let Some(&existing) = self.scopes.last().unwrap().get(&binding.name) {
            return Err(existing);
        }
        let id = BindingId(self.arena.len() as u32);
        self.scopes
            .last_mut()
            .unwrap()
            .insert(binding.name.clone(), id);
        self.arena.push(binding);
        Ok(id)
    }

    /// Nearest visible binding, walking the scope chain outward.
    pub fn lookup(&self, name: &str) -> Option<BindingId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.get(name) {
                return Some(id);
            }
        }
        None
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.arena[id.0 as usize]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.arena[id.0 as usize]
    }
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub fields: Vec<(String, Ty)>,
    pub declared_at: Pos,
}

impl StructInfo {
    pub fn field_ty(&self, name: &str) -> Option<&Ty> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

#[derive(Debug, Clone)]
pub struct FnSig {
    pub params: Vec<(String, Ty)>,
    pub return_type: Ty,
    pub declared_at: Pos,
}

/// Struct definitions and function signatures, collected before any body is
/// checked so forward and recursive calls resolve.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    structs: HashMap<String, StructInfo>,
    functions: HashMap<String, FnSig>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a struct; on a duplicate, returns where the first
    /// definition was declared.
    pub fn add_struct(&mut self, name: String, info: StructInfo) -> Result<(), Pos> {
        if let Some(first) = self.structs.get(&name) {
            return Err(first.declared_at);
        }
        self.structs.insert(name, info);
        Ok(())
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructInfo> {
        self.structs.get(name)
    }

    /// Registers a function signature; on a duplicate, returns where the
    /// first definition was declared.
    pub fn add_function(&mut self, name: String, sig: FnSig) -> Result<(), Pos> {
        if let Some(first) = self.functions.get(&name) {
            return Err(first.declared_at);
        }
        self.functions.insert(name, sig);
        Ok(())
    }

    pub fn signature(&self, name: &str) -> Option<&FnSig> {
        self.functions.get(name)
    }

    /// Checks that every `Named` component of a type refers to a registered
    /// struct; returns the first unresolved name.
    pub fn validate<'t>(&self, ty: &'t Ty) -> Result<(), &'t str> {
        match ty {
            Ty::Named(name) => {
                if self.structs.contains_key(name.as_str()) {
                    Ok(())
                } else {
                    Err(name)
                }
            }
            Ty::Array(inner) | Ty::Ref(inner) | Ty::Ptr(inner) => self.validate(inner),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeInterner;

    fn binding(name: &str, ty: TyId, depth: usize) -> Binding {
        Binding {
            name: name.to_string(),
            ty,
            mutable: true,
            lifetime: LifetimeTag::Local(depth),
            referent_depth: None,
            declared_at: Pos::new(1, 1),
        }
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut interner = TypeInterner::new();
        let int = interner.intern(Ty::Int);
        let mut table = SymbolTable::new();
        let first = table.define(binding("x", int, 0)).unwrap();
        assert_eq!(table.define(binding("x", int, 0)), Err(first));
    }

    #[test]
    fn shadowing_ancestor_is_allowed() {
        let mut interner = TypeInterner::new();
        let int = interner.intern(Ty::Int);
        let str_ty = interner.intern(Ty::Str);
        let mut table = SymbolTable::new();
        let outer = table.define(binding("x", int, 0)).unwrap();
        table.push_scope();
        let inner = table.define(binding("x", str_ty, 1)).unwrap();
        assert_eq!(table.lookup("x"), Some(inner));
        table.pop_scope();
        assert_eq!(table.lookup("x"), Some(outer));
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let mut interner = TypeInterner::new();
        let int = interner.intern(Ty::Int);
        let mut table = SymbolTable::new();
        let id = table.define(binding("x", int, 0)).unwrap();
        table.push_scope();
        table.push_scope();
        assert_eq!(table.lookup("x"), Some(id));
        assert_eq!(table.lookup("y"), None);
    }

    #[test]
    fn root_scope_survives_excess_pops() {
        let mut table = SymbolTable::new();
        table.pop_scope();
        table.pop_scope();
        assert_eq!(table.depth(), 0);
    }
}
