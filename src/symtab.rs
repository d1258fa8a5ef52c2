//! Symbol table: a stack of scopes holding locals and functions, plus the
//! pending relocation list for forward references.
//!
//! Scopes are pushed at function entry and popped at exit. This is the
//! fixed-scope redesign: the original compiler never removed parameters
//! from its single flat symbol list, so a parameter name from one function
//! stayed resolvable from every function compiled afterwards. See DESIGN.md
//! Open Question 1.

use crate::ast::TypeDesc;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub label: u64,
    pub params: Vec<(String, TypeDesc)>,
    pub return_type: TypeDesc,
}

#[derive(Debug, Clone)]
pub enum Symbol {
    Local { ty: TypeDesc, offset: u64 },
    Function(FunctionInfo),
}

type Scope = HashMap<String, Symbol>;

pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { scopes: vec![Scope::new()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Functions are always declared into the outermost scope: this
    /// language has no nested function definitions.
    pub fn declare_function(&mut self, name: &str, info: FunctionInfo) {
        self.scopes[0].insert(name.to_string(), Symbol::Function(info));
    }

    pub fn declare_local(&mut self, name: &str, ty: TypeDesc, offset: u64) {
        let scope = self.scopes.last_mut().expect("symbol table always has a scope");
        scope.insert(name.to_string(), Symbol::Local { ty, offset });
    }

    /// First match, innermost scope first.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    pub fn resolve_function(&self, name: &str) -> Option<&FunctionInfo> {
        match self.resolve(name) {
            Some(Symbol::Function(info)) => Some(info),
            _ => None,
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    Call,
}

/// A pending backpatch: the byte offset of a placeholder operand, and the
/// function name whose label should be written there once known. Resolving
/// these after the full statement walk (instead of patching positionally at
/// every call site) is the single-table redesign noted in DESIGN.md.
pub struct Relocation {
    pub kind: RelocKind,
    pub site_offset: usize,
    pub target: String,
}

#[derive(Default)]
pub struct RelocationTable {
    pending: Vec<Relocation>,
}

impl RelocationTable {
    pub fn new() -> Self {
        RelocationTable { pending: Vec::new() }
    }

    pub fn add(&mut self, kind: RelocKind, site_offset: usize, target: &str) {
        self.pending.push(Relocation { kind, site_offset, target: target.to_string() });
    }

    pub fn entries(&self) -> &[Relocation] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BaseType;

    fn int_ty() -> TypeDesc {
        TypeDesc { base: BaseType::Int, pointer_depth: 0 }
    }

    #[test]
    fn test_params_do_not_leak_across_functions() {
        let mut table = SymbolTable::new();

        table.push_scope();
        table.declare_local("x", int_ty(), 0);
        assert!(table.resolve("x").is_some());
        table.pop_scope();

        table.push_scope();
        assert!(table.resolve("x").is_none());
        table.pop_scope();
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut table = SymbolTable::new();
        table.declare_local("x", int_ty(), 0);
        table.push_scope();
        table.declare_local("x", int_ty(), 8);
        match table.resolve("x") {
            Some(Symbol::Local { offset, .. }) => assert_eq!(*offset, 8),
            _ => panic!("expected local"),
        }
        table.pop_scope();
        match table.resolve("x") {
            Some(Symbol::Local { offset, .. }) => assert_eq!(*offset, 0),
            _ => panic!("expected local"),
        }
    }

    #[test]
    fn test_function_resolved_from_nested_scope() {
        let mut table = SymbolTable::new();
        table.declare_function("f", FunctionInfo { label: 100, params: vec![], return_type: int_ty() });
        table.push_scope();
        assert!(table.resolve_function("f").is_some());
    }
}
