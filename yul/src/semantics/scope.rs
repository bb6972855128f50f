// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeMap;

use crate::YulString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The id of the `index`-th scope that was entered.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function {
        parameters: usize,
        returns: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,

    /// Lookups leaving this scope can only resolve to functions.
    pub is_function_boundary: bool,

    symbols: BTreeMap<YulString, SymbolKind>,
}

impl Scope {
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<SymbolKind> {
        self.symbols.get(name).copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&YulString, &SymbolKind)> {
        self.symbols.iter()
    }
}

/// All scopes of a program. Scopes are numbered in the order they are
/// entered by a walk in evaluation order: a function's parameter scope comes
/// before the scope of its body, and the pre block of a for loop comes before
/// its body and post block.
#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scope(&mut self, parent: Option<ScopeId>, is_function_boundary: bool) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            is_function_boundary,
            symbols: BTreeMap::new(),
        });
        id
    }

    /// Registers a symbol, returning `false` if the scope already has one
    /// with the same name.
    pub fn register(&mut self, scope: ScopeId, name: YulString, kind: SymbolKind) -> bool {
        let symbols = &mut self.scopes[scope.0].symbols;
        if symbols.contains_key(&name) {
            return false;
        }
        symbols.insert(name, kind);
        true
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len()).map(ScopeId)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Resolves `name` as seen from `scope`, returning the declaring scope.
    /// Variables of scopes outside of the innermost function are invisible.
    #[must_use]
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, SymbolKind)> {
        let mut crossed_function_boundary = false;
        let mut current = Some(scope);

        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(kind) = scope.symbol(name) {
                if crossed_function_boundary && kind == SymbolKind::Variable {
                    return None;
                }
                return Some((id, kind));
            }

            crossed_function_boundary |= scope.is_function_boundary;
            current = scope.parent;
        }

        None
    }

    /// Returns whether `name` is declared in `scope` or any enclosing scope,
    /// regardless of function boundaries.
    #[must_use]
    pub fn is_declared(&self, scope: ScopeId, name: &str) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if scope.symbol(name).is_some() {
                return true;
            }
            current = scope.parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_boundaries_hide_outer_variables() {
        let mut tree = ScopeTree::new();
        let outer = tree.add_scope(None, false);
        tree.register(outer, YulString::from("x"), SymbolKind::Variable);
        tree.register(outer, YulString::from("f"), SymbolKind::Function { parameters: 0, returns: 0 });

        let function = tree.add_scope(Some(outer), true);
        let body = tree.add_scope(Some(function), false);

        assert_eq!(tree.lookup(body, "x"), None);
        assert_eq!(tree.lookup(body, "f").map(|(id, _)| id), Some(outer));
        assert!(tree.is_declared(body, "x"));
    }

    #[test]
    fn registering_twice_fails() {
        let mut tree = ScopeTree::new();
        let scope = tree.add_scope(None, false);
        assert!(tree.register(scope, YulString::from("x"), SymbolKind::Variable));
        assert!(!tree.register(scope, YulString::from("x"), SymbolKind::Variable));
    }
}
