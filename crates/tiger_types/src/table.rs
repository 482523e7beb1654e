//! Scoped symbol tables

use std::collections::HashMap;

/// A symbol table with nested scopes. Entering a name shadows any outer
/// binding until the scope that holds it ends.
#[derive(Debug, Clone)]
pub struct Table<T> {
    scopes: Vec<HashMap<String, T>>,
}

impl<T> Table<T> {
    pub fn new() -> Self {
        Self { scopes: vec![HashMap::new()] }
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Drop every binding made since the matching `begin_scope`. The base
    /// scope is never removed.
    pub fn end_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn enter(&mut self, name: impl Into<String>, value: T) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    pub fn look(&self, name: &str) -> Option<&T> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}
