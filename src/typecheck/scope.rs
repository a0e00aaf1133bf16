//! Lexical scope stack used by the type checker.

use std::collections::HashMap;

use crate::ast::Type;

/// Stack of name → type bindings. Lookup walks innermost to outermost;
/// declaration always targets the innermost scope.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, Type>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Declare a name in the innermost scope. Redeclaration within the same
    /// scope returns the existing type.
    pub fn declare(&mut self, name: &str, ty: Type) -> Result<(), Type> {
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };

        if let Some(existing) = scope.get(name) {
            return Err(existing.clone());
        }

        scope.insert(name.to_string(), ty);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}
