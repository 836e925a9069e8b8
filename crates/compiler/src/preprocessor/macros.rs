//! Macro table: object-like and function-like `#define`s.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    /// `None` for object-like macros; `Some(params)` for function-like ones
    /// (possibly an empty parameter list, `FOO()`).
    pub params: Option<Vec<String>>,
    /// Raw body text, substituted verbatim (after parameter substitution)
    /// at each expansion site.
    pub body: String,
}

impl MacroDef {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }
}

#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, def: MacroDef) {
        self.macros.insert(def.name.clone(), def);
    }

    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_undef_roundtrip() {
        let mut table = MacroTable::new();
        table.define(MacroDef {
            name: "FOO".into(),
            params: None,
            body: "1".into(),
        });
        assert!(table.is_defined("FOO"));
        table.undef("FOO");
        assert!(!table.is_defined("FOO"));
    }
}
