//! Session-scoped string variables.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

/// The variable table a session expands words against.
///
/// Values are plain strings. Isolated sub-scopes work on a copy, so writes
/// made inside them never reach the parent table.
#[derive(Clone, Default)]
pub struct VarTable {
    vars: HashMap<String, String>,
}

impl VarTable {
    /// An empty table.
    pub fn new() -> Self {
        VarTable::default()
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Set a variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Remove a variable, returning its old value.
    pub fn unset(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    /// Whether the variable exists, even with an empty value.
    pub fn is_set(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Write `value` into the variable named by `dest`.
    ///
    /// The assign-by-name channel used for capture and probe destinations:
    /// an empty destination name means the caller wants the value discarded.
    pub fn assign(&mut self, dest: &str, value: impl Into<String>) {
        if dest.is_empty() {
            debug!("empty destination, result discarded");
            return;
        }
        self.vars.insert(dest.to_string(), value.into());
    }

    /// Number of variables set.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variables are set.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Debug for VarTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.vars.keys().collect();
        names.sort();
        let mut map = f.debug_map();
        for name in names {
            map.entry(name, &self.vars[name]);
        }
        map.finish()
    }
}
