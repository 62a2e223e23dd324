//! DOS environment block
//!
//! Variable names are case-insensitive and stored uppercased, the way the
//! real environment segment behaves. Setting a variable to the empty string
//! removes it (`SET NAME=` semantics).

use std::collections::BTreeMap;
use std::sync::RwLock;

/// Shared name/value store for environment variables.
///
/// Interior-mutable so it can be handed out as `Arc<EnvStore>` to sessions,
/// the autoexec registry, and command dispatchers alike.
#[derive(Debug, Default)]
pub struct EnvStore {
    vars: RwLock<BTreeMap<String, String>>,
}

impl EnvStore {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable. An empty value removes the variable.
    pub fn set(&self, name: &str, value: &str) {
        let key = name.to_ascii_uppercase();
        let mut vars = self.vars.write().unwrap();
        if value.is_empty() {
            vars.remove(&key);
        } else {
            vars.insert(key, value.to_string());
        }
    }

    /// Look up a variable by (case-insensitive) name.
    pub fn get(&self, name: &str) -> Option<String> {
        let vars = self.vars.read().unwrap();
        vars.get(&name.to_ascii_uppercase()).cloned()
    }

    /// Snapshot of all variables in name order, for `SET` listings.
    pub fn vars(&self) -> Vec<(String, String)> {
        let vars = self.vars.read().unwrap();
        vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}
