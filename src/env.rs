use std::collections::HashMap;
use std::env as stdenv;

/// Variables visible to `$NAME` expansion and to spawned commands.
///
/// Captured from the process environment when the shell starts. Lookups that miss the
/// snapshot fall back to the live process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn new() -> Self {
        Self {
            vars: stdenv::vars().collect(),
        }
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}
