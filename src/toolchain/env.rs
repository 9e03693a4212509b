//! Environment variable access.
//!
//! All pipeline stages read the environment through [`EnvSource`] so that an
//! unset variable and an empty one are indistinguishable, and so tests can run
//! against an in-memory map instead of the real process environment.

use std::collections::HashMap;

/// A source of environment variables.
pub trait EnvSource: Send + Sync {
    /// Raw lookup. `None` when the variable is unset or not valid unicode.
    fn raw(&self, key: &str) -> Option<String>;

    /// Lookup treating an empty value the same as an unset one.
    fn get(&self, key: &str) -> Option<String> {
        self.raw(key).filter(|v| !v.is_empty())
    }

    /// Whether the variable is set to a non-empty value.
    fn is_configured(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// The environment of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment.
#[derive(Debug, Default, Clone)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl EnvSource for MapEnv {
    fn raw(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}
