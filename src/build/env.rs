//! Environment overrides for build commands.
//!
//! The build needs the ROCm compiler directory on `PATH` and a fixed `LANG`
//! for the link step. Rather than editing the packager's own environment, the
//! overrides are collected here and attached to each child command, so they
//! last exactly as long as the build stage and never leak into the caller.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{LOCALE_VAR, PATH_VAR};
use crate::exec::runner::CommandSpec;
use crate::toolchain::env::EnvSource;

#[derive(Error, Debug)]
#[error("cannot add {dir} to PATH: {reason}")]
pub struct SearchPathError {
    pub dir: PathBuf,
    pub reason: String,
}

/// Variables applied to every command of a build stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `dir` is on the search path inherited from `env`.
    ///
    /// The directory is appended, so binaries already on `PATH` keep priority.
    /// Nothing is overridden when it is already present.
    pub fn with_search_dir(mut self, env: &dyn EnvSource, dir: &Path) -> Result<Self, SearchPathError> {
        let current = env.get(PATH_VAR).unwrap_or_default();
        let mut entries: Vec<PathBuf> = std::env::split_paths(&current).collect();
        entries.retain(|p| !p.as_os_str().is_empty());

        if entries.iter().any(|p| p == dir) {
            return Ok(self);
        }
        entries.push(dir.to_path_buf());

        let joined: OsString = std::env::join_paths(&entries).map_err(|e| SearchPathError {
            dir: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        let joined = joined.into_string().map_err(|_| SearchPathError {
            dir: dir.to_path_buf(),
            reason: "search path is not valid unicode".to_string(),
        })?;

        self.vars.insert(PATH_VAR.to_string(), joined);
        Ok(self)
    }

    /// Copy of this environment with `LANG` forced to `locale`.
    pub fn with_locale(&self, locale: &str) -> Self {
        let mut next = self.clone();
        next.vars.insert(LOCALE_VAR.to_string(), locale.to_string());
        next
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Attach the overrides to a command.
    pub fn apply(&self, spec: CommandSpec) -> CommandSpec {
        self.vars.iter().fold(spec, |spec, (k, v)| spec.env(k.clone(), v.clone()))
    }
}
