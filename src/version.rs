//! Package version resolution.
//!
//! The version is best-effort metadata: the release branch name supplies
//! `X.Y.Z`, a ROCm build appends the installed toolkit version as build
//! metadata, and the commit hash is recorded when git can provide it. None of
//! these lookups can fail the run; each one degrades to less information.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::exec::runner::{CommandRunner, CommandSpec};
use crate::toolchain::detect::{rocm_root, BackendKind};
use crate::toolchain::env::EnvSource;

/// Resolved package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// `X.Y.Z`.
    pub base_version: String,

    /// Build metadata, e.g. `rocm6.1.2`.
    pub backend_suffix: Option<String>,

    /// Full commit hash of the checkout.
    pub commit_sha: Option<String>,
}

impl VersionInfo {
    /// `X.Y.Z` or `X.Y.Z+<suffix>`.
    pub fn version_string(&self) -> String {
        match self.backend_suffix {
            Some(ref suffix) => format!("{}+{}", self.base_version, suffix),
            None => self.base_version.clone(),
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version_string())
    }
}

/// Length of a `digits.digits.digits` run at the start of `bytes`.
fn triplet_len(bytes: &[u8]) -> Option<usize> {
    let mut pos = 0;
    for part in 0..3 {
        if part > 0 {
            if bytes.get(pos) != Some(&b'.') {
                return None;
            }
            pos += 1;
        }
        let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        pos += digits;
    }
    Some(pos)
}

/// First `MAJOR.MINOR.PATCH` anywhere in `text`.
pub fn extract_semver(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    (0..bytes.len()).find_map(|i| triplet_len(&bytes[i..]).map(|n| &text[i..i + n]))
}

/// First `vMAJOR.MINOR.PATCH` in `text`, without the `v`.
pub fn extract_tagged_semver(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    (0..bytes.len())
        .filter(|&i| bytes[i] == b'v')
        .find_map(|i| triplet_len(&bytes[i + 1..]).map(|n| &text[i + 1..i + 1 + n]))
}

/// Location of the ROCm version file under a toolkit root.
pub fn rocm_version_file(rocm_root: &Path) -> PathBuf {
    rocm_root.join(".info").join("version")
}

/// Derives [`VersionInfo`] from git and the installed toolkit.
pub struct VersionResolver<'a> {
    config: &'a Config,
    env: &'a dyn EnvSource,
    runner: &'a dyn CommandRunner,
}

impl<'a> VersionResolver<'a> {
    pub fn new(config: &'a Config, env: &'a dyn EnvSource, runner: &'a dyn CommandRunner) -> Self {
        Self { config, env, runner }
    }

    pub async fn resolve(&self, backend: BackendKind) -> VersionInfo {
        let base_version = self.branch_version().await;
        let commit_sha = self.commit_sha().await;

        let backend_suffix = match backend {
            BackendKind::Rocm => self.rocm_version().await.map(|v| format!("rocm{v}")),
            BackendKind::Cuda | BackendKind::None => None,
        };

        let info = VersionInfo {
            base_version,
            backend_suffix,
            commit_sha,
        };
        info!(version = %info, sha = ?info.commit_sha, backend = %backend, "Resolved version");
        info
    }

    /// Run a git query in the repository root; `None` on any failure.
    async fn git(&self, args: &[&str]) -> Option<String> {
        let spec = CommandSpec::new("git")
            .args(args.iter().copied())
            .current_dir(&self.config.root_dir);

        match self.runner.run_checked(&spec).await {
            Ok(output) => {
                let value = output.stdout.trim().to_string();
                (!value.is_empty()).then_some(value)
            }
            Err(e) => {
                debug!(error = %e, "git query failed");
                None
            }
        }
    }

    async fn branch_version(&self) -> String {
        let default = &self.config.package.default_version;

        let Some(branch) = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await else {
            warn!(default = %default, "Could not find version from branch name.");
            return default.clone();
        };

        match extract_tagged_semver(&branch) {
            Some(version) => version.to_string(),
            None => {
                debug!(branch = %branch, default = %default, "Branch carries no vX.Y.Z, using default");
                default.clone()
            }
        }
    }

    async fn commit_sha(&self) -> Option<String> {
        let sha = self.git(&["rev-parse", "HEAD"]).await;
        if sha.is_none() {
            warn!("Could not find git SHA.");
        }
        sha
    }

    async fn rocm_version(&self) -> Option<String> {
        let path = rocm_version_file(&rocm_root(self.env, self.config));

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not find rocm version from rocm installation.");
                return None;
            }
        };

        let first_line = contents.lines().next().unwrap_or("").trim();
        let version = extract_semver(first_line).map(str::to_string);
        if version.is_none() {
            warn!(path = %path.display(), line = first_line, "ROCm version file has no X.Y.Z");
        }
        version
    }
}
