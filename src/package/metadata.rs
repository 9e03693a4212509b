//! Package metadata manifest.
//!
//! The manifest carries what a wheel's metadata would: name, version, author,
//! license, the README as long description, and the list of packaged data
//! files. It is written to `<staging>/<package>/package.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use super::assembler::{PackageError, PackageLayout};
use crate::config::Config;
use crate::toolchain::detect::BackendKind;
use crate::version::VersionInfo;

pub const MANIFEST_FILE: &str = "package.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub commit_sha: Option<String>,
    pub backend: BackendKind,
    pub author: String,
    pub url: String,
    pub license: String,
    pub long_description: String,
    pub long_description_content_type: String,
    pub python_requires: String,

    /// Data files shipped inside the package, relative to its root.
    pub package_data: Vec<String>,
}

impl PackageMetadata {
    pub fn new(config: &Config, version: &VersionInfo, backend: BackendKind, readme: String) -> Self {
        let pkg = &config.package;
        Self {
            name: pkg.name.clone(),
            version: version.version_string(),
            commit_sha: version.commit_sha.clone(),
            backend,
            author: pkg.author.clone(),
            url: pkg.url.clone(),
            license: pkg.license.clone(),
            long_description: readme,
            long_description_content_type: "text/markdown".to_string(),
            python_requires: pkg.python_requires.clone(),
            package_data: vec![format!("lib/{}", pkg.library), "include/*.h".to_string()],
        }
    }
}

/// README contents, or an empty description when it cannot be read.
pub async fn load_readme(path: &Path) -> String {
    match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "README not readable, long description left empty");
            String::new()
        }
    }
}

/// Write the manifest into the package root.
pub async fn write_manifest(
    layout: &PackageLayout,
    metadata: &PackageMetadata,
) -> Result<PathBuf, PackageError> {
    let path = layout.package_root.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(metadata)?;

    fs::write(&path, json)
        .await
        .map_err(|source| PackageError::Write {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), version = %metadata.version, "Wrote package manifest");
    Ok(path)
}
