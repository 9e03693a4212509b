//! Package assembly.
//!
//! Produces `<staging>/<package>/lib/<library>` and a full copy of the header
//! tree under `<staging>/<package>/include`. A package without its native
//! library is useless, so every copy failure aborts assembly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("shared library not found at {0}")]
    MissingLibrary(PathBuf),

    #[error("header directory not found at {0}")]
    MissingIncludeDir(PathBuf),

    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize package metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Final on-disk layout of the package inside the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLayout {
    /// `<staging>/<package>`
    pub package_root: PathBuf,

    /// `<staging>/<package>/lib`
    pub lib_dir: PathBuf,

    /// `<staging>/<package>/include`
    pub include_dir: PathBuf,
}

impl PackageLayout {
    pub fn new(staging: &Path, package_name: &str) -> Self {
        let package_root = staging.join(package_name);
        Self {
            lib_dir: package_root.join("lib"),
            include_dir: package_root.join("include"),
            package_root,
        }
    }
}

/// Result of a successful assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledPackage {
    pub layout: PackageLayout,

    /// Staged shared library.
    pub library_path: PathBuf,

    /// Header files copied, relative to the include directory.
    pub headers: Vec<PathBuf>,
}

/// Look for `header` at the top of `include_dir`.
pub fn find_header(include_dir: &Path, header: &str) -> bool {
    let candidate = include_dir.join(header);
    let found = candidate.is_file();
    if found {
        info!("Searching for {header} in {}. Found in Magma Include.", candidate.display());
    } else {
        info!("Searching for {header}. Didn't find in Magma Include.");
    }
    found
}

/// Recursively copy `src` into `dst`, returning the copied files relative to `src`.
///
/// Existing files under `dst` are overwritten; unrelated files are left alone.
pub async fn copy_tree(src: &Path, dst: &Path) -> Result<Vec<PathBuf>, PackageError> {
    let mut copied = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(rel_dir) = pending.pop() {
        let from_dir = src.join(&rel_dir);
        let to_dir = dst.join(&rel_dir);
        fs::create_dir_all(&to_dir)
            .await
            .map_err(|source| PackageError::CreateDir {
                path: to_dir.clone(),
                source,
            })?;

        let read_dir_err = |source| PackageError::ReadDir {
            path: from_dir.clone(),
            source,
        };
        let mut entries = fs::read_dir(&from_dir).await.map_err(read_dir_err)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
            names.push(entry.file_name());
        }
        names.sort();

        for name in names {
            let rel = rel_dir.join(&name);
            let from = src.join(&rel);
            let meta = fs::metadata(&from)
                .await
                .map_err(|source| PackageError::ReadDir {
                    path: from.clone(),
                    source,
                })?;

            if meta.is_dir() {
                pending.push(rel);
            } else {
                let to = dst.join(&rel);
                fs::copy(&from, &to)
                    .await
                    .map_err(|source| PackageError::Copy {
                        from: from.clone(),
                        to: to.clone(),
                        source,
                    })?;
                debug!(file = %rel.display(), "Copied");
                copied.push(rel);
            }
        }
    }

    copied.sort();
    Ok(copied)
}

/// Builds the package tree from the source checkout.
pub struct PackageAssembler<'a> {
    config: &'a Config,
}

impl<'a> PackageAssembler<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub async fn assemble(&self, staging: &Path) -> Result<AssembledPackage, PackageError> {
        let pkg = &self.config.package;
        let layout = PackageLayout::new(staging, &pkg.name);

        info!("Build destination = {}", staging.display());

        let source_lib = self.config.source_lib_dir().join(&pkg.library);
        if !source_lib.is_file() {
            return Err(PackageError::MissingLibrary(source_lib));
        }

        let source_include = self.config.source_include_dir();
        if !source_include.is_dir() {
            return Err(PackageError::MissingIncludeDir(source_include));
        }

        if !find_header(&source_include, &pkg.primary_header) {
            warn!(
                header = %pkg.primary_header,
                include = %source_include.display(),
                "Primary header missing from the include tree"
            );
        }

        fs::create_dir_all(&layout.lib_dir)
            .await
            .map_err(|source| PackageError::CreateDir {
                path: layout.lib_dir.clone(),
                source,
            })?;

        let library_path = layout.lib_dir.join(&pkg.library);
        fs::copy(&source_lib, &library_path)
            .await
            .map_err(|source| PackageError::Copy {
                from: source_lib.clone(),
                to: library_path.clone(),
                source,
            })?;

        let headers = copy_tree(&source_include, &layout.include_dir).await?;

        info!(
            library = %library_path.display(),
            headers = headers.len(),
            "Staged package"
        );

        Ok(AssembledPackage {
            layout,
            library_path,
            headers,
        })
    }
}
