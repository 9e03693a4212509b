//! The packaging pipeline.
//!
//! detect backend → resolve version → native build → assemble package.
//! Stages run once, in order; the first fatal error ends the run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::build::driver::{BuildError, BuildOutcome, NativeBuildDriver};
use crate::config::Config;
use crate::exec::runner::CommandRunner;
use crate::package::assembler::{PackageAssembler, PackageError, PackageLayout};
use crate::package::metadata::{load_readme, write_manifest, PackageMetadata};
use crate::toolchain::detect::{detect_backend, BackendKind};
use crate::toolchain::env::EnvSource;
use crate::version::{VersionInfo, VersionResolver};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("native build failed: {0}")]
    Build(#[from] BuildError),

    #[error("package assembly failed: {0}")]
    Package(#[from] PackageError),
}

/// Summary of a completed packaging run.
#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub package: String,
    pub version: VersionInfo,
    pub backend: BackendKind,
    pub build: BuildOutcome,
    pub layout: PackageLayout,
    pub library_path: PathBuf,
    pub headers_copied: usize,
    pub manifest: PathBuf,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    env: &'a dyn EnvSource,
    runner: &'a dyn CommandRunner,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, env: &'a dyn EnvSource, runner: &'a dyn CommandRunner) -> Self {
        Self { config, env, runner }
    }

    pub fn detect(&self) -> BackendKind {
        detect_backend(self.env)
    }

    pub async fn version(&self, backend: BackendKind) -> VersionInfo {
        VersionResolver::new(self.config, self.env, self.runner)
            .resolve(backend)
            .await
    }

    pub async fn run(&self, staging: &Path) -> Result<PackageReport, PipelineError> {
        let backend = self.detect();
        let version = self.version(backend).await;
        info!(
            backend = %backend,
            "Building wheel {}-{}",
            self.config.package.name,
            version
        );

        let build = NativeBuildDriver::new(self.config, self.env, self.runner)
            .build(backend)
            .await?;

        let assembled = PackageAssembler::new(self.config).assemble(staging).await?;

        let readme = load_readme(&self.config.root_path(&self.config.package.readme)).await;
        let metadata = PackageMetadata::new(self.config, &version, backend, readme);
        let manifest = write_manifest(&assembled.layout, &metadata).await?;

        Ok(PackageReport {
            package: self.config.package.name.clone(),
            version,
            backend,
            build,
            layout: assembled.layout,
            library_path: assembled.library_path,
            headers_copied: assembled.headers.len(),
            manifest,
        })
    }
}
