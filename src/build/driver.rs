//! Native build driver.
//!
//! Only ROCm builds run anything. A CPU-only run packages whatever library is
//! already in `lib/`, and CUDA builds are produced outside this tool.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::env::{BuildEnv, SearchPathError};
use super::plan::{append_offload_archs, resolve_architectures, seed_build_config, BuildPlan};
use crate::config::{Config, MKL_ROOT_VAR, TARGET_ARCH_VAR};
use crate::exec::runner::{CommandRunner, CommandSpec, ExecError};
use crate::toolchain::detect::{rocm_root, BackendKind};
use crate::toolchain::env::EnvSource;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("MKL installation not found. Please set MKLROOT.")]
    MissingMklRoot,

    #[error(transparent)]
    SearchPath(#[from] SearchPathError),

    #[error("failed to prepare {path}: {source}")]
    BuildConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to enumerate GPU targets: {0}")]
    ArchEnumeration(#[source] ExecError),

    #[error("error running MAGMA {step} build command: {source}")]
    Step {
        step: BuildStep,
        #[source]
        source: ExecError,
    },
}

/// The two make invocations of a ROCm build, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStep {
    /// Generate and compile the HIP sources.
    HipSources,
    /// Link the shared library.
    SharedLibrary,
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStep::HipSources => f.write_str("HIP sources"),
            BuildStep::SharedLibrary => f.write_str("shared library"),
        }
    }
}

/// What the driver did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// No native build ran; the prebuilt library is packaged as-is.
    Skipped { backend: BackendKind },
    /// A ROCm build completed.
    Built { plan: BuildPlan },
}

impl BuildOutcome {
    pub fn plan(&self) -> Option<&BuildPlan> {
        match self {
            BuildOutcome::Built { plan } => Some(plan),
            BuildOutcome::Skipped { .. } => None,
        }
    }
}

pub struct NativeBuildDriver<'a> {
    config: &'a Config,
    env: &'a dyn EnvSource,
    runner: &'a dyn CommandRunner,
}

impl<'a> NativeBuildDriver<'a> {
    pub fn new(config: &'a Config, env: &'a dyn EnvSource, runner: &'a dyn CommandRunner) -> Self {
        Self { config, env, runner }
    }

    pub async fn build(&self, backend: BackendKind) -> Result<BuildOutcome, BuildError> {
        match backend {
            BackendKind::None => {
                info!("GPU backend not found, packaging the prebuilt library");
                Ok(BuildOutcome::Skipped { backend })
            }
            BackendKind::Cuda => {
                info!("Building MAGMA for CUDA...");
                info!("CUDA builds are produced externally, no native build step runs here");
                Ok(BuildOutcome::Skipped { backend })
            }
            BackendKind::Rocm => self.build_rocm().await.map(|plan| BuildOutcome::Built { plan }),
        }
    }

    async fn build_rocm(&self) -> Result<BuildPlan, BuildError> {
        let mkl_root = self.env.get(MKL_ROOT_VAR).ok_or(BuildError::MissingMklRoot)?;
        let cpu_count = self.config.job_count();

        let rocm_bin = rocm_root(self.env, self.config).join("bin");
        let build_env = BuildEnv::new().with_search_dir(self.env, &rocm_bin)?;

        info!(mkl_root = %mkl_root, cpu_count, "Building MAGMA for ROCm...");

        let build_config_path = self.config.build_config_path();
        let template = self.config.root_path(&self.config.build.build_config_template);
        seed_build_config(&template, &build_config_path)
            .await
            .map_err(|source| BuildError::BuildConfig {
                path: build_config_path.clone(),
                source,
            })?;

        let enumerator = build_env.apply(
            CommandSpec::new(&self.config.build.arch_enumerator).current_dir(&self.config.root_dir),
        );
        let target_arch = self.env.get(TARGET_ARCH_VAR);
        let (target_architectures, source) =
            resolve_architectures(target_arch.as_deref(), enumerator, self.runner)
                .await
                .map_err(BuildError::ArchEnumeration)?;

        append_offload_archs(&build_config_path, &target_architectures)
            .await
            .map_err(|source| BuildError::BuildConfig {
                path: build_config_path.clone(),
                source,
            })?;

        info!(
            archs = ?target_architectures,
            source = ?source,
            path = %build_config_path.display(),
            "Wrote GPU targets to build configuration"
        );

        let plan = BuildPlan {
            cpu_count,
            mkl_root: PathBuf::from(mkl_root),
            target_architectures,
            build_config_path,
        };

        self.run_step(BuildStep::HipSources, self.hip_sources_command(&plan, &build_env))
            .await?;

        let link_env = build_env.with_locale(&self.config.build.locale);
        self.run_step(BuildStep::SharedLibrary, self.shared_library_command(&plan, &link_env))
            .await?;

        Ok(plan)
    }

    /// `make -f make.gen.hipMAGMA -j <cpus>`
    pub fn hip_sources_command(&self, plan: &BuildPlan, build_env: &BuildEnv) -> CommandSpec {
        build_env.apply(
            CommandSpec::new(&self.config.build.make_program)
                .args(["-f", self.config.build.hip_makefile.as_str()])
                .args(["-j".to_string(), plan.cpu_count.to_string()])
                .current_dir(&self.config.root_dir),
        )
    }

    /// `make lib/libmagma.so -j <cpus> MKLROOT=<mkl root>`
    pub fn shared_library_command(&self, plan: &BuildPlan, build_env: &BuildEnv) -> CommandSpec {
        build_env.apply(
            CommandSpec::new(&self.config.build.make_program)
                .arg(self.config.build.shared_lib_target.as_str())
                .args(["-j".to_string(), plan.cpu_count.to_string()])
                .arg(format!("{MKL_ROOT_VAR}={}", plan.mkl_root.display()))
                .current_dir(&self.config.root_dir),
        )
    }

    async fn run_step(&self, step: BuildStep, spec: CommandSpec) -> Result<(), BuildError> {
        let output = self
            .runner
            .run_checked(&spec)
            .await
            .map_err(|source| BuildError::Step { step, source })?;

        tracing::debug!(step = %step, stdout = %output.stdout.trim_end(), "Build output");
        info!(step = %step, "End of {step} build");
        Ok(())
    }
}
