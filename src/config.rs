//! Runtime configuration for magma-packager.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Every file name and external program the pipeline touches lives here, so a
//! MAGMA checkout with a non-standard layout only needs a config file.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// ROCm toolkit root.
pub const ROCM_PATH_VAR: &str = "ROCM_PATH";

/// CUDA toolkit root.
pub const CUDA_HOME_VAR: &str = "CUDA_HOME";

/// Intel MKL installation root, required for ROCm builds.
pub const MKL_ROOT_VAR: &str = "MKLROOT";

/// Semicolon-separated list of GPU targets, e.g. `gfx90a;gfx942`.
pub const TARGET_ARCH_VAR: &str = "PYTORCH_ROCM_ARCH";

/// Executable search path.
pub const PATH_VAR: &str = "PATH";

/// Locale variable forced for the shared-library link step.
pub const LOCALE_VAR: &str = "LANG";

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "magma-packager",
    version,
    about = "Build and stage the MAGMA native library for CUDA, ROCm or CPU"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "magma-packager.json", global = true)]
    pub config: PathBuf,

    /// Repository root (overrides `root_dir` from the config file).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Detect the backend, run the native build and stage the package.
    Build {
        /// Staging directory (defaults to `<root>/build/lib`).
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// Print the package report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved package version.
    Version,

    /// Print the detected GPU backend.
    Detect,

    /// Remove generated build artifacts.
    Clean,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the MAGMA source checkout.
    pub root_dir: PathBuf,

    /// Package layout and metadata.
    pub package: PackageConfig,

    /// Native build settings.
    pub build: BuildConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            package: PackageConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

/// What gets packaged and how it is described.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Package name; also the directory created under the staging root.
    pub name: String,

    /// Version used when the branch name carries no `vX.Y.Z`.
    pub default_version: String,

    /// Shared library file name inside `lib_dir`.
    pub library: String,

    /// Source directory holding the built shared library (relative to root).
    pub lib_dir: PathBuf,

    /// Source header tree (relative to root).
    pub include_dir: PathBuf,

    /// Header expected at the top of the include tree.
    pub primary_header: String,

    pub author: String,
    pub url: String,
    pub license: String,

    /// README used as the long description (relative to root).
    pub readme: PathBuf,

    pub python_requires: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: "magma".to_string(),
            default_version: "2.9.0".to_string(),
            library: "libmagma.so".to_string(),
            lib_dir: PathBuf::from("lib"),
            include_dir: PathBuf::from("include"),
            primary_header: "magma.h".to_string(),
            author: "ICL".to_string(),
            url: "https://github.com/icl-utk-edu/magma/tree/master".to_string(),
            license: "BSD-3-Clause".to_string(),
            readme: PathBuf::from("README"),
            python_requires: ">=3.9".to_string(),
        }
    }
}

/// External build tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// make executable.
    pub make_program: PathBuf,

    /// Makefile that generates the HIP sources.
    pub hip_makefile: String,

    /// make target producing the shared library.
    pub shared_lib_target: String,

    /// Generated build configuration file (relative to root).
    pub build_config_file: PathBuf,

    /// Template the build configuration is seeded from (relative to root).
    pub build_config_template: PathBuf,

    /// Tool listing the GPU targets present on this host.
    pub arch_enumerator: String,

    /// `LANG` value for the shared-library link step.
    pub locale: String,

    /// ROCm root used when `ROCM_PATH` is not set.
    pub default_rocm_root: PathBuf,

    /// Parallel job count (None = number of logical CPUs).
    pub jobs: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            make_program: PathBuf::from("/usr/bin/make"),
            hip_makefile: "make.gen.hipMAGMA".to_string(),
            shared_lib_target: "lib/libmagma.so".to_string(),
            build_config_file: PathBuf::from("make.inc"),
            build_config_template: PathBuf::from("make.inc-examples/make.inc.hip-gcc-mkl"),
            arch_enumerator: "rocm_agent_enumerator".to_string(),
            locale: "C.UTF-8".to_string(),
            default_rocm_root: PathBuf::from("/opt/rocm"),
            jobs: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Resolve a root-relative path.
    pub fn root_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root_dir.join(relative)
    }

    /// Directory holding the prebuilt shared library.
    pub fn source_lib_dir(&self) -> PathBuf {
        self.root_path(&self.package.lib_dir)
    }

    /// Header tree to be packaged.
    pub fn source_include_dir(&self) -> PathBuf {
        self.root_path(&self.package.include_dir)
    }

    /// Path of the generated build configuration (`make.inc`).
    pub fn build_config_path(&self) -> PathBuf {
        self.root_path(&self.build.build_config_file)
    }

    /// Default staging root, mirroring the usual `build/lib` layout.
    pub fn default_staging_dir(&self) -> PathBuf {
        self.root_dir.join("build").join("lib")
    }

    /// Number of parallel make jobs.
    pub fn job_count(&self) -> usize {
        self.build.jobs.filter(|&j| j > 0).unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.package.name, "magma");
        assert_eq!(cfg.package.default_version, "2.9.0");
        assert_eq!(cfg.build.build_config_file, PathBuf::from("make.inc"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{ "root_dir": "/src/magma", "build": { "jobs": 4 } }"#)
                .unwrap();
        assert_eq!(cfg.root_dir, PathBuf::from("/src/magma"));
        assert_eq!(cfg.job_count(), 4);
        assert_eq!(cfg.build.hip_makefile, "make.gen.hipMAGMA");
        assert_eq!(cfg.package.library, "libmagma.so");
    }

    #[test]
    fn test_zero_jobs_falls_back_to_cpu_count() {
        let mut cfg = Config::default();
        cfg.build.jobs = Some(0);
        assert!(cfg.job_count() >= 1);
    }

    #[test]
    fn test_root_relative_paths() {
        let cfg = Config {
            root_dir: PathBuf::from("/src/magma"),
            ..Default::default()
        };
        assert_eq!(cfg.build_config_path(), PathBuf::from("/src/magma/make.inc"));
        assert_eq!(cfg.source_lib_dir(), PathBuf::from("/src/magma/lib"));
        assert_eq!(cfg.default_staging_dir(), PathBuf::from("/src/magma/build/lib"));
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/magma-packager.json")).unwrap();
        assert_eq!(cfg.package.name, "magma");
    }
}
