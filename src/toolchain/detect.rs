//! GPU backend detection.
//!
//! ROCm is checked before CUDA: a host with both toolkits builds for ROCm.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::env::EnvSource;
use crate::config::{Config, CUDA_HOME_VAR, ROCM_PATH_VAR};

/// Accelerator toolkit targeted by a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    None,
    Cuda,
    Rocm,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::Cuda => "cuda",
            BackendKind::Rocm => "rocm",
        }
    }

    pub fn is_gpu(&self) -> bool {
        !matches!(self, BackendKind::None)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiler location relative to the ROCm root.
pub fn hipcc_path(rocm_root: &Path) -> PathBuf {
    rocm_root.join("bin").join("hipcc")
}

/// Compiler location relative to the CUDA root.
pub fn nvcc_path(cuda_root: &Path) -> PathBuf {
    cuda_root.join("bin").join("nvcc")
}

/// ROCm root from the environment, or the configured default install location.
pub fn rocm_root(env: &dyn EnvSource, config: &Config) -> PathBuf {
    env.get(ROCM_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.build.default_rocm_root.clone())
}

/// True when `var` names a root under which `compiler` exists.
fn toolkit_present(env: &dyn EnvSource, var: &str, compiler: fn(&Path) -> PathBuf) -> bool {
    match env.get(var) {
        Some(root) => {
            let path = compiler(Path::new(&root));
            let found = path.exists();
            debug!(var, path = %path.display(), found, "Probed toolkit compiler");
            found
        }
        None => false,
    }
}

/// Detect the backend from the environment.
pub fn detect_backend(env: &dyn EnvSource) -> BackendKind {
    if toolkit_present(env, ROCM_PATH_VAR, hipcc_path) {
        BackendKind::Rocm
    } else if toolkit_present(env, CUDA_HOME_VAR, nvcc_path) {
        BackendKind::Cuda
    } else {
        info!("No CUDA or ROCm installation found. Building for CPU.");
        BackendKind::None
    }
}
