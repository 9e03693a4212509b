//! ROCm build plan: target architectures and the generated `make.inc`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::exec::runner::{CommandRunner, CommandSpec, ExecError};

/// Enumerator output for "no GPU agent detected".
pub const PLACEHOLDER_ARCH: &str = "gfx000";

/// Inputs consumed by the two make invocations of a ROCm build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Parallel job count passed to make.
    pub cpu_count: usize,

    /// MKL installation root.
    pub mkl_root: PathBuf,

    /// GPU targets, in resolution order.
    pub target_architectures: Vec<String>,

    /// Generated build configuration file.
    pub build_config_path: PathBuf,
}

/// Where the target list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchSource {
    Environment,
    Enumerator,
}

/// Parse a semicolon-separated target list such as `gfx90a;gfx942`.
pub fn parse_arch_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse enumerator output: one target per line, blanks and the placeholder dropped.
pub fn parse_enumerator_output(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|a| !a.is_empty() && *a != PLACEHOLDER_ARCH)
        .map(str::to_string)
        .collect()
}

/// Resolve the target list, preferring `from_env` over running the enumerator.
pub async fn resolve_architectures(
    from_env: Option<&str>,
    enumerator: CommandSpec,
    runner: &dyn CommandRunner,
) -> Result<(Vec<String>, ArchSource), ExecError> {
    if let Some(raw) = from_env {
        let archs = parse_arch_list(raw);
        if !archs.is_empty() {
            debug!(?archs, "Target architectures from environment");
            return Ok((archs, ArchSource::Environment));
        }
    }

    let output = runner.run_checked(&enumerator).await?;
    let archs = parse_enumerator_output(&output.stdout);
    debug!(?archs, "Target architectures from enumerator");
    Ok((archs, ArchSource::Enumerator))
}

/// Replace `target` with a fresh copy of `template`.
pub async fn seed_build_config(template: &Path, target: &Path) -> std::io::Result<()> {
    match fs::remove_file(target).await {
        Ok(()) => debug!(path = %target.display(), "Removed stale build configuration"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    fs::copy(template, target).await?;
    info!(
        template = %template.display(),
        path = %target.display(),
        "Seeded build configuration"
    );
    Ok(())
}

/// `make.inc` line enabling device code for one target.
pub fn offload_arch_line(arch: &str) -> String {
    format!("\nDEVCCFLAGS += --offload-arch={arch}")
}

/// Append one offload flag per target to the build configuration.
pub async fn append_offload_archs(path: &Path, archs: &[String]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().append(true).open(path).await?;
    let block: String = archs.iter().map(|a| offload_arch_line(a)).collect();
    file.write_all(block.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
