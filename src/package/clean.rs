//! Removal of generated build artifacts.

use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};

use crate::config::Config;

/// Paths `clean` removes, whether or not they exist.
pub fn clean_targets(config: &Config) -> Vec<PathBuf> {
    vec![
        config.root_path(format!("{}.egg-info", config.package.name)),
        config.root_path("build"),
        config.root_path("dist"),
        config.build_config_path(),
    ]
}

/// Remove generated artifacts, returning the paths that actually existed.
///
/// Missing targets are skipped silently.
pub async fn clean(config: &Config) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for path in clean_targets(config) {
        let meta = match fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Nothing to remove");
                continue;
            }
            Err(e) => return Err(e),
        };

        if meta.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        info!(path = %path.display(), "Removed");
        removed.push(path);
    }

    Ok(removed)
}
