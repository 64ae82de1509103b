//! Initialize a docs folder.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use niveflow_static::meta::META_FILE;
use niveflow_static::SiteMeta;

use crate::config::DEFAULT_CONFIG;

/// Write `meta.json` and the config file unless they exist.
pub fn run(config_path: &Path) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    init_in(&cwd, config_path)
}

fn init_in(dir: &Path, config_path: &Path) -> Result<()> {
    if SiteMeta::write_default(dir)? {
        tracing::info!("Created {}", META_FILE);
        tracing::info!("Edit it to set the site title, logo, index page and avatar.");
    } else {
        tracing::warn!("{} already exists", META_FILE);
    }

    let config_path = dir.join(config_path);
    if config_path.exists() {
        tracing::warn!("{} already exists", config_path.display());
    } else {
        fs::write(&config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        tracing::info!("Created {}", config_path.display());
    }

    tracing::info!("Add [[sources]] to the config, then run 'niveflow sync'.");
    Ok(())
}
