//! `niveflow.toml` loading and wiring.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use niveflow_server::{Orchestrator, DEFAULT_SCHEDULE};
use niveflow_static::{BuildDispatcher, Bundler, CommandBundler, DispatchConfig, NativeBundler};
use niveflow_sync::source::validate_sources;
use niveflow_sync::{
    ChangeDetector, FileBackend, FingerprintCache, GitCli, SourceDescriptor, Synchronizer,
};

/// Default config file name.
pub const CONFIG_FILE: &str = "niveflow.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub sync: SyncSection,
    pub build: BuildSection,
    pub sources: Vec<SourceDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Cron expression for scheduled checks
    pub schedule: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            schedule: DEFAULT_SCHEDULE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub staging_dir: PathBuf,
    /// Fingerprint markers
    pub state_dir: PathBuf,
    pub git_timeout_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(".niveflow/staging"),
            state_dir: PathBuf::from(".niveflow/state"),
            git_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub output_dir: PathBuf,
    pub site_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub meta_file: PathBuf,
    /// External build command; the native bundler is used when absent
    pub command: Option<String>,
    pub timeout_secs: u64,
    pub base_url: String,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("dist"),
            site_dir: PathBuf::from("."),
            docs_dir: PathBuf::from("public/docs"),
            meta_file: PathBuf::from("public/meta.json"),
            command: None,
            timeout_secs: 1800,
            base_url: "/".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (defaults when missing), apply environment overrides and
    /// validate the sources.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config = Self::parse(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            tracing::debug!("Loaded config from {}", path.display());
            config
        } else {
            tracing::debug!("No {} found, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        validate_sources(&config.sources).context("Invalid source configuration")?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `WEBHOOK_PORT`, `POLL_INTERVAL`, `OUTPUT_PATH` and `DOCS_REPOS`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup("WEBHOOK_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("WEBHOOK_PORT is not a port number: {}", port))?;
        }
        if let Some(schedule) = lookup("POLL_INTERVAL") {
            self.server.schedule = schedule;
        }
        if let Some(output) = lookup("OUTPUT_PATH") {
            self.build.output_dir = PathBuf::from(output);
        }
        if let Some(repos) = lookup("DOCS_REPOS") {
            self.sources = serde_json::from_str(&repos).context("DOCS_REPOS is not a JSON array of sources")?;
        }
        Ok(())
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.git_timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build.timeout_secs)
    }

    pub fn synchronizer(&self) -> Synchronizer {
        let cache = FingerprintCache::new(FileBackend::new(&self.sync.state_dir));
        Synchronizer::new(
            &self.sync.staging_dir,
            ChangeDetector::new(Arc::new(cache)),
            Arc::new(GitCli::new(self.git_timeout())),
        )
    }

    /// The configured command bundler, or the native one.
    pub fn bundler(&self) -> Result<Arc<dyn Bundler>> {
        match &self.build.command {
            Some(command) => Ok(Arc::new(CommandBundler::from_command_line(
                command,
                self.build_timeout(),
            )?)),
            None => Ok(Arc::new(NativeBundler::new(&self.build.base_url))),
        }
    }

    pub fn dispatch_config(&self) -> Result<DispatchConfig> {
        Ok(DispatchConfig {
            site_dir: self.build.site_dir.clone(),
            docs_dir: self.build.docs_dir.clone(),
            meta_file: self.build.meta_file.clone(),
            output_root: self.build.output_dir.clone(),
            cwd: std::env::current_dir().context("Failed to read working directory")?,
        })
    }

    pub fn dispatcher(&self, bundler: Arc<dyn Bundler>) -> Result<BuildDispatcher> {
        Ok(BuildDispatcher::new(self.dispatch_config()?, bundler))
    }

    pub fn orchestrator(&self) -> Result<Orchestrator> {
        Ok(Orchestrator::new(
            self.sources.clone(),
            self.synchronizer(),
            self.dispatcher(self.bundler()?)?,
        ))
    }

    /// Log every configured source.
    pub fn print_sources(&self) {
        tracing::info!("{} source(s) configured:", self.sources.len());
        for source in &self.sources {
            tracing::info!(
                "  - {} [{}] {} ({})",
                source.name,
                source.kind_label(),
                source.url,
                source.branch
            );
        }
    }
}

/// Starter config written by `niveflow init`.
pub const DEFAULT_CONFIG: &str = r#"# niveflow configuration

[server]
host = "0.0.0.0"
port = 3001
# Cron expression for scheduled checks
schedule = "*/30 * * * *"

[sync]
staging_dir = ".niveflow/staging"
state_dir = ".niveflow/state"
git_timeout_secs = 300

[build]
# Parent of per-source output directories
output_dir = "dist"
# External build command run in site_dir; omit to use the built-in renderer
# command = "pnpm build:only"
timeout_secs = 1800
base_url = "/"

# [[sources]]
# name = "docs"
# url = "https://github.com/your-org/docs.git"
# branch = "main"
# output_path = "/var/www/docs"
"#;
