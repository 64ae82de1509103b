//! Bundlers turn a staged site into deployable output.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::builder::{SiteBuilder, SiteConfig};
use crate::error::BuildError;
use crate::meta::SiteMeta;

/// Default bound on one bundler run.
pub const DEFAULT_BUNDLER_TIMEOUT: Duration = Duration::from_secs(1800);

/// Placeholder replaced by the output directory in command arguments.
pub const OUT_PLACEHOLDER: &str = "{out}";

/// One bundler invocation. All paths are absolute.
#[derive(Debug, Clone)]
pub struct BundleJob {
    /// Source being built
    pub name: String,

    /// Directory the bundler runs in
    pub site_dir: PathBuf,

    /// Staged markdown
    pub docs_dir: PathBuf,

    /// Staged `meta.json`; may be absent
    pub meta_file: PathBuf,

    /// Where the bundler must write its output
    pub out_dir: PathBuf,
}

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    async fn bundle(&self, job: &BundleJob) -> Result<(), BuildError>;
}

/// Runs an external build command, e.g. `pnpm build:only`.
///
/// The output directory is passed as `--outDir <dir>` unless an argument
/// contains `{out}`, in which case it is substituted there instead. It is
/// also exported as `OUT_PUT`.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandBundler {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Split a whitespace-separated command line.
    pub fn from_command_line(command: &str, timeout: Duration) -> Result<Self, BuildError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(BuildError::EmptyCommand)?;
        Ok(Self::new(program, parts.collect(), timeout))
    }

    fn args_for(&self, job: &BundleJob) -> Vec<String> {
        let out = job.out_dir.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(OUT_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(OUT_PLACEHOLDER, &out)
                } else {
                    arg.clone()
                }
            })
            .collect();

        if !substituted {
            args.push("--outDir".to_string());
            args.push(out.into_owned());
        }
        args
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    fn name(&self) -> &str {
        &self.program
    }

    async fn bundle(&self, job: &BundleJob) -> Result<(), BuildError> {
        let args = self.args_for(job);
        tracing::info!("[{}] Running {} {}", job.name, self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(&job.site_dir)
            .env("OUT_PUT", &job.out_dir)
            .env("NIVEFLOW_SOURCE", &job.name)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|source| BuildError::Spawn {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("[{}] Failed to kill {}: {}", job.name, self.program, e);
                }
                return Err(BuildError::Timeout {
                    program: self.program.clone(),
                    after: self.timeout,
                });
            }
        };

        if !status.success() {
            return Err(BuildError::BundlerExit {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// Builds the site in-process with [`SiteBuilder`].
#[derive(Debug, Clone)]
pub struct NativeBundler {
    base_url: String,
}

impl NativeBundler {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for NativeBundler {
    fn default() -> Self {
        Self::new("/")
    }
}

#[async_trait]
impl Bundler for NativeBundler {
    fn name(&self) -> &str {
        "native"
    }

    async fn bundle(&self, job: &BundleJob) -> Result<(), BuildError> {
        let meta = SiteMeta::load_or_default(&job.meta_file)?;
        let config = SiteConfig {
            docs_dir: job.docs_dir.clone(),
            output_dir: job.out_dir.clone(),
            base_url: self.base_url.clone(),
            meta,
        };

        let result = tokio::task::spawn_blocking(move || SiteBuilder::new(config)?.build())
            .await
            .map_err(|e| BuildError::Task(e.to_string()))??;

        tracing::info!(
            "[{}] Built {} pages in {}ms",
            job.name,
            result.pages,
            result.duration_ms
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    fn job(root: &Path) -> BundleJob {
        BundleJob {
            name: "docs".to_string(),
            site_dir: root.to_path_buf(),
            docs_dir: root.join("public/docs"),
            meta_file: root.join("public/meta.json"),
            out_dir: root.join("dist/docs"),
        }
    }

    #[test]
    fn appends_out_dir_by_default() {
        let bundler = CommandBundler::from_command_line("pnpm build:only", DEFAULT_BUNDLER_TIMEOUT)
            .unwrap();
        let job = job(Path::new("/srv/site"));

        assert_eq!(
            bundler.args_for(&job),
            ["build:only", "--outDir", "/srv/site/dist/docs"]
        );
    }

    #[test]
    fn substitutes_placeholder() {
        let bundler =
            CommandBundler::from_command_line("vite build --outDir={out}", DEFAULT_BUNDLER_TIMEOUT)
                .unwrap();
        let job = job(Path::new("/srv/site"));

        assert_eq!(bundler.args_for(&job), ["build", "--outDir=/srv/site/dist/docs"]);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            CommandBundler::from_command_line("   ", DEFAULT_BUNDLER_TIMEOUT),
            Err(BuildError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_runs_in_site_dir() {
        let temp = tempdir().unwrap();
        let bundler = CommandBundler::new(
            "sh",
            vec![
                "-c".to_string(),
                "mkdir -p \"$OUT_PUT\" && echo $NIVEFLOW_SOURCE > \"$OUT_PUT/built\" && touch ran".to_string(),
            ],
            DEFAULT_BUNDLER_TIMEOUT,
        );
        let job = job(temp.path());

        bundler.bundle(&job).await.unwrap();

        assert!(temp.path().join("ran").exists());
        assert_eq!(fs::read_to_string(job.out_dir.join("built")).unwrap().trim(), "docs");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_reports_exit() {
        let temp = tempdir().unwrap();
        let bundler = CommandBundler::new("sh", vec!["-c".into(), "exit 3".into()], DEFAULT_BUNDLER_TIMEOUT);

        let err = bundler.bundle(&job(temp.path())).await.unwrap_err();

        assert!(matches!(err, BuildError::BundlerExit { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let temp = tempdir().unwrap();
        let bundler = CommandBundler::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(100),
        );

        let err = bundler.bundle(&job(temp.path())).await.unwrap_err();

        assert!(matches!(err, BuildError::Timeout { .. }));
    }

    #[tokio::test]
    async fn native_bundler_uses_staged_meta() {
        let temp = tempdir().unwrap();
        let job = job(temp.path());
        fs::create_dir_all(&job.docs_dir).unwrap();
        fs::write(job.docs_dir.join("README.md"), "# Hello").unwrap();
        fs::write(&job.meta_file, r#"{"title": "Staged Title"}"#).unwrap();

        NativeBundler::default().bundle(&job).await.unwrap();

        let html = fs::read_to_string(job.out_dir.join("index.html")).unwrap();
        assert!(html.contains("Hello - Staged Title"));
    }
}
