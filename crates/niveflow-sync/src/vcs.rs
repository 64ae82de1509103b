//! Version-control client used for remote sources.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::SyncError;

/// Default bound on a single git invocation.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Clone and pull operations for remote sources.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Clone `url` at `branch` into `dest`, which is empty or absent.
    async fn clone_repo(
        &self,
        name: &str,
        url: &str,
        branch: &str,
        dest: &Path,
    ) -> Result<(), SyncError>;

    /// Pull `branch` into the clone at `repo_dir`, returning how many files
    /// the pull changed.
    async fn pull(&self, name: &str, repo_dir: &Path, branch: &str) -> Result<usize, SyncError>;
}

/// [`VcsClient`] backed by the `git` command line.
///
/// Every invocation is bounded by `timeout`; the child is killed when the
/// bound is hit.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_TIMEOUT)
    }
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
        }
    }

    /// Use a different git executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, dir: Option<&Path>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        command
    }

    async fn run(
        &self,
        name: &str,
        operation: &'static str,
        mut command: Command,
    ) -> Result<String, SyncError> {
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|e| SyncError::Git {
                name: name.to_string(),
                operation,
                message: format!("failed to run {}: {}", self.program, e),
            })?,
            Err(_) => {
                return Err(SyncError::Timeout {
                    name: name.to_string(),
                    operation,
                    after: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::Git {
                name: name.to_string(),
                operation,
                message: format!("{} ({})", stderr.trim(), output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn head(&self, name: &str, repo_dir: &Path) -> Result<String, SyncError> {
        let mut command = self.command(Some(repo_dir));
        command.args(["rev-parse", "HEAD"]);
        self.run(name, "rev-parse", command).await
    }
}

#[async_trait]
impl VcsClient for GitCli {
    async fn clone_repo(
        &self,
        name: &str,
        url: &str,
        branch: &str,
        dest: &Path,
    ) -> Result<(), SyncError> {
        let mut command = self.command(None);
        command
            .args(["clone", "--branch", branch, url])
            .arg(dest);
        self.run(name, "clone", command).await?;
        Ok(())
    }

    async fn pull(&self, name: &str, repo_dir: &Path, branch: &str) -> Result<usize, SyncError> {
        let before = self.head(name, repo_dir).await?;

        let mut command = self.command(Some(repo_dir));
        command.args(["pull", "--ff-only", "origin", branch]);
        self.run(name, "pull", command).await?;

        let after = self.head(name, repo_dir).await?;
        if before == after {
            return Ok(0);
        }

        let mut command = self.command(Some(repo_dir));
        command.args(["diff", "--name-only", before.as_str(), after.as_str()]);
        let changed = self.run(name, "diff", command).await?;

        Ok(changed.lines().filter(|l| !l.trim().is_empty()).count())
    }
}
