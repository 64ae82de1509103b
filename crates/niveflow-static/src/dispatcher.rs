//! Builds one synced source into its output directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use niveflow_sync::fsutil::{copy_tree, empty_dir, is_vcs_name};
use niveflow_sync::SourceDescriptor;

use crate::bundler::{BundleJob, Bundler};
use crate::error::{io_err, BuildError};
use crate::meta::META_FILE;
use crate::nav::{write_nav_index, NAV_INDEX_FILE};

/// Where the build tool reads its input and where outputs go.
///
/// Relative paths resolve against `cwd`; `docs_dir` and `meta_file`
/// resolve against `site_dir`.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Directory the bundler runs in
    pub site_dir: PathBuf,

    /// Docs input location of the build tool
    pub docs_dir: PathBuf,

    /// Global metadata location of the build tool
    pub meta_file: PathBuf,

    /// Parent of per-source output directories
    pub output_root: PathBuf,

    pub cwd: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            site_dir: PathBuf::from("."),
            docs_dir: PathBuf::from("public/docs"),
            meta_file: PathBuf::from("public/meta.json"),
            output_root: PathBuf::from("dist"),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Outcome of one successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub name: String,
    pub output_dir: PathBuf,
    pub duration_ms: u64,
}

pub struct BuildDispatcher {
    config: DispatchConfig,
    bundler: Arc<dyn Bundler>,
    // The docs input location is shared by every source.
    stage_lock: Mutex<()>,
}

impl BuildDispatcher {
    pub fn new(config: DispatchConfig, bundler: Arc<dyn Bundler>) -> Self {
        Self {
            config,
            bundler,
            stage_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Configured `output_path`, else `<output_root>/<name>`.
    pub fn output_dir(&self, source: &SourceDescriptor) -> PathBuf {
        let dir = match &source.output_path {
            Some(path) => path.clone(),
            None => self.config.output_root.join(&source.name),
        };
        self.resolve(&dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.cwd.join(path)
        }
    }

    fn site_dir(&self) -> PathBuf {
        self.resolve(&self.config.site_dir)
    }

    /// Stage `staged` for the build tool and run the bundler on it.
    pub async fn build(
        &self,
        source: &SourceDescriptor,
        staged: &Path,
    ) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        if !staged.is_dir() {
            return Err(BuildError::MissingStaging {
                name: source.name.clone(),
                path: staged.to_path_buf(),
            });
        }

        let _staging = self.stage_lock.lock().await;

        let site_dir = self.site_dir();
        let job = BundleJob {
            name: source.name.clone(),
            docs_dir: site_dir.join(&self.config.docs_dir),
            meta_file: site_dir.join(&self.config.meta_file),
            out_dir: self.output_dir(source),
            site_dir,
        };

        let staged_files = {
            let job = job.clone();
            let staged = staged.to_path_buf();
            tokio::task::spawn_blocking(move || stage(&staged, &job))
                .await
                .map_err(|e| BuildError::Task(e.to_string()))??
        };
        tracing::info!(
            "[{}] Staged {} files into {}",
            source.name,
            staged_files,
            job.docs_dir.display()
        );

        tracing::info!("[{}] Building with {}", source.name, self.bundler.name());
        self.bundler.bundle(&job).await?;

        fs::create_dir_all(&job.out_dir).map_err(|e| io_err(&job.out_dir, e))?;
        let nav_source = job.docs_dir.join(NAV_INDEX_FILE);
        let nav_target = job.out_dir.join(NAV_INDEX_FILE);
        fs::copy(&nav_source, &nav_target).map_err(|e| io_err(&nav_source, e))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "[{}] Built into {} in {}ms",
            source.name,
            job.out_dir.display(),
            duration_ms
        );

        Ok(BuildReport {
            name: source.name.clone(),
            output_dir: job.out_dir,
            duration_ms,
        })
    }
}

/// Copy the synced tree into the docs input, write its navigation index and
/// put its `meta.json` where the build tool reads it.
fn stage(staged: &Path, job: &BundleJob) -> Result<usize, BuildError> {
    empty_dir(&job.docs_dir)?;
    let copied = copy_tree(staged, &job.docs_dir, is_vcs_name)?;
    write_nav_index(&job.docs_dir)?;

    let meta = staged.join(META_FILE);
    if meta.is_file() {
        if let Some(parent) = job.meta_file.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::copy(&meta, &job.meta_file).map_err(|e| io_err(&meta, e))?;
    } else if job.meta_file.exists() {
        // A previous source's metadata must not leak into this build.
        fs::remove_file(&job.meta_file).map_err(|e| io_err(&job.meta_file, e))?;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingBundler {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Bundler for RecordingBundler {
        fn name(&self) -> &str {
            "recording"
        }

        async fn bundle(&self, job: &BundleJob) -> Result<(), BuildError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BuildError::Task("bundler failed".to_string()));
            }
            assert!(job.docs_dir.join(NAV_INDEX_FILE).exists());
            fs::create_dir_all(&job.out_dir).unwrap();
            fs::write(job.out_dir.join("index.html"), "built").unwrap();
            Ok(())
        }
    }

    fn dispatcher(root: &Path, bundler: Arc<RecordingBundler>) -> BuildDispatcher {
        BuildDispatcher::new(
            DispatchConfig {
                site_dir: PathBuf::from("site"),
                cwd: root.to_path_buf(),
                ..Default::default()
            },
            bundler,
        )
    }

    fn staged_source(root: &Path) -> PathBuf {
        let staged = root.join("staging/docs");
        fs::create_dir_all(staged.join(".git")).unwrap();
        fs::write(staged.join(".git/HEAD"), "ref").unwrap();
        fs::write(staged.join("README.md"), "# Home").unwrap();
        fs::write(staged.join(META_FILE), r#"{"title":"Docs"}"#).unwrap();
        staged
    }

    #[test]
    fn output_dir_resolution() {
        let temp = tempdir().unwrap();
        let dispatcher = dispatcher(temp.path(), Arc::default());

        let plain = SourceDescriptor::remote("docs", "https://example.com/docs.git");
        assert_eq!(dispatcher.output_dir(&plain), temp.path().join("dist/docs"));

        let relative = plain.clone().with_output("out/site");
        assert_eq!(dispatcher.output_dir(&relative), temp.path().join("out/site"));

        let absolute = plain.with_output("/srv/www/docs");
        assert_eq!(dispatcher.output_dir(&absolute), PathBuf::from("/srv/www/docs"));
    }

    #[tokio::test]
    async fn stages_and_builds() {
        let temp = tempdir().unwrap();
        let bundler = Arc::new(RecordingBundler::default());
        let dispatcher = dispatcher(temp.path(), bundler.clone());
        let staged = staged_source(temp.path());
        fs::create_dir_all(temp.path().join("site/public/docs")).unwrap();
        fs::write(temp.path().join("site/public/docs/old.md"), "# Old").unwrap();

        let source = SourceDescriptor::remote("docs", "https://example.com/docs.git");
        let report = dispatcher.build(&source, &staged).await.unwrap();

        let docs = temp.path().join("site/public/docs");
        assert!(docs.join("README.md").exists());
        assert!(!docs.join("old.md").exists());
        assert!(!docs.join(".git").exists());
        assert!(temp.path().join("site/public/meta.json").exists());
        assert_eq!(report.output_dir, temp.path().join("dist/docs"));
        assert!(report.output_dir.join(NAV_INDEX_FILE).exists());
        assert_eq!(bundler.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_meta_is_removed() {
        let temp = tempdir().unwrap();
        let dispatcher = dispatcher(temp.path(), Arc::default());
        let staged = staged_source(temp.path());
        fs::remove_file(staged.join(META_FILE)).unwrap();
        fs::create_dir_all(temp.path().join("site/public")).unwrap();
        fs::write(temp.path().join("site/public/meta.json"), "{}").unwrap();

        let source = SourceDescriptor::remote("docs", "https://example.com/docs.git");
        dispatcher.build(&source, &staged).await.unwrap();

        assert!(!temp.path().join("site/public/meta.json").exists());
    }

    #[tokio::test]
    async fn bundler_failure_leaves_output_alone() {
        let temp = tempdir().unwrap();
        let bundler = Arc::new(RecordingBundler {
            fail: true,
            ..Default::default()
        });
        let dispatcher = dispatcher(temp.path(), bundler);
        let staged = staged_source(temp.path());

        let source = SourceDescriptor::remote("docs", "https://example.com/docs.git");
        assert!(dispatcher.build(&source, &staged).await.is_err());
        assert!(!temp.path().join("dist/docs").exists());
    }

    #[tokio::test]
    async fn missing_staging_is_an_error() {
        let temp = tempdir().unwrap();
        let dispatcher = dispatcher(temp.path(), Arc::default());

        let source = SourceDescriptor::remote("docs", "https://example.com/docs.git");
        let err = dispatcher
            .build(&source, &temp.path().join("staging/docs"))
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::MissingStaging { .. }));
    }
}
