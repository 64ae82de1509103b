//! One-shot build of a local docs folder.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use niveflow_static::meta::META_FILE;
use niveflow_static::BuildDispatcher;
use niveflow_sync::fsutil::{copy_tree, empty_dir, is_ignored_name};
use niveflow_sync::SourceDescriptor;

use crate::config::Config;

const STAGING_NAME: &str = "build-staging";

/// Site directory for the built-in renderer, kept out of the folder being built.
const SITE_NAME: &str = "build-site";

/// Build `dir` (default: the working directory) into `output`.
pub async fn run(config: &Config, dir: Option<PathBuf>, output: PathBuf) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    build_in(config, &cwd, dir, output).await
}

async fn build_in(
    config: &Config,
    cwd: &Path,
    dir: Option<PathBuf>,
    output: PathBuf,
) -> Result<()> {
    let dir = dir.map(|d| cwd.join(d)).unwrap_or_else(|| cwd.to_path_buf());
    let output = cwd.join(output);

    if !dir.is_dir() {
        anyhow::bail!("Docs folder not found: {}", dir.display());
    }

    tracing::info!("Building {} into {}", dir.display(), output.display());

    let state_dir = cwd.join(&config.sync.state_dir);
    let mut dispatch = config.dispatch_config()?;
    dispatch.cwd = cwd.to_path_buf();
    if config.build.command.is_none() {
        dispatch.site_dir = state_dir.join(SITE_NAME);
    }
    let site_dir = cwd.join(&dispatch.site_dir);
    let inputs = [
        site_dir.join(&dispatch.docs_dir),
        site_dir.join(&dispatch.meta_file),
    ];

    let staging = state_dir.join(STAGING_NAME);
    let copied = stage(&dir, &staging, &output, &inputs)?;
    tracing::debug!("Staged {} file(s) into {}", copied, staging.display());

    let dispatcher = BuildDispatcher::new(dispatch, config.bundler()?);
    let source = SourceDescriptor::local("site", &dir).with_output(&output);

    let result = dispatcher.build(&source, &staging).await;
    clear_inputs(&dir, &inputs)?;
    let report = result.context("Build failed")?;

    tracing::info!(
        "Built into {} in {}ms",
        report.output_dir.display(),
        report.duration_ms
    );
    Ok(())
}

/// Copy `dir` into `staging`, leaving out build outputs and the build
/// tool's own input locations when they sit inside `dir`.
fn stage(dir: &Path, staging: &Path, output: &Path, inputs: &[PathBuf]) -> Result<usize> {
    let output_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    empty_dir(staging)?;
    let copied = copy_tree(dir, staging, |name| {
        is_ignored_name(name) || name == "dist" || name == "_documents" || name == output_name
    })?;

    for relative in inputs.iter().filter_map(|input| nested_input(dir, input)) {
        remove_path(&staging.join(relative))?;
    }
    Ok(copied)
}

/// Remove input locations the build wrote inside `dir`.
fn clear_inputs(dir: &Path, inputs: &[PathBuf]) -> Result<()> {
    for input in inputs {
        if nested_input(dir, input).is_some() {
            remove_path(input)?;
        }
    }
    Ok(())
}

fn remove_path(path: &Path) -> Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.is_file() {
        fs::remove_file(path)
    } else {
        return Ok(());
    };
    removed.with_context(|| format!("Failed to remove {}", path.display()))
}

/// Path of `input` below `dir`, unless it is outside or is the folder's own
/// `meta.json`.
fn nested_input<'a>(dir: &Path, input: &'a Path) -> Option<&'a Path> {
    let relative = input.strip_prefix(dir).ok()?;
    if relative.as_os_str().is_empty() || relative == Path::new(META_FILE) {
        None
    } else {
        Some(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn staging_leaves_out_outputs_and_hidden_entries() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("docs");
        for sub in ["guide", "dist", "_documents", "site-out", ".github", "node_modules"] {
            fs::create_dir_all(dir.join(sub)).unwrap();
            fs::write(dir.join(sub).join("page.md"), "# Page").unwrap();
        }
        fs::write(dir.join("README.md"), "# Home").unwrap();
        fs::write(dir.join("meta.json"), "{}").unwrap();

        let staging = temp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("stale.md"), "# Old").unwrap();

        let copied = stage(&dir, &staging, &temp.path().join("site-out"), &[]).unwrap();

        assert_eq!(copied, 3);
        assert!(staging.join("guide/page.md").exists());
        assert!(staging.join("meta.json").exists());
        assert!(!staging.join("stale.md").exists());
        for skipped in ["dist", "_documents", "site-out", ".github", "node_modules"] {
            assert!(!staging.join(skipped).exists(), "{skipped} was staged");
        }
    }

    #[test]
    fn staging_leaves_out_nested_build_inputs() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("docs");
        fs::create_dir_all(dir.join("public/docs")).unwrap();
        fs::write(dir.join("public/docs/README.md"), "# Old copy").unwrap();
        fs::write(dir.join("public/meta.json"), "{}").unwrap();
        fs::write(dir.join("README.md"), "# Home").unwrap();
        fs::write(dir.join("meta.json"), "{}").unwrap();

        let staging = temp.path().join("staging");
        let inputs = [dir.join("public/docs"), dir.join("public/meta.json")];
        stage(&dir, &staging, &temp.path().join("_documents"), &inputs).unwrap();

        assert!(staging.join("README.md").exists());
        assert!(staging.join("meta.json").exists());
        assert!(!staging.join("public/docs").exists());
        assert!(!staging.join("public/meta.json").exists());
    }

    #[tokio::test]
    async fn repeated_builds_leave_the_folder_clean() {
        let temp = tempdir().unwrap();
        let cwd = temp.path();
        fs::write(cwd.join("README.md"), "# Home").unwrap();
        fs::create_dir_all(cwd.join("guide")).unwrap();
        fs::write(cwd.join("guide/setup.md"), "# Setup").unwrap();

        let config = Config::default();
        for _ in 0..2 {
            build_in(&config, cwd, None, PathBuf::from("_documents"))
                .await
                .unwrap();
        }

        let out = cwd.join("_documents");
        assert!(out.join("README.html").exists());
        assert!(out.join("guide/setup.html").exists());
        assert!(out.join("nav-tree.json").exists());
        assert!(!out.join("public").exists());
        assert!(!cwd.join("public").exists());
    }
}
