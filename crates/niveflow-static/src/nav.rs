//! Navigation index generation.
//!
//! Produces `nav-tree.json`: the directory tree of a staged source with its
//! markdown pages, which the viewer renders as the sidebar.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use niveflow_mdx::{parse_body, parse_markdown};
use niveflow_sync::fsutil::is_ignored_name;

use crate::error::{io_err, BuildError};

/// File name of the navigation index.
pub const NAV_INDEX_FILE: &str = "nav-tree.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavKind {
    File,
    Directory,
}

/// One entry of the navigation tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavNode {
    /// File or directory name
    pub name: String,

    /// Path relative to the docs root, `/`-separated
    pub path: String,

    #[serde(rename = "type")]
    pub kind: NavKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavNode>,
}

impl NavNode {
    /// Title to display, falling back to the file stem.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.name
                .strip_suffix(".md")
                .unwrap_or(&self.name)
                .to_string()
        })
    }
}

/// Build the navigation tree for `docs_dir`.
///
/// Directories come first, then pages, each group sorted by name.
/// Directories with no pages are dropped, as are pages whose front matter
/// sets `nav: false`.
pub fn build_nav_tree(docs_dir: &Path) -> Result<Vec<NavNode>, BuildError> {
    walk(docs_dir, docs_dir)
}

/// Write `nav-tree.json` into `docs_dir` and return its path.
pub fn write_nav_index(docs_dir: &Path) -> Result<PathBuf, BuildError> {
    let tree = build_nav_tree(docs_dir)?;
    let json = serde_json::to_string_pretty(&tree)?;
    let path = docs_dir.join(NAV_INDEX_FILE);
    fs::write(&path, json).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

fn walk(root: &Path, dir: &Path) -> Result<Vec<NavNode>, BuildError> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .collect::<Result<_, _>>()
        .map_err(|e| io_err(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut nodes = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_ignored_name(&name) {
            continue;
        }

        let path = entry.path();
        let relative = relative_url(root, &path);

        if path.is_dir() {
            let children = walk(root, &path)?;
            if children.is_empty() {
                continue;
            }
            nodes.push(NavNode {
                name,
                path: relative,
                kind: NavKind::Directory,
                title: None,
                children,
            });
        } else if name.ends_with(".md") {
            let source = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            let title = match parse_markdown(&source) {
                Ok(doc) if !doc.in_nav() => continue,
                Ok(doc) => doc.title(),
                Err(e) => {
                    tracing::warn!("Ignoring front matter of {}: {}", path.display(), e);
                    parse_body(&source).title()
                }
            };
            nodes.push(NavNode {
                name,
                path: relative,
                kind: NavKind::File,
                title,
                children: Vec::new(),
            });
        }
    }

    nodes.sort_by(compare_nodes);
    Ok(nodes)
}

fn compare_nodes(a: &NavNode, b: &NavNode) -> Ordering {
    let rank = |node: &NavNode| match node.kind {
        NavKind::Directory => 0,
        NavKind::File => 1,
    };
    rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
}

fn relative_url(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
