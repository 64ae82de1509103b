//! Source descriptors and location classification.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Branch used when a remote source does not name one.
pub const DEFAULT_BRANCH: &str = "main";

static DRIVE_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]:[\\/]").expect("drive letter pattern is valid"));

/// One configured documentation source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique key, used as a directory segment and as the webhook selector
    pub name: String,

    /// Remote repository address or local filesystem path
    pub url: String,

    /// Tracked branch (remote sources only)
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Where this source's built site goes; defaults to `<output>/<name>`
    #[serde(default, alias = "outputPath")]
    pub output_path: Option<PathBuf>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

/// How a source is synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind<'a> {
    /// A directory on this machine, copied into staging
    Local { path: &'a str },

    /// A git repository, cloned or pulled into staging
    Remote { url: &'a str, branch: &'a str },
}

impl SourceDescriptor {
    /// Create a remote source tracking the default branch.
    pub fn remote(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            branch: default_branch(),
            output_path: None,
        }
    }

    /// Create a local directory source.
    pub fn local(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            url: path.as_ref().to_string_lossy().into_owned(),
            branch: default_branch(),
            output_path: None,
        }
    }

    /// Set an explicit output directory.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output.into());
        self
    }

    /// Classify the location.
    pub fn kind(&self) -> SourceKind<'_> {
        if is_local_path(&self.url) {
            SourceKind::Local { path: &self.url }
        } else {
            SourceKind::Remote {
                url: &self.url,
                branch: if self.branch.is_empty() {
                    DEFAULT_BRANCH
                } else {
                    &self.branch
                },
            }
        }
    }

    /// Short label for log lines.
    pub fn kind_label(&self) -> &'static str {
        match self.kind() {
            SourceKind::Local { .. } => "local",
            SourceKind::Remote { .. } => "git",
        }
    }
}

/// Whether a location string names a local path rather than a remote URL.
///
/// Local paths start with `/`, `./`, `../`, `~` or a drive letter
/// (`C:\` or `C:/`).
pub fn is_local_path(location: &str) -> bool {
    location.starts_with('/')
        || location.starts_with("./")
        || location.starts_with("../")
        || location.starts_with('~')
        || DRIVE_LETTER.is_match(location)
}

/// Resolve a local location to an absolute path.
///
/// `~` expands to `home`; relative paths are joined onto `cwd`.
pub fn resolve_local_path(location: &str, cwd: &Path, home: Option<&Path>) -> PathBuf {
    if let Some(rest) = location.strip_prefix('~') {
        let rest = rest.trim_start_matches(['/', '\\']);
        let base = home.unwrap_or(cwd);
        return if rest.is_empty() {
            base.to_path_buf()
        } else {
            base.join(rest)
        };
    }

    let path = Path::new(location);
    if path.is_absolute() || DRIVE_LETTER.is_match(location) {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Problems with the configured source list.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("source name '{0}' is used more than once")]
    Duplicate(String),

    #[error("source name '{0}' must be a single path segment")]
    InvalidName(String),

    #[error("source '{0}' has an empty url")]
    EmptyUrl(String),
}

/// Check that names are usable as unique directory segments.
pub fn validate_sources(sources: &[SourceDescriptor]) -> Result<(), SourceError> {
    let mut seen = HashSet::new();

    for (index, source) in sources.iter().enumerate() {
        let name = source.name.trim();
        if name.is_empty() {
            return Err(SourceError::EmptyName { index });
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(SourceError::InvalidName(source.name.clone()));
        }
        if source.url.trim().is_empty() {
            return Err(SourceError::EmptyUrl(source.name.clone()));
        }
        if !seen.insert(name) {
            return Err(SourceError::Duplicate(source.name.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_locations() {
        for local in ["/srv/docs", "./docs", "../docs", "~/docs", "C:\\docs", "d:/docs"] {
            assert!(is_local_path(local), "{local} should be local");
        }
        for remote in [
            "https://github.com/nive-studio/docs.git",
            "git@github.com:nive-studio/docs.git",
            "docs",
            "ssh://host/repo",
        ] {
            assert!(!is_local_path(remote), "{remote} should be remote");
        }
    }

    #[test]
    fn remote_kind_uses_default_branch_when_blank() {
        let mut source = SourceDescriptor::remote("docs", "https://example.com/docs.git");
        source.branch = String::new();

        assert_eq!(
            source.kind(),
            SourceKind::Remote {
                url: "https://example.com/docs.git",
                branch: "main"
            }
        );
    }

    #[test]
    fn deserializes_with_defaults_and_camel_case_alias() {
        let json = r#"[
            {"name": "a", "url": "./a"},
            {"name": "b", "url": "https://x/b.git", "branch": "dev", "outputPath": "/var/www/b"}
        ]"#;
        let sources: Vec<SourceDescriptor> = serde_json::from_str(json).unwrap();

        assert_eq!(sources[0].branch, "main");
        assert_eq!(sources[0].output_path, None);
        assert_eq!(sources[1].branch, "dev");
        assert_eq!(sources[1].output_path, Some(PathBuf::from("/var/www/b")));
    }

    #[test]
    fn resolves_local_paths() {
        let cwd = Path::new("/work");
        let home = Path::new("/home/nive");

        assert_eq!(
            resolve_local_path("~/notes", cwd, Some(home)),
            PathBuf::from("/home/nive/notes")
        );
        assert_eq!(resolve_local_path("~", cwd, Some(home)), PathBuf::from("/home/nive"));
        assert_eq!(
            resolve_local_path("./docs", cwd, Some(home)),
            PathBuf::from("/work/./docs")
        );
        assert_eq!(
            resolve_local_path("/abs/docs", cwd, Some(home)),
            PathBuf::from("/abs/docs")
        );
    }

    #[test]
    fn rejects_duplicate_and_unsafe_names() {
        let dup = vec![
            SourceDescriptor::local("docs", "./a"),
            SourceDescriptor::local("docs", "./b"),
        ];
        assert_eq!(
            validate_sources(&dup),
            Err(SourceError::Duplicate("docs".to_string()))
        );

        let nested = vec![SourceDescriptor::local("a/b", "./a")];
        assert_eq!(
            validate_sources(&nested),
            Err(SourceError::InvalidName("a/b".to_string()))
        );

        let empty = vec![SourceDescriptor::local(" ", "./a")];
        assert_eq!(
            validate_sources(&empty),
            Err(SourceError::EmptyName { index: 0 })
        );

        let ok = vec![
            SourceDescriptor::local("a", "./a"),
            SourceDescriptor::remote("b", "https://x/b.git"),
        ];
        assert!(validate_sources(&ok).is_ok());
    }
}
