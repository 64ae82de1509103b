//! Site metadata (`meta.json`) shipped alongside each documentation source.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, BuildError};

/// File name of the metadata file at the root of a source.
pub const META_FILE: &str = "meta.json";

/// Global site settings read by the viewer and the native builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteMeta {
    pub title: String,
    pub logo: String,
    /// Page rendered as the site's landing page
    pub index_path: String,
    pub avatar: String,
}

impl Default for SiteMeta {
    fn default() -> Self {
        Self {
            title: "NiveFlow Docs".to_string(),
            logo: "NiveFlow".to_string(),
            index_path: "README.md".to_string(),
            avatar: String::new(),
        }
    }
}

impl SiteMeta {
    /// Load `path`, or the defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, BuildError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the defaults to `<dir>/meta.json` unless the file exists.
    ///
    /// Returns whether a file was written.
    pub fn write_default(dir: &Path) -> Result<bool, BuildError> {
        let path = dir.join(META_FILE);
        if path.exists() {
            return Ok(false);
        }
        let json = serde_json::to_string_pretty(&Self::default())?;
        fs::write(&path, json).map_err(|e| io_err(&path, e))?;
        Ok(true)
    }
}
