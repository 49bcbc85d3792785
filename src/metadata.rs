//! Issue metadata loading.
//!
//! Each issue folder carries a small YAML record:
//!
//! ```yaml
//! title: "Newsletter #12 – Spring"
//! date: "2024-03-01"
//! type: canvas        # optional: normal (default) or canvas
//! ```
//!
//! ## File resolution
//!
//! Two filenames are recognized. The first one that exists wins, checked in
//! this order: `meta.yml`, `meta.yaml`.
//!
//! ## Field rules
//!
//! - `title` and `date` are required and must be non-empty after trimming.
//! - `type` is trimmed and lowercased; absent or blank means `normal`.
//! - Scalars are accepted in any YAML form (`date: 2024-03-01` unquoted is fine).

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Recognized metadata filenames, in priority order.
pub const META_FILENAMES: &[&str] = &["meta.yml", "meta.yaml"];

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No metadata file (meta.yml or meta.yaml) in {0}")]
    NotFound(PathBuf),
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Missing required field '{field}' in {path}")]
    MissingField { field: &'static str, path: PathBuf },
    #[error("Unknown issue type '{kind}' in {path} (expected normal or canvas)")]
    UnknownKind { kind: String, path: PathBuf },
}

/// What an issue's body is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueKind {
    /// Intro plus `article*.md` documents.
    #[default]
    Normal,
    /// A single full-width image.
    Canvas,
}

impl IssueKind {
    /// Parse a raw `type` value. `None` for anything unrecognized.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let normalized = raw.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        match normalized.as_str() {
            "" | "normal" => Some(Self::Normal),
            "canvas" => Some(Self::Canvas),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Canvas => "canvas",
        }
    }
}

/// Validated metadata of one issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueMeta {
    pub title: String,
    pub date: String,
    pub kind: IssueKind,
    /// The file the record was read from.
    pub source: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    title: Option<serde_yaml::Value>,
    date: Option<serde_yaml::Value>,
    #[serde(rename = "type")]
    kind: Option<serde_yaml::Value>,
}

/// Find the metadata file of an issue folder.
pub fn find_meta_file(issue_dir: &Path) -> Option<PathBuf> {
    META_FILENAMES
        .iter()
        .map(|name| issue_dir.join(name))
        .find(|path| path.is_file())
}

/// Load and validate the metadata of an issue folder.
pub fn load_meta(issue_dir: &Path) -> Result<IssueMeta, MetadataError> {
    let path =
        find_meta_file(issue_dir).ok_or_else(|| MetadataError::NotFound(issue_dir.to_path_buf()))?;
    let content = fs::read_to_string(&path).map_err(|source| MetadataError::Io {
        path: path.clone(),
        source,
    })?;
    parse_meta(&content, path)
}

fn parse_meta(content: &str, path: PathBuf) -> Result<IssueMeta, MetadataError> {
    // An empty file deserializes as null; treat it as a record with no fields
    let raw: RawMeta = if content.trim().is_empty() {
        RawMeta {
            title: None,
            date: None,
            kind: None,
        }
    } else {
        serde_yaml::from_str(content).map_err(|source| MetadataError::Yaml {
            path: path.clone(),
            source,
        })?
    };

    let title = scalar(raw.title.as_ref()).ok_or_else(|| MetadataError::MissingField {
        field: "title",
        path: path.clone(),
    })?;
    let date = scalar(raw.date.as_ref()).ok_or_else(|| MetadataError::MissingField {
        field: "date",
        path: path.clone(),
    })?;
    let kind_raw = scalar(raw.kind.as_ref());
    let kind = IssueKind::parse(kind_raw.as_deref()).ok_or_else(|| MetadataError::UnknownKind {
        kind: kind_raw.clone().unwrap_or_default(),
        path: path.clone(),
    })?;

    Ok(IssueMeta {
        title,
        date,
        kind,
        source: path,
    })
}

/// Render a YAML scalar as a trimmed, non-empty string.
fn scalar(value: Option<&serde_yaml::Value>) -> Option<String> {
    let text = match value? {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(text.trim().to_string()).filter(|s| !s.is_empty())
}
