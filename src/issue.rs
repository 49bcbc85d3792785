//! Issue resolution: which content root, which issue folder.
//!
//! ```text
//! content/                 # Published root (site.content_dir)
//! ├── 2024-01-01/
//! └── 2024-02-02/          # ← latest, picked when nothing else is given
//! planned/                 # Planned root (site.planned_dir)
//! └── 2024-03-03/
//! ```
//!
//! Precedence for the issue id: explicit argument, then the `NEWSLETTER_ISSUE`
//! environment value, then the lexicographically last folder in the root.
//! Issue ids are ISO dates by convention, so "last" is "most recent".
//!
//! Resolution takes the environment value as a parameter instead of reading it,
//! so the CLI is the only place that touches process env.

use crate::config::{ConfigError, SiteConfig};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Content root not found: {0}")]
    MissingRoot(PathBuf),
    #[error("No issues found in {0}")]
    NoIssues(PathBuf),
    #[error("Issue folder not found: {0}")]
    IssueNotFound(PathBuf),
    #[error("Invalid issue id {0:?}: expected a single folder name such as 2024-01-01")]
    InvalidIssueId(String),
}

/// Published issues or planned drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentRoot {
    #[default]
    Published,
    Planned,
}

impl ContentRoot {
    /// Pick the root from the `--planned` flag, falling back to the
    /// `NEWSLETTER_ROOT` value, then to published.
    pub fn select(planned_flag: bool, env: Option<&str>) -> Result<Self, ConfigError> {
        if planned_flag {
            return Ok(Self::Planned);
        }
        match env.map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(Self::Published),
            Some(v) if v.is_empty() || v == "published" || v == "content" => Ok(Self::Published),
            Some(v) if v == "planned" => Ok(Self::Planned),
            Some(v) => Err(ConfigError::InvalidEnv {
                name: "NEWSLETTER_ROOT",
                value: v,
            }),
        }
    }

    /// Folder name of this root, as configured.
    pub fn dir_name(self, site: &SiteConfig) -> &str {
        match self {
            Self::Published => &site.content_dir,
            Self::Planned => &site.planned_dir,
        }
    }
}

/// An issue folder that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIssue {
    pub root: ContentRoot,
    /// Root folder name as it appears in public URLs (`content`, `planned`).
    pub root_name: String,
    /// Issue identifier, the folder name (`2024-01-01`).
    pub id: String,
    /// Full path to the issue folder.
    pub path: PathBuf,
}

/// Where the resolved issue id came from. Reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSource {
    Argument,
    Environment,
    Latest,
}

/// Resolve the issue folder to operate on.
///
/// `base` is the directory the configured roots are relative to.
pub fn resolve_issue(
    base: &Path,
    site: &SiteConfig,
    root: ContentRoot,
    explicit: Option<&str>,
    env: Option<&str>,
) -> Result<(ResolvedIssue, IssueSource), ResolveError> {
    let root_name = root.dir_name(site).to_string();
    let root_path = base.join(&root_name);

    let explicit = explicit.map(str::trim).filter(|s| !s.is_empty());
    let env = env.map(str::trim).filter(|s| !s.is_empty());

    let (id, source) = match (explicit, env) {
        (Some(id), _) => (issue_folder_name(id)?, IssueSource::Argument),
        (None, Some(id)) => (issue_folder_name(id)?, IssueSource::Environment),
        (None, None) => (latest_issue(&root_path)?, IssueSource::Latest),
    };

    let path = root_path.join(&id);
    if !path.is_dir() {
        return Err(ResolveError::IssueNotFound(path));
    }

    Ok((
        ResolvedIssue {
            root,
            root_name,
            id,
            path,
        },
        source,
    ))
}

/// Normalize a user-supplied issue id to a bare folder name.
///
/// Shell completion leaves a trailing separator (`2024-01-01/`), which is
/// dropped. Anything else that is not exactly one plain path component is
/// refused, so the id can never leave the content root or the output folder.
fn issue_folder_name(raw: &str) -> Result<String, ResolveError> {
    let trimmed = raw.trim_end_matches(['/', '\\']);
    let mut components = Path::new(trimmed).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Ok(name.to_string_lossy().to_string()),
        _ => Err(ResolveError::InvalidIssueId(raw.to_string())),
    }
}

/// All issue ids under a root, sorted ascending. Hidden entries and plain
/// files are skipped.
pub fn list_issues(root_path: &Path) -> Result<Vec<String>, ResolveError> {
    if !root_path.is_dir() {
        return Err(ResolveError::MissingRoot(root_path.to_path_buf()));
    }
    let io_err = |source| ResolveError::Io {
        path: root_path.to_path_buf(),
        source,
    };
    let mut ids = Vec::new();
    for entry in fs::read_dir(root_path).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        ids.push(name);
    }
    ids.sort();
    Ok(ids)
}

fn latest_issue(root_path: &Path) -> Result<String, ResolveError> {
    list_issues(root_path)?
        .pop()
        .ok_or_else(|| ResolveError::NoIssues(root_path.to_path_buf()))
}
