//! New issue scaffolding.
//!
//! `gazette new [DATE]` creates a ready-to-edit issue folder:
//!
//! ```text
//! content/2024-05-01/
//! ├── meta.yml
//! ├── intro.md
//! ├── article-1.md
//! └── images/
//! ```
//!
//! Files that already exist are left untouched, so running the command on an
//! existing issue only fills in what is missing.

use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("Invalid issue date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What `scaffold_issue` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldReport {
    pub issue_dir: PathBuf,
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Parse an issue date, or use `today` when none is given.
pub fn issue_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, ScaffoldError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(today),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ScaffoldError::InvalidDate(s.to_string())),
    }
}

fn starter_files(date: &str) -> [(&'static str, String); 3] {
    [
        (
            "meta.yml",
            format!("title: \"Newsletter {date}\"\ndate: \"{date}\"\n# type: canvas\n"),
        ),
        ("intro.md", "Write the introduction here.\n".to_string()),
        (
            "article-1.md",
            "# First article\n\nWrite the article here. Images go in `images/`:\n\n\
             ![Description](images/example.jpg)\n"
                .to_string(),
        ),
    ]
}

/// Create `{root}/{date}` with starter files. Never overwrites.
pub fn scaffold_issue(root: &Path, date: NaiveDate) -> Result<ScaffoldReport, ScaffoldError> {
    let id = date.format("%Y-%m-%d").to_string();
    let issue_dir = root.join(&id);
    let images = issue_dir.join("images");
    fs::create_dir_all(&images).map_err(|source| ScaffoldError::Io {
        path: images.clone(),
        source,
    })?;

    let mut report = ScaffoldReport {
        issue_dir: issue_dir.clone(),
        created: Vec::new(),
        skipped: Vec::new(),
    };

    for (name, content) in starter_files(&id) {
        let path = issue_dir.join(name);
        if path.exists() {
            report.skipped.push(path);
            continue;
        }
        fs::write(&path, content).map_err(|source| ScaffoldError::Io {
            path: path.clone(),
            source,
        })?;
        report.created.push(path);
    }

    tracing::info!(issue = %id, created = report.created.len(), "scaffolded issue");
    Ok(report)
}
