//! `newsletters.json`: the archive index read by the public website.
//!
//! ```json
//! [
//!   { "filename": "2024-02-02.html", "title": "Poster", "date": "2024-02-02" },
//!   { "filename": "2024-01-01.html", "title": "Issue #1", "date": "2024-01-01" }
//! ]
//! ```
//!
//! Newest first, by reverse filename order. Site pages that are not issues
//! (`index.html`, `subscribe.html`) are skipped.

use crate::render::extract_title;
use crate::types::ListingEntry;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LISTING_FILE: &str = "newsletters.json";

/// Pages in the output directory that are not issues.
const NON_ISSUE_PAGES: &[&str] = &["index.html", "subscribe.html"];

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Output directory not found: {0}")]
    MissingOutputDir(PathBuf),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Collect listing entries from the rendered issues in `output_dir`.
pub fn collect_entries(output_dir: &Path) -> Result<Vec<ListingEntry>, ListingError> {
    if !output_dir.is_dir() {
        return Err(ListingError::MissingOutputDir(output_dir.to_path_buf()));
    }
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ListingError::Io { path, source }
    };

    let mut filenames: Vec<String> = fs::read_dir(output_dir)
        .map_err(io_err(output_dir))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".html") && !NON_ISSUE_PAGES.contains(&name.as_str()))
        .collect();
    filenames.sort_by(|a, b| b.cmp(a));

    filenames
        .into_iter()
        .map(|filename| {
            let path = output_dir.join(&filename);
            let html = fs::read_to_string(&path).map_err(io_err(&path))?;
            let stem = filename.trim_end_matches(".html");
            Ok(ListingEntry {
                title: extract_title(&html).unwrap_or_else(|| stem.to_string()),
                date: NaiveDate::parse_from_str(stem, "%Y-%m-%d")
                    .ok()
                    .map(|_| stem.to_string()),
                filename,
            })
        })
        .collect()
}

/// Write `newsletters.json` into `output_dir`. Returns the entries and the file path.
pub fn write_listing(output_dir: &Path) -> Result<(Vec<ListingEntry>, PathBuf), ListingError> {
    let entries = collect_entries(output_dir)?;
    let path = output_dir.join(LISTING_FILE);
    let json = serde_json::to_string_pretty(&entries)?;
    fs::write(&path, json).map_err(|source| ListingError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::info!(count = entries.len(), path = %path.display(), "wrote listing");
    Ok((entries, path))
}
