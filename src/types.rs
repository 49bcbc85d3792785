//! Types shared between rendering, delivery and listing.

use serde::Serialize;

/// The body of an issue, by kind.
///
/// Built once from the issue folder and consumed by a single `match` in the
/// templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueBody {
    /// Intro plus the concatenated `article*.md` fragments, both already HTML
    /// with absolute image URLs.
    Standard { intro: String, articles: String },
    /// One full-width image.
    Canvas { image_url: String },
}

/// A finished HTML newsletter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Issue identifier the document was rendered from.
    pub issue: String,
    /// Title, also the email subject.
    pub title: String,
    pub html: String,
}

/// One entry of `newsletters.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub filename: String,
    pub title: String,
    pub date: Option<String>,
}
