//! CLI output formatting for every command.
//!
//! Output is **information-first**: each entity leads with its identity (issue
//! id, title, recipient) and shows file paths as indented context lines.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Issue 2024-01-01 (content, latest)
//!     Title: Issue #1
//!     Date: 2024-01-01
//!     Kind: normal
//!     Source: content/2024-01-01/meta.yml
//! Articles
//!     001 article-1.md
//!     002 article-2.md
//! Images
//!     a.jpg: 1200x800 → 600x400
//!     b.png: 400x300 unchanged
//!     c.jpg: failed (unsupported format)
//! Rendered → dist/2024-01-01.html
//! ```
//!
//! ## Send
//!
//! ```text
//! Sending "Issue #1" to 3 recipients (NEWSLETTER_RECIPIENTS)
//! Sent 2 of 3
//! Failed
//!     bad@x.org: message rejected: 550 no such user
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::delivery::DeliveryReport;
use crate::imaging::NormalizeOutcome;
use crate::issue::{IssueSource, ResolvedIssue};
use crate::render::RenderOutput;
use crate::scaffold::ScaffoldReport;
use crate::types::ListingEntry;
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Show `path` relative to `base` when it lives under it.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

fn source_label(source: IssueSource) -> &'static str {
    match source {
        IssueSource::Argument => "argument",
        IssueSource::Environment => "NEWSLETTER_ISSUE",
        IssueSource::Latest => "latest",
    }
}

// ============================================================================
// Build
// ============================================================================

/// Issue header: id, content root and how the id was chosen.
pub fn format_issue_header(issue: &ResolvedIssue, source: IssueSource) -> Vec<String> {
    vec![format!(
        "Issue {} ({}, {})",
        issue.id,
        issue.root_name,
        source_label(source)
    )]
}

/// Per-image results of the normalization pass.
pub fn format_normalize_report(report: &[(PathBuf, NormalizeOutcome)]) -> Vec<String> {
    if report.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Images".to_string()];
    for (path, outcome) in report {
        let name = file_name(path);
        let detail = match outcome {
            NormalizeOutcome::Resized { from, to } => {
                format!("{}x{} \u{2192} {}x{}", from.0, from.1, to.0, to.1)
            }
            NormalizeOutcome::Unchanged { width, height } => {
                format!("{width}x{height} unchanged")
            }
            NormalizeOutcome::Failed(reason) => format!("failed ({reason})"),
        };
        lines.push(format!("    {name}: {detail}"));
    }
    lines
}

/// Full build report. Paths are shown relative to `base`.
pub fn format_build_output(output: &RenderOutput, base: &Path) -> Vec<String> {
    let meta = &output.meta;
    let mut lines = vec![
        format!("    Title: {}", meta.title),
        format!("    Date: {}", meta.date),
        format!("    Kind: {}", meta.kind.as_str()),
        format!("    Source: {}", display_path(&meta.source, base)),
    ];

    if !output.articles.is_empty() {
        lines.push("Articles".to_string());
        for (i, article) in output.articles.iter().enumerate() {
            lines.push(format!("    {} {}", format_index(i + 1), file_name(article)));
        }
    }

    lines.extend(format_normalize_report(&output.images));
    lines.push(format!(
        "Rendered \u{2192} {}",
        display_path(&output.output_path, base)
    ));
    lines
}

pub fn print_build_output(
    issue: &ResolvedIssue,
    source: IssueSource,
    output: &RenderOutput,
    base: &Path,
) {
    for line in format_issue_header(issue, source)
        .into_iter()
        .chain(format_build_output(output, base))
    {
        println!("{}", line);
    }
}

// ============================================================================
// Send
// ============================================================================

/// Line announcing a send run.
pub fn format_send_header(subject: &str, recipients: usize, source: &str, dry_run: bool) -> String {
    let mode = if dry_run { " [dry run]" } else { "" };
    format!(
        "Sending \"{}\" to {} ({}){}",
        subject,
        plural(recipients, "recipient", "recipients"),
        source,
        mode
    )
}

/// Tally of a finished run with every failed address and its reason.
pub fn format_delivery_report(report: &DeliveryReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Sent {} of {}",
        report.sent().len(),
        report.attempted()
    )];
    let failed = report.failed();
    if !failed.is_empty() {
        lines.push("Failed".to_string());
        for (address, reason) in failed {
            lines.push(format!("    {address}: {reason}"));
        }
    }
    lines
}

pub fn print_send_header(subject: &str, recipients: usize, source: &str, dry_run: bool) {
    println!("{}", format_send_header(subject, recipients, source, dry_run));
}

pub fn print_delivery_report(report: &DeliveryReport) {
    for line in format_delivery_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// New / Index
// ============================================================================

pub fn format_scaffold_output(report: &ScaffoldReport, base: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Issue {}",
        display_path(&report.issue_dir, base)
    )];
    for path in &report.created {
        lines.push(format!("    created {}", file_name(path)));
    }
    for path in &report.skipped {
        lines.push(format!("    kept {}", file_name(path)));
    }
    lines
}

pub fn print_scaffold_output(report: &ScaffoldReport, base: &Path) {
    for line in format_scaffold_output(report, base) {
        println!("{}", line);
    }
}

pub fn format_listing_output(entries: &[ListingEntry], path: &Path, base: &Path) -> Vec<String> {
    let mut lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{} {} \u{2192} {}",
                format_index(i + 1),
                entry.title,
                entry.filename
            )
        })
        .collect();
    lines.push(format!(
        "Listed {} \u{2192} {}",
        plural(entries.len(), "newsletter", "newsletters"),
        display_path(path, base)
    ));
    lines
}

pub fn print_listing_output(entries: &[ListingEntry], path: &Path, base: &Path) {
    for line in format_listing_output(entries, path, base) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryResult;
    use crate::issue::ContentRoot;
    use crate::metadata::{IssueKind, IssueMeta};
    use crate::types::RenderedDocument;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn display_path_strips_base() {
        assert_eq!(
            display_path(Path::new("/site/dist/a.html"), Path::new("/site")),
            "dist/a.html"
        );
        assert_eq!(
            display_path(Path::new("/other/a.html"), Path::new("/site")),
            "/other/a.html"
        );
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "recipient", "recipients"), "1 recipient");
        assert_eq!(plural(0, "recipient", "recipients"), "0 recipients");
    }

    // =========================================================================
    // Build output
    // =========================================================================

    fn render_output() -> RenderOutput {
        RenderOutput {
            document: RenderedDocument {
                issue: "2024-01-01".to_string(),
                title: "Issue #1".to_string(),
                html: String::new(),
            },
            meta: IssueMeta {
                title: "Issue #1".to_string(),
                date: "2024-01-01".to_string(),
                kind: IssueKind::Normal,
                source: PathBuf::from("/site/content/2024-01-01/meta.yml"),
            },
            output_path: PathBuf::from("/site/dist/2024-01-01.html"),
            images: vec![
                (
                    PathBuf::from("/site/content/2024-01-01/images/a.jpg"),
                    NormalizeOutcome::Resized {
                        from: (1200, 800),
                        to: (600, 400),
                    },
                ),
                (
                    PathBuf::from("/site/content/2024-01-01/images/b.png"),
                    NormalizeOutcome::Unchanged {
                        width: 400,
                        height: 300,
                    },
                ),
                (
                    PathBuf::from("/site/content/2024-01-01/images/c.jpg"),
                    NormalizeOutcome::Failed("bad data".to_string()),
                ),
            ],
            articles: vec![
                PathBuf::from("/site/content/2024-01-01/article-1.md"),
                PathBuf::from("/site/content/2024-01-01/article-2.md"),
            ],
        }
    }

    #[test]
    fn issue_header_names_root_and_source() {
        let issue = ResolvedIssue {
            root: ContentRoot::Planned,
            root_name: "planned".to_string(),
            id: "2024-03-03".to_string(),
            path: PathBuf::from("/site/planned/2024-03-03"),
        };
        assert_eq!(
            format_issue_header(&issue, IssueSource::Environment),
            vec!["Issue 2024-03-03 (planned, NEWSLETTER_ISSUE)"]
        );
    }

    #[test]
    fn build_output_lists_everything() {
        let lines = format_build_output(&render_output(), Path::new("/site"));
        assert_eq!(
            lines,
            vec![
                "    Title: Issue #1",
                "    Date: 2024-01-01",
                "    Kind: normal",
                "    Source: content/2024-01-01/meta.yml",
                "Articles",
                "    001 article-1.md",
                "    002 article-2.md",
                "Images",
                "    a.jpg: 1200x800 \u{2192} 600x400",
                "    b.png: 400x300 unchanged",
                "    c.jpg: failed (bad data)",
                "Rendered \u{2192} dist/2024-01-01.html",
            ]
        );
    }

    #[test]
    fn build_output_without_articles_or_images() {
        let mut output = render_output();
        output.articles.clear();
        output.images.clear();
        let lines = format_build_output(&output, Path::new("/site"));
        assert!(!lines.iter().any(|l| l == "Articles" || l == "Images"));
        assert_eq!(lines.last().unwrap(), "Rendered \u{2192} dist/2024-01-01.html");
    }

    // =========================================================================
    // Send output
    // =========================================================================

    #[test]
    fn send_header_marks_dry_run() {
        assert_eq!(
            format_send_header("Issue #1", 3, "NEWSLETTER_RECIPIENTS", false),
            "Sending \"Issue #1\" to 3 recipients (NEWSLETTER_RECIPIENTS)"
        );
        assert_eq!(
            format_send_header("Issue #1", 1, "list.txt", true),
            "Sending \"Issue #1\" to 1 recipient (list.txt) [dry run]"
        );
    }

    #[test]
    fn delivery_report_tally() {
        let report = DeliveryReport {
            results: vec![
                ("a@x.org".to_string(), DeliveryResult::Sent),
                (
                    "bad@x.org".to_string(),
                    DeliveryResult::Failed("message rejected: 550".to_string()),
                ),
                ("c@x.org".to_string(), DeliveryResult::Sent),
            ],
        };
        assert_eq!(
            format_delivery_report(&report),
            vec![
                "Sent 2 of 3",
                "Failed",
                "    bad@x.org: message rejected: 550",
            ]
        );
    }

    #[test]
    fn delivery_report_all_sent() {
        let report = DeliveryReport {
            results: vec![("a@x.org".to_string(), DeliveryResult::Sent)],
        };
        assert_eq!(format_delivery_report(&report), vec!["Sent 1 of 1"]);
    }

    // =========================================================================
    // New / Index output
    // =========================================================================

    #[test]
    fn scaffold_output_shows_created_and_kept() {
        let report = ScaffoldReport {
            issue_dir: PathBuf::from("/site/content/2024-05-01"),
            created: vec![PathBuf::from("/site/content/2024-05-01/meta.yml")],
            skipped: vec![PathBuf::from("/site/content/2024-05-01/intro.md")],
        };
        assert_eq!(
            format_scaffold_output(&report, Path::new("/site")),
            vec![
                "Issue content/2024-05-01",
                "    created meta.yml",
                "    kept intro.md",
            ]
        );
    }

    #[test]
    fn listing_output() {
        let entries = vec![ListingEntry {
            filename: "2024-01-01.html".to_string(),
            title: "Issue #1".to_string(),
            date: Some("2024-01-01".to_string()),
        }];
        assert_eq!(
            format_listing_output(
                &entries,
                Path::new("/site/dist/newsletters.json"),
                Path::new("/site")
            ),
            vec![
                "001 Issue #1 \u{2192} 2024-01-01.html",
                "Listed 1 newsletter \u{2192} dist/newsletters.json",
            ]
        );
    }
}
