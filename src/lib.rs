//! # Gazette
//!
//! Builds a periodic HTML newsletter from per-issue content folders and mails
//! it to a subscriber list. The filesystem is the data source: one folder per
//! issue, markdown for the words, YAML for the metadata.
//!
//! # Pipeline
//!
//! ```text
//! 1. Resolve   argument / NEWSLETTER_ISSUE / latest  →  content/2024-01-01/
//! 2. Render    issue folder                          →  dist/2024-01-01.html
//! 3. Deliver   dist/2024-01-01.html + recipients     →  one email per recipient
//! ```
//!
//! Rendering and delivery are separate commands joined only by the written
//! artifact, so an issue can be built, reviewed in a browser, and sent later.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`issue`] | Picks the content root (published or planned) and the issue folder |
//! | [`metadata`] | Loads and validates `meta.yml` (title, date, kind) |
//! | [`imaging`] | Downscales oversized images in place, pure Rust |
//! | [`render`] | Markdown to HTML, image URL rewriting, writes the artifact |
//! | [`templates`] | Maud markup for standard and canvas issues |
//! | [`recipients`] | Recipient list from a file, an env variable or a spreadsheet |
//! | [`delivery`] | Per-recipient send loop with reconnect retry and pacing |
//! | [`smtp`] | lettre SMTP transport and the dry-run transport |
//! | [`scaffold`] | Creates new issue folders |
//! | [`listing`] | Writes `newsletters.json` for the archive page |
//! | [`config`] | `newsletter.toml` loading, merging and validation; env secrets |
//! | [`output`] | CLI output formatting |
//! | [`telemetry`] | `tracing` subscriber setup |
//! | [`types`] | Types shared between rendering, delivery and listing |
//!
//! # Design Decisions
//!
//! ## Absolute Image URLs
//!
//! Mail clients have no base URL to resolve against, so every image reference
//! in an article is rewritten to the issue's public URL before the document is
//! written. The same HTML serves the web archive and the email.
//!
//! ## One Session, Many Messages
//!
//! Delivery opens a single authenticated SMTP session and sends one message
//! per recipient through it, pausing between sends to stay under provider rate
//! limits. A dropped connection is reopened and the send retried a bounded
//! number of times; a rejected address is recorded and the run moves on.
//!
//! ## Testable Seams
//!
//! Pixel work sits behind [`imaging::ImageBackend`] and mail behind
//! [`delivery::Transport`]. Both have in-memory mocks in the test suite, so the
//! pipeline is exercised end to end without encoding images or opening
//! sockets.

pub mod config;
pub mod delivery;
pub mod imaging;
pub mod issue;
pub mod listing;
pub mod metadata;
pub mod output;
pub mod recipients;
pub mod render;
pub mod scaffold;
pub mod smtp;
pub mod telemetry;
pub mod templates;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
