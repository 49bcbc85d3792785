//! Issue rendering.
//!
//! Turns one issue folder into `{output_dir}/{issue}.html`.
//!
//! ## Issue Folder Layout
//!
//! ```text
//! content/2024-01-01/              # normal issue
//! ├── meta.yml                     # title, date, type (optional)
//! ├── intro.md
//! ├── article-1.md                 # article*.md, rendered in filename order
//! ├── article-2.md
//! └── images/                      # downscaled in place before rendering
//!     └── a.jpg
//!
//! content/2024-02-02/              # canvas issue (type: canvas)
//! ├── meta.yml
//! └── banner.png                   # first raster image in the folder
//! ```
//!
//! ## Image URLs
//!
//! Newsletters are read in mail clients, so every image reference must be
//! absolute. Relative `src` values in articles become
//! `{base_url}/{content_root}/{issue}/{src}`; values with a URL scheme are
//! left alone. Only the `src` value changes, other attributes are kept
//! byte for byte.
//!
//! ## Determinism
//!
//! Rendering has no clock or random input. Rebuilding an unchanged issue
//! overwrites the artifact with identical bytes.

use crate::config::Config;
use crate::imaging::{
    ImageBackend, NormalizeConfig, NormalizeOutcome, is_hidden, is_raster_image, normalize_images,
};
use crate::issue::ResolvedIssue;
use crate::metadata::{self, IssueKind, IssueMeta, MetadataError};
use crate::templates;
use crate::types::{IssueBody, RenderedDocument};
use pulldown_cmark::{Options, Parser, html as md_html};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Canvas issue has no image (jpg, jpeg, png, gif, webp) in {0}")]
    MissingCanvasImage(PathBuf),
    #[error("Rendered newsletter not found: {0} (run `gazette build` first)")]
    MissingArtifact(PathBuf),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> RenderError + '_ {
    move |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Everything produced by rendering one issue.
#[derive(Debug)]
pub struct RenderOutput {
    pub document: RenderedDocument,
    pub meta: IssueMeta,
    pub output_path: PathBuf,
    /// Per-file results of the image normalization pass.
    pub images: Vec<(PathBuf, NormalizeOutcome)>,
    /// Article files included, in render order (empty for canvas issues).
    pub articles: Vec<PathBuf>,
}

// ============================================================================
// Markdown and image references
// ============================================================================

/// Convert markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img([^>]*?) src="([^"]+)"([^>]*)>"#).expect("image tag pattern must compile")
});

/// Whether `src` already points somewhere absolute: `scheme:` or `//host`.
pub fn has_url_scheme(src: &str) -> bool {
    if src.starts_with("//") {
        return true;
    }
    let Some((scheme, _)) = src.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Rewrite relative `<img src>` values in `html` to `{prefix}/{src}`.
pub fn absolutize_image_sources(html: &str, prefix: &str) -> String {
    IMG_SRC
        .replace_all(html, |caps: &Captures| {
            let before = &caps[1];
            let src = &caps[2];
            let after = &caps[3];
            if has_url_scheme(src) {
                caps[0].to_string()
            } else {
                let relative = src.trim_start_matches("./");
                format!(r#"<img{before} src="{prefix}/{relative}"{after}>"#)
            }
        })
        .into_owned()
}

/// Public URL prefix of an issue folder: `{base_url}/{root}/{issue}`.
pub fn issue_url_prefix(config: &Config, issue: &ResolvedIssue) -> String {
    format!("{}/{}/{}", config.site.base_url(), issue.root_name, issue.id)
}

// ============================================================================
// Issue folder readers
// ============================================================================

/// `article*.md` files of an issue, in lexicographic filename order.
pub fn article_files(issue_dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let mut files: Vec<PathBuf> = sorted_files(issue_dir)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("article") && name.ends_with(".md"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// First raster image directly inside the issue folder (sorted listing).
pub fn find_canvas_image(issue_dir: &Path) -> Result<Option<String>, RenderError> {
    Ok(sorted_files(issue_dir)?
        .into_iter()
        .find(|path| is_raster_image(path))
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().to_string())))
}

/// Visible files directly inside `dir`, sorted.
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_file() && !is_hidden(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_markdown(path: &Path) -> Result<String, RenderError> {
    let markdown = fs::read_to_string(path).map_err(io_error(path))?;
    Ok(markdown_to_html(&markdown))
}

/// Assemble the body of an issue according to its kind.
pub fn build_body(
    config: &Config,
    issue: &ResolvedIssue,
    kind: IssueKind,
) -> Result<(IssueBody, Vec<PathBuf>), RenderError> {
    let prefix = issue_url_prefix(config, issue);
    match kind {
        IssueKind::Canvas => {
            let image = find_canvas_image(&issue.path)?
                .ok_or_else(|| RenderError::MissingCanvasImage(issue.path.clone()))?;
            let body = IssueBody::Canvas {
                image_url: format!("{prefix}/{image}"),
            };
            Ok((body, Vec::new()))
        }
        IssueKind::Normal => {
            let intro_path = issue.path.join("intro.md");
            let intro = if intro_path.is_file() {
                read_markdown(&intro_path)?
            } else {
                tracing::warn!(path = %intro_path.display(), "issue has no intro");
                String::new()
            };

            let articles = article_files(&issue.path)?;
            let mut combined = String::new();
            for path in &articles {
                let html = read_markdown(path)?;
                combined.push_str(&absolutize_image_sources(&html, &prefix));
            }

            let body = IssueBody::Standard {
                intro,
                articles: combined,
            };
            Ok((body, articles))
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Render an issue and write it to `{output_dir}/{issue}.html`.
///
/// The file is only written once the whole document has been assembled.
pub fn render_issue(
    config: &Config,
    issue: &ResolvedIssue,
    output_dir: &Path,
    backend: &impl ImageBackend,
) -> Result<RenderOutput, RenderError> {
    let meta = metadata::load_meta(&issue.path)?;
    tracing::info!(issue = %issue.id, kind = meta.kind.as_str(), "rendering issue");

    let images = normalize_images(
        backend,
        &issue.path.join("images"),
        &NormalizeConfig::from(&config.images),
    );

    let (body, articles) = build_body(config, issue, meta.kind)?;
    let html = templates::render_document(&config.site, &meta.title, &meta.date, &body).into_string();

    let document = RenderedDocument {
        issue: issue.id.clone(),
        title: meta.title.clone(),
        html,
    };
    let output_path = write_document(output_dir, &document)?;

    Ok(RenderOutput {
        document,
        meta,
        output_path,
        images,
        articles,
    })
}

/// Path of the rendered artifact for an issue.
pub fn document_path(output_dir: &Path, issue: &str) -> PathBuf {
    output_dir.join(format!("{issue}.html"))
}

/// Write a rendered document, replacing any previous build.
pub fn write_document(output_dir: &Path, document: &RenderedDocument) -> Result<PathBuf, RenderError> {
    fs::create_dir_all(output_dir).map_err(io_error(output_dir))?;
    let path = document_path(output_dir, &document.issue);
    fs::write(&path, &document.html).map_err(io_error(&path))?;
    Ok(path)
}

/// Read a previously rendered document back, taking the title from `<title>`.
pub fn read_document(output_dir: &Path, issue: &str) -> Result<RenderedDocument, RenderError> {
    let path = document_path(output_dir, issue);
    if !path.is_file() {
        return Err(RenderError::MissingArtifact(path));
    }
    let html = fs::read_to_string(&path).map_err(io_error(&path))?;
    let title = extract_title(&html).unwrap_or_else(|| format!("Newsletter {issue}"));
    Ok(RenderedDocument {
        issue: issue.to_string(),
        title,
        html,
    })
}

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title>(.*?)</title>").expect("title pattern must compile"));

/// Extract the text of the `<title>` element, with basic entities decoded.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .map(|caps| decode_entities(caps[1].trim()))
        .filter(|t| !t.is_empty())
}

/// Decode the entities an HTML serializer emits for text content.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

// ============================================================================
// Tests
// ============================================================================
