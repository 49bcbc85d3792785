//! High-level image operations.
//!
//! [`normalize_images`] walks an issue's `images/` folder and downscales every
//! raster image wider than the configured maximum, in place. It never fails as
//! a whole: each file gets its own [`NormalizeOutcome`] and the caller decides
//! how to report them.

use super::backend::ImageBackend;
use super::calculations::calculate_downscale;
use super::params::{Quality, ResizeParams};
use crate::config::ImagesConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions treated as raster images, compared case-insensitively.
pub const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Whether a path has a raster image extension.
pub fn is_raster_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            RASTER_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Dotfiles, including editor swap files and AppleDouble `._*` companions.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Normalization settings.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeConfig {
    pub max_width: u32,
    pub quality: Quality,
}

impl From<&ImagesConfig> for NormalizeConfig {
    fn from(config: &ImagesConfig) -> Self {
        Self {
            max_width: config.max_width,
            quality: Quality::new(config.jpeg_quality),
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeOutcome {
    Resized { from: (u32, u32), to: (u32, u32) },
    Unchanged { width: u32, height: u32 },
    Failed(String),
}

/// Downscale every oversized raster image in `dir`, in sorted filename order.
///
/// A missing directory yields an empty report. Subdirectories, hidden files
/// and non-image files are skipped.
pub fn normalize_images(
    backend: &impl ImageBackend,
    dir: &Path,
    config: &NormalizeConfig,
) -> Vec<(PathBuf, NormalizeOutcome)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => return vec![(dir.to_path_buf(), NormalizeOutcome::Failed(e.to_string()))],
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && !is_hidden(path) && is_raster_image(path))
        .collect();
    files.sort();

    files
        .into_iter()
        .map(|path| {
            let outcome = normalize_one(backend, &path, config);
            match &outcome {
                NormalizeOutcome::Resized { from, to } => tracing::info!(
                    file = %path.display(),
                    from = ?from,
                    to = ?to,
                    "downscaled image"
                ),
                NormalizeOutcome::Failed(reason) => {
                    tracing::warn!(file = %path.display(), %reason, "skipped image")
                }
                NormalizeOutcome::Unchanged { .. } => {}
            }
            (path, outcome)
        })
        .collect()
}

fn normalize_one(
    backend: &impl ImageBackend,
    path: &Path,
    config: &NormalizeConfig,
) -> NormalizeOutcome {
    let dims = match backend.identify(path) {
        Ok(dims) => dims,
        Err(e) => return NormalizeOutcome::Failed(e.to_string()),
    };
    let Some((width, height)) = calculate_downscale((dims.width, dims.height), config.max_width)
    else {
        return NormalizeOutcome::Unchanged {
            width: dims.width,
            height: dims.height,
        };
    };

    let params = ResizeParams {
        source: path.to_path_buf(),
        output: path.to_path_buf(),
        width,
        height,
        quality: config.quality,
    };
    match backend.resize(&params) {
        Ok(()) => NormalizeOutcome::Resized {
            from: (dims.width, dims.height),
            to: (width, height),
        },
        Err(e) => NormalizeOutcome::Failed(e.to_string()),
    }
}
