//! Shared test utilities for the gazette test suite.
//!
//! Builds issue folders in a temp directory and writes small synthetic images.
//!
//! ```rust,ignore
//! let site = TestSite::new();
//! site.issue("2024-01-01")
//!     .meta("Issue #1", "2024-01-01", None)
//!     .intro("Hello")
//!     .article("article-1.md", "![a](images/a.jpg)");
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Config;

pub const TEST_BASE_URL: &str = "https://BASE";

// =========================================================================
// Synthetic images
// =========================================================================

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a small valid PNG file (with alpha) with the given dimensions.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, 64, (y % 256) as u8, 255])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

// =========================================================================
// Issue fixtures
// =========================================================================

/// A temp project directory with a config pointing at it.
pub struct TestSite {
    pub dir: TempDir,
    pub config: Config,
}

impl TestSite {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.site.base_url = TEST_BASE_URL.to_string();
        config.smtp.send_delay_secs = 0;
        Self {
            dir: TempDir::new().unwrap(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Start an issue folder under the published root.
    pub fn issue(&self, id: &str) -> IssueFixture {
        IssueFixture::create(self.path().join(&self.config.site.content_dir).join(id))
    }

    /// Start an issue folder under the planned root.
    pub fn planned_issue(&self, id: &str) -> IssueFixture {
        IssueFixture::create(self.path().join(&self.config.site.planned_dir).join(id))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join(&self.config.site.output_dir)
    }
}

/// Builder writing the files of one issue folder.
pub struct IssueFixture {
    pub path: PathBuf,
}

impl IssueFixture {
    fn create(path: PathBuf) -> Self {
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn meta(self, title: &str, date: &str, kind: Option<&str>) -> Self {
        let mut yaml = format!("title: \"{title}\"\ndate: \"{date}\"\n");
        if let Some(kind) = kind {
            yaml.push_str(&format!("type: {kind}\n"));
        }
        self.file("meta.yml", &yaml)
    }

    pub fn intro(self, markdown: &str) -> Self {
        self.file("intro.md", markdown)
    }

    pub fn article(self, name: &str, markdown: &str) -> Self {
        self.file(name, markdown)
    }

    pub fn file(self, name: &str, content: &str) -> Self {
        fs::write(self.path.join(name), content).unwrap();
        self
    }

    pub fn jpeg(self, relative: &str, width: u32, height: u32) -> Self {
        let path = self.path.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        create_test_jpeg(&path, width, height);
        self
    }

    pub fn png(self, relative: &str, width: u32, height: u32) -> Self {
        let path = self.path.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        create_test_png(&path, width, height);
        self
    }
}
