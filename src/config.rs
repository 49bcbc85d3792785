//! Newsletter configuration.
//!
//! Settings live in `newsletter.toml` next to the content folders. Every key is
//! optional: the file is merged on top of the stock defaults, so a project only
//! writes the values it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! [site]
//! name = "Newsletter"          # Shown in the footer of every issue
//! language = "fr"              # <html lang="…">
//! base_url = "https://example.github.io/newsletter"
//! content_dir = "content"      # Published issues
//! planned_dir = "planned"      # Drafts scheduled for later
//! output_dir = "dist"          # Rendered {issue}.html files
//!
//! [images]
//! max_width = 600              # Wider images are downscaled in place
//! jpeg_quality = 85
//!
//! [smtp]
//! host = "smtp.gmail.com"
//! port = 587
//! timeout_secs = 30
//! retry_ceiling = 3            # Attempts per recipient
//! send_delay_secs = 3          # Pause between recipients
//!
//! [recipients]
//! sheet_range = "Sheet1!A2:A"
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Secrets
//!
//! Credentials never go in the file. They are read from the environment (a
//! `.env` file is loaded first when present):
//!
//! | Variable | Used by |
//! |----------|---------|
//! | `NEWSLETTER_EMAIL` | SMTP username and `From` address |
//! | `NEWSLETTER_PASSWORD` | SMTP password |
//! | `NEWSLETTER_ISSUE` | Issue override for `build`/`send` |
//! | `NEWSLETTER_ROOT` | `published` or `planned` |
//! | `NEWSLETTER_RECIPIENTS` | Fixed recipient list |
//! | `GOOGLE_SHEET_ID` | Spreadsheet holding the subscriber list |
//! | `GOOGLE_ACCESS_TOKEN` / `GOOGLE_API_KEY` | Spreadsheet authorization |

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE: &str = "newsletter.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Full newsletter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub site: SiteConfig,
    pub images: ImagesConfig,
    pub smtp: SmtpConfig,
    pub recipients: RecipientsConfig,
}

/// Where issues live and where they are published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Newsletter name, rendered in the footer.
    pub name: String,
    /// Value of the `lang` attribute on rendered documents.
    pub language: String,
    /// Public URL the content folders are served from. Relative image
    /// references are rewritten against it.
    pub base_url: String,
    /// Folder holding published issues.
    pub content_dir: String,
    /// Folder holding planned (draft) issues.
    pub planned_dir: String,
    /// Folder rendered documents are written to.
    pub output_dir: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Newsletter".to_string(),
            language: "fr".to_string(),
            base_url: "https://example.github.io/newsletter".to_string(),
            content_dir: "content".to_string(),
            planned_dir: "planned".to_string(),
            output_dir: "dist".to_string(),
        }
    }
}

impl SiteConfig {
    /// Base URL without a trailing slash, ready for `{base}/{path}` joins.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Image normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Images wider than this are downscaled to exactly this width.
    pub max_width: u32,
    /// JPEG re-encode quality (1-100).
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_width: 600,
            jpeg_quality: 85,
        }
    }
}

/// Mail submission settings. Credentials come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Connection timeout in seconds.
    pub timeout_secs: u64,
    /// Total send attempts per recipient, reconnects included.
    pub retry_ceiling: u32,
    /// Pause between two recipients, in seconds.
    pub send_delay_secs: u64,
    /// Display name for the `From` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    /// `List-Unsubscribe` header value. Defaults to a mailto back to the sender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsubscribe: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            timeout_secs: 30,
            retry_ceiling: 3,
            send_delay_secs: 3,
            from_name: None,
            unsubscribe: None,
        }
    }
}

impl SmtpConfig {
    pub fn send_delay(&self) -> Duration {
        Duration::from_secs(self.send_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Subscriber list settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecipientsConfig {
    /// A1-notation range read from the subscriber spreadsheet.
    pub sheet_range: String,
}

impl Default for RecipientsConfig {
    fn default() -> Self {
        Self {
            sheet_range: "Sheet1!A2:A".to_string(),
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.site.base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ConfigError::Validation(
                "site.base_url must be an http(s) URL".into(),
            ));
        }
        if self.site.content_dir.trim().is_empty() || self.site.planned_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.content_dir and site.planned_dir must not be empty".into(),
            ));
        }
        if self.images.max_width == 0 {
            return Err(ConfigError::Validation(
                "images.max_width must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::Validation("smtp.port must be non-zero".into()));
        }
        if self.smtp.retry_ceiling == 0 {
            return Err(ConfigError::Validation(
                "smtp.retry_ceiling must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load the config file at `path`, merged over stock defaults.
///
/// A missing file is not an error: the stock defaults are returned.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value();
    let merged = if path.exists() {
        let content = fs::read_to_string(path)?;
        let overlay: toml::Value = toml::from_str(&content)?;
        merge_toml(base, overlay)
    } else {
        base
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Read an environment variable, treating blank values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Load `.env` from the working directory if there is one, returning its path.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// SMTP login, read from `NEWSLETTER_EMAIL` / `NEWSLETTER_PASSWORD`.
#[derive(Clone)]
pub struct SenderCredentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SenderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderCredentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl SenderCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            std::env::var("NEWSLETTER_EMAIL").ok(),
            std::env::var("NEWSLETTER_PASSWORD").ok(),
        )
    }

    /// Validate raw values. The password is kept byte for byte; only an empty
    /// or all-blank one counts as missing.
    pub fn from_values(
        email: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ConfigError> {
        let email = email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or(ConfigError::MissingEnv("NEWSLETTER_EMAIL"))?;
        let password = password
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("NEWSLETTER_PASSWORD"))?;
        Ok(Self { email, password })
    }
}

/// Returns a fully-commented stock `newsletter.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Newsletter configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.
#
# Secrets are read from the environment (or a .env file), never from here:
#   NEWSLETTER_EMAIL, NEWSLETTER_PASSWORD   SMTP login and sender address
#   NEWSLETTER_RECIPIENTS                   fixed recipient list
#   GOOGLE_SHEET_ID                         recipient spreadsheet, authorized by
#     GOOGLE_SERVICE_ACCOUNT_JSON or GOOGLE_SERVICE_ACCOUNT_FILE, or else
#     GOOGLE_ACCESS_TOKEN or GOOGLE_API_KEY

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
# Name shown in the footer of every issue.
name = "Newsletter"

# Language of the rendered documents (<html lang="...">).
language = "fr"

# Public URL the content folders are served from. Relative image paths in
# articles become {base_url}/{content_dir}/{issue}/{path}.
base_url = "https://example.github.io/newsletter"

# Published issues, one folder per issue (e.g. content/2024-01-01/).
content_dir = "content"

# Planned issues, same layout. Select with --planned or NEWSLETTER_ROOT=planned.
planned_dir = "planned"

# Rendered {issue}.html files and newsletters.json.
output_dir = "dist"

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[images]
# Images in {issue}/images wider than this are downscaled in place.
max_width = 600

# JPEG re-encode quality (1-100).
jpeg_quality = 85

# ---------------------------------------------------------------------------
# SMTP
# ---------------------------------------------------------------------------
[smtp]
host = "smtp.gmail.com"
port = 587

# Connection timeout, seconds.
timeout_secs = 30

# Send attempts per recipient; a dropped connection is reopened between tries.
retry_ceiling = 3

# Pause between recipients, seconds. Keeps the provider from throttling.
send_delay_secs = 3

# Display name for the From header.
# from_name = "Newsletter"

# List-Unsubscribe header. Defaults to <mailto:{sender}?subject=unsubscribe>.
# unsubscribe = "<https://example.com/unsubscribe>"

# ---------------------------------------------------------------------------
# Recipients
# ---------------------------------------------------------------------------
[recipients]
# Range read from the GOOGLE_SHEET_ID spreadsheet.
sheet_range = "Sheet1!A2:A"
"##
}
