//! Recipient sourcing.
//!
//! The recipient list is fetched fresh on every send and never persisted.
//! Three sources, first configured wins:
//!
//! 1. `--recipients <path>`: a text file, addresses separated by commas,
//!    semicolons or whitespace, `#` starts a comment.
//! 2. `NEWSLETTER_RECIPIENTS`: the same syntax in one variable.
//! 3. A spreadsheet range (`GOOGLE_SHEET_ID`, `GOOGLE_SHEET_RANGE`) read from
//!    the Sheets v4 values endpoint.
//!
//! The sheet request is authorized by the first of:
//!
//! - a service account key, inline in `GOOGLE_SERVICE_ACCOUNT_JSON` or as a
//!   path in `GOOGLE_SERVICE_ACCOUNT_FILE`. A signed RS256 assertion is
//!   exchanged at the key's `token_uri` for a short-lived read-only token on
//!   every send.
//! - `GOOGLE_ACCESS_TOKEN`, used as a bearer token as is.
//! - `GOOGLE_API_KEY`, which only reaches publicly shared sheets.
//!
//! Whatever the source, [`normalize_recipients`] produces the final ordered,
//! de-duplicated list.

use crate::config::{RecipientsConfig, env_var};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Google caps assertion lifetime at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Error, Debug)]
pub enum RecipientError {
    #[error(
        "No recipient source: pass --recipients, set NEWSLETTER_RECIPIENTS, or set GOOGLE_SHEET_ID"
    )]
    NoSource,
    #[error(
        "GOOGLE_SHEET_ID is set without credentials: set GOOGLE_SERVICE_ACCOUNT_JSON, \
         GOOGLE_SERVICE_ACCOUNT_FILE, GOOGLE_ACCESS_TOKEN or GOOGLE_API_KEY"
    )]
    MissingSheetAuth,
    #[error("Invalid service account key: {0}")]
    InvalidServiceAccount(String),
    #[error("Could not sign service account assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Sheet request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Recipient list is empty")]
    Empty,
}

/// How the sheet request is authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum SheetAuth {
    ServiceAccount(ServiceAccountKey),
    Bearer(String),
    ApiKey(String),
}

impl std::fmt::Debug for SheetAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

// ============================================================================
// Service account
// ============================================================================

/// The parts of a Google service account key file used for the token
/// exchange. Other fields of the file are ignored.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM private key.
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"***")
            .finish()
    }
}

/// Claims of the JWT bearer assertion sent to the token endpoint.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccountKey {
    pub fn from_json(text: &str) -> Result<Self, RecipientError> {
        let key: Self = serde_json::from_str(text)
            .map_err(|e| RecipientError::InvalidServiceAccount(e.to_string()))?;
        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(RecipientError::InvalidServiceAccount(
                "client_email and private_key must not be empty".to_string(),
            ));
        }
        Ok(key)
    }

    pub fn from_file(path: &Path) -> Result<Self, RecipientError> {
        let text = fs::read_to_string(path).map_err(|source| RecipientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    fn assertion_claims(&self, now: i64) -> AssertionClaims<'_> {
        AssertionClaims {
            iss: &self.client_email,
            scope: SHEETS_READONLY_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }

    /// Sign the token request assertion, issued at `now` (unix seconds).
    fn signed_assertion(&self, now: i64) -> Result<String, RecipientError> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        Ok(jsonwebtoken::encode(&header, &self.assertion_claims(now), &key)?)
    }

    /// Exchange a fresh assertion for a read-only access token.
    fn access_token(&self, client: &reqwest::blocking::Client) -> Result<String, RecipientError> {
        let assertion = self.signed_assertion(chrono::Utc::now().timestamp())?;
        tracing::debug!(account = %self.client_email, "requesting sheets access token");
        let response = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()?
            .error_for_status()?
            .json::<TokenResponse>()?;
        Ok(response.access_token)
    }
}

/// Where the recipient list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSource {
    List(String),
    File(PathBuf),
    Sheet {
        sheet_id: String,
        range: String,
        auth: SheetAuth,
    },
}

/// Recipient-related environment values, read once by the CLI.
#[derive(Debug, Clone, Default)]
pub struct RecipientEnv {
    pub list: Option<String>,
    pub sheet_id: Option<String>,
    pub sheet_range: Option<String>,
    pub service_account_json: Option<String>,
    pub service_account_file: Option<PathBuf>,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
}

impl RecipientEnv {
    pub fn from_env() -> Self {
        Self {
            list: env_var("NEWSLETTER_RECIPIENTS"),
            sheet_id: env_var("GOOGLE_SHEET_ID"),
            sheet_range: env_var("GOOGLE_SHEET_RANGE"),
            service_account_json: env_var("GOOGLE_SERVICE_ACCOUNT_JSON"),
            service_account_file: env_var("GOOGLE_SERVICE_ACCOUNT_FILE").map(PathBuf::from),
            access_token: env_var("GOOGLE_ACCESS_TOKEN"),
            api_key: env_var("GOOGLE_API_KEY"),
        }
    }
}

impl RecipientSource {
    /// Pick a source: file, then env list, then sheet.
    ///
    /// A service account key is loaded and parsed here, so a broken key fails
    /// the run before anything is sent.
    pub fn select(
        file: Option<&Path>,
        env: RecipientEnv,
        config: &RecipientsConfig,
    ) -> Result<Self, RecipientError> {
        if let Some(path) = file {
            return Ok(Self::File(path.to_path_buf()));
        }
        if let Some(list) = env.list {
            return Ok(Self::List(list));
        }
        let Some(sheet_id) = env.sheet_id else {
            return Err(RecipientError::NoSource);
        };
        let auth = if let Some(json) = env.service_account_json {
            SheetAuth::ServiceAccount(ServiceAccountKey::from_json(&json)?)
        } else if let Some(path) = env.service_account_file {
            SheetAuth::ServiceAccount(ServiceAccountKey::from_file(&path)?)
        } else if let Some(token) = env.access_token {
            SheetAuth::Bearer(token)
        } else if let Some(key) = env.api_key {
            SheetAuth::ApiKey(key)
        } else {
            return Err(RecipientError::MissingSheetAuth);
        };
        Ok(Self::Sheet {
            sheet_id,
            range: env.sheet_range.unwrap_or_else(|| config.sheet_range.clone()),
            auth,
        })
    }

    /// Short human-readable description, for the send report.
    pub fn describe(&self) -> String {
        match self {
            Self::List(_) => "NEWSLETTER_RECIPIENTS".to_string(),
            Self::File(path) => path.display().to_string(),
            Self::Sheet { sheet_id, range, .. } => format!("sheet {sheet_id} ({range})"),
        }
    }

    /// Fetch and normalize the recipient list.
    pub fn fetch(&self) -> Result<Vec<String>, RecipientError> {
        let raw = match self {
            Self::List(text) => split_addresses(text),
            Self::File(path) => {
                let text = fs::read_to_string(path).map_err(|source| RecipientError::Io {
                    path: path.clone(),
                    source,
                })?;
                parse_recipient_file(&text)
            }
            Self::Sheet {
                sheet_id,
                range,
                auth,
            } => fetch_sheet(sheet_id, range, auth)?,
        };
        let recipients = normalize_recipients(raw);
        tracing::info!(source = %self.describe(), count = recipients.len(), "loaded recipients");
        if recipients.is_empty() {
            return Err(RecipientError::Empty);
        }
        Ok(recipients)
    }
}

/// Trim, keep entries containing `@`, drop duplicates keeping first occurrence.
pub fn normalize_recipients<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| s.contains('@'))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

fn split_addresses(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a recipients file: `#` comments, any mix of separators.
pub fn parse_recipient_file(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(split_addresses)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Flatten the cells of a values response, row by row.
fn sheet_cells(range: ValueRange) -> Vec<String> {
    range
        .values
        .into_iter()
        .flatten()
        .filter_map(|cell| match cell {
            serde_json::Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn fetch_sheet(sheet_id: &str, range: &str, auth: &SheetAuth) -> Result<Vec<String>, RecipientError> {
    let mut url = reqwest::Url::parse(SHEETS_API).expect("sheets endpoint must parse");
    url.path_segments_mut()
        .expect("https url has path segments")
        .push(sheet_id)
        .push("values")
        .push(range);

    tracing::debug!(%sheet_id, %range, "fetching recipients sheet");
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()?;
    let request = match auth {
        SheetAuth::ServiceAccount(key) => client.get(url).bearer_auth(key.access_token(&client)?),
        SheetAuth::Bearer(token) => client.get(url).bearer_auth(token),
        SheetAuth::ApiKey(key) => client.get(url).query(&[("key", key)]),
    };
    let body = request.send()?.error_for_status()?.json::<ValueRange>()?;
    Ok(sheet_cells(body))
}
