//! Spreadsheet append gateway.
//!
//! Reviews are appended as `(uploader, project, text)` rows. The Google
//! implementation authenticates as a service account: an RS256 assertion is
//! exchanged for an OAuth access token, which is cached until shortly before
//! it expires.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

const SHEETS_SCOPE: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("spreadsheet not configured")]
    NotConfigured,
    #[error("invalid service account credentials: {0}")]
    Credentials(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("spreadsheet API returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// One appended row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub uploader: String,
    pub project: String,
    pub text: String,
}

/// Build rows for `reviews`, trimming each and dropping blank ones.
pub fn review_rows(uploader: &str, project: &str, reviews: &[String]) -> Vec<ReviewRow> {
    reviews
        .iter()
        .map(|review| review.trim())
        .filter(|review| !review.is_empty())
        .map(|text| ReviewRow {
            uploader: uploader.to_string(),
            project: project.to_string(),
            text: text.to_string(),
        })
        .collect()
}

#[async_trait]
pub trait ReviewSheet: Send + Sync {
    /// Append all rows in one call, returning how many were written.
    async fn append_rows(&self, rows: &[ReviewRow]) -> Result<usize, SheetError>;
}

/// Stand-in used when no spreadsheet is configured; every append fails.
pub struct DisabledSheet;

#[async_trait]
impl ReviewSheet for DisabledSheet {
    async fn append_rows(&self, _rows: &[ReviewRow]) -> Result<usize, SheetError> {
        Err(SheetError::NotConfigured)
    }
}

/// The fields of a Google service-account key file this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, SheetError> {
        serde_json::from_str(json).map_err(|err| SheetError::Credentials(err.to_string()))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct GoogleSheet {
    http: reqwest::Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    api_base: String,
    spreadsheet_id: String,
    range: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheet {
    pub fn new(
        key: ServiceAccountKey,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
    ) -> Result<Self, SheetError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|err| SheetError::Credentials(err.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            key,
            signing_key,
            api_base: DEFAULT_SHEETS_API.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            token: Mutex::new(None),
        })
    }

    /// Point the client at another Sheets API root (`.../v4/spreadsheets`).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    async fn access_token(&self) -> Result<String, SheetError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: self.token_uri(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|err| SheetError::Credentials(err.to_string()))?;

        let response = self
            .http
            .post(self.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        let token: TokenResponse = response.json().await?;

        debug!("obtained spreadsheet access token valid for {}s", token.expires_in);
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SheetError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SheetError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ReviewSheet for GoogleSheet {
    async fn append_rows(&self, rows: &[ReviewRow]) -> Result<usize, SheetError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let token = self.access_token().await?;
        let url = format!(
            "{}/{}/values/{}:append",
            self.api_base,
            self.spreadsheet_id,
            urlencoding::encode(&self.range)
        );
        let values: Vec<[&str; 3]> = rows
            .iter()
            .map(|row| [row.uploader.as_str(), row.project.as_str(), row.text.as_str()])
            .collect();

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&serde_json::json!({ "values": values }))
            .send()
            .await?;
        check_status(response).await?;

        Ok(rows.len())
    }
}
