//! Fetching documents from the design tool's REST API.
//!
//! The credential is an argument to every call. Clients hold no token of their own, so one
//! client can serve requests on behalf of many callers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::{fmt, future::Future};

use crate::{
    codec::DocumentResponse,
    error::{FigparseError, UpstreamKind},
};

#[cfg(feature = "client")]
use crate::config::ApiConfig;
#[cfg(feature = "client")]
use std::time::Duration;

static FILE_URL: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"(?:https?://)?(?:www\.)?figma\.com/(?:file|design)/([a-zA-Z0-9]+)"));
static BARE_KEY: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+$"));

const MIN_BARE_KEY_LEN: usize = 11;

/// Pulls the file key out of a share URL (`/file/<key>` or `/design/<key>`), or accepts a bare
/// key of at least eleven alphanumeric characters.
pub fn extract_file_key(input: &str) -> Result<String, FigparseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(FigparseError::InvalidInput("URL cannot be empty".to_string()));
    }
    let file_url = FILE_URL.as_ref().map_err(|e| FigparseError::from(e.clone()))?;
    if let Some(key) = file_url.captures(input).and_then(|c| c.get(1)) {
        return Ok(key.as_str().to_string());
    }
    let bare_key = BARE_KEY.as_ref().map_err(|e| FigparseError::from(e.clone()))?;
    if input.len() >= MIN_BARE_KEY_LEN && bare_key.is_match(input) {
        return Ok(input.to_string());
    }
    Err(FigparseError::InvalidInput(format!(
        "invalid document URL format: {input}"
    )))
}

/// A personal access token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential(String);

impl ApiCredential {
    /// Accepts a raw token or an `Authorization` header value (`Bearer <token>`).
    pub fn new(token: impl AsRef<str>) -> Result<Self, FigparseError> {
        let token = token.as_ref().trim();
        let token = token
            .strip_prefix("Bearer ")
            .map(str::trim)
            .unwrap_or(token);
        if token.is_empty() {
            return Err(FigparseError::upstream(
                UpstreamKind::Unauthorized,
                "an access token is required",
            ));
        }
        Ok(ApiCredential(token.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiCredential(***)")
    }
}

/// Shape of the API's error bodies.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    err: String,
}

/// Maps a non-success response to a typed upstream error.
pub fn upstream_error(status: u16, body: &str) -> FigparseError {
    let kind = UpstreamKind::from_status(status);
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.err,
        Err(_) => {
            return FigparseError::upstream(
                kind,
                format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
            )
        }
    };
    let message = match kind {
        UpstreamKind::BadRequest => format!("bad request: {detail}"),
        UpstreamKind::Unauthorized => "invalid API token".to_string(),
        UpstreamKind::Forbidden => "insufficient permissions for this file".to_string(),
        UpstreamKind::NotFound => "file does not exist or is not accessible".to_string(),
        UpstreamKind::RateLimited => "too many requests".to_string(),
        _ => format!("HTTP {status}: {detail}"),
    };
    FigparseError::upstream(kind, message)
}

/// Decodes a successful response body.
pub fn decode_document(body: &str) -> Result<DocumentResponse, FigparseError> {
    DocumentResponse::decode_with(body, |e| {
        FigparseError::upstream(UpstreamKind::Decode, format!("document response: {e}"))
    })
}

pub trait DocumentClient: Send + Sync {
    fn fetch_document(
        &self,
        file_key: &str,
        credential: &ApiCredential,
    ) -> impl Future<Output = Result<DocumentResponse, FigparseError>> + Send;

    /// Confirms the credential is accepted, without fetching a document.
    fn check_access(
        &self,
        credential: &ApiCredential,
    ) -> impl Future<Output = Result<(), FigparseError>> + Send;
}

#[cfg(feature = "client")]
#[derive(Debug, Clone)]
pub struct HttpDocumentClient {
    http: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "client")]
impl HttpDocumentClient {
    pub fn new(config: &ApiConfig) -> Result<Self, FigparseError> {
        url::Url::parse(&config.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(HttpDocumentClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, path: &str, credential: &ApiCredential) -> Result<String, FigparseError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("[HttpDocumentClient] GET {url}");
        let response = self
            .http
            .get(&url)
            .header("X-Figma-Token", credential.expose())
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let err = upstream_error(status.as_u16(), &body);
            tracing::warn!("[HttpDocumentClient] GET {url} failed: {err}");
            return Err(err);
        }
        Ok(body)
    }
}

#[cfg(feature = "client")]
impl DocumentClient for HttpDocumentClient {
    #[tracing::instrument(skip(self, credential))]
    async fn fetch_document(
        &self,
        file_key: &str,
        credential: &ApiCredential,
    ) -> Result<DocumentResponse, FigparseError> {
        if file_key.is_empty() {
            return Err(FigparseError::InvalidInput(
                "file key cannot be empty".to_string(),
            ));
        }
        let body = self
            .get_text(&format!("/files/{file_key}"), credential)
            .await?;
        decode_document(&body)
    }

    async fn check_access(&self, credential: &ApiCredential) -> Result<(), FigparseError> {
        self.get_text("/me", credential).await.map(|_| ())
    }
}
