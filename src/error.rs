use std::{fmt, io};

#[cfg(feature = "service")]
use std::{borrow::Cow, error::Error as StdError};

use http::status::StatusCode;
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[cfg(feature = "service")]
use sqlx::{
    error::{DatabaseError, ErrorKind as DatabaseErrorKind},
    Error as SqlxError,
};

#[cfg(feature = "client")]
use reqwest::Error as ReqwestError;

/// The storage stage a batch was in when a write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStage {
    File,
    Components,
    Instances,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStage::File => write!(f, "file"),
            BatchStage::Components => write!(f, "components"),
            BatchStage::Instances => write!(f, "instances"),
        }
    }
}

/// Why the document source refused or failed a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpstreamKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    Server,
    Transport,
    Decode,
    Other(u16),
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamKind::BadRequest => write!(f, "bad request"),
            UpstreamKind::Unauthorized => write!(f, "unauthorized"),
            UpstreamKind::Forbidden => write!(f, "forbidden"),
            UpstreamKind::NotFound => write!(f, "not found"),
            UpstreamKind::RateLimited => write!(f, "rate limit exceeded"),
            UpstreamKind::Server => write!(f, "upstream server error"),
            UpstreamKind::Transport => write!(f, "transport failure"),
            UpstreamKind::Decode => write!(f, "undecodable response"),
            UpstreamKind::Other(code) => write!(f, "HTTP {code}"),
        }
    }
}

impl UpstreamKind {
    pub fn from_status(code: u16) -> Self {
        match code {
            400 => UpstreamKind::BadRequest,
            401 => UpstreamKind::Unauthorized,
            403 => UpstreamKind::Forbidden,
            404 => UpstreamKind::NotFound,
            429 => UpstreamKind::RateLimited,
            500..=599 => UpstreamKind::Server,
            other => UpstreamKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum FigparseError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid root node: expected DOCUMENT, found {0}")]
    InvalidRoot(String),
    #[error("Document tree exceeds the maximum depth of {0}")]
    DepthExceeded(usize),
    #[error("Document source error ({kind}): {message}")]
    Upstream { kind: UpstreamKind, message: String },
    #[error("Instance '{node_id}' references unresolved component slot {provisional}")]
    ResolutionMiss { node_id: String, provisional: u32 },
    #[error("Persistence failed at {stage} stage: {message}")]
    Persistence { stage: BatchStage, message: String },
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FigparseError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FigparseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FigparseError::InvalidRoot(_) => StatusCode::BAD_REQUEST,
            FigparseError::DepthExceeded(_) => StatusCode::BAD_REQUEST,
            FigparseError::Upstream { kind, .. } => match kind {
                UpstreamKind::Unauthorized => StatusCode::UNAUTHORIZED,
                UpstreamKind::Forbidden => StatusCode::FORBIDDEN,
                UpstreamKind::NotFound => StatusCode::NOT_FOUND,
                UpstreamKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            FigparseError::ResolutionMiss { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            FigparseError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            FigparseError::NotFound(_) => StatusCode::NOT_FOUND,
            FigparseError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FigparseError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FigparseError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn upstream(kind: UpstreamKind, message: impl Into<String>) -> Self {
        FigparseError::Upstream {
            kind,
            message: message.into(),
        }
    }

    /// Re-tags a storage failure with the stage it happened in. Errors that already carry a
    /// stage keep it.
    pub fn at_stage(self, stage: BatchStage) -> Self {
        match self {
            FigparseError::Persistence { .. } => self,
            other => FigparseError::Persistence {
                stage,
                message: other.to_string(),
            },
        }
    }
}

impl From<toml::de::Error> for FigparseError {
    fn from(src: toml::de::Error) -> FigparseError {
        FigparseError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for FigparseError {
    fn from(src: toml::ser::Error) -> FigparseError {
        FigparseError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for FigparseError {
    fn from(src: JsonError) -> FigparseError {
        FigparseError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for FigparseError {
    fn from(src: UrlParseError) -> FigparseError {
        FigparseError::InvalidInput(format!("Invalid URL: {src}"))
    }
}

impl From<io::Error> for FigparseError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => FigparseError::NotFound(format!("{x}")),
            _ => FigparseError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<RegexError> for FigparseError {
    fn from(x: RegexError) -> Self {
        FigparseError::Serialization(format!("Regex parse failed: {x}"))
    }
}

#[cfg(feature = "client")]
impl From<ReqwestError> for FigparseError {
    fn from(x: ReqwestError) -> Self {
        if x.is_decode() {
            FigparseError::upstream(UpstreamKind::Decode, format!("{x}"))
        } else if let Some(status) = x.status() {
            FigparseError::upstream(UpstreamKind::from_status(status.as_u16()), format!("{x}"))
        } else {
            FigparseError::upstream(UpstreamKind::Transport, format!("{x}"))
        }
    }
}

#[cfg(feature = "service")]
impl From<SqlxError> for FigparseError {
    fn from(db_error: SqlxError) -> Self {
        match db_error {
            SqlxError::RowNotFound => FigparseError::NotFound("database row not found".into()),
            other => FigparseError::Io(format!("database error: {other:?}")),
        }
    }
}

#[cfg(feature = "service")]
impl DatabaseError for FigparseError {
    fn message(&self) -> &str {
        "Figparse FromRow parsing failure"
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        DatabaseErrorKind::Other
    }

    /// The extended result code.
    #[inline]
    fn code(&self) -> Option<Cow<'_, str>> {
        None
    }

    #[doc(hidden)]
    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    #[doc(hidden)]
    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    #[doc(hidden)]
    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_mapping() {
        assert_eq!(UpstreamKind::from_status(401), UpstreamKind::Unauthorized);
        assert_eq!(UpstreamKind::from_status(429), UpstreamKind::RateLimited);
        assert_eq!(UpstreamKind::from_status(503), UpstreamKind::Server);
        assert_eq!(UpstreamKind::from_status(418), UpstreamKind::Other(418));

        let err = FigparseError::upstream(UpstreamKind::RateLimited, "slow down");
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            err.to_string(),
            "Document source error (rate limit exceeded): slow down"
        );
    }

    #[test]
    fn test_at_stage_keeps_existing_stage() {
        let original = FigparseError::Persistence {
            stage: BatchStage::File,
            message: "disk full".into(),
        };
        assert_eq!(original.clone().at_stage(BatchStage::Instances), original);

        let tagged = FigparseError::Io("broken pipe".into()).at_stage(BatchStage::Components);
        assert!(matches!(
            tagged,
            FigparseError::Persistence {
                stage: BatchStage::Components,
                ..
            }
        ));
    }
}
