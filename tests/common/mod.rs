//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use figparse_core::{
    client::{ApiCredential, DocumentClient},
    codec::DocumentResponse,
    FigparseError,
};

pub const FIXTURE_URL: &str = "https://www.figma.com/design/MkTg0SiteKey42/Marketing-Site";
pub const FIXTURE_KEY: &str = "MkTg0SiteKey42";

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// The raw body of `tests/fixtures/design_kit.json`.
#[allow(dead_code)]
pub fn fixture_body() -> &'static str {
    include_str!("../fixtures/design_kit.json")
}

#[allow(dead_code)]
pub fn credential() -> ApiCredential {
    ApiCredential::new("figd_integration").unwrap()
}

/// Document source that decodes the fixture on every fetch, and only knows [`FIXTURE_KEY`].
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct FixtureClient;

impl DocumentClient for FixtureClient {
    async fn fetch_document(
        &self,
        file_key: &str,
        _credential: &ApiCredential,
    ) -> Result<DocumentResponse, FigparseError> {
        if file_key != FIXTURE_KEY {
            return Err(FigparseError::upstream(
                figparse_core::UpstreamKind::NotFound,
                format!("no fixture for {file_key}"),
            ));
        }
        DocumentResponse::from_json(fixture_body())
    }

    async fn check_access(&self, _credential: &ApiCredential) -> Result<(), FigparseError> {
        Ok(())
    }
}
