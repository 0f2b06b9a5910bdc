//! # figparse-core
//!
//! Turns a design-tool document export into a flat, relationally consistent record set: one file
//! record, the components defined in the file, and the instances that place those components.
//!
//! ## Overview
//!
//! A document arrives as a deeply nested node tree with geometry, type tags and cross-references.
//! figparse-core walks that tree once, classifies the nodes, infers the canvas size, collapses
//! duplicates, and hands the result to a storage backend in an order that lets every instance
//! point at a real component row.
//!
//! ### Key Features
//!
//! - **Bounded walk**: explicit-stack traversal with a configurable depth limit
//! - **Two-phase references**: instances carry provisional component ids until components are written
//! - **Error tolerance**: nodes that cannot be placed are reported as diagnostics, not errors
//! - **Atomic batches**: one unit of work per document, rolled back on any storage failure
//! - **Pluggable collaborators**: document source and storage sit behind traits
//!
//! ## Architecture
//!
//! - **[`codec`]**: Node model, canvas inference, extraction (`BatchBuilder`), deduplication
//! - **[`resolve`]**: Provisional component ids and the id map that replaces them
//! - **[`persist`]**: Write sequencing for one batch (`BatchPersister`)
//! - **[`properties`]**: Drafts, persisted records and their row mapping
//! - **[`store`]**: Storage traits and the in-memory store
//! - **[`client`]**: Credentials, URL parsing and the document source trait
//! - **[`service`]**: The fetch, extract and persist pipeline
//!
//! ## Quick Start
//!
//! ```rust
//! use figparse_core::{
//!     client::{ApiCredential, DocumentClient},
//!     codec::{DocumentResponse, ExtractionConfig},
//!     service::ParserService,
//!     store::MemoryStore,
//!     FigparseError,
//! };
//!
//! struct Fixture;
//!
//! impl DocumentClient for Fixture {
//!     async fn fetch_document(
//!         &self,
//!         _file_key: &str,
//!         _credential: &ApiCredential,
//!     ) -> Result<DocumentResponse, FigparseError> {
//!         DocumentResponse::from_json(
//!             r#"{"name": "Kit", "document": {"id": "0:0", "type": "DOCUMENT", "children": [
//!                 {"id": "1:1", "name": "Button", "type": "COMPONENT"}
//!             ]}}"#,
//!         )
//!     }
//!
//!     async fn check_access(&self, _credential: &ApiCredential) -> Result<(), FigparseError> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), FigparseError> {
//! let service = ParserService::new(Fixture, MemoryStore::new(), ExtractionConfig::default());
//! let credential = ApiCredential::new("figd_example")?;
//! let persisted = service
//!     .parse_and_persist("https://www.figma.com/file/AbCdEfGhIjKl/Kit", &credential)
//!     .await?;
//! let details = service.get_details(persisted.file.id).await?;
//! assert_eq!(details.components[0].name, "Button");
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `client`: [`client::HttpDocumentClient`], backed by `reqwest`
//! - `service`: SQLite storage in [`db`] (implies `client`)
//! - `bin`: the `figparse` command line tool and HTTP server

pub mod client;
pub mod codec;
pub mod config;
#[cfg(feature = "service")]
pub mod db;
pub mod error;
pub mod persist;
pub mod properties;
pub mod resolve;
pub mod service;
pub mod store;
#[cfg(test)]
mod tests;

pub use error::*;
