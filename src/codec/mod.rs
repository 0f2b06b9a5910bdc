//! Document extraction.
//!
//! This module turns one fetched design document into a flat [`ParsedBatch`]: a file draft,
//! deduplicated component drafts and instance drafts that point at components by provisional
//! position.
//!
//! ## Key Components
//!
//! - [`Node`] / [`DocumentResponse`] - The tree and the fetch envelope as the document source
//!   delivers them
//! - [`canvas_dimensions`] - Infers the size of the design surface
//! - [`BatchBuilder`] - Classifies nodes and assembles the batch
//! - [`dedup_by_node_id`] - Collapses records sharing a source node id, first wins
//! - [`ParseDiagnostic`] - Records nodes that were skipped and why
//!
//! ## Ordering
//!
//! Provisional component ids are positions, so the pass is careful about order:
//!
//! 1. **API maps**: `components` then `componentSets`, each in key order
//! 2. **Tree**: COMPONENT and COMPONENT_SET nodes in pre-order
//! 3. **Dedup**: the two lists are concatenated per [`ComponentPriority`] and deduplicated
//! 4. **Instances**: INSTANCE nodes in pre-order, resolved against the deduplicated list
//!
//! ```rust
//! use figparse_core::codec::{BatchBuilder, DocumentResponse, SourceRef};
//!
//! let body = r#"{
//!     "name": "Kit",
//!     "document": {"id": "0:0", "name": "Document", "type": "DOCUMENT", "children": [
//!         {"id": "1:1", "name": "Button", "type": "COMPONENT"},
//!         {"id": "1:2", "name": "Button#1", "type": "INSTANCE", "componentId": "1:1"}
//!     ]}
//! }"#;
//! let response = DocumentResponse::from_json(body).unwrap();
//! let batch = BatchBuilder::default()
//!     .build(&response, &SourceRef::new("https://www.figma.com/file/AbCdEfGhIjKl", "AbCdEfGhIjKl"))
//!     .unwrap();
//! assert_eq!(batch.components.len(), 1);
//! assert_eq!(batch.instances[0].component.get(), 1);
//! ```
//!
//! Storage identities are assigned later; see [`crate::resolve`] and [`crate::persist`].

pub mod builder;
pub mod dedup;
pub mod diagnostic;
pub mod dimensions;
pub mod node;

pub use crate::config::{ComponentPriority, ExtractionConfig};
pub use builder::{BatchBuilder, ParsedBatch, SourceRef};
pub use dedup::dedup_by_node_id;
pub use diagnostic::{ParseDiagnostic, UnmatchedReference};
pub use dimensions::{canvas_dimensions, CanvasSize, DEFAULT_CANVAS};
pub use node::{ComponentMeta, DocumentResponse, Node, NodeKind};
