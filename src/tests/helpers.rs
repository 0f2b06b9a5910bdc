//! Shared test utilities for the extraction pipeline

use crate::{
    client::{ApiCredential, DocumentClient},
    codec::{DocumentResponse, Node},
    error::FigparseError,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A small design system: one page, a button set with two variants, a standalone icon and a
/// handful of instances, one of which points at a component published from another file.
pub fn kit_response() -> DocumentResponse {
    let page = Node::new("1:0", "Components", "CANVAS")
        .with_bounds(0.0, 0.0, 1440.0, 900.0)
        .with_children(vec![
            Node::new("2:0", "Button", "COMPONENT_SET")
                .with_bounds(40.0, 40.0, 300.0, 120.0)
                .with_children(vec![
                    Node::new("2:1", "State=Default", "COMPONENT")
                        .with_bounds(60.0, 60.0, 120.0, 40.0),
                    Node::new("2:2", "State=Hover", "COMPONENT")
                        .with_bounds(200.0, 60.0, 120.0, 40.0),
                ]),
            Node::new("3:0", "Icon", "COMPONENT")
                .with_bounds(400.0, 40.0, 24.0, 24.0)
                .with_visible(false),
            Node::new("4:0", "Screen", "FRAME")
                .with_bounds(0.0, 300.0, 375.0, 812.0)
                .with_children(vec![
                    Node::new("4:1", "Button", "INSTANCE")
                        .with_component_ref("2:1")
                        .with_bounds(20.0, 320.0, 120.0, 40.0),
                    Node::new("4:2", "Button", "INSTANCE")
                        .with_component_ref("2:2")
                        .with_bounds(160.0, 320.0, 120.0, 40.0)
                        .with_visible(false),
                    Node::new("4:3", "Icon", "INSTANCE")
                        .with_component_ref("3:0")
                        .with_bounds(300.0, 330.0, 24.0, 24.0),
                    Node::new("4:4", "Avatar", "INSTANCE")
                        .with_component_ref("99:1")
                        .with_bounds(320.0, 330.0, 32.0, 32.0),
                ]),
        ]);
    let mut response = DocumentResponse {
        name: "Design Kit".to_string(),
        thumbnail_url: "https://example.test/thumb.png".to_string(),
        document: Some(Node::new("0:0", "Document", "DOCUMENT").with_children(vec![page])),
        ..Default::default()
    };
    response.component_sets.insert(
        "2:0".to_string(),
        crate::codec::ComponentMeta {
            name: "Button".to_string(),
            description: "Primary call to action".to_string(),
        },
    );
    response
}

/// Serves one canned response and remembers which keys were asked for.
#[derive(Clone)]
pub struct StaticClient {
    response: Result<DocumentResponse, FigparseError>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl StaticClient {
    pub fn new(response: DocumentResponse) -> Self {
        StaticClient {
            response: Ok(response),
            requested: Arc::default(),
        }
    }

    pub fn failing(err: FigparseError) -> Self {
        StaticClient {
            response: Err(err),
            requested: Arc::default(),
        }
    }
}

impl DocumentClient for StaticClient {
    async fn fetch_document(
        &self,
        file_key: &str,
        _credential: &ApiCredential,
    ) -> Result<DocumentResponse, FigparseError> {
        self.requested.lock().push(file_key.to_string());
        self.response.clone()
    }

    async fn check_access(&self, _credential: &ApiCredential) -> Result<(), FigparseError> {
        self.response.as_ref().map(|_| ()).map_err(Clone::clone)
    }
}
