//! The document tree as the upstream export delivers it.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use crate::{error::FigparseError, properties::BoundingBox};

/// Node type tag. The set is open: anything not listed is carried through as
/// [`NodeKind::Other`] and treated as an opaque container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Document,
    Canvas,
    Component,
    ComponentSet,
    Instance,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Document => "DOCUMENT",
            NodeKind::Canvas => "CANVAS",
            NodeKind::Component => "COMPONENT",
            NodeKind::ComponentSet => "COMPONENT_SET",
            NodeKind::Instance => "INSTANCE",
            NodeKind::Other(tag) => tag,
        }
    }

    /// COMPONENT and COMPONENT_SET nodes become component records.
    pub fn is_component(&self) -> bool {
        matches!(self, NodeKind::Component | NodeKind::ComponentSet)
    }
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Other(String::new())
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "DOCUMENT" => NodeKind::Document,
            "CANVAS" => NodeKind::Canvas,
            "COMPONENT" => NodeKind::Component,
            "COMPONENT_SET" => NodeKind::ComponentSet,
            "INSTANCE" => NodeKind::Instance,
            _ => NodeKind::Other(tag),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(tag: &str) -> Self {
        NodeKind::from(tag.to_string())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> String {
        kind.as_str().to_string()
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: &str, name: &str, kind: impl Into<NodeKind>) -> Self {
        Node {
            id: id.to_string(),
            name: name.to_string(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.absolute_bounding_box = Some(BoundingBox::new(x, y, width, height));
        self
    }

    pub fn with_component_ref(mut self, component_id: &str) -> Self {
        self.component_id = Some(component_id.to_string());
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// The source-level component reference, if present and non-empty.
    pub fn component_ref(&self) -> Option<&str> {
        self.component_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Pre-order depth-first traversal that fails once a node sits deeper than `max_depth`
    /// (the node itself is depth 0).
    pub fn pre_order(&self, max_depth: usize) -> PreOrder<'_> {
        PreOrder {
            stack: vec![(0, self)],
            max_depth,
            failed: false,
        }
    }

    /// Linear search for the first node (pre-order) with the given id.
    pub fn find(&self, target_id: &str, max_depth: usize) -> Result<Option<&Node>, FigparseError> {
        for visit in self.pre_order(max_depth) {
            let (_, node) = visit?;
            if node.id == target_id {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }
}

/// Iterator returned by [`Node::pre_order`]. Yields `(depth, node)`; after the first error it
/// is exhausted.
#[derive(Debug)]
pub struct PreOrder<'a> {
    stack: Vec<(usize, &'a Node)>,
    max_depth: usize,
    failed: bool,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = Result<(usize, &'a Node), FigparseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (depth, node) = self.stack.pop()?;
        if depth > self.max_depth {
            self.failed = true;
            self.stack.clear();
            return Some(Err(FigparseError::DepthExceeded(self.max_depth)));
        }
        // Reversed so the first child is popped first.
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some(Ok((depth, node)))
    }
}

/// Name and description of an entry in the response's component maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Full document fetch as returned by the document source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub document: Option<Node>,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentMeta>,
    #[serde(default)]
    pub component_sets: BTreeMap<String, ComponentMeta>,
}

/// Deepest node nesting a response body may carry. Bodies nested further are refused before
/// decoding; `extraction.max_depth` is capped at this value.
pub const MAX_TREE_DEPTH: usize = 1024;

// Each node level is an object plus its `children` array. The slack covers the response
// wrapper and per-node fields such as `absoluteBoundingBox` or paint lists.
const MAX_JSON_NESTING: usize = 2 * (MAX_TREE_DEPTH + 8);

/// Deepest `{`/`[` nesting in `body`, ignoring brackets inside string literals.
fn json_nesting(body: &str) -> usize {
    let (mut depth, mut deepest) = (0usize, 0usize);
    let (mut in_string, mut escaped) = (false, false);
    for byte in body.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

impl DocumentResponse {
    /// Decodes a raw response body. A JSON `null` body is rejected as absent input.
    pub fn from_json(body: &str) -> Result<Self, FigparseError> {
        Self::decode_with(body, |e| {
            FigparseError::InvalidInput(format!("malformed document response: {e}"))
        })
    }

    /// Decodes a raw response body, mapping syntax and shape errors through `malformed`.
    ///
    /// serde_json's recursion limit is lifted so the tree depth is governed by
    /// [`MAX_TREE_DEPTH`] here and by `max_depth` during the walk. Decoding runs on a growable
    /// stack. Bodies nested beyond the ceiling fail with [`FigparseError::DepthExceeded`].
    pub fn decode_with(
        body: &str,
        malformed: impl FnOnce(serde_json::Error) -> FigparseError,
    ) -> Result<Self, FigparseError> {
        let nesting = json_nesting(body);
        if nesting > MAX_JSON_NESTING {
            tracing::warn!(
                "[DocumentResponse.decode_with] body nests {nesting} levels, refusing to decode"
            );
            return Err(FigparseError::DepthExceeded(MAX_TREE_DEPTH));
        }

        let mut de = serde_json::Deserializer::from_str(body);
        de.disable_recursion_limit();
        let decoded = Option::<DocumentResponse>::deserialize(serde_stacker::Deserializer::new(
            &mut de,
        ))
        .and_then(|maybe| de.end().map(|()| maybe))
        .map_err(malformed)?;
        decoded.ok_or_else(|| FigparseError::InvalidInput("document response is null".to_string()))
    }

    pub fn root(&self) -> Result<&Node, FigparseError> {
        self.document
            .as_ref()
            .ok_or_else(|| FigparseError::InvalidInput("response carries no document".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_DEPTH;
    use test_log::test;

    fn sample_tree() -> Node {
        Node::new("0:0", "Doc", "DOCUMENT").with_children(vec![
            Node::new("1:0", "Page", "CANVAS").with_children(vec![
                Node::new("1:1", "Frame", "FRAME")
                    .with_children(vec![Node::new("1:2", "Leaf", "TEXT")]),
                Node::new("1:3", "Btn", "COMPONENT"),
            ]),
            Node::new("2:0", "Page 2", "CANVAS"),
        ])
    }

    #[test]
    fn test_node_kind_round_trips_open_set() {
        assert_eq!(NodeKind::from("COMPONENT_SET"), NodeKind::ComponentSet);
        assert_eq!(
            NodeKind::from("BOOLEAN_OPERATION"),
            NodeKind::Other("BOOLEAN_OPERATION".into())
        );
        assert_eq!(String::from(NodeKind::Instance), "INSTANCE");
        assert!(NodeKind::Component.is_component());
        assert!(!NodeKind::Instance.is_component());
    }

    #[test]
    fn test_pre_order_visits_parent_before_children() {
        let tree = sample_tree();
        let visited = tree
            .pre_order(16)
            .map(|v| v.map(|(depth, node)| (depth, node.id.clone())))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            visited,
            vec![
                (0, "0:0".to_string()),
                (1, "1:0".to_string()),
                (2, "1:1".to_string()),
                (3, "1:2".to_string()),
                (2, "1:3".to_string()),
                (1, "2:0".to_string()),
            ]
        );
    }

    #[test]
    fn test_pre_order_rejects_excess_depth() {
        let tree = sample_tree();
        let results = tree.pre_order(2).collect::<Vec<_>>();
        assert!(matches!(
            results.last(),
            Some(Err(FigparseError::DepthExceeded(2)))
        ));
        assert!(tree.pre_order(3).all(|v| v.is_ok()));
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut node = Node::new("leaf", "leaf", "RECTANGLE");
        for depth in 0..10_000 {
            node = Node::new(&format!("n{depth}"), "wrap", "FRAME").with_children(vec![node]);
        }
        assert_eq!(node.pre_order(20_000).count(), 10_001);
        assert!(node.pre_order(100).any(|v| v.is_err()));
        // Unwind by hand; the derived Drop is recursive.
        let mut current = Some(node);
        while let Some(mut n) = current {
            current = n.children.pop();
        }
    }

    #[test]
    fn test_find_and_component_ref() {
        let tree = sample_tree();
        assert_eq!(tree.find("1:3", 16).unwrap().map(|n| n.name.as_str()), Some("Btn"));
        assert!(tree.find("9:9", 16).unwrap().is_none());

        let empty_ref = Node::new("5:5", "I", "INSTANCE").with_component_ref("");
        assert_eq!(empty_ref.component_ref(), None);
        let real_ref = Node::new("5:6", "I", "INSTANCE").with_component_ref("1:3");
        assert_eq!(real_ref.component_ref(), Some("1:3"));
    }

    #[test]
    fn test_response_decoding() {
        let body = r#"{
            "name": "Kit",
            "thumbnailUrl": "https://example.test/thumb.png",
            "document": {
                "id": "0:0", "name": "Document", "type": "DOCUMENT",
                "children": [{
                    "id": "1:0", "name": "Page", "type": "CANVAS",
                    "absoluteBoundingBox": {"x": 0, "y": 0, "width": 100, "height": 200},
                    "children": [{"id": "1:1", "name": "I", "type": "INSTANCE", "componentId": "1:9", "visible": false}]
                }]
            },
            "components": {"1:9": {"name": "Btn", "description": "primary"}},
            "styles": {}
        }"#;
        let response = DocumentResponse::from_json(body).unwrap();
        assert_eq!(response.name, "Kit");
        let root = response.root().unwrap();
        assert_eq!(root.kind, NodeKind::Document);
        let instance = &root.children[0].children[0];
        assert_eq!(instance.component_ref(), Some("1:9"));
        assert_eq!(instance.visible, Some(false));
        assert_eq!(response.components["1:9"].description, "primary");

        assert!(matches!(
            DocumentResponse::from_json("null"),
            Err(FigparseError::InvalidInput(_))
        ));
        let no_doc = DocumentResponse::from_json(r#"{"name": "x"}"#).unwrap();
        assert!(matches!(no_doc.root(), Err(FigparseError::InvalidInput(_))));
    }

    /// A DOCUMENT root over a FRAME chain, `levels` nodes deep below the root.
    fn chain_body(levels: usize) -> String {
        let mut body =
            String::from(r#"{"name": "Deep", "document": {"id": "0:0", "type": "DOCUMENT""#);
        for level in 1..=levels {
            body.push_str(&format!(
                r#", "children": [{{"id": "{level}:0", "name": "n\"[{{", "type": "FRAME""#
            ));
        }
        for _ in 0..levels {
            body.push_str("}]");
        }
        body.push_str("}}");
        body
    }

    fn unwind(root: Node) {
        let mut current = Some(root);
        while let Some(mut n) = current {
            current = n.children.pop();
        }
    }

    #[test]
    fn test_json_nesting_skips_string_contents() {
        assert_eq!(json_nesting(r#"{"a": [1, {"b": "}]{["}]}"#), 3);
        assert_eq!(json_nesting(r#"{"a": "\"{"}"#), 1);
        assert_eq!(json_nesting("7"), 0);
    }

    #[test]
    fn test_decoding_is_not_capped_below_max_depth() {
        for levels in [70, 200, DEFAULT_MAX_DEPTH] {
            let response = DocumentResponse::from_json(&chain_body(levels)).unwrap();
            let root = response.document.unwrap();
            let deepest = root
                .pre_order(DEFAULT_MAX_DEPTH)
                .map(|v| v.map(|(depth, _)| depth))
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            assert_eq!(deepest.last(), Some(&levels));
            let leaf = root.find(&format!("{levels}:0"), DEFAULT_MAX_DEPTH).unwrap();
            assert_eq!(leaf.map(|n| n.name.as_str()), Some("n\"[{"));
            unwind(root);
        }
    }

    #[test]
    fn test_decoding_refuses_bodies_past_the_ceiling() {
        let root = DocumentResponse::from_json(&chain_body(MAX_TREE_DEPTH))
            .unwrap()
            .document
            .unwrap();
        assert!(root.pre_order(MAX_TREE_DEPTH).all(|v| v.is_ok()));
        unwind(root);

        assert_eq!(
            DocumentResponse::from_json(&chain_body(MAX_TREE_DEPTH + 32)),
            Err(FigparseError::DepthExceeded(MAX_TREE_DEPTH))
        );
    }
}
