use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    codec::{
        dedup::dedup_by_node_id,
        diagnostic::{ParseDiagnostic, UnmatchedReference},
        dimensions::canvas_dimensions,
        node::{ComponentMeta, DocumentResponse, Node, NodeKind},
    },
    config::{ComponentPriority, ExtractionConfig},
    error::FigparseError,
    properties::{
        unix_now, ComponentDraft, FileDraft, InstanceDraft, PropertyBag, PROP_NODE_TYPE,
        PROP_SOURCE_COMPONENT, PROP_VISIBLE,
    },
    resolve::ProvisionalIndex,
};

/// Everything one extraction pass produces, ready to hand to the persistence orchestrator.
///
/// `components` and `instances` are deduplicated by source node id. Each instance's provisional
/// component id is a 1-based position into `components`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedBatch {
    pub file: FileDraft,
    pub components: Vec<ComponentDraft>,
    pub instances: Vec<InstanceDraft>,
    /// Nodes the pass chose to leave out, and why
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParsedBatch {
    pub fn add_diagnostic(&mut self, diagnostic: ParseDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn unmatched_references(&self) -> impl Iterator<Item = &UnmatchedReference> {
        self.diagnostics
            .iter()
            .filter_map(ParseDiagnostic::as_unmatched_reference)
    }
}

/// Where the document came from. Carried onto the file draft verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRef {
    pub url: String,
    pub file_key: String,
}

impl SourceRef {
    pub fn new(url: impl Into<String>, file_key: impl Into<String>) -> Self {
        SourceRef {
            url: url.into(),
            file_key: file_key.into(),
        }
    }
}

/// BatchBuilder turns one fetched document into a [`ParsedBatch`].
///
/// The pass is pure: it reads the response, never touches storage, and never fails on a single
/// node. Whole-document problems (no root, a root that is not DOCUMENT, a tree deeper than
/// [`ExtractionConfig::max_depth`]) abort it.
///
/// Order matters throughout. Components are collected from the API component maps and from
/// the tree, concatenated according to [`ComponentPriority`], then deduplicated with the first
/// record winning. Instances are only extracted once that list is final, because their
/// provisional component ids are positions in it.
#[derive(Debug, Clone, Default)]
pub struct BatchBuilder {
    config: ExtractionConfig,
}

impl BatchBuilder {
    pub fn new(config: ExtractionConfig) -> Self {
        BatchBuilder { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    #[tracing::instrument(skip(self, response), fields(file_key = %source.file_key))]
    pub fn build(
        &self,
        response: &DocumentResponse,
        source: &SourceRef,
    ) -> Result<ParsedBatch, FigparseError> {
        let root = response.root()?;
        let canvas = canvas_dimensions(root, self.config.max_depth)?;

        let mut batch = ParsedBatch {
            file: FileDraft {
                name: response.name.clone(),
                url: source.url.clone(),
                file_key: source.file_key.clone(),
                image_url: response.thumbnail_url.clone(),
                canvas_width: canvas.width,
                canvas_height: canvas.height,
                parsed_at: unix_now(),
            },
            ..Default::default()
        };

        let from_api = self.extract_api_components(response, root)?;
        let from_tree = self.extract_tree_components(root, &mut batch.diagnostics)?;
        let combined = match self.config.component_priority {
            ComponentPriority::ApiMap => [from_api, from_tree].concat(),
            ComponentPriority::Tree => [from_tree, from_api].concat(),
        };
        let before = combined.len();
        batch.components = dedup_by_node_id(combined);
        if before > batch.components.len() {
            batch.add_diagnostic(ParseDiagnostic::Duplicates {
                kind: "component".to_string(),
                dropped: before - batch.components.len(),
            });
        }

        let instances = self.extract_instances(root, &batch.components, &mut batch.diagnostics)?;
        let before = instances.len();
        batch.instances = dedup_by_node_id(instances);
        if before > batch.instances.len() {
            batch.add_diagnostic(ParseDiagnostic::Duplicates {
                kind: "instance".to_string(),
                dropped: before - batch.instances.len(),
            });
        }

        tracing::info!(
            "[BatchBuilder.build] '{}': {} components, {} instances, {} diagnostics",
            batch.file.name,
            batch.components.len(),
            batch.instances.len(),
            batch.diagnostics.len()
        );
        Ok(batch)
    }

    /// Every COMPONENT and COMPONENT_SET node in pre-order. Nested components are all visited.
    pub fn extract_tree_components(
        &self,
        root: &Node,
        diagnostics: &mut Vec<ParseDiagnostic>,
    ) -> Result<Vec<ComponentDraft>, FigparseError> {
        let mut components = Vec::new();
        for visit in root.pre_order(self.config.max_depth) {
            let (_, node) = visit?;
            if !node.kind.is_component() {
                continue;
            }
            if node.id.is_empty() {
                diagnostics.push(ParseDiagnostic::warning(format!(
                    "{} node '{}' has no id and was skipped",
                    node.kind, node.name
                )));
                continue;
            }
            tracing::debug!(
                "[BatchBuilder.extract_tree_components] {} {} '{}'",
                node.kind,
                node.id,
                node.name
            );
            components.push(component_from_node(node));
        }
        Ok(components)
    }

    /// Drafts for the response's `components` map, then its `componentSets` map. Geometry and
    /// properties are borrowed from the tree node with the same id when there is one.
    pub fn extract_api_components(
        &self,
        response: &DocumentResponse,
        root: &Node,
    ) -> Result<Vec<ComponentDraft>, FigparseError> {
        let mut components = Vec::with_capacity(response.components.len());
        let sources = [
            (NodeKind::Component, &response.components),
            (NodeKind::ComponentSet, &response.component_sets),
        ];
        for (kind, map) in sources {
            for (node_id, meta) in map.iter() {
                let found = root.find(node_id, self.config.max_depth)?;
                if found.is_none() {
                    tracing::debug!(
                        "[BatchBuilder.extract_api_components] {} {} not present in tree",
                        kind,
                        node_id
                    );
                }
                components.push(component_from_meta(node_id, &kind, meta, found));
            }
        }
        Ok(components)
    }

    /// INSTANCE nodes whose component reference names one of `components`.
    ///
    /// Empty and unmatched references are recorded in `diagnostics` and skipped.
    pub fn extract_instances(
        &self,
        root: &Node,
        components: &[ComponentDraft],
        diagnostics: &mut Vec<ParseDiagnostic>,
    ) -> Result<Vec<InstanceDraft>, FigparseError> {
        let index = ProvisionalIndex::new(components);
        let mut instances = Vec::new();
        for visit in root.pre_order(self.config.max_depth) {
            let (_, node) = visit?;
            if node.kind != NodeKind::Instance {
                continue;
            }
            let Some(component_ref) = node.component_ref() else {
                tracing::debug!(
                    "[BatchBuilder.extract_instances] {} has no component reference",
                    node.id
                );
                diagnostics.push(ParseDiagnostic::MissingReference {
                    node_id: node.id.clone(),
                });
                continue;
            };
            let provisional = index.lookup(component_ref);
            if provisional.is_unresolved() {
                tracing::debug!(
                    "[BatchBuilder.extract_instances] {} references unknown component {}",
                    node.id,
                    component_ref
                );
                diagnostics.push(ParseDiagnostic::UnmatchedReference(UnmatchedReference {
                    node_id: node.id.clone(),
                    name: node.name.clone(),
                    component_ref: component_ref.to_string(),
                }));
                continue;
            }

            let mut properties = PropertyBag::new();
            properties.insert(
                PROP_SOURCE_COMPONENT.to_string(),
                Value::from(component_ref),
            );
            if let Some(visible) = node.visible {
                properties.insert(PROP_VISIBLE.to_string(), Value::from(visible));
            }
            instances.push(InstanceDraft {
                component: provisional,
                node_id: node.id.clone(),
                name: node.name.clone(),
                geometry: node.absolute_bounding_box.unwrap_or_default(),
                properties,
            });
        }
        Ok(instances)
    }
}

fn node_properties(node: &Node) -> PropertyBag {
    let mut properties = PropertyBag::new();
    if let Some(visible) = node.visible {
        properties.insert(PROP_VISIBLE.to_string(), Value::from(visible));
    }
    if !node.kind.as_str().is_empty() {
        properties.insert(PROP_NODE_TYPE.to_string(), Value::from(node.kind.as_str()));
    }
    properties
}

fn component_from_node(node: &Node) -> ComponentDraft {
    ComponentDraft {
        node_id: node.id.clone(),
        name: node.name.clone(),
        kind: node.kind.to_string(),
        description: None,
        geometry: node.absolute_bounding_box.unwrap_or_default(),
        z_index: 0,
        properties: node_properties(node),
    }
}

fn component_from_meta(
    node_id: &str,
    kind: &NodeKind,
    meta: &ComponentMeta,
    node: Option<&Node>,
) -> ComponentDraft {
    ComponentDraft {
        node_id: node_id.to_string(),
        name: meta.name.clone(),
        kind: kind.to_string(),
        description: Some(meta.description.clone()).filter(|d| !d.is_empty()),
        geometry: node
            .and_then(|n| n.absolute_bounding_box)
            .unwrap_or_default(),
        z_index: 0,
        properties: node.map(node_properties).unwrap_or_default(),
    }
}
