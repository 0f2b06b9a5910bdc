//! Two-phase component reference resolution.
//!
//! Components only receive a storage identity once they are written, but instances have to
//! point at a component long before that. Resolution therefore happens twice:
//!
//! 1. At extraction time every instance gets a [`ProvisionalId`]: the 1-based position of its
//!    component in the deduplicated component list ([`ProvisionalIndex`]).
//! 2. After every component has been written, in submission order, [`ComponentIdMap`] pairs
//!    each position with the identity storage handed back and rewrites instances into
//!    [`ResolvedInstance`]s.
//!
//! Provisional ids live in their own value space and are never persisted. The mapping is purely
//! positional, so [`ComponentIdMap::from_persisted`] refuses to build unless the persisted list
//! lines up one-for-one with what was submitted.

use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
};

use crate::{
    error::{BatchStage, FigparseError},
    properties::{Component, ComponentDraft, InstanceDraft, ResolvedInstance},
};

/// Position-based placeholder for a component that has no storage identity yet. `0` means
/// unresolved.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProvisionalId(u32);

impl ProvisionalId {
    pub const UNRESOLVED: ProvisionalId = ProvisionalId(0);

    /// Placeholder for the component at zero-based `index` of the deduplicated list.
    pub fn from_position(index: usize) -> Self {
        ProvisionalId(u32::try_from(index + 1).unwrap_or(0))
    }

    pub fn from_raw(raw: u32) -> Self {
        ProvisionalId(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_unresolved(self) -> bool {
        self.0 == 0
    }

    fn position(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl Display for ProvisionalId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Phase 1: source node id -> provisional id, over a deduplicated component list.
#[derive(Debug, Default)]
pub struct ProvisionalIndex<'a> {
    slots: HashMap<&'a str, ProvisionalId>,
}

impl<'a> ProvisionalIndex<'a> {
    pub fn new(components: &'a [ComponentDraft]) -> Self {
        let mut slots = HashMap::with_capacity(components.len());
        for (index, component) in components.iter().enumerate() {
            // First occurrence wins, matching deduplication.
            slots
                .entry(component.node_id.as_str())
                .or_insert_with(|| ProvisionalId::from_position(index));
        }
        ProvisionalIndex { slots }
    }

    pub fn lookup(&self, node_id: &str) -> ProvisionalId {
        self.slots
            .get(node_id)
            .copied()
            .unwrap_or(ProvisionalId::UNRESOLVED)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Phase 2: provisional id -> storage identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentIdMap {
    real: Vec<i64>,
}

impl ComponentIdMap {
    /// Pairs list positions with storage identities, in the order components were submitted.
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        ComponentIdMap {
            real: ids.into_iter().collect(),
        }
    }

    /// Builds the map from the submitted drafts and the rows storage returned for them.
    ///
    /// Fails if the two lists differ in length or if any position holds a different source
    /// node; either means the positional pairing can no longer be trusted.
    pub fn from_persisted(
        submitted: &[ComponentDraft],
        persisted: &[Component],
    ) -> Result<Self, FigparseError> {
        if submitted.len() != persisted.len() {
            return Err(FigparseError::Persistence {
                stage: BatchStage::Instances,
                message: format!(
                    "component id map out of step: {} submitted, {} persisted",
                    submitted.len(),
                    persisted.len()
                ),
            });
        }
        if let Some((position, (draft, row))) = submitted
            .iter()
            .zip(persisted)
            .enumerate()
            .find(|(_, (draft, row))| draft.node_id != row.node_id)
        {
            return Err(FigparseError::Persistence {
                stage: BatchStage::Instances,
                message: format!(
                    "component id map out of order at position {}: submitted '{}', persisted '{}'",
                    position + 1,
                    draft.node_id,
                    row.node_id
                ),
            });
        }
        Ok(ComponentIdMap::from_ids(persisted.iter().map(|c| c.id)))
    }

    pub fn resolve(&self, provisional: ProvisionalId) -> Option<i64> {
        provisional
            .position()
            .and_then(|position| self.real.get(position))
            .copied()
    }

    /// Rewrites a draft with the real component identity, or reports a miss.
    pub fn resolve_instance(
        &self,
        draft: InstanceDraft,
    ) -> Result<ResolvedInstance, FigparseError> {
        match self.resolve(draft.component) {
            Some(component_id) => Ok(ResolvedInstance {
                component_id,
                node_id: draft.node_id,
                name: draft.name,
                geometry: draft.geometry,
                properties: draft.properties,
            }),
            None => Err(FigparseError::ResolutionMiss {
                node_id: draft.node_id,
                provisional: draft.component.get(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }
}
