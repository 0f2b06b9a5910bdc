//! Sequencing of storage writes for one [`ParsedBatch`].
//!
//! A batch moves through `Parsed -> FileSaved -> ComponentsSaved -> InstancesSaved`. The file
//! must exist before any component, and every component must exist before the first instance,
//! because instances only learn their component identity once [`ComponentIdMap`] can be built.
//!
//! The persister never rolls anything back. Run it against a unit of work
//! ([`DesignStore::begin`](crate::store::DesignStore::begin)) when partial writes must not
//! survive a failure.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    codec::{ParseDiagnostic, ParsedBatch},
    error::{BatchStage, FigparseError},
    properties::DesignFile,
    resolve::ComponentIdMap,
    store::DesignSink,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchState {
    #[default]
    Parsed,
    FileSaved,
    ComponentsSaved,
    InstancesSaved,
    Failed(BatchStage),
}

impl Display for BatchState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            BatchState::Parsed => write!(f, "parsed"),
            BatchState::FileSaved => write!(f, "file saved"),
            BatchState::ComponentsSaved => write!(f, "components saved"),
            BatchState::InstancesSaved => write!(f, "instances saved"),
            BatchState::Failed(stage) => write!(f, "failed at {stage}"),
        }
    }
}

/// What happened to one component or instance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowOutcome {
    Saved { node_id: String, id: i64 },
    Skipped { node_id: String, reason: String },
    Failed { node_id: String, reason: String },
}

impl RowOutcome {
    pub fn node_id(&self) -> &str {
        match self {
            RowOutcome::Saved { node_id, .. }
            | RowOutcome::Skipped { node_id, .. }
            | RowOutcome::Failed { node_id, .. } => node_id,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, RowOutcome::Saved { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub state: BatchState,
    pub components: Vec<RowOutcome>,
    pub instances: Vec<RowOutcome>,
    /// Carried over from extraction
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl BatchSummary {
    pub fn saved_components(&self) -> usize {
        self.components.iter().filter(|o| o.is_saved()).count()
    }

    pub fn saved_instances(&self) -> usize {
        self.instances.iter().filter(|o| o.is_saved()).count()
    }

    pub fn skipped_instances(&self) -> impl Iterator<Item = &RowOutcome> {
        self.instances
            .iter()
            .filter(|o| matches!(o, RowOutcome::Skipped { .. }))
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: {}/{} components, {}/{} instances, {} diagnostics",
            self.state,
            self.saved_components(),
            self.components.len(),
            self.saved_instances(),
            self.instances.len(),
            self.diagnostics.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBatch {
    pub file: DesignFile,
    pub summary: BatchSummary,
}

/// Drives one batch through a [`DesignSink`].
///
/// The persister keeps its [`BatchState`] and [`BatchSummary`] after a failure, so callers can
/// report how far the batch got.
#[derive(Debug)]
pub struct BatchPersister<'s, S: DesignSink> {
    sink: &'s mut S,
    summary: BatchSummary,
}

impl<'s, S: DesignSink> BatchPersister<'s, S> {
    pub fn new(sink: &'s mut S) -> Self {
        BatchPersister {
            sink,
            summary: BatchSummary::default(),
        }
    }

    pub fn state(&self) -> BatchState {
        self.summary.state
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }

    pub fn into_summary(self) -> BatchSummary {
        self.summary
    }

    fn fail(&mut self, stage: BatchStage, err: FigparseError) -> FigparseError {
        self.summary.state = BatchState::Failed(stage);
        let err = err.at_stage(stage);
        tracing::error!("[BatchPersister] {err}");
        err
    }

    pub async fn persist(&mut self, batch: ParsedBatch) -> Result<DesignFile, FigparseError> {
        if self.summary.state != BatchState::Parsed {
            return Err(FigparseError::InvalidInput(format!(
                "batch persister already used (state: {})",
                self.summary.state
            )));
        }
        let ParsedBatch {
            file: file_draft,
            components,
            instances,
            diagnostics,
        } = batch;
        self.summary.diagnostics = diagnostics;

        let file = match self.sink.create_file(&file_draft).await {
            Ok(file) => file,
            Err(e) => return Err(self.fail(BatchStage::File, e)),
        };
        self.summary.state = BatchState::FileSaved;
        tracing::debug!("[BatchPersister.persist] file '{}' saved as {}", file.name, file.id);

        let mut persisted = Vec::with_capacity(components.len());
        for draft in components.iter() {
            match self.sink.create_component(file.id, draft).await {
                Ok(component) => {
                    self.summary.components.push(RowOutcome::Saved {
                        node_id: component.node_id.clone(),
                        id: component.id,
                    });
                    persisted.push(component);
                }
                Err(e) => {
                    self.summary.components.push(RowOutcome::Failed {
                        node_id: draft.node_id.clone(),
                        reason: e.to_string(),
                    });
                    return Err(self.fail(BatchStage::Components, e));
                }
            }
        }
        self.summary.state = BatchState::ComponentsSaved;

        let id_map = match ComponentIdMap::from_persisted(&components, &persisted) {
            Ok(id_map) => id_map,
            Err(e) => return Err(self.fail(BatchStage::Instances, e)),
        };

        for draft in instances {
            let node_id = draft.node_id.clone();
            let resolved = match id_map.resolve_instance(draft) {
                Ok(resolved) => resolved,
                Err(miss) => {
                    tracing::warn!("[BatchPersister.persist] skipping instance: {miss}");
                    self.summary.instances.push(RowOutcome::Skipped {
                        node_id,
                        reason: miss.to_string(),
                    });
                    continue;
                }
            };
            match self.sink.create_instance(&resolved).await {
                Ok(instance) => self.summary.instances.push(RowOutcome::Saved {
                    node_id,
                    id: instance.id,
                }),
                Err(e) => {
                    self.summary.instances.push(RowOutcome::Failed {
                        node_id,
                        reason: e.to_string(),
                    });
                    return Err(self.fail(BatchStage::Instances, e));
                }
            }
        }
        self.summary.state = BatchState::InstancesSaved;
        tracing::info!("[BatchPersister.persist] file {}: {}", file.id, self.summary);
        Ok(file)
    }
}

/// Persists `batch` through `sink` in one go.
pub async fn persist_batch<S: DesignSink>(
    sink: &mut S,
    batch: ParsedBatch,
) -> Result<PersistedBatch, FigparseError> {
    let mut persister = BatchPersister::new(sink);
    let file = persister.persist(batch).await?;
    Ok(PersistedBatch {
        file,
        summary: persister.into_summary(),
    })
}
