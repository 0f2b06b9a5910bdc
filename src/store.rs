//! Storage seams.
//!
//! Writes go through a [`DesignSink`], always inside a unit of work obtained from
//! [`DesignStore::begin`]. Reads go through [`DesignSource`]. [`MemoryStore`] is the in-process
//! implementation; the SQLite one lives in [`crate::db`].

use parking_lot::Mutex;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use crate::{
    error::FigparseError,
    properties::{
        unix_now, Component, ComponentDraft, DesignFile, FileDraft, Instance, ResolvedInstance,
    },
};

/// Write side. Every method returns the persisted row, storage identity included.
pub trait DesignSink: Send {
    fn create_file(
        &mut self,
        draft: &FileDraft,
    ) -> impl Future<Output = Result<DesignFile, FigparseError>> + Send;

    fn create_component(
        &mut self,
        file_id: i64,
        draft: &ComponentDraft,
    ) -> impl Future<Output = Result<Component, FigparseError>> + Send;

    fn create_instance(
        &mut self,
        instance: &ResolvedInstance,
    ) -> impl Future<Output = Result<Instance, FigparseError>> + Send;
}

/// Read side.
pub trait DesignSource: Sync {
    fn get_file(&self, id: i64) -> impl Future<Output = Result<DesignFile, FigparseError>> + Send;

    fn list_files(&self) -> impl Future<Output = Result<Vec<DesignFile>, FigparseError>> + Send;

    fn get_component(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Component, FigparseError>> + Send;

    fn get_instance(&self, id: i64)
        -> impl Future<Output = Result<Instance, FigparseError>> + Send;

    /// Active components of a file, by z-order then id.
    fn list_components(
        &self,
        file_id: i64,
    ) -> impl Future<Output = Result<Vec<Component>, FigparseError>> + Send;

    /// Active instances of every component of a file, by id.
    fn list_instances_by_file(
        &self,
        file_id: i64,
    ) -> impl Future<Output = Result<Vec<Instance>, FigparseError>> + Send;

    /// Active instances of one component, by id.
    fn list_instances_by_component(
        &self,
        component_id: i64,
    ) -> impl Future<Output = Result<Vec<Instance>, FigparseError>> + Send;
}

/// A batch of writes that becomes visible all at once or not at all.
pub trait UnitOfWork: Send {
    fn commit(self) -> impl Future<Output = Result<(), FigparseError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), FigparseError>> + Send;
}

pub trait DesignStore: DesignSource + Send {
    type Unit: DesignSink + UnitOfWork;

    fn begin(&self) -> impl Future<Output = Result<Self::Unit, FigparseError>> + Send;
}

#[derive(Debug, Default)]
struct Tables {
    files: Vec<DesignFile>,
    components: Vec<Component>,
    instances: Vec<Instance>,
}

impl Tables {
    fn has_file(&self, id: i64) -> bool {
        self.files.iter().any(|f| f.id == id)
    }

    fn has_component(&self, id: i64) -> bool {
        self.components.iter().any(|c| c.id == id)
    }

    fn has_active_node(&self, file_id: i64, node_id: &str) -> bool {
        self.components
            .iter()
            .any(|c| c.active && c.file_id == file_id && c.node_id == node_id)
    }
}

#[derive(Debug, Default)]
struct Sequences {
    file: AtomicI64,
    component: AtomicI64,
    instance: AtomicI64,
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

/// Process-local store. Clones share the same tables.
///
/// Identities come from per-table sequences and are never reused, even when a unit of work is
/// rolled back.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    sequences: Arc<Sequences>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl DesignSource for MemoryStore {
    async fn get_file(&self, id: i64) -> Result<DesignFile, FigparseError> {
        self.tables
            .lock()
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| FigparseError::NotFound(format!("file {id}")))
    }

    async fn list_files(&self) -> Result<Vec<DesignFile>, FigparseError> {
        Ok(self.tables.lock().files.clone())
    }

    async fn get_component(&self, id: i64) -> Result<Component, FigparseError> {
        self.tables
            .lock()
            .components
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| FigparseError::NotFound(format!("component {id}")))
    }

    async fn get_instance(&self, id: i64) -> Result<Instance, FigparseError> {
        self.tables
            .lock()
            .instances
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| FigparseError::NotFound(format!("instance {id}")))
    }

    async fn list_components(&self, file_id: i64) -> Result<Vec<Component>, FigparseError> {
        let mut components = self
            .tables
            .lock()
            .components
            .iter()
            .filter(|c| c.active && c.file_id == file_id)
            .cloned()
            .collect::<Vec<_>>();
        components.sort_by_key(|c| (c.z_index, c.id));
        Ok(components)
    }

    async fn list_instances_by_file(&self, file_id: i64) -> Result<Vec<Instance>, FigparseError> {
        let tables = self.tables.lock();
        let mut instances = tables
            .instances
            .iter()
            .filter(|i| {
                i.active
                    && tables.components.iter().any(|c| {
                        c.active && c.id == i.component_id && c.file_id == file_id
                    })
            })
            .cloned()
            .collect::<Vec<_>>();
        instances.sort_by_key(|i| i.id);
        Ok(instances)
    }

    async fn list_instances_by_component(
        &self,
        component_id: i64,
    ) -> Result<Vec<Instance>, FigparseError> {
        let mut instances = self
            .tables
            .lock()
            .instances
            .iter()
            .filter(|i| i.active && i.component_id == component_id)
            .cloned()
            .collect::<Vec<_>>();
        instances.sort_by_key(|i| i.id);
        Ok(instances)
    }
}

impl DesignStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, FigparseError> {
        Ok(MemoryUnit {
            store: self.clone(),
            staged: Tables::default(),
        })
    }
}

/// Writes staged against a [`MemoryStore`]. Nothing is visible to readers until
/// [`UnitOfWork::commit`]. Dropping the unit discards it.
#[derive(Debug)]
pub struct MemoryUnit {
    store: MemoryStore,
    staged: Tables,
}

impl DesignSink for MemoryUnit {
    async fn create_file(&mut self, draft: &FileDraft) -> Result<DesignFile, FigparseError> {
        let file = DesignFile::from_draft(next_id(&self.store.sequences.file), draft, unix_now());
        tracing::debug!("[MemoryUnit.create_file] staged file {}", file.id);
        self.staged.files.push(file.clone());
        Ok(file)
    }

    async fn create_component(
        &mut self,
        file_id: i64,
        draft: &ComponentDraft,
    ) -> Result<Component, FigparseError> {
        {
            let committed = self.store.tables.lock();
            if !committed.has_file(file_id) && !self.staged.has_file(file_id) {
                return Err(FigparseError::NotFound(format!("file {file_id}")));
            }
            if committed.has_active_node(file_id, &draft.node_id)
                || self.staged.has_active_node(file_id, &draft.node_id)
            {
                return Err(FigparseError::InvalidInput(format!(
                    "component node '{}' already exists in file {file_id}",
                    draft.node_id
                )));
            }
        }
        let component = Component::from_draft(
            next_id(&self.store.sequences.component),
            file_id,
            draft,
            unix_now(),
        );
        self.staged.components.push(component.clone());
        Ok(component)
    }

    async fn create_instance(
        &mut self,
        instance: &ResolvedInstance,
    ) -> Result<Instance, FigparseError> {
        let known = self.staged.has_component(instance.component_id)
            || self.store.tables.lock().has_component(instance.component_id);
        if !known {
            return Err(FigparseError::NotFound(format!(
                "component {}",
                instance.component_id
            )));
        }
        let row = Instance::from_resolved(
            next_id(&self.store.sequences.instance),
            instance,
            unix_now(),
        );
        self.staged.instances.push(row.clone());
        Ok(row)
    }
}

impl UnitOfWork for MemoryUnit {
    async fn commit(self) -> Result<(), FigparseError> {
        let MemoryUnit { store, staged } = self;
        let mut tables = store.tables.lock();
        tracing::debug!(
            "[MemoryUnit.commit] {} files, {} components, {} instances",
            staged.files.len(),
            staged.components.len(),
            staged.instances.len()
        );
        tables.files.extend(staged.files);
        tables.components.extend(staged.components);
        tables.instances.extend(staged.instances);
        Ok(())
    }

    async fn rollback(self) -> Result<(), FigparseError> {
        tracing::debug!(
            "[MemoryUnit.rollback] discarding {} staged rows",
            self.staged.files.len() + self.staged.components.len() + self.staged.instances.len()
        );
        Ok(())
    }
}
