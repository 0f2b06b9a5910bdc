//! The fetch, extract and persist pipeline, plus the read helpers built on the store.

use crate::{
    client::{extract_file_key, ApiCredential, DocumentClient},
    codec::{BatchBuilder, ExtractionConfig, SourceRef},
    error::{BatchStage, FigparseError},
    persist::{persist_batch, PersistedBatch},
    properties::{Component, DesignFile, FileDetails, Instance},
    store::{DesignStore, UnitOfWork},
};

#[derive(Debug, Clone)]
pub struct ParserService<C, S> {
    client: C,
    store: S,
    builder: BatchBuilder,
}

impl<C, S> ParserService<C, S>
where
    C: DocumentClient,
    S: DesignStore,
{
    pub fn new(client: C, store: S, extraction: ExtractionConfig) -> Self {
        ParserService {
            client,
            store,
            builder: BatchBuilder::new(extraction),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetches the document behind `url`, extracts it and writes the batch in one unit of work.
    ///
    /// Fetch and extraction failures happen before storage is touched. A storage failure rolls
    /// the unit of work back, so no partial batch is ever visible.
    #[tracing::instrument(skip(self, credential))]
    pub async fn parse_and_persist(
        &self,
        url: &str,
        credential: &ApiCredential,
    ) -> Result<PersistedBatch, FigparseError> {
        let file_key = extract_file_key(url)?;
        let response = self.client.fetch_document(&file_key, credential).await?;
        let batch = self
            .builder
            .build(&response, &SourceRef::new(url.trim(), file_key))?;

        let mut unit = self
            .store
            .begin()
            .await
            .map_err(|e| e.at_stage(BatchStage::File))?;
        match persist_batch(&mut unit, batch).await {
            Ok(persisted) => {
                unit.commit()
                    .await
                    .map_err(|e| e.at_stage(BatchStage::Instances))?;
                tracing::info!(
                    "[ParserService.parse_and_persist] committed file {}: {}",
                    persisted.file.id,
                    persisted.summary
                );
                Ok(persisted)
            }
            Err(e) => {
                tracing::warn!("[ParserService.parse_and_persist] rolling back: {e}");
                if let Err(rollback_err) = unit.rollback().await {
                    tracing::error!(
                        "[ParserService.parse_and_persist] rollback failed: {rollback_err}"
                    );
                }
                Err(e)
            }
        }
    }

    /// Validates a credential against the document source.
    pub async fn check_access(&self, credential: &ApiCredential) -> Result<(), FigparseError> {
        self.client.check_access(credential).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_details(&self, file_id: i64) -> Result<FileDetails, FigparseError> {
        let file = self.store.get_file(file_id).await?;
        let components = self.store.list_components(file_id).await?;
        let instances = self.store.list_instances_by_file(file_id).await?;
        Ok(FileDetails {
            file,
            components,
            instances,
        })
    }

    pub async fn list_files(&self) -> Result<Vec<DesignFile>, FigparseError> {
        self.store.list_files().await
    }

    pub async fn components_for_file(&self, file_id: i64) -> Result<Vec<Component>, FigparseError> {
        self.store.get_file(file_id).await?;
        self.store.list_components(file_id).await
    }

    pub async fn instances_for_file(&self, file_id: i64) -> Result<Vec<Instance>, FigparseError> {
        self.store.get_file(file_id).await?;
        self.store.list_instances_by_file(file_id).await
    }

    pub async fn instances_for_component(
        &self,
        component_id: i64,
    ) -> Result<Vec<Instance>, FigparseError> {
        self.store.get_component(component_id).await?;
        self.store.list_instances_by_component(component_id).await
    }
}
