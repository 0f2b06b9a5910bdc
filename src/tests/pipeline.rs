use super::helpers::{init_logging, kit_response, StaticClient};
use crate::{
    client::ApiCredential,
    codec::{ComponentPriority, ExtractionConfig, ParseDiagnostic},
    error::{BatchStage, FigparseError, UpstreamKind},
    persist::BatchState,
    properties::{
        Component, ComponentDraft, DesignFile, FileDraft, Instance, ResolvedInstance,
        PROP_SOURCE_COMPONENT, PROP_VISIBLE,
    },
    service::ParserService,
    store::{DesignSink, DesignSource, DesignStore, MemoryStore, MemoryUnit, UnitOfWork},
};
use serde_json::Value;

const KIT_URL: &str = "https://www.figma.com/file/AbCdEfGhIjKl/Design-Kit";

fn credential() -> ApiCredential {
    ApiCredential::new("figd_test_token").unwrap()
}

#[tokio::test]
async fn test_kit_round_trip() {
    init_logging();
    let client = StaticClient::new(kit_response());
    let service = ParserService::new(client.clone(), MemoryStore::new(), ExtractionConfig::default());

    let persisted = service
        .parse_and_persist(KIT_URL, &credential())
        .await
        .unwrap();
    assert_eq!(*client.requested.lock(), vec!["AbCdEfGhIjKl".to_string()]);
    assert_eq!(persisted.summary.state, BatchState::InstancesSaved);
    assert_eq!(persisted.summary.saved_components(), 4);
    assert_eq!(persisted.summary.saved_instances(), 3);
    assert!(persisted
        .summary
        .diagnostics
        .iter()
        .filter_map(ParseDiagnostic::as_unmatched_reference)
        .any(|u| u.node_id == "4:4" && u.component_ref == "99:1"));

    let details = service.get_details(persisted.file.id).await.unwrap();
    assert_eq!(details.file.name, "Design Kit");
    assert_eq!(details.file.url, KIT_URL);
    assert_eq!(details.file.file_key, "AbCdEfGhIjKl");
    assert_eq!(
        (details.file.canvas_width, details.file.canvas_height),
        (1440.0, 900.0)
    );
    assert!(details.file.active);

    let node_ids = details
        .components
        .iter()
        .map(|c| c.node_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(node_ids, vec!["2:0", "2:1", "2:2", "3:0"]);
    assert_eq!(
        details.components[0].description.as_deref(),
        Some("Primary call to action")
    );
    assert_eq!(details.components[0].kind, "COMPONENT_SET");

    assert_eq!(details.instances.len(), 3);
    for instance in &details.instances {
        let component = details
            .components
            .iter()
            .find(|c| c.id == instance.component_id)
            .unwrap();
        assert_eq!(
            instance.properties.get(PROP_SOURCE_COMPONENT),
            Some(&Value::from(component.node_id.as_str()))
        );
    }
    let hover = details.instances.iter().find(|i| i.node_id == "4:2").unwrap();
    assert_eq!(hover.properties.get(PROP_VISIBLE), Some(&Value::from(false)));
    assert!(hover.active);

    let icon = details.components.iter().find(|c| c.node_id == "3:0").unwrap();
    let icon_instances = service.instances_for_component(icon.id).await.unwrap();
    assert_eq!(icon_instances.len(), 1);
    assert_eq!(icon_instances[0].node_id, "4:3");
}

#[tokio::test]
async fn test_tree_priority_keeps_tree_metadata() {
    init_logging();
    let service = ParserService::new(
        StaticClient::new(kit_response()),
        MemoryStore::new(),
        ExtractionConfig {
            component_priority: ComponentPriority::Tree,
            ..Default::default()
        },
    );
    let persisted = service
        .parse_and_persist(KIT_URL, &credential())
        .await
        .unwrap();
    let components = service.components_for_file(persisted.file.id).await.unwrap();
    let set = components.iter().find(|c| c.node_id == "2:0").unwrap();
    assert_eq!(set.description, None);
    assert_eq!(components.len(), 4);
}

#[tokio::test]
async fn test_bad_input_never_touches_storage() {
    init_logging();
    let store = MemoryStore::new();
    let client = StaticClient::new(kit_response());
    let service = ParserService::new(client.clone(), store.clone(), ExtractionConfig::default());

    assert!(matches!(
        service
            .parse_and_persist("https://example.com/nothing", &credential())
            .await,
        Err(FigparseError::InvalidInput(_))
    ));
    assert!(client.requested.lock().is_empty());

    let forbidden = ParserService::new(
        StaticClient::failing(FigparseError::upstream(UpstreamKind::Forbidden, "no access")),
        store.clone(),
        ExtractionConfig::default(),
    );
    let err = forbidden
        .parse_and_persist(KIT_URL, &credential())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), http::StatusCode::FORBIDDEN);
    assert!(forbidden.check_access(&credential()).await.is_err());

    assert!(store.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_file_lookups() {
    init_logging();
    let service = ParserService::new(
        StaticClient::new(kit_response()),
        MemoryStore::new(),
        ExtractionConfig::default(),
    );
    assert!(matches!(
        service.get_details(404).await,
        Err(FigparseError::NotFound(_))
    ));
    assert!(matches!(
        service.instances_for_file(404).await,
        Err(FigparseError::NotFound(_))
    ));
    assert!(matches!(
        service.instances_for_component(404).await,
        Err(FigparseError::NotFound(_))
    ));
}

/// A memory store whose units refuse the nth component write.
#[derive(Clone)]
struct BrokenStore {
    inner: MemoryStore,
    fail_at: usize,
}

struct BrokenUnit {
    inner: MemoryUnit,
    written: usize,
    fail_at: usize,
}

impl DesignSource for BrokenStore {
    async fn get_file(&self, id: i64) -> Result<DesignFile, FigparseError> {
        self.inner.get_file(id).await
    }

    async fn list_files(&self) -> Result<Vec<DesignFile>, FigparseError> {
        self.inner.list_files().await
    }

    async fn get_component(&self, id: i64) -> Result<Component, FigparseError> {
        self.inner.get_component(id).await
    }

    async fn get_instance(&self, id: i64) -> Result<Instance, FigparseError> {
        self.inner.get_instance(id).await
    }

    async fn list_components(&self, file_id: i64) -> Result<Vec<Component>, FigparseError> {
        self.inner.list_components(file_id).await
    }

    async fn list_instances_by_file(&self, file_id: i64) -> Result<Vec<Instance>, FigparseError> {
        self.inner.list_instances_by_file(file_id).await
    }

    async fn list_instances_by_component(
        &self,
        component_id: i64,
    ) -> Result<Vec<Instance>, FigparseError> {
        self.inner.list_instances_by_component(component_id).await
    }
}

impl DesignStore for BrokenStore {
    type Unit = BrokenUnit;

    async fn begin(&self) -> Result<BrokenUnit, FigparseError> {
        Ok(BrokenUnit {
            inner: self.inner.begin().await?,
            written: 0,
            fail_at: self.fail_at,
        })
    }
}

impl DesignSink for BrokenUnit {
    async fn create_file(&mut self, draft: &FileDraft) -> Result<DesignFile, FigparseError> {
        self.inner.create_file(draft).await
    }

    async fn create_component(
        &mut self,
        file_id: i64,
        draft: &ComponentDraft,
    ) -> Result<Component, FigparseError> {
        if self.written == self.fail_at {
            return Err(FigparseError::Io("write refused".into()));
        }
        self.written += 1;
        self.inner.create_component(file_id, draft).await
    }

    async fn create_instance(
        &mut self,
        instance: &ResolvedInstance,
    ) -> Result<Instance, FigparseError> {
        self.inner.create_instance(instance).await
    }
}

impl UnitOfWork for BrokenUnit {
    async fn commit(self) -> Result<(), FigparseError> {
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), FigparseError> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn test_component_failure_rolls_back_the_whole_batch() {
    init_logging();
    let inner = MemoryStore::new();
    let service = ParserService::new(
        StaticClient::new(kit_response()),
        BrokenStore {
            inner: inner.clone(),
            fail_at: 2,
        },
        ExtractionConfig::default(),
    );
    let err = service
        .parse_and_persist(KIT_URL, &credential())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FigparseError::Persistence {
            stage: BatchStage::Components,
            ..
        }
    ));
    assert!(inner.list_files().await.unwrap().is_empty());
}
