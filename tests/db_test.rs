//! SQLite storage round trips.
#![cfg(feature = "service")]

mod common;

use common::{credential, init_logging, FixtureClient, FIXTURE_KEY, FIXTURE_URL};
use figparse_core::{
    codec::ExtractionConfig,
    db::db_init,
    properties::{ComponentDraft, FileDraft, ResolvedInstance, PROP_SOURCE_COMPONENT},
    service::ParserService,
    store::{DesignSink, DesignSource, DesignStore, UnitOfWork},
    FigparseError,
};
use serde_json::Value;
use tempfile::TempDir;

#[tokio::test]
async fn test_sqlite_batch_round_trip() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let db = db_init(&temp_dir.path().join("figparse.db")).await.unwrap();
    let service = ParserService::new(FixtureClient, db.clone(), ExtractionConfig::default());

    let persisted = service
        .parse_and_persist(FIXTURE_URL, &credential())
        .await
        .unwrap();
    let details = service.get_details(persisted.file.id).await.unwrap();

    assert_eq!(details.file.file_key, FIXTURE_KEY);
    assert_eq!(details.file.canvas_width, 1280.0);
    assert!(details.file.active);
    assert_eq!(details.components.len(), 4);
    assert_eq!(details.instances.len(), 3);

    let card = details
        .components
        .iter()
        .find(|c| c.node_id == "10:1")
        .unwrap();
    assert_eq!(card.description.as_deref(), Some("Content card"));
    assert_eq!(card.geometry.width, 320.0);
    assert_eq!(
        card.properties.get("node_type"),
        Some(&Value::from("COMPONENT"))
    );

    let nested = details
        .instances
        .iter()
        .find(|i| i.node_id == "I20:2;11:9")
        .unwrap();
    let tag = db.get_component(nested.component_id).await.unwrap();
    assert_eq!(tag.node_id, "11:2");
    assert_eq!(
        nested.properties.get(PROP_SOURCE_COMPONENT),
        Some(&Value::from("11:2"))
    );

    // Reopening the same file keeps the rows.
    drop(service);
    db.0.close().await;
    let reopened = db_init(&temp_dir.path().join("figparse.db")).await.unwrap();
    assert_eq!(reopened.list_files().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sqlite_rollback_and_constraints() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let db = db_init(&temp_dir.path().join("figparse.db")).await.unwrap();

    let draft = ComponentDraft {
        node_id: "1:1".into(),
        name: "Button".into(),
        kind: "COMPONENT".into(),
        ..Default::default()
    };

    let mut unit = db.begin().await.unwrap();
    let file = unit
        .create_file(&FileDraft {
            name: "Scratch".into(),
            file_key: "ScratchKey000".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    unit.create_component(file.id, &draft).await.unwrap();
    // Same node twice in one file violates the unique index.
    assert!(unit.create_component(file.id, &draft).await.is_err());
    unit.rollback().await.unwrap();

    assert!(db.list_files().await.unwrap().is_empty());
    assert!(matches!(
        db.get_file(file.id).await,
        Err(FigparseError::NotFound(_))
    ));

    let mut unit = db.begin().await.unwrap();
    let dangling = ResolvedInstance {
        component_id: 4242,
        node_id: "9:9".into(),
        name: "Ghost".into(),
        ..Default::default()
    };
    assert!(unit.create_instance(&dangling).await.is_err());
    unit.rollback().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_file_instances_follow_component_activity() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let db = db_init(&temp_dir.path().join("figparse.db")).await.unwrap();
    let service = ParserService::new(FixtureClient, db.clone(), ExtractionConfig::default());
    let persisted = service
        .parse_and_persist(FIXTURE_URL, &credential())
        .await
        .unwrap();
    assert_eq!(
        service.instances_for_file(persisted.file.id).await.unwrap().len(),
        3
    );

    sqlx::query("UPDATE components SET active = 0 WHERE file_id = ? AND node_id = '11:2'")
        .bind(persisted.file.id)
        .execute(&db.0)
        .await
        .unwrap();

    let remaining = service.instances_for_file(persisted.file.id).await.unwrap();
    assert_eq!(
        remaining.iter().map(|i| i.node_id.as_str()).collect::<Vec<_>>(),
        vec!["20:2", "20:3"]
    );
}
