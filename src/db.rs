use crate::{
    error::FigparseError,
    properties::{
        unix_now, Component, ComponentDraft, DesignFile, FileDraft, Instance, ResolvedInstance,
    },
    store::{DesignSink, DesignSource, DesignStore, UnitOfWork},
};
use futures_core::future::BoxFuture;
use sqlx::{
    error::BoxDynError,
    migrate::{Migration as SqlxMigration, MigrationSource, MigrationType, Migrator},
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions},
    ConnectOptions, Pool, Row,
};
use std::{path::Path, result::Result};

pub const DEFAULT_POOL_SIZE: u32 = 4;

#[derive(Debug, Clone)]
pub struct DbConnection(pub Pool<Sqlite>);

fn log_sql_error(context: &'static str) -> impl Fn(sqlx::Error) -> FigparseError {
    move |e| {
        tracing::error!("[DbConnection.{context}] {e}");
        FigparseError::from(e)
    }
}

impl DesignSource for DbConnection {
    #[tracing::instrument(skip(self))]
    async fn get_file(&self, id: i64) -> Result<DesignFile, FigparseError> {
        sqlx::query_as::<_, DesignFile>("SELECT * FROM design_files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.0)
            .await
            .map_err(log_sql_error("get_file"))?
            .ok_or_else(|| FigparseError::NotFound(format!("file {id}")))
    }

    async fn list_files(&self) -> Result<Vec<DesignFile>, FigparseError> {
        Ok(
            sqlx::query_as::<_, DesignFile>("SELECT * FROM design_files ORDER BY id")
                .fetch_all(&self.0)
                .await
                .map_err(log_sql_error("list_files"))?,
        )
    }

    #[tracing::instrument(skip(self))]
    async fn get_component(&self, id: i64) -> Result<Component, FigparseError> {
        sqlx::query_as::<_, Component>("SELECT * FROM components WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.0)
            .await
            .map_err(log_sql_error("get_component"))?
            .ok_or_else(|| FigparseError::NotFound(format!("component {id}")))
    }

    #[tracing::instrument(skip(self))]
    async fn get_instance(&self, id: i64) -> Result<Instance, FigparseError> {
        sqlx::query_as::<_, Instance>("SELECT * FROM instances WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.0)
            .await
            .map_err(log_sql_error("get_instance"))?
            .ok_or_else(|| FigparseError::NotFound(format!("instance {id}")))
    }

    #[tracing::instrument(skip(self))]
    async fn list_components(&self, file_id: i64) -> Result<Vec<Component>, FigparseError> {
        Ok(sqlx::query_as::<_, Component>(
            "SELECT * FROM components WHERE file_id = ? AND active = 1 ORDER BY z_index, id",
        )
        .bind(file_id)
        .fetch_all(&self.0)
        .await
        .map_err(log_sql_error("list_components"))?)
    }

    #[tracing::instrument(skip(self))]
    async fn list_instances_by_file(&self, file_id: i64) -> Result<Vec<Instance>, FigparseError> {
        Ok(sqlx::query_as::<_, Instance>(
            "SELECT i.* FROM instances i \
             JOIN components c ON c.id = i.component_id \
             WHERE c.file_id = ? AND i.active = 1 AND c.active = 1 \
             ORDER BY i.id",
        )
        .bind(file_id)
        .fetch_all(&self.0)
        .await
        .map_err(log_sql_error("list_instances_by_file"))?)
    }

    #[tracing::instrument(skip(self))]
    async fn list_instances_by_component(
        &self,
        component_id: i64,
    ) -> Result<Vec<Instance>, FigparseError> {
        Ok(sqlx::query_as::<_, Instance>(
            "SELECT * FROM instances WHERE component_id = ? AND active = 1 ORDER BY id",
        )
        .bind(component_id)
        .fetch_all(&self.0)
        .await
        .map_err(log_sql_error("list_instances_by_component"))?)
    }
}

impl DesignStore for DbConnection {
    type Unit = DbUnit;

    async fn begin(&self) -> Result<DbUnit, FigparseError> {
        let tx = self.0.begin().await.map_err(log_sql_error("begin"))?;
        Ok(DbUnit(tx))
    }
}

/// Writes inside one SQLite transaction. Dropping the unit without committing rolls it back.
#[derive(Debug)]
pub struct DbUnit(sqlx::Transaction<'static, Sqlite>);

impl DesignSink for DbUnit {
    async fn create_file(&mut self, draft: &FileDraft) -> Result<DesignFile, FigparseError> {
        let now = unix_now();
        let file = sqlx::query_as::<_, DesignFile>(
            "INSERT INTO design_files \
             (name, url, file_key, image_url, canvas_width, canvas_height, parsed_at, created_at, updated_at, active) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1) RETURNING *",
        )
        .bind(&draft.name)
        .bind(&draft.url)
        .bind(&draft.file_key)
        .bind(&draft.image_url)
        .bind(draft.canvas_width)
        .bind(draft.canvas_height)
        .bind(draft.parsed_at)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.0)
        .await
        .map_err(log_sql_error("create_file"))?;
        Ok(file)
    }

    async fn create_component(
        &mut self,
        file_id: i64,
        draft: &ComponentDraft,
    ) -> Result<Component, FigparseError> {
        let now = unix_now();
        let properties = serde_json::to_string(&draft.properties)?;
        let component = sqlx::query_as::<_, Component>(
            "INSERT INTO components \
             (file_id, node_id, name, kind, description, x, y, width, height, z_index, properties, created_at, updated_at, active) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1) RETURNING *",
        )
        .bind(file_id)
        .bind(&draft.node_id)
        .bind(&draft.name)
        .bind(&draft.kind)
        .bind(draft.description.as_deref())
        .bind(draft.geometry.x)
        .bind(draft.geometry.y)
        .bind(draft.geometry.width)
        .bind(draft.geometry.height)
        .bind(draft.z_index)
        .bind(properties)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.0)
        .await
        .map_err(log_sql_error("create_component"))?;
        Ok(component)
    }

    async fn create_instance(
        &mut self,
        instance: &ResolvedInstance,
    ) -> Result<Instance, FigparseError> {
        let now = unix_now();
        let properties = serde_json::to_string(&instance.properties)?;
        let row = sqlx::query_as::<_, Instance>(
            "INSERT INTO instances \
             (component_id, node_id, name, x, y, width, height, properties, created_at, updated_at, active) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1) RETURNING *",
        )
        .bind(instance.component_id)
        .bind(&instance.node_id)
        .bind(&instance.name)
        .bind(instance.geometry.x)
        .bind(instance.geometry.y)
        .bind(instance.geometry.width)
        .bind(instance.geometry.height)
        .bind(properties)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.0)
        .await
        .map_err(log_sql_error("create_instance"))?;
        Ok(row)
    }
}

impl UnitOfWork for DbUnit {
    async fn commit(self) -> Result<(), FigparseError> {
        self.0.commit().await.map_err(log_sql_error("commit"))
    }

    async fn rollback(self) -> Result<(), FigparseError> {
        self.0.rollback().await.map_err(log_sql_error("rollback"))
    }
}

/// A migration definition.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
    pub kind: MigrationType,
}

#[derive(Debug, Clone)]
struct MigrationList(Vec<Migration>);

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            Ok(self
                .0
                .into_iter()
                .filter(|m| matches!(m.kind, MigrationType::ReversibleUp))
                .map(|m| {
                    SqlxMigration::new(m.version, m.description.into(), m.kind, m.sql.into(), false)
                })
                .collect())
        })
    }
}

fn migrations() -> MigrationList {
    MigrationList(vec![Migration {
        version: 1,
        description: "create_design_tables",
        sql: "\
        CREATE TABLE design_files (\
            id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, url TEXT NOT NULL, \
            file_key TEXT NOT NULL, image_url TEXT NOT NULL DEFAULT '', \
            canvas_width REAL NOT NULL, canvas_height REAL NOT NULL, parsed_at INTEGER NOT NULL, \
            created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL, active BOOLEAN NOT NULL DEFAULT 1); \
        CREATE TABLE components (\
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            file_id INTEGER NOT NULL REFERENCES design_files(id) ON DELETE CASCADE, \
            node_id TEXT NOT NULL, name TEXT NOT NULL, kind TEXT NOT NULL, description TEXT, \
            x REAL NOT NULL, y REAL NOT NULL, width REAL NOT NULL, height REAL NOT NULL, \
            z_index INTEGER NOT NULL DEFAULT 0, properties TEXT NOT NULL DEFAULT '{}', \
            created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL, active BOOLEAN NOT NULL DEFAULT 1); \
        CREATE UNIQUE INDEX components_file_node ON components (file_id, node_id) WHERE active = 1; \
        CREATE TABLE instances (\
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            component_id INTEGER NOT NULL REFERENCES components(id) ON DELETE CASCADE, \
            node_id TEXT NOT NULL, name TEXT NOT NULL, \
            x REAL NOT NULL, y REAL NOT NULL, width REAL NOT NULL, height REAL NOT NULL, \
            properties TEXT NOT NULL DEFAULT '{}', \
            created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL, active BOOLEAN NOT NULL DEFAULT 1); \
        CREATE INDEX instances_component ON instances (component_id);",
        kind: MigrationType::ReversibleUp,
    }])
}

pub async fn db_init(db_path: &Path) -> Result<DbConnection, FigparseError> {
    tracing::debug!("Initializing design db from file: {:?}", db_path);
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .disable_statement_logging();
    let pool = SqlitePoolOptions::new()
        .max_connections(DEFAULT_POOL_SIZE)
        .connect_with(options)
        .await?;

    let migrator = Migrator::new(migrations())
        .await
        .map_err(|e| FigparseError::Io(format!("migration setup failed: {e}")))?;
    migrator
        .run(&pool)
        .await
        .map_err(|e| FigparseError::Io(format!("migration failed: {e}")))?;

    let files = sqlx::query("SELECT COUNT(*) AS n FROM design_files;")
        .fetch_one(&pool)
        .await?;
    let components = sqlx::query("SELECT COUNT(*) AS n FROM components;")
        .fetch_one(&pool)
        .await?;
    tracing::info!(
        "DB Connection initialized.\n \
         \tStored files:\t{:?} \n \
         \tStored components:\t{:?}",
        files.get::<i64, usize>(0),
        components.get::<i64, usize>(0)
    );

    Ok(DbConnection(pool))
}
