//! SQLite-backed [`DocumentStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::config::DbConfig;
use crate::db;
use crate::migrate;
use crate::models::{EndpointRecord, ModuleRecord, NewEndpoint, StoredEndpoint};

use super::DocumentStore;

const ENDPOINT_COLUMNS: &str =
    "id, method, path, operation_id, module_id, visibility, keywords, description, raw_json";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and make sure the schema exists.
    pub async fn open(db: &DbConfig) -> Result<Self> {
        let pool = db::connect(db).await?;
        migrate::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &SqliteRow) -> Result<EndpointRecord> {
    Ok(EndpointRecord {
        id: row.try_get("id")?,
        method: row.try_get("method")?,
        path: row.try_get("path")?,
        operation_id: row.try_get("operation_id")?,
        module_id: row.try_get("module_id")?,
        visibility: row.try_get("visibility")?,
        keywords: row.try_get("keywords")?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn modules(&self) -> Result<Vec<ModuleRecord>> {
        let rows = sqlx::query("SELECT id, name FROM modules ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ModuleRecord> {
                Ok(ModuleRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn endpoints(&self) -> Result<Vec<EndpointRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM endpoints ORDER BY rowid",
            ENDPOINT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn module_by_name(&self, name: &str) -> Result<Option<ModuleRecord>> {
        let row = sqlx::query("SELECT id, name FROM modules WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> Result<ModuleRecord> {
            Ok(ModuleRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }

    async fn upsert_module(&self, name: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            "INSERT INTO modules (id, name, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(&id)
        .bind(name)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create module '{}'", name))?;

        if inserted.rows_affected() == 1 {
            tracing::info!(module = name, id = %id, "created module");
            return Ok(id);
        }

        let existing = self
            .module_by_name(name)
            .await?
            .with_context(|| format!("Module '{}' vanished after insert", name))?;
        Ok(existing.id)
    }

    async fn insert_endpoints(&self, endpoints: &[NewEndpoint]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for endpoint in endpoints {
            sqlx::query(
                r#"
                INSERT INTO endpoints (
                    id, method, path, operation_id, module_id, visibility, keywords,
                    description, author, created_at, updated_at, raw_json
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&endpoint.id)
            .bind(&endpoint.method)
            .bind(&endpoint.path)
            .bind(&endpoint.operation_id)
            .bind(&endpoint.module_id)
            .bind(&endpoint.visibility)
            .bind(&endpoint.keywords)
            .bind(&endpoint.description)
            .bind(&endpoint.author)
            .bind(endpoint.created_at)
            .bind(endpoint.updated_at)
            .bind(serde_json::to_string(&endpoint.raw)?)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert endpoint {}", endpoint.id))?;
        }

        tx.commit().await?;
        Ok(endpoints.len())
    }

    async fn get_endpoint(&self, id: &str) -> Result<Option<StoredEndpoint>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM endpoints WHERE id = ?",
            ENDPOINT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_json: Option<String> = row.try_get("raw_json")?;
        let raw = raw_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .with_context(|| format!("Endpoint {} has an unreadable raw payload", id))?;

        Ok(Some(StoredEndpoint {
            record: record_from_row(&row)?,
            raw,
        }))
    }
}
