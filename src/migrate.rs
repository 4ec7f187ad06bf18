use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the document store schema. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS modules (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Everything but the id is nullable: records may come from older
    // importers or hand edits, and the corpus builder decides what it needs.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS endpoints (
            id TEXT PRIMARY KEY,
            method TEXT,
            path TEXT,
            operation_id TEXT,
            module_id TEXT,
            visibility TEXT,
            keywords TEXT,
            description TEXT,
            author TEXT,
            created_at INTEGER,
            updated_at INTEGER,
            raw_json TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_endpoints_module_id ON endpoints(module_id)")
        .execute(pool)
        .await?;

    Ok(())
}
