//! Import Postman collections into the document store.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::config::Config;
use crate::postman::{parse_collection, ImportMeta};
use crate::store::{DocumentStore, SqliteStore};

/// What an import wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub module_id: String,
    pub total: usize,
}

/// Parse `collection` and store its endpoints under `meta.module`.
///
/// Returns `None` when the collection yielded no endpoints; in that case
/// nothing is written, not even the module.
pub async fn import_collection(
    store: &dyn DocumentStore,
    collection: &Value,
    meta: &ImportMeta,
) -> Result<Option<ImportSummary>> {
    if meta.module.trim().is_empty() {
        bail!("Module name must not be empty");
    }

    let mut endpoints = parse_collection(collection, meta);
    if endpoints.is_empty() {
        tracing::warn!(module = %meta.module, "no endpoints extracted from collection");
        return Ok(None);
    }

    let module_id = store.upsert_module(meta.module.trim()).await?;
    for endpoint in &mut endpoints {
        endpoint.module_id = module_id.clone();
    }
    let total = store.insert_endpoints(&endpoints).await?;

    tracing::info!(module = %meta.module, total, "imported collection");
    Ok(Some(ImportSummary { module_id, total }))
}

/// `ephub import`
pub async fn run_import(config: &Config, file: &Path, meta: &ImportMeta) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let collection: Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let store = SqliteStore::open(&config.db).await?;
    let summary = import_collection(&store, &collection, meta).await;
    store.close().await;

    match summary? {
        Some(summary) => {
            println!("import {}", file.display());
            println!("  module: {} ({})", meta.module, summary.module_id);
            println!("  endpoints: {}", summary.total);
            Ok(())
        }
        None => bail!("No endpoints extracted from {}", file.display()),
    }
}

/// `ephub modules`
pub async fn run_modules(config: &Config) -> Result<()> {
    let store = SqliteStore::open(&config.db).await?;
    let modules = store.modules().await;
    let endpoints = store.endpoints().await;
    store.close().await;
    let (modules, endpoints) = (modules?, endpoints?);

    if modules.is_empty() {
        println!("No modules.");
        return Ok(());
    }

    println!("{:<24} {:>9}  ID", "MODULE", "ENDPOINTS");
    for module in &modules {
        let count = endpoints
            .iter()
            .filter(|e| e.module_id.as_deref() == Some(module.id.as_str()))
            .count();
        println!("{:<24} {:>9}  {}", module.name, count, module.id);
    }
    Ok(())
}
