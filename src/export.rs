//! Export a stored endpoint as its original Postman item.
//!
//! The item is exactly what was imported, pretty-printed. The CLI writes it
//! to a file or stdout; the HTTP API serves it as an attachment.

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;
use crate::store::{DocumentStore, SqliteStore};

/// A rendered export: suggested file name plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedItem {
    pub filename: String,
    pub json: String,
}

/// Render endpoint `id`, or `None` if it does not exist.
///
/// Endpoints stored without a raw payload cannot be exported.
pub async fn export_endpoint(store: &dyn DocumentStore, id: &str) -> Result<Option<ExportedItem>> {
    let Some(stored) = store.get_endpoint(id).await? else {
        return Ok(None);
    };
    let Some(raw) = stored.raw else {
        bail!("Endpoint {} has no stored collection item", id);
    };

    let name = stored
        .record
        .operation_id
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("endpoint");

    Ok(Some(ExportedItem {
        filename: format!("{}.json", sanitize_filename(name)),
        json: serde_json::to_string_pretty(&raw)?,
    }))
}

/// Replace characters that are unsafe in a file name or a
/// `Content-Disposition` header.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '"' | ':' | '*' | '?' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// `ephub export`
///
/// If `output` is `Some`, writes to that file path. Otherwise writes to
/// stdout for piping.
pub async fn run_export(config: &Config, id: &str, output: Option<&Path>) -> Result<()> {
    let store = SqliteStore::open(&config.db).await?;
    let exported = export_endpoint(&store, id).await;
    store.close().await;

    let Some(exported) = exported? else {
        bail!("Endpoint not found: {}", id);
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &exported.json)?;
            eprintln!("Exported {} to {}", id, path.display());
        }
        None => {
            println!("{}", exported.json);
        }
    }

    Ok(())
}
