//! Postman collection parsing.
//!
//! Walks a collection's `item` tree, descending into folders, and turns
//! every request item into a [`NewEndpoint`]. The item itself is kept as
//! the endpoint's raw payload so it can be exported unchanged.
//!
//! Items that are not requests, or whose request lacks a method or URL,
//! are logged and skipped.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::NewEndpoint;
use crate::normalize::normalize;

pub const DEFAULT_VISIBILITY: &str = "public";

/// Who and what an imported collection belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMeta {
    /// Module name; created if it does not exist.
    pub module: String,
    pub created_by: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
}

impl ImportMeta {
    pub fn visibility(&self) -> &str {
        self.visibility
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VISIBILITY)
    }
}

/// Extract every request in `collection`, in document order.
///
/// `module_id` is left empty; the importer fills it in once the module is
/// resolved.
pub fn parse_collection(collection: &Value, meta: &ImportMeta) -> Vec<NewEndpoint> {
    let now = Utc::now().timestamp();
    let mut out = Vec::new();

    match collection.get("item").and_then(Value::as_array) {
        Some(items) => walk(items, meta, now, &mut out),
        None => tracing::warn!("collection has no `item` array"),
    }

    tracing::debug!(endpoints = out.len(), "parsed collection");
    out
}

fn walk(items: &[Value], meta: &ImportMeta, now: i64, out: &mut Vec<NewEndpoint>) {
    for item in items {
        // Folders carry their own `item` array.
        if let Some(children) = item.get("item").and_then(Value::as_array) {
            walk(children, meta, now, out);
            continue;
        }

        match parse_item(item, meta, now) {
            Ok(endpoint) => out.push(endpoint),
            Err(e) => {
                let name = item.get("name").and_then(Value::as_str).unwrap_or("?");
                tracing::warn!(item = name, error = %e, "skipping collection item");
            }
        }
    }
}

fn parse_item(item: &Value, meta: &ImportMeta, now: i64) -> Result<NewEndpoint> {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let request = item.get("request").context("item has no request")?;

    let method = request
        .get("method")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .context("request has no method")?
        .to_uppercase();

    let path = match request.get("url") {
        Some(Value::String(url)) => strip_query(url),
        Some(url @ Value::Object(_)) => url
            .get("raw")
            .and_then(Value::as_str)
            .map(strip_query)
            .unwrap_or_default(),
        _ => bail!("request has no url"),
    };
    if path.is_empty() {
        bail!("request url is empty");
    }

    let description = request
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|d| !d.trim().is_empty());

    let visibility = meta.visibility().to_string();
    let keywords = normalize(&format!(
        "{} {} {} {} {}",
        method,
        path,
        name,
        meta.keywords.as_deref().unwrap_or_default(),
        visibility
    ));

    Ok(NewEndpoint {
        id: uuid::Uuid::new_v4().to_string(),
        method,
        path,
        operation_id: name,
        module_id: String::new(),
        visibility,
        keywords,
        description,
        author: Some(meta.created_by.clone()),
        created_at: now,
        updated_at: now,
        raw: item.clone(),
    })
}

fn strip_query(url: &str) -> String {
    url.split('?').next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> ImportMeta {
        ImportMeta {
            module: "accounts".to_string(),
            created_by: "alice".to_string(),
            visibility: None,
            keywords: Some("usuarios".to_string()),
        }
    }

    #[test]
    fn test_nested_folders_are_flattened() {
        let collection = json!({
            "item": [
                { "name": "List users", "request": { "method": "GET", "url": "{{base}}/users" } },
                { "name": "Admin", "item": [
                    { "name": "Delete user", "request": { "method": "delete", "url": { "raw": "{{base}}/users/:id" } } },
                    { "name": "Deeper", "item": [
                        { "name": "Create user", "request": { "method": "POST", "url": { "raw": "{{base}}/users" } } }
                    ] }
                ] }
            ]
        });

        let endpoints = parse_collection(&collection, &meta());
        let names: Vec<&str> = endpoints.iter().map(|e| e.operation_id.as_str()).collect();
        assert_eq!(names, vec!["List users", "Delete user", "Create user"]);
        assert_eq!(endpoints[1].method, "DELETE");
    }

    #[test]
    fn test_query_strings_are_stripped() {
        let collection = json!({
            "item": [
                { "name": "Search", "request": { "method": "GET", "url": { "raw": "https://api.test/users?page=2&size=10" } } },
                { "name": "Plain", "request": { "method": "GET", "url": "https://api.test/items?x=1" } }
            ]
        });

        let endpoints = parse_collection(&collection, &meta());
        assert_eq!(endpoints[0].path, "https://api.test/users");
        assert_eq!(endpoints[1].path, "https://api.test/items");
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let collection = json!({
            "item": [
                { "name": "No request" },
                { "name": "No method", "request": { "url": "/a" } },
                { "name": "No url", "request": { "method": "GET" } },
                "not an object",
                { "name": "Good", "request": { "method": "GET", "url": "/good" } }
            ]
        });

        let endpoints = parse_collection(&collection, &meta());
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].operation_id, "Good");
    }

    #[test]
    fn test_fields_and_keywords() {
        let collection = json!({
            "item": [
                { "name": "getUserById", "request": {
                    "method": "GET",
                    "url": { "raw": "/users/{id}" },
                    "description": "Fetch one user"
                } }
            ]
        });

        let endpoints = parse_collection(&collection, &meta());
        let e = &endpoints[0];
        assert_eq!(e.visibility, DEFAULT_VISIBILITY);
        assert_eq!(e.author.as_deref(), Some("alice"));
        assert_eq!(e.description.as_deref(), Some("Fetch one user"));
        assert_eq!(e.keywords, "get users get user usuarios public");
        assert_eq!(e.raw["name"], "getUserById");
        assert!(e.module_id.is_empty());
    }

    #[test]
    fn test_missing_item_array() {
        assert!(parse_collection(&json!({ "info": {} }), &meta()).is_empty());
    }

    #[test]
    fn test_import_meta_from_json() {
        let meta: ImportMeta =
            serde_json::from_str(r#"{"module":"billing","created_by":"ci","visibility":"private"}"#)
                .unwrap();
        assert_eq!(meta.visibility(), "private");
        assert!(meta.keywords.is_none());
    }
}
