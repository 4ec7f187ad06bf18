//! Core data models used throughout Endpoint Hub.
//!
//! Records flow from the document store ([`EndpointRecord`],
//! [`ModuleRecord`]) through the corpus builder ([`CorpusRow`]) into the
//! persisted metadata ([`EndpointMeta`]) and finally out of the query
//! engine ([`QueryResult`]).

use serde::{Deserialize, Serialize};

/// An endpoint as it sits in the document store.
///
/// Everything but `id` is nullable in storage; the corpus builder decides
/// which absences are fatal for a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointRecord {
    pub id: String,
    pub method: Option<String>,
    pub path: Option<String>,
    pub operation_id: Option<String>,
    pub module_id: Option<String>,
    pub visibility: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
}

/// A module (endpoint grouping) as it sits in the document store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRecord {
    pub id: String,
    pub name: String,
}

/// An endpoint about to be inserted, as produced by the Postman importer.
#[derive(Debug, Clone)]
pub struct NewEndpoint {
    pub id: String,
    pub method: String,
    pub path: String,
    pub operation_id: String,
    pub module_id: String,
    pub visibility: String,
    pub keywords: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// The original collection item, kept verbatim for export.
    pub raw: serde_json::Value,
}

impl NewEndpoint {
    pub fn to_record(&self) -> EndpointRecord {
        EndpointRecord {
            id: self.id.clone(),
            method: Some(self.method.clone()),
            path: Some(self.path.clone()),
            operation_id: Some(self.operation_id.clone()),
            module_id: Some(self.module_id.clone()),
            visibility: Some(self.visibility.clone()),
            keywords: Some(self.keywords.clone()),
            description: self.description.clone(),
        }
    }
}

/// A stored endpoint together with its raw collection payload.
#[derive(Debug, Clone)]
pub struct StoredEndpoint {
    pub record: EndpointRecord,
    pub raw: Option<serde_json::Value>,
}

/// One embeddable unit derived from an [`EndpointRecord`] at training time.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusRow {
    /// Dense position in the vector index; the join key with the metadata.
    pub row_index: usize,
    pub source_id: String,
    pub module_id: String,
    pub module_name: String,
    pub method: String,
    pub path: String,
    pub operation_id: String,
    pub visibility: String,
    pub keywords: String,
    pub description: String,
    pub normalized_text: String,
    pub raw_text: String,
}

/// Per-row display fields persisted next to the index, keyed by row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMeta {
    pub id: String,
    pub module_id: String,
    pub module_name: String,
    pub method: String,
    pub path: String,
    pub operation_id: String,
    pub visibility: String,
    pub keywords: String,
    pub description: String,
    pub normalized_text: String,
    pub raw_text: String,
}

impl From<&CorpusRow> for EndpointMeta {
    fn from(row: &CorpusRow) -> Self {
        Self {
            id: row.source_id.clone(),
            module_id: row.module_id.clone(),
            module_name: row.module_name.clone(),
            method: row.method.clone(),
            path: row.path.clone(),
            operation_id: row.operation_id.clone(),
            visibility: row.visibility.clone(),
            keywords: row.keywords.clone(),
            description: row.description.clone(),
            normalized_text: row.normalized_text.clone(),
            raw_text: row.raw_text.clone(),
        }
    }
}

/// A ranked search hit. `score` is a distance: lower is better.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub row_index: usize,
    pub id: String,
    pub module_id: String,
    pub module_name: String,
    pub method: String,
    pub path: String,
    pub operation_id: String,
    pub visibility: String,
    pub keywords: String,
    pub description: String,
    pub score: f64,
}

impl QueryResult {
    pub fn from_meta(row_index: usize, meta: &EndpointMeta, score: f64) -> Self {
        Self {
            row_index,
            id: meta.id.clone(),
            module_id: meta.module_id.clone(),
            module_name: meta.module_name.clone(),
            method: meta.method.clone(),
            path: meta.path.clone(),
            operation_id: meta.operation_id.clone(),
            visibility: meta.visibility.clone(),
            keywords: meta.keywords.clone(),
            description: meta.description.clone(),
            score,
        }
    }
}
