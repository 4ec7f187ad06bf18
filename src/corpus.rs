//! Corpus construction: store records → embeddable rows.
//!
//! Each endpoint becomes one [`CorpusRow`] whose `normalized_text` is what
//! gets embedded. The text is assembled from the endpoint's fields, cleaned
//! of domain vocabulary, then run through [`normalize`].
//!
//! # Text Assembly
//!
//! ```text
//! <method> × method_weight, path, operationId, description,
//! keywords (domain-filtered), visibility, module name
//! ```
//!
//! Repeating the method pulls endpoints sharing a verb closer together in
//! embedding space; `method_weight` controls how strongly.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use crate::config::CorpusConfig;
use crate::error::RecordError;
use crate::models::{CorpusRow, EndpointRecord, ModuleRecord};
use crate::normalize::normalize;
use crate::stopwords;

/// Module name used when an endpoint's module cannot be resolved.
pub const UNKNOWN_MODULE: &str = "unknown";

#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    method_weight: usize,
    domain_stopwords: HashSet<String>,
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new(2, &[])
    }
}

impl CorpusBuilder {
    pub fn new(method_weight: usize, extra_stopwords: &[String]) -> Self {
        let domain_stopwords = stopwords::DOMAIN
            .iter()
            .map(|w| w.to_string())
            .chain(extra_stopwords.iter().map(|w| w.trim().to_lowercase()))
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            method_weight: method_weight.max(1),
            domain_stopwords,
        }
    }

    pub fn from_config(config: &CorpusConfig) -> Self {
        Self::new(config.method_weight, &config.extra_stopwords)
    }

    /// Split on whitespace and drop domain stopwords, compared
    /// case-insensitively.
    ///
    /// Surviving words keep their casing so [`normalize`] can still split
    /// identifiers such as `listInvoiceItems`. Language stopwords are left
    /// to [`normalize`].
    pub fn strip_domain_words(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|word| !self.domain_stopwords.contains(&word.to_lowercase()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the ordered corpus.
    ///
    /// Returns an empty corpus when there are no modules. Records that fail
    /// validation are logged and skipped; row indices are assigned over the
    /// surviving rows only.
    pub fn build(&self, endpoints: &[EndpointRecord], modules: &[ModuleRecord]) -> Vec<CorpusRow> {
        if modules.is_empty() {
            tracing::warn!("no modules found; corpus is empty");
            return Vec::new();
        }

        let module_names: HashMap<&str, &str> = modules
            .iter()
            .map(|m| (m.id.as_str(), m.name.as_str()))
            .collect();

        let mut rows = Vec::with_capacity(endpoints.len());
        let mut skipped = 0usize;

        for record in endpoints {
            match self.build_row(record, &module_names, rows.len()) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(endpoint = %record.id, error = %e, "skipping endpoint record");
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                skipped,
                kept = rows.len(),
                "some endpoint records were left out of the corpus"
            );
        }
        tracing::info!(rows = rows.len(), "corpus built");
        rows
    }

    fn build_row(
        &self,
        record: &EndpointRecord,
        module_names: &HashMap<&str, &str>,
        row_index: usize,
    ) -> Result<CorpusRow, RecordError> {
        if record.id.trim().is_empty() {
            return Err(RecordError::MissingField("id"));
        }

        let method = record
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or(RecordError::MissingField("method"))?;
        if !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RecordError::MalformedMethod(method.to_string()));
        }

        let path = record
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(RecordError::MissingField("path"))?;

        let module_id = record.module_id.clone().unwrap_or_default();
        let module_name = module_names
            .get(module_id.as_str())
            .copied()
            .unwrap_or(UNKNOWN_MODULE);

        let operation_id = record.operation_id.clone().unwrap_or_default();
        let description = record.description.clone().unwrap_or_default();
        let visibility = record.visibility.clone().unwrap_or_default();
        let keywords = self.strip_domain_words(record.keywords.as_deref().unwrap_or_default());

        let raw_text = self.compose(
            method,
            &[
                path,
                &operation_id,
                &description,
                &keywords,
                &visibility,
                module_name,
            ],
        );
        let normalized_text = normalize(&self.strip_domain_words(&raw_text));

        Ok(CorpusRow {
            row_index,
            source_id: record.id.clone(),
            module_id,
            module_name: module_name.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            operation_id,
            visibility,
            keywords,
            description,
            normalized_text,
            raw_text,
        })
    }

    /// The weighted method head followed by the non-empty fields.
    fn compose(&self, method: &str, fields: &[&str]) -> String {
        let method = method.to_lowercase();
        std::iter::repeat(method.as_str())
            .take(self.method_weight)
            .chain(fields.iter().map(|f| f.trim()).filter(|f| !f.is_empty()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// SHA-256 over the ordered normalized texts; identifies a corpus snapshot.
pub fn corpus_digest(rows: &[CorpusRow]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        hasher.update(row.normalized_text.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
