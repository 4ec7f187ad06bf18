//! Index training: corpus → embeddings → published generation.
//!
//! [`IndexTrainer::train`] reads every module and endpoint from the
//! [`DocumentStore`], builds the corpus, embeds it in batches and publishes
//! the index, metadata, embedding matrix and manifest as one generation
//! through the [`ArtifactStore`].
//!
//! Runs are serialized by an async mutex held for the whole run. Queries
//! keep reading the previous generation until the new one is published.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::artifacts::{ArtifactStore, Metadata, TrainingArtifacts};
use crate::config::Config;
use crate::corpus::{corpus_digest, CorpusBuilder};
use crate::embedding::{embed_batched, Embedder};
use crate::hub::Hub;
use crate::index::{FlatL2Index, VectorIndex};
use crate::models::EndpointMeta;
use crate::store::DocumentStore;

/// Outcome of a training run that reached a decision.
///
/// Empty corpora are reported here with `success = false`; infrastructure
/// failures are returned as `Err` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub success: bool,
    pub message: String,
    pub rows: usize,
}

impl TrainReport {
    fn empty(message: &str) -> Self {
        tracing::warn!("{}", message);
        Self {
            success: false,
            message: message.to_string(),
            rows: 0,
        }
    }
}

pub struct IndexTrainer {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    artifacts: ArtifactStore,
    builder: CorpusBuilder,
    batch_size: usize,
    lock: Mutex<()>,
}

impl IndexTrainer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        artifacts: ArtifactStore,
        builder: CorpusBuilder,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            artifacts,
            builder,
            batch_size: batch_size.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub async fn train(&self) -> Result<TrainReport> {
        let _guard = self.lock.lock().await;
        let started = std::time::Instant::now();

        let modules = self
            .store
            .modules()
            .await
            .context("Failed to read modules")?;
        if modules.is_empty() {
            return Ok(TrainReport::empty(
                "No modules found. Import a collection before training.",
            ));
        }

        let endpoints = self
            .store
            .endpoints()
            .await
            .context("Failed to read endpoints")?;
        let rows = self.builder.build(&endpoints, &modules);
        if rows.is_empty() {
            return Ok(TrainReport::empty(
                "No endpoints extracted. Check that endpoints have a method and path.",
            ));
        }

        let texts: Vec<String> = rows.iter().map(|r| r.normalized_text.clone()).collect();
        let vectors = embed_batched(self.embedder.as_ref(), &texts, self.batch_size)
            .await
            .with_context(|| {
                format!(
                    "Failed to embed corpus with model '{}'",
                    self.embedder.model_name()
                )
            })?;

        let index = FlatL2Index::build(self.embedder.dims(), &vectors)?;
        let metadata: Metadata = rows
            .iter()
            .map(|row| (row.row_index.to_string(), EndpointMeta::from(row)))
            .collect();
        let digest = corpus_digest(&rows);

        let generation = self.artifacts.publish(&TrainingArtifacts {
            index: &index,
            metadata: &metadata,
            embeddings: &vectors,
            model: self.embedder.model_name(),
            corpus_digest: &digest,
        })?;

        tracing::info!(
            generation = %generation,
            rows = index.len(),
            model = self.embedder.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "training complete"
        );

        Ok(TrainReport {
            success: true,
            message: format!("Model trained successfully with {} endpoints.", index.len()),
            rows: index.len(),
        })
    }
}

/// `ephub train`
pub async fn run_train(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let hub = Hub::open(config).await?;
    let report = hub.trainer.train().await;
    hub.close().await;

    let report = report?;
    if !report.success {
        anyhow::bail!(report.message);
    }
    println!("{}", report.message);
    Ok(())
}
