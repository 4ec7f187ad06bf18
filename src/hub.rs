//! Process-wide wiring of the pipeline.
//!
//! [`Hub::open`] builds the store, the embedder and the intent table once
//! and hands the same `Arc`s to the trainer and the query engine, so both
//! sides of the index always use the same model.

use anyhow::Result;
use std::sync::Arc;

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::corpus::CorpusBuilder;
use crate::embedding::{self, Embedder};
use crate::intent::IntentResolver;
use crate::search::QueryEngine;
use crate::store::{DocumentStore, SqliteStore};
use crate::train::IndexTrainer;

pub struct Hub {
    sqlite: Option<Arc<SqliteStore>>,
    pub store: Arc<dyn DocumentStore>,
    pub trainer: Arc<IndexTrainer>,
    pub engine: Arc<QueryEngine>,
}

impl Hub {
    /// Open the SQLite store named by `config` and wire everything to it.
    pub async fn open(config: &Config) -> Result<Self> {
        let sqlite = Arc::new(SqliteStore::open(&config.db).await?);
        let embedder = embedding::create_provider(&config.embedding)?;
        let mut hub = Self::with_parts(config, sqlite.clone(), embedder);
        hub.sqlite = Some(sqlite);
        Ok(hub)
    }

    /// Wire the pipeline around an existing store and embedder.
    pub fn with_parts(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let artifacts = ArtifactStore::new(&config.model.dir);
        tracing::debug!(
            provider = %config.embedding.provider,
            model = embedder.model_name(),
            dims = embedder.dims(),
            model_dir = %config.model.dir.display(),
            "hub ready"
        );

        let trainer = IndexTrainer::new(
            store.clone(),
            embedder.clone(),
            artifacts.clone(),
            CorpusBuilder::from_config(&config.corpus),
            config.embedding.batch_size,
        );
        let engine = QueryEngine::new(
            embedder,
            artifacts,
            IntentResolver::from_config(&config.intent),
            config.retrieval.intent_penalty,
        );

        Self {
            sqlite: None,
            store,
            trainer: Arc::new(trainer),
            engine: Arc::new(engine),
        }
    }

    /// Close the database pool, if this hub opened one.
    pub async fn close(&self) {
        if let Some(sqlite) = &self.sqlite {
            sqlite.close().await;
        }
    }
}
