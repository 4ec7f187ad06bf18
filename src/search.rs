//! Query engine: ranked endpoint search with an intent bias.
//!
//! # Algorithm
//!
//! 1. Normalize the query and embed it with the same [`Embedder`] used for
//!    training.
//! 2. Ask the published index for the `top_k` nearest rows. Scores are
//!    squared L2 distances, so lower is better.
//! 3. Resolve intent from the raw query. When the query names a verb, every
//!    result whose method is not among the preferred verbs has
//!    `intent_penalty` added to its score.
//! 4. Stable ascending sort on the final score.
//!
//! The loaded generation is cached and swapped only when `CURRENT` moves,
//! so a query always sees one coherent index/metadata pair.

use anyhow::Result;
use std::sync::{Arc, RwLock};

use crate::artifacts::{ArtifactStore, Snapshot};
use crate::config::Config;
use crate::embedding::{embed_query, Embedder};
use crate::error::SearchError;
use crate::hub::Hub;
use crate::index::VectorIndex;
use crate::intent::{method_matches, IntentResolver};
use crate::models::QueryResult;
use crate::normalize::normalize;

pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    artifacts: ArtifactStore,
    resolver: IntentResolver,
    penalty: f64,
    cache: RwLock<Option<Arc<Snapshot>>>,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        artifacts: ArtifactStore,
        resolver: IntentResolver,
        penalty: f64,
    ) -> Self {
        Self {
            embedder,
            artifacts,
            resolver,
            penalty,
            cache: RwLock::new(None),
        }
    }

    /// Up to `top_k` results, best first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<QueryResult>, SearchError> {
        if top_k < 1 {
            return Err(SearchError::InvalidTopK);
        }

        let snapshot = self.snapshot()?;
        let vector = embed_query(self.embedder.as_ref(), &normalize(query)).await?;
        let hits = snapshot.index.search(&vector, top_k)?;
        let intent = self.resolver.resolve(query);

        let mut results = Vec::with_capacity(hits.len());
        for (row, distance) in hits {
            let Some(meta) = snapshot.metadata.get(&row.to_string()) else {
                tracing::debug!(row, generation = %snapshot.generation, "row has no metadata; dropped");
                continue;
            };

            let mut score = f64::from(distance);
            if let Some(labels) = &intent {
                if !method_matches(labels, &meta.method) {
                    score += self.penalty;
                }
            }
            results.push(QueryResult::from_meta(row, meta, score));
        }

        results.sort_by(|a, b| a.score.total_cmp(&b.score));
        tracing::debug!(
            query,
            intent = ?intent,
            results = results.len(),
            "search complete"
        );
        Ok(results)
    }

    /// The published generation, loading it if it is not the cached one.
    fn snapshot(&self) -> Result<Arc<Snapshot>, SearchError> {
        let generation = self.artifacts.current_generation()?.ok_or_else(|| {
            SearchError::NotTrained("no generation published; run training first".to_string())
        })?;

        if let Some(cached) = self.read_cache()? {
            if cached.generation == generation {
                return Ok(cached);
            }
        }

        let snapshot = Arc::new(self.artifacts.load_generation(&generation)?);
        if let Some(manifest) = &snapshot.manifest {
            if manifest.model != self.embedder.model_name() {
                tracing::warn!(
                    generation = %generation,
                    trained_with = %manifest.model,
                    querying_with = self.embedder.model_name(),
                    "index was trained with a different embedding model; retrain to fix"
                );
            }
        }
        tracing::info!(generation = %generation, rows = snapshot.index.len(), "loaded index generation");

        let mut cache = self
            .cache
            .write()
            .map_err(|_| anyhow::anyhow!("snapshot cache lock poisoned"))?;
        *cache = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn read_cache(&self) -> Result<Option<Arc<Snapshot>>, SearchError> {
        let cache = self
            .cache
            .read()
            .map_err(|_| anyhow::anyhow!("snapshot cache lock poisoned"))?;
        Ok(cache.clone())
    }
}

/// `ephub search`
pub async fn run_search(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
    if top_k > config.retrieval.max_top_k {
        anyhow::bail!(
            "--top-k {} exceeds retrieval.max_top_k ({})",
            top_k,
            config.retrieval.max_top_k
        );
    }

    let hub = Hub::open(config).await?;
    let results = hub.engine.search(query, top_k).await;
    hub.close().await;
    let results = results?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} {}",
            i + 1,
            result.score,
            result.method.to_uppercase(),
            result.path
        );
        println!("    operation: {}", result.operation_id);
        println!("    module: {}", result.module_name);
        println!("    visibility: {}", result.visibility);
        println!("    id: {}", result.id);
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{Metadata, TrainingArtifacts};
    use crate::index::FlatL2Index;
    use crate::models::EndpointMeta;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Embeds every text at the origin.
    struct OriginEmbedder;

    #[async_trait]
    impl crate::embedding::Embedder for OriginEmbedder {
        fn model_name(&self) -> &str {
            "origin"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0, 0.0]).collect())
        }
    }

    fn meta(id: &str, method: &str) -> EndpointMeta {
        EndpointMeta {
            id: id.to_string(),
            module_id: "m1".to_string(),
            module_name: "accounts".to_string(),
            method: method.to_string(),
            path: format!("/{}", id),
            operation_id: id.to_string(),
            visibility: "public".to_string(),
            keywords: String::new(),
            description: String::new(),
            normalized_text: String::new(),
            raw_text: String::new(),
        }
    }

    fn publish(dir: &std::path::Path, vectors: &[Vec<f32>], metadata: &Metadata) {
        let index = FlatL2Index::build(2, vectors).unwrap();
        ArtifactStore::new(dir)
            .publish(&TrainingArtifacts {
                index: &index,
                metadata,
                embeddings: vectors,
                model: "origin",
                corpus_digest: "test",
            })
            .unwrap();
    }

    fn engine(dir: &std::path::Path) -> QueryEngine {
        QueryEngine::new(
            Arc::new(OriginEmbedder),
            ArtifactStore::new(dir),
            IntentResolver::default(),
            0.3,
        )
    }

    #[tokio::test]
    async fn test_not_trained() {
        let tmp = TempDir::new().unwrap();
        let err = engine(tmp.path()).search("users", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::NotTrained(_)));
    }

    #[tokio::test]
    async fn test_invalid_top_k() {
        let tmp = TempDir::new().unwrap();
        let err = engine(tmp.path()).search("users", 0).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidTopK));
    }

    #[tokio::test]
    async fn test_intent_penalty_reorders() {
        let tmp = TempDir::new().unwrap();
        let metadata: Metadata = [
            ("0".to_string(), meta("remove-user", "DELETE")),
            ("1".to_string(), meta("list-users", "GET")),
        ]
        .into_iter()
        .collect();
        publish(tmp.path(), &[vec![0.0, 0.0], vec![0.5, 0.0]], &metadata);
        let engine = engine(tmp.path());

        // No intent: pure distance.
        let plain = engine.search("usuarios", 2).await.unwrap();
        assert_eq!(plain[0].id, "remove-user");
        assert_eq!(plain[0].score, 0.0);

        // GET intent pushes the DELETE row behind the GET row.
        let biased = engine.search("obtener usuarios", 2).await.unwrap();
        assert_eq!(biased[0].id, "list-users");
        assert_eq!(biased[0].score, 0.25);
        assert!((biased[1].score - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_matching_intent_never_penalized() {
        let tmp = TempDir::new().unwrap();
        let metadata: Metadata = [("0".to_string(), meta("remove-user", "delete"))]
            .into_iter()
            .collect();
        publish(tmp.path(), &[vec![0.0, 0.0]], &metadata);

        let results = engine(tmp.path()).search("eliminar usuario", 1).await.unwrap();
        assert_eq!(results[0].score, 0.0);
    }

    #[tokio::test]
    async fn test_rows_without_metadata_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let metadata: Metadata = [("1".to_string(), meta("kept", "GET"))].into_iter().collect();
        publish(tmp.path(), &[vec![0.0, 0.0], vec![1.0, 0.0]], &metadata);

        let results = engine(tmp.path()).search("anything", 2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "kept");
        assert_eq!(results[0].row_index, 1);
    }

    #[tokio::test]
    async fn test_reloads_when_generation_changes() {
        let tmp = TempDir::new().unwrap();
        let first: Metadata = [("0".to_string(), meta("first", "GET"))].into_iter().collect();
        publish(tmp.path(), &[vec![0.0, 0.0]], &first);
        let engine = engine(tmp.path());
        assert_eq!(engine.search("x", 1).await.unwrap()[0].id, "first");

        let second: Metadata = [("0".to_string(), meta("second", "GET"))].into_iter().collect();
        publish(tmp.path(), &[vec![0.0, 0.0]], &second);
        assert_eq!(engine.search("x", 1).await.unwrap()[0].id, "second");
    }

    #[tokio::test]
    async fn test_ties_keep_index_order() {
        let tmp = TempDir::new().unwrap();
        let metadata: Metadata = [
            ("0".to_string(), meta("a", "POST")),
            ("1".to_string(), meta("b", "POST")),
            ("2".to_string(), meta("c", "POST")),
        ]
        .into_iter()
        .collect();
        publish(
            tmp.path(),
            &[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]],
            &metadata,
        );

        let ids: Vec<String> = engine(tmp.path())
            .search("crear", 3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
