//! Typed failures of the retrieval pipeline.
//!
//! Most plumbing returns [`anyhow::Result`]; the variants here are the ones
//! callers need to tell apart (for example the HTTP layer maps
//! [`SearchError::NotTrained`] to `409` instead of `500`).

use thiserror::Error;

/// Failures surfaced by [`QueryEngine::search`](crate::search::QueryEngine::search).
#[derive(Debug, Error)]
pub enum SearchError {
    /// No published index/metadata pair is available yet.
    #[error("index not trained: {0}")]
    NotTrained(String),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures while reading or publishing training artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no trained generation found in {0}")]
    Missing(String),

    /// A publish stopped part-way. The previously published generation is
    /// still current.
    #[error("failed to publish {artifact}: {source}")]
    Publish {
        artifact: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact {artifact}: {message}")]
    Corrupt {
        artifact: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ArtifactError> for SearchError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Missing(dir) => SearchError::NotTrained(format!(
                "no artifacts in {}; run training first",
                dir
            )),
            other => SearchError::Other(other.into()),
        }
    }
}

/// Why a single endpoint record was left out of the corpus.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("malformed method {0:?}")]
    MalformedMethod(String),
}
