//! TOML configuration for Endpoint Hub.
//!
//! Every section except `[db]` and `[model]` has defaults, so a minimal
//! configuration only names where the document store and the trained
//! artifacts live:
//!
//! ```toml
//! [db]
//! path = "./data/hub.sqlite"
//!
//! [model]
//! dir = "./model"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where training artifacts are published.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// How many times the HTTP method is repeated at the head of the
    /// embedded text. Higher values pull rows with the same verb closer
    /// together in embedding space.
    #[serde(default = "default_method_weight")]
    pub method_weight: usize,
    /// Domain words stripped in addition to the built-in set.
    #[serde(default)]
    pub extra_stopwords: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            method_weight: default_method_weight(),
            extra_stopwords: Vec::new(),
        }
    }
}

fn default_method_weight() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Added to the distance of results whose method contradicts the
    /// query's intent.
    #[serde(default = "default_intent_penalty")]
    pub intent_penalty: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            intent_penalty: default_intent_penalty(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_top_k() -> usize {
    100
}
fn default_intent_penalty() -> f64 {
    0.3
}

/// Optional per-verb trigger overrides. Unset verbs keep the built-in table.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct IntentConfig {
    #[serde(default)]
    pub get: Option<Vec<String>>,
    #[serde(default)]
    pub post: Option<Vec<String>>,
    #[serde(default)]
    pub put: Option<Vec<String>>,
    #[serde(default)]
    pub patch: Option<Vec<String>>,
    #[serde(default)]
    pub delete: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_train_on_startup")]
    pub train_on_startup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
            train_on_startup: default_train_on_startup(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_train_on_startup() -> bool {
    true
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.corpus.method_weight == 0 {
        anyhow::bail!("corpus.method_weight must be >= 1");
    }

    if config.retrieval.default_top_k < 1 {
        anyhow::bail!("retrieval.default_top_k must be >= 1");
    }
    if config.retrieval.max_top_k < config.retrieval.default_top_k {
        anyhow::bail!("retrieval.max_top_k must be >= retrieval.default_top_k");
    }
    if !config.retrieval.intent_penalty.is_finite() || config.retrieval.intent_penalty < 0.0 {
        anyhow::bail!("retrieval.intent_penalty must be a non-negative number");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" | "hashing" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, hashing, openai, or ollama.",
            other
        ),
    }

    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[db]
path = "./data/hub.sqlite"

[model]
dir = "./model"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.corpus.method_weight, 2);
        assert_eq!(config.retrieval.default_top_k, 5);
        assert!((config.retrieval.intent_penalty - 0.3).abs() < 1e-12);
        assert_eq!(config.server.allowed_origins, vec!["*".to_string()]);
        assert!(config.server.train_on_startup);
        assert!(config.intent.put.is_none());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let src = format!("{}\n[retrieval]\ndefault_top_k = 0\n", MINIMAL);
        let err = parse(&src).unwrap_err();
        assert!(err.to_string().contains("default_top_k"));
    }

    #[test]
    fn test_disabled_provider_is_not_enabled() {
        let src = format!("{}\n[embedding]\nprovider = \"disabled\"\n", MINIMAL);
        let config = parse(&src).unwrap();
        assert!(!config.embedding.is_enabled());
        assert!(parse(MINIMAL).unwrap().embedding.is_enabled());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let src = format!("{}\n[embedding]\nprovider = \"magic\"\n", MINIMAL);
        let err = parse(&src).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_remote_provider_requires_model_and_dims() {
        let src = format!("{}\n[embedding]\nprovider = \"openai\"\n", MINIMAL);
        assert!(parse(&src).is_err());

        let src = format!(
            "{}\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
            MINIMAL
        );
        assert!(parse(&src).is_ok());
    }

    #[test]
    fn test_negative_penalty_rejected() {
        let src = format!("{}\n[retrieval]\nintent_penalty = -0.5\n", MINIMAL);
        assert!(parse(&src).is_err());
    }

    #[test]
    fn test_intent_overrides_parse() {
        let src = format!("{}\n[intent]\ndelete = [\"purge\"]\n", MINIMAL);
        let config = parse(&src).unwrap();
        assert_eq!(config.intent.delete, Some(vec!["purge".to_string()]));
    }
}
