//! Configuration loading and validation.
//!
//! Settings come from a TOML file, with per-field defaults matching the
//! original deployment. The environment variables the deployment scripts
//! already use (`EMBEDDINGS_MODEL`, `QA_MODEL`, `RERANKER_MODEL`, `TOP_K`,
//! `CHUNK_CHARS`, `CHUNK_OVERLAP`, `BATCH_SIZE`, `RERANK_PRE_K`, `CACHE_DIR`)
//! override the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: default_corpus_dir(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("knowledge_base")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_chars() -> usize {
    700
}
fn default_chunk_overlap() -> usize {
    80
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    /// Inference backend: `local` (fastembed) or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embeddings_model")]
    pub embeddings_model: String,
    /// Encoder used for answer-span scoring. Defaults to the embedding model.
    #[serde(default)]
    pub qa_model: Option<String>,
    /// Cross-encoder for reranking. Unset disables reranking (vector order
    /// is used instead).
    #[serde(default)]
    pub reranker_model: Option<String>,
    /// Vector dimensionality; required for remote providers, inferred for
    /// known local models.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Bounded retries for transient per-call inference failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            embeddings_model: default_embeddings_model(),
            qa_model: None,
            reranker_model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embeddings_model() -> String {
    "multilingual-e5-small".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidate pool handed to the reranker. Defaults to `max(3 × top_k, top_k)`.
    #[serde(default)]
    pub pre_k: Option<usize>,
    /// Answers scoring below this are reported as `no_answer`.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_answer_timeout_secs")]
    pub answer_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            pre_k: None,
            min_confidence: default_min_confidence(),
            answer_timeout_secs: default_answer_timeout_secs(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_confidence() -> f32 {
    0.15
}
fn default_answer_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl RetrievalConfig {
    /// Resolved reranker pool size.
    pub fn effective_pre_k(&self) -> usize {
        self.pre_k.unwrap_or_else(|| (self.top_k * 3).max(self.top_k))
    }
}

impl ModelsConfig {
    /// Resolved QA encoder identifier.
    pub fn effective_qa_model(&self) -> &str {
        self.qa_model.as_deref().unwrap_or(&self.embeddings_model)
    }
}

impl Config {
    /// Reject configurations the pipeline cannot run with. Called once at
    /// load; all later code may assume these invariants.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.chunking.chunk_chars == 0 {
            return Err(EngineError::Config(
                "chunking.chunk_chars must be > 0".to_string(),
            ));
        }
        // overlap >= chunk_chars means the window never advances.
        if self.chunking.chunk_overlap >= self.chunking.chunk_chars {
            return Err(EngineError::Config(format!(
                "chunking.chunk_overlap ({}) must be < chunking.chunk_chars ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_chars
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(EngineError::Config(
                "retrieval.top_k must be >= 1".to_string(),
            ));
        }
        if self.retrieval.effective_pre_k() < self.retrieval.top_k {
            return Err(EngineError::Config(format!(
                "retrieval.pre_k ({}) must be >= retrieval.top_k ({})",
                self.retrieval.effective_pre_k(),
                self.retrieval.top_k
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_confidence) {
            return Err(EngineError::Config(
                "retrieval.min_confidence must be in [0.0, 1.0]".to_string(),
            ));
        }
        if self.models.batch_size == 0 {
            return Err(EngineError::Config(
                "models.batch_size must be > 0".to_string(),
            ));
        }
        if self.models.embeddings_model.trim().is_empty() {
            return Err(EngineError::Config(
                "models.embeddings_model must be set".to_string(),
            ));
        }
        match self.models.provider.as_str() {
            "local" | "openai" => {}
            other => {
                return Err(EngineError::Config(format!(
                    "unknown models.provider: '{}'. Must be local or openai.",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Apply the deployment environment variables over the file settings.
    pub fn apply_env_overrides(&mut self) -> Result<(), EngineError> {
        if let Ok(v) = std::env::var("EMBEDDINGS_MODEL") {
            self.models.embeddings_model = v;
        }
        if let Ok(v) = std::env::var("QA_MODEL") {
            self.models.qa_model = Some(v);
        }
        if let Ok(v) = std::env::var("RERANKER_MODEL") {
            self.models.reranker_model = Some(v);
        }
        if let Ok(v) = std::env::var("CACHE_DIR") {
            self.cache.dir = PathBuf::from(v);
        }
        self.retrieval.top_k = env_usize("TOP_K", self.retrieval.top_k)?;
        self.chunking.chunk_chars = env_usize("CHUNK_CHARS", self.chunking.chunk_chars)?;
        self.chunking.chunk_overlap = env_usize("CHUNK_OVERLAP", self.chunking.chunk_overlap)?;
        self.models.batch_size = env_usize("BATCH_SIZE", self.models.batch_size)?;
        if let Ok(v) = std::env::var("RERANK_PRE_K") {
            let parsed = v
                .parse::<usize>()
                .map_err(|_| EngineError::Config(format!("RERANK_PRE_K is not an integer: {}", v)))?;
            self.retrieval.pre_k = Some(parsed);
        }
        Ok(())
    }
}

fn env_usize(name: &str, current: usize) -> Result<usize, EngineError> {
    match std::env::var(name) {
        Ok(v) => v
            .parse::<usize>()
            .map_err(|_| EngineError::Config(format!("{} is not an integer: {}", name, v))),
        Err(_) => Ok(current),
    }
}

/// Read, env-override, and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.apply_env_overrides()?;
    config.validate()?;

    Ok(config)
}
