//! Embedding backends and vector utilities.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`LocalEmbedder`]** — runs models in-process via fastembed; no network
//!   calls after the initial model download (feature `local-models`).
//! - **[`OpenAiEmbedder`]** — calls an OpenAI-compatible embeddings API.
//!
//! The model is loaded once when the embedder is constructed; a failure there
//! is a [`EngineError::ModelLoad`] and fatal for the loading phase. Per-call
//! failures are [`EngineError::Inference`]; bounded retry around calls lives
//! in `store.rs`, not here.
//!
//! Also provides the vector helpers shared by the cache and the index:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 BLOB codec for
//!   SQLite storage

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ModelsConfig;
use crate::error::EngineError;

/// A dense-vector text encoder.
///
/// Implementations must be order-independent: each output vector depends
/// only on its own input text, so batching never changes values.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"multilingual-e5-small"`).
    fn model_name(&self) -> &str;
    /// Fixed output dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError>;
}

/// Construct the embedder named by `model` for the configured provider.
///
/// Fails with [`EngineError::ModelLoad`] when the model cannot be resolved
/// or initialized — callers treat this as fatal for loading.
pub fn create_embedder(
    config: &ModelsConfig,
    model: &str,
) -> Result<Box<dyn Embedder>, EngineError> {
    match config.provider.as_str() {
        #[cfg(feature = "local-models")]
        "local" => Ok(Box::new(LocalEmbedder::new(config, model)?)),
        #[cfg(not(feature = "local-models"))]
        "local" => Err(EngineError::ModelLoad(
            "local provider requires the local-models feature".to_string(),
        )),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config, model)?)),
        other => Err(EngineError::Config(format!(
            "unknown models.provider: {}",
            other
        ))),
    }
}

// ============ Local provider (fastembed) ============

/// In-process embedder backed by fastembed. The underlying session is built
/// once and shared; inference runs on the blocking pool.
#[cfg(feature = "local-models")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-models")]
impl LocalEmbedder {
    pub fn new(config: &ModelsConfig, model: &str) -> Result<Self, EngineError> {
        let fastembed_model = resolve_fastembed_model(model)?;
        let dims = config.dims.unwrap_or_else(|| known_model_dims(model));

        let session = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| {
            EngineError::ModelLoad(format!("failed to initialize embedding model {}: {}", model, e))
        })?;

        Ok(Self {
            model_name: model.to_string(),
            dims,
            batch_size: config.batch_size,
            model: std::sync::Arc::new(std::sync::Mutex::new(session)),
        })
    }
}

#[cfg(feature = "local-models")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let model = self.model.clone();
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut session = model
                .lock()
                .map_err(|_| EngineError::Inference("embedding session poisoned".to_string()))?;
            session
                .embed(texts, Some(batch_size))
                .map_err(|e| EngineError::Inference(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| EngineError::Inference(format!("embedding task panicked: {}", e)))?
    }
}

/// Map a configured model identifier onto a fastembed model.
#[cfg(feature = "local-models")]
fn resolve_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel, EngineError> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(EngineError::ModelLoad(format!(
            "unknown local embedding model: '{}'. Supported: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ))),
    }
}

#[cfg(feature = "local-models")]
fn known_model_dims(name: &str) -> usize {
    match name {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    }
}

// ============ OpenAI-compatible provider ============

/// Remote embedder calling `POST /v1/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &ModelsConfig, model: &str) -> Result<Self, EngineError> {
        let dims = config.dims.ok_or_else(|| {
            EngineError::Config("models.dims is required for the openai provider".to_string())
        })?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(EngineError::ModelLoad(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::ModelLoad(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model: model.to_string(),
            dims,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| EngineError::Inference("OPENAI_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Inference(format!("embeddings API unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Inference(format!(
                "embeddings API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Inference(format!("invalid embeddings response: {}", e)))?;
        parse_openai_response(&json)
    }
}

/// Extract the `data[].embedding` arrays, in input order.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EngineError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EngineError::Inference("embeddings response missing data array".to_string()))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                EngineError::Inference("embeddings response missing embedding".to_string())
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a BLOB
/// of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Reverses [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths. Embedding magnitude carries no meaning here, only
/// direction, which is why retrieval ranks by this and not dot product.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_parse_openai_response_order() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [1.0, 0.0] },
                { "embedding": [0.0, 1.0] },
            ]
        });
        let parsed = parse_openai_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_openai_response_missing_data() {
        let json = serde_json::json!({ "unexpected": true });
        assert!(parse_openai_response(&json).is_err());
    }
}
