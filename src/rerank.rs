//! Second-stage candidate reranking.
//!
//! A cross-encoder scores each (query, passage) pair jointly, which is more
//! accurate than vector similarity but far too expensive for the whole
//! corpus — it only ever sees the pre-filtered candidate pool. Reranking is
//! a precision enhancement, not a correctness requirement: when the model is
//! unset, fails to load, or fails to score, the query falls back to vector
//! order. A reranker can reorder and truncate the pool but never change its
//! membership.

use async_trait::async_trait;

use crate::config::ModelsConfig;
use crate::error::EngineError;
use crate::models::{Candidate, Chunk};

/// A pairwise (query, passage) relevance scorer.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn model_name(&self) -> &str;
    /// Relevance score per passage, positionally aligned with the input.
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, EngineError>;
}

/// Build the configured reranker, if any.
///
/// A missing identifier disables reranking; a broken one degrades to
/// vector-only ranking with a warning rather than failing startup.
pub fn create_reranker(config: &ModelsConfig) -> Option<Box<dyn Reranker>> {
    let name = config.reranker_model.as_deref()?;

    if config.provider != "local" {
        eprintln!(
            "Warning: reranker '{}' requires the local provider, continuing without reranking",
            name
        );
        return None;
    }

    #[cfg(feature = "local-models")]
    match LocalReranker::new(name) {
        Ok(reranker) => return Some(Box::new(reranker)),
        Err(e) => {
            eprintln!("Warning: reranker unavailable ({}), continuing without reranking", e);
            return None;
        }
    }

    #[cfg(not(feature = "local-models"))]
    {
        eprintln!(
            "Warning: reranker '{}' requires the local-models feature, continuing without reranking",
            name
        );
        None
    }
}

/// Re-score the candidate pool and keep the best `top_k`.
///
/// On any reranker failure the vector-order truncation is returned instead;
/// either way the result is a subset of the input candidates.
pub async fn rerank_candidates(
    reranker: Option<&dyn Reranker>,
    query: &str,
    candidates: &[Candidate],
    chunks: &[Chunk],
    top_k: usize,
) -> Vec<Candidate> {
    let fallback = || {
        let mut kept = candidates.to_vec();
        kept.truncate(top_k);
        kept
    };

    let Some(reranker) = reranker else {
        return fallback();
    };

    let passages: Vec<String> = candidates
        .iter()
        .map(|c| chunks[c.chunk_idx].text.clone())
        .collect();

    match reranker.score(query, &passages).await {
        Ok(scores) if scores.len() == candidates.len() => {
            let mut rescored: Vec<Candidate> = candidates
                .iter()
                .zip(scores)
                .map(|(c, score)| Candidate {
                    chunk_idx: c.chunk_idx,
                    score,
                })
                .collect();
            // Stable sort: tied rescores keep the vector ordering.
            rescored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            rescored.truncate(top_k);
            rescored
        }
        Ok(scores) => {
            eprintln!(
                "Warning: reranker returned {} scores for {} candidates, using vector order",
                scores.len(),
                candidates.len()
            );
            fallback()
        }
        Err(e) => {
            eprintln!("Warning: reranking failed ({}), using vector order", e);
            fallback()
        }
    }
}

// ============ Local cross-encoder (fastembed) ============

#[cfg(feature = "local-models")]
pub struct LocalReranker {
    model_name: String,
    model: std::sync::Arc<std::sync::Mutex<fastembed::TextRerank>>,
}

#[cfg(feature = "local-models")]
impl LocalReranker {
    pub fn new(model: &str) -> Result<Self, EngineError> {
        let reranker_model = match model {
            "bge-reranker-base" => fastembed::RerankerModel::BGERerankerBase,
            "jina-reranker-v1-turbo-en" => fastembed::RerankerModel::JINARerankerV1TurboEn,
            other => {
                return Err(EngineError::ModelLoad(format!(
                    "unknown reranker model: '{}'. Supported: bge-reranker-base, \
                     jina-reranker-v1-turbo-en",
                    other
                )));
            }
        };

        let session = fastembed::TextRerank::try_new(
            fastembed::RerankInitOptions::new(reranker_model).with_show_download_progress(true),
        )
        .map_err(|e| {
            EngineError::ModelLoad(format!("failed to initialize reranker {}: {}", model, e))
        })?;

        Ok(Self {
            model_name: model.to_string(),
            model: std::sync::Arc::new(std::sync::Mutex::new(session)),
        })
    }
}

#[cfg(feature = "local-models")]
#[async_trait]
impl Reranker for LocalReranker {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, EngineError> {
        let model = self.model.clone();
        let query = query.to_string();
        let passages = passages.to_vec();
        let n = passages.len();

        tokio::task::spawn_blocking(move || {
            let mut session = model
                .lock()
                .map_err(|_| EngineError::Inference("reranker session poisoned".to_string()))?;
            let results = session
                .rerank(query, passages, false, None)
                .map_err(|e| EngineError::Inference(format!("reranking failed: {}", e)))?;

            // fastembed returns results sorted by score; map them back onto
            // input positions.
            let mut scores = vec![0.0f32; n];
            for r in results {
                scores[r.index] = r.score;
            }
            Ok(scores)
        })
        .await
        .map_err(|e| EngineError::Inference(format!("reranking task panicked: {}", e)))?
    }
}
