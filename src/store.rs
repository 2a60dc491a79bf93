//! Embedding store: batching, cache read-through, bounded retry.
//!
//! Sits between the pipeline and the raw [`Embedder`]. Chunk vectors go
//! through the persistent cache (hit → reuse, miss → compute and store);
//! query vectors are computed fresh every time — queries rarely repeat, so
//! caching them buys nothing. Batch size bounds peak inference cost and
//! never affects values, since each vector depends only on its own text.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::EmbeddingCache;
use crate::embedding::Embedder;
use crate::error::EngineError;
use crate::models::Chunk;

/// Outcome counters for one `embed_chunks` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedReport {
    pub total: usize,
    pub cache_hits: usize,
    pub computed: usize,
}

pub struct EmbeddingStore {
    embedder: Box<dyn Embedder>,
    cache: EmbeddingCache,
    batch_size: usize,
    max_retries: u32,
}

impl EmbeddingStore {
    pub fn new(
        embedder: Box<dyn Embedder>,
        cache: EmbeddingCache,
        batch_size: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            embedder,
            cache,
            batch_size,
            max_retries,
        }
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn dims(&self) -> usize {
        self.embedder.dims()
    }

    /// Embed all chunks, reusing cached vectors where possible. Returns one
    /// vector per chunk, in chunk order, plus hit/compute counters.
    pub async fn embed_chunks(
        &self,
        chunks: &[Chunk],
    ) -> Result<(Vec<Vec<f32>>, EmbedReport), EngineError> {
        let model = self.embedder.model_name().to_string();
        let dims = self.embedder.dims();

        let keys: Vec<String> = chunks
            .iter()
            .map(|c| EmbeddingCache::cache_key(&model, &c.text))
            .collect();

        let mut hits = self.cache.get_many(&keys, dims).await;

        let miss_indices: Vec<usize> = (0..chunks.len())
            .filter(|i| !hits.contains_key(&keys[*i]))
            .collect();

        let mut report = EmbedReport {
            total: chunks.len(),
            cache_hits: chunks.len() - miss_indices.len(),
            computed: 0,
        };

        for batch in miss_indices.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|&i| chunks[i].text.clone()).collect();
            let vectors = self.embed_with_retry(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(EngineError::Inference(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (&i, vector) in batch.iter().zip(vectors.into_iter()) {
                self.cache.put(&keys[i], &model, &vector).await;
                hits.insert(keys[i].clone(), vector);
                report.computed += 1;
            }
        }

        let vectors = collect_in_order(&keys, &mut hits)?;
        Ok((vectors, report))
    }

    /// Embed a single query. Never cached.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        let vectors = self.embed_with_retry(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Inference("empty embedding response".to_string()))
    }

    /// Call the embedder with bounded retries and exponential backoff
    /// (1s, 2s, 4s, ... capped). Transient failures surface as a per-call
    /// error only after the attempts are exhausted.
    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.embedder.embed(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    eprintln!(
                        "Warning: embedding attempt {}/{} failed: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EngineError::Inference("embedding failed after retries".to_string())))
    }
}

fn collect_in_order(
    keys: &[String],
    hits: &mut HashMap<String, Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EngineError> {
    keys.iter()
        .map(|key| {
            // Duplicate chunk texts share a key; clone rather than remove.
            hits.get(key).cloned().ok_or_else(|| {
                EngineError::Inference(format!("no vector produced for key {}", key))
            })
        })
        .collect()
}
