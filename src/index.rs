//! In-memory vector index.
//!
//! Holds one vector per chunk, positionally aligned with corpus sequence
//! order, and answers nearest-neighbor queries by brute-force cosine scan.
//! At corpus scale (one public-health program's documents, thousands of
//! chunks at most) a scan beats maintaining an ANN structure.
//!
//! Built once during loading and read-only afterwards; concurrent searches
//! need no locking.

use crate::embedding::cosine_similarity;
use crate::error::EngineError;
use crate::models::Candidate;

/// Scores closer than this are considered tied and keep corpus order.
const SCORE_EPSILON: f32 = 1e-6;

#[derive(Debug)]
pub struct VectorIndex {
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build the index from per-chunk vectors in corpus order.
    ///
    /// All vectors must share one dimensionality; a mismatch means the
    /// embedding records are inconsistent and loading must fail.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, EngineError> {
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                return Err(EngineError::ModelLoad(format!(
                    "embedding dimensionality mismatch at chunk {}: {} != {}",
                    i,
                    v.len(),
                    dims
                )));
            }
        }
        Ok(Self { dims, vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Return the `k` most similar chunks, best first.
    ///
    /// Ordering is by descending cosine similarity; scores within epsilon
    /// are tied and resolved by corpus order (lower sequence index first),
    /// keeping results deterministic across runs.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(chunk_idx, v)| Candidate {
                chunk_idx,
                score: cosine_similarity(query, v),
            })
            .collect();

        // Quantizing by epsilon gives a total order, so ties fall through
        // to the sequence index instead of depending on sort internals.
        candidates.sort_by(|a, b| {
            let qa = (a.score / SCORE_EPSILON).round() as i64;
            let qb = (b.score / SCORE_EPSILON).round() as i64;
            qb.cmp(&qa).then(a.chunk_idx.cmp(&b.chunk_idx))
        });

        candidates.truncate(k);
        candidates
    }
}
