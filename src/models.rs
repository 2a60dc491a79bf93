//! Core data types that flow through the answering pipeline.
//!
//! Documents and chunks are built once at load time and are immutable
//! afterwards. Candidates and answers live only within a single query.

use serde::{Deserialize, Serialize};

/// A scraped document as produced by the external collector.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub source_url: Option<String>,
    /// Full raw text. Records with empty text are skipped at load time.
    #[serde(alias = "content")]
    pub text: String,
}

/// A fixed-size overlapping window of a document, the unit of retrieval.
///
/// Offsets are character (not byte) positions into the document text.
/// Consecutive chunks of the same document overlap by the configured amount,
/// modulo boundary adjustment; the final chunk may be shorter.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub title: String,
    /// Position in corpus order; also the index into the vector index.
    pub seq: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A retrieval candidate: a chunk plus its current relevance score.
///
/// Produced by the vector index with a cosine similarity score; reranking
/// replaces the score but never the chunk reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk_idx: usize,
    pub score: f32,
}

/// An extracted answer span with its supporting chunk.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub confidence: f32,
    pub chunk_idx: usize,
    pub source: String,
}

/// Outcome kind of a query. The caller must be able to tell a valid empty
/// result (`NoAnswer`) from a not-yet-ready engine and from a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Answered,
    NoAnswer,
    NotReady,
    Error,
}

/// The sole contract exposed to the boundary layer (HTTP, CLI).
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn answered(answer: Answer) -> Self {
        Self {
            status: QueryStatus::Answered,
            answer: Some(answer.text),
            confidence: Some(answer.confidence),
            source: Some(answer.source),
            error: None,
        }
    }

    pub fn no_answer() -> Self {
        Self {
            status: QueryStatus::NoAnswer,
            answer: None,
            confidence: None,
            source: None,
            error: None,
        }
    }

    pub fn not_ready() -> Self {
        Self {
            status: QueryStatus::NotReady,
            answer: None,
            confidence: None,
            source: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::Error,
            answer: None,
            confidence: None,
            source: None,
            error: Some(message.into()),
        }
    }
}
