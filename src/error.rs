//! Error taxonomy for the answering pipeline.
//!
//! The variants map directly onto how the orchestrator reacts:
//! - [`EngineError::Config`] and [`EngineError::Corpus`] fail startup.
//! - [`EngineError::ModelLoad`] fails startup and moves the engine to `Failed`.
//! - [`EngineError::Inference`] is surfaced for a single query after bounded
//!   retries; it is never fatal to the process.
//! - [`EngineError::Timeout`] wraps a whole `answer()` call that exceeded the
//!   configured deadline.
//!
//! Cache read problems have no variant on purpose: they are recovered locally
//! by treating the entry as a miss (see `cache.rs`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration (e.g. chunk overlap >= chunk size, missing model
    /// identifier). Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required model could not be loaded. Fatal for the loading phase.
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// Corpus directory unreadable or no usable documents.
    #[error("corpus error: {0}")]
    Corpus(String),

    /// A model call failed after bounded retries. Per-query only.
    #[error("inference error: {0}")]
    Inference(String),

    /// The whole answer() call exceeded its deadline.
    #[error("query timed out after {0}s")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, EngineError>;
