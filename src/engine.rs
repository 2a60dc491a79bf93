//! Pipeline orchestration and engine lifecycle.
//!
//! [`Engine::load`] runs the startup pipeline (corpus → chunks → embeddings →
//! index) and yields an immutable engine; [`Engine::answer`] runs the query
//! pipeline (embed → search → rerank → extract) under a deadline. The engine
//! holds no interior mutability, so any number of queries may run
//! concurrently against one instance.
//!
//! [`EngineHandle`] wraps the lifecycle for callers that must stay responsive
//! while loading: queries against a loading engine get `not_ready`, against a
//! failed one `error`. States move strictly forward — `Uninitialized` →
//! `Loading` → `Ready` or `Failed` — and a `Ready` engine is never replaced.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::cache::EmbeddingCache;
use crate::chunk::chunk_corpus;
use crate::config::{Config, RetrievalConfig};
use crate::corpus::load_corpus;
use crate::embedding::{create_embedder, Embedder};
use crate::error::EngineError;
use crate::extract::{AnswerExtractor, EncoderSpanExtractor};
use crate::index::VectorIndex;
use crate::models::{Answer, Chunk, QueryResponse};
use crate::rerank::{create_reranker, rerank_candidates, Reranker};
use crate::store::EmbeddingStore;

/// The model backends the engine runs on. Split out from [`Engine::load`] so
/// tests can substitute deterministic encoders.
pub struct PipelineModels {
    pub embedder: Box<dyn Embedder>,
    pub qa_encoder: Box<dyn Embedder>,
    pub reranker: Option<Box<dyn Reranker>>,
}

impl PipelineModels {
    /// Build the configured backends. The QA encoder defaults to the
    /// embedding model when no separate one is configured.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let embedder = create_embedder(&config.models, &config.models.embeddings_model)?;
        let qa_encoder = create_embedder(&config.models, config.models.effective_qa_model())?;
        let reranker = create_reranker(&config.models);
        Ok(Self {
            embedder,
            qa_encoder,
            reranker,
        })
    }
}

/// A fully loaded answering pipeline over one corpus snapshot.
pub struct Engine {
    store: EmbeddingStore,
    index: VectorIndex,
    chunks: Vec<Chunk>,
    reranker: Option<Box<dyn Reranker>>,
    extractor: EncoderSpanExtractor,
    retrieval: RetrievalConfig,
}

impl Engine {
    /// Run the startup pipeline: load documents, chunk them, embed every
    /// chunk (through the cache), and build the vector index.
    pub async fn load(config: &Config, models: PipelineModels) -> Result<Self, EngineError> {
        config.validate()?;

        let documents = load_corpus(&config.corpus)?;
        let chunks = chunk_corpus(
            &documents,
            config.chunking.chunk_chars,
            config.chunking.chunk_overlap,
        );
        println!(
            "Loaded {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let cache = EmbeddingCache::open(&config.cache.dir).await;
        let store = EmbeddingStore::new(
            models.embedder,
            cache,
            config.models.batch_size,
            config.models.max_retries,
        );

        let (vectors, report) = store.embed_chunks(&chunks).await?;
        println!(
            "Embedded {} chunks ({} from cache, {} computed)",
            report.total, report.cache_hits, report.computed
        );

        let index = VectorIndex::build(vectors)?;
        let extractor =
            EncoderSpanExtractor::new(models.qa_encoder, config.retrieval.min_confidence);

        Ok(Self {
            store,
            index,
            chunks,
            reranker: models.reranker,
            extractor,
            retrieval: config.retrieval.clone(),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn embedding_model(&self) -> &str {
        self.store.model_name()
    }

    /// Answer one question. Never fails the caller: pipeline errors and the
    /// deadline both collapse into the response status.
    pub async fn answer(&self, question: &str) -> QueryResponse {
        let deadline = Duration::from_secs(self.retrieval.answer_timeout_secs);
        match tokio::time::timeout(deadline, self.answer_inner(question)).await {
            Ok(Ok(Some(answer))) => QueryResponse::answered(answer),
            Ok(Ok(None)) => QueryResponse::no_answer(),
            Ok(Err(e)) => QueryResponse::error(e.to_string()),
            Err(_) => QueryResponse::error(
                EngineError::Timeout(self.retrieval.answer_timeout_secs).to_string(),
            ),
        }
    }

    async fn answer_inner(&self, question: &str) -> Result<Option<Answer>, EngineError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }

        let query_vec = self.store.embed_query(question).await?;
        let pool = self
            .index
            .search(&query_vec, self.retrieval.effective_pre_k());
        if pool.is_empty() {
            return Ok(None);
        }

        let kept = rerank_candidates(
            self.reranker.as_deref(),
            question,
            &pool,
            &self.chunks,
            self.retrieval.top_k,
        )
        .await;

        self.extractor.extract(question, &kept, &self.chunks).await
    }
}

/// Lifecycle of a handle's engine. States only move forward.
pub enum EngineState {
    Uninitialized,
    Loading,
    Ready(Arc<Engine>),
    Failed(String),
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Loading => "loading",
            EngineState::Ready(_) => "ready",
            EngineState::Failed(_) => "failed",
        }
    }
}

/// Shareable, cheaply clonable front for an engine that may still be loading.
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<RwLock<EngineState>>,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::Uninitialized)),
        }
    }

    pub async fn state_name(&self) -> &'static str {
        self.state.read().await.name()
    }

    /// Start loading in the background. The handle answers `not_ready` until
    /// the returned task completes.
    pub fn spawn_load(&self, config: Config, models: PipelineModels) -> tokio::task::JoinHandle<()> {
        let state = self.state.clone();
        tokio::spawn(async move {
            *state.write().await = EngineState::Loading;
            match Engine::load(&config, models).await {
                Ok(engine) => {
                    *state.write().await = EngineState::Ready(Arc::new(engine));
                }
                Err(e) => {
                    eprintln!("Warning: engine failed to load: {}", e);
                    *state.write().await = EngineState::Failed(e.to_string());
                }
            }
        })
    }

    /// Answer through the current state. The read lock is held only long
    /// enough to clone the engine handle, never across inference.
    pub async fn answer(&self, question: &str) -> QueryResponse {
        let engine = {
            let state = self.state.read().await;
            match &*state {
                EngineState::Ready(engine) => engine.clone(),
                EngineState::Uninitialized | EngineState::Loading => {
                    return QueryResponse::not_ready();
                }
                EngineState::Failed(message) => {
                    return QueryResponse::error(message.clone());
                }
            }
        };
        engine.answer(question).await
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}
