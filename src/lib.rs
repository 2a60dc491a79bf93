//! # FarmaQA
//!
//! Extractive question answering over the Farmácia Popular document corpus.
//!
//! FarmaQA loads a fixed corpus of scraped program documents, splits them
//! into overlapping chunks, embeds the chunks (with a persistent cache),
//! and answers natural-language questions by retrieving, reranking, and
//! extracting a literal answer span from the corpus text. It never
//! generates text: every answer is a verbatim quote with a source.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Corpus   │──▶│ Chunk+Embed │──▶│ Vector index │
//! │  (JSON)   │   │  (cached)   │   │  (cosine)    │
//! └───────────┘   └─────────────┘   └──────┬───────┘
//!                                          │ query
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐      ┌────────────┐
//!                 │ Reranker │─────▶│ Extractor  │──▶ answer span
//!                 │(optional)│      │ (QA model) │
//!                 └──────────┘      └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! farmaqa corpus                          # inspect the loaded documents
//! farmaqa index                           # chunk, embed, and warm the cache
//! farmaqa ask "Quem pode participar do programa?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`models`] | Core data types |
//! | [`corpus`] | JSON document loading |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`embedding`] | Embedding backends (local, OpenAI-compatible) |
//! | [`cache`] | Persistent embedding cache (SQLite) |
//! | [`store`] | Batching, cache read-through, bounded retry |
//! | [`index`] | Brute-force cosine vector index |
//! | [`rerank`] | Cross-encoder reranking with vector-order fallback |
//! | [`extract`] | Extractive answer span selection |
//! | [`engine`] | Pipeline orchestration and lifecycle |

pub mod cache;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod rerank;
pub mod store;
