//! # FarmaQA CLI (`farmaqa`)
//!
//! Command-line interface for the Farmácia Popular question-answering
//! pipeline.
//!
//! ## Usage
//!
//! ```bash
//! farmaqa --config ./farmaqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `farmaqa corpus` | List the documents the corpus directory yields |
//! | `farmaqa index` | Chunk and embed the corpus, warming the cache |
//! | `farmaqa ask "<question>"` | Answer a question from the corpus |
//!
//! Settings come from the TOML file; the deployment environment variables
//! (`EMBEDDINGS_MODEL`, `TOP_K`, `CACHE_DIR`, ...) override it, and a
//! missing file falls back to defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use farmaqa::config::{self, Config};
use farmaqa::corpus;
use farmaqa::engine::{Engine, PipelineModels};
use farmaqa::models::QueryStatus;

/// FarmaQA — extractive question answering over the Farmácia Popular
/// document corpus.
#[derive(Parser)]
#[command(
    name = "farmaqa",
    about = "Extractive question answering over the Farmácia Popular document corpus",
    version,
    long_about = "FarmaQA chunks and embeds a fixed corpus of scraped program documents, \
    then answers natural-language questions by vector retrieval, cross-encoder reranking, \
    and extractive span selection. Answers are verbatim quotes with a source document."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./farmaqa.toml`; a missing file means built-in defaults.
    /// Environment variables override either.
    #[arg(long, global = true, default_value = "./farmaqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List the documents the corpus directory yields.
    ///
    /// Loads and parses every matched JSON file, applying the same
    /// skip-empty rules the pipeline uses, and prints one line per document.
    Corpus,

    /// Chunk and embed the whole corpus.
    ///
    /// Runs the full loading pipeline once, populating the embedding cache
    /// so a later `ask` (or server start) skips recomputation. Idempotent.
    Index,

    /// Answer a question from the corpus.
    ///
    /// Loads the pipeline (reusing cached embeddings), runs retrieval,
    /// reranking, and span extraction, and prints the answer with its
    /// source and confidence.
    Ask {
        /// The question, in the corpus language.
        question: String,

        /// Print the full response as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Corpus => {
            let documents = corpus::load_corpus(&cfg.corpus)?;
            for doc in &documents {
                println!(
                    "{}  {}  ({} chars)",
                    doc.id,
                    doc.title,
                    doc.text.chars().count()
                );
            }
            println!("{} documents", documents.len());
        }
        Commands::Index => {
            let models = PipelineModels::from_config(&cfg)?;
            let engine = Engine::load(&cfg, models).await?;
            println!(
                "Index ready: {} chunks, model {}",
                engine.chunk_count(),
                engine.embedding_model()
            );
        }
        Commands::Ask { question, json } => {
            let models = PipelineModels::from_config(&cfg)?;
            let engine = Engine::load(&cfg, models).await?;
            let response = engine.answer(&question).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                match response.status {
                    QueryStatus::Answered => {
                        println!("{}", response.answer.unwrap_or_default());
                        println!(
                            "  — {} (confiança {:.2})",
                            response.source.unwrap_or_default(),
                            response.confidence.unwrap_or(0.0)
                        );
                    }
                    QueryStatus::NoAnswer => {
                        println!("Nenhuma resposta encontrada no corpus.");
                    }
                    QueryStatus::NotReady => {
                        println!("O motor ainda está carregando. Tente novamente.");
                    }
                    QueryStatus::Error => {
                        eprintln!(
                            "Erro: {}",
                            response.error.unwrap_or_else(|| "desconhecido".to_string())
                        );
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Load the config file, or fall back to defaults (still applying
/// environment overrides) when it does not exist.
fn load_or_default(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        let mut cfg = Config::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }
}
