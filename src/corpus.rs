//! Corpus loading.
//!
//! Documents are JSON files under the configured directory. A file holds
//! either a single document object or an array of them. Files are visited in
//! sorted path order so chunk sequence numbers are stable across runs.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::EngineError;
use crate::models::Document;

/// Load every document matched by the corpus globs.
///
/// Empty-text documents are skipped with a warning; they chunk to nothing
/// and would only produce dead index slots. An unreadable file or malformed
/// JSON is fatal, since a silently half-loaded corpus would answer questions
/// from incomplete knowledge.
pub fn load_corpus(config: &CorpusConfig) -> Result<Vec<Document>, EngineError> {
    if !config.dir.is_dir() {
        return Err(EngineError::Corpus(format!(
            "corpus directory not found: {}",
            config.dir.display()
        )));
    }

    let include = build_globset(&config.include_globs)?;
    let exclude = build_globset(&config.exclude_globs)?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(&config.dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            EngineError::Corpus(format!("failed to walk {}: {}", config.dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&config.dir)
            .unwrap_or(entry.path());
        if include.is_match(rel) && !exclude.is_match(rel) {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();

    let mut documents = Vec::new();
    for path in &paths {
        for doc in read_document_file(path)? {
            if doc.text.trim().is_empty() {
                eprintln!(
                    "Warning: skipping document '{}' from {}: empty text",
                    doc.id,
                    path.display()
                );
                continue;
            }
            documents.push(doc);
        }
    }

    if documents.is_empty() {
        return Err(EngineError::Corpus(format!(
            "no usable documents under {}",
            config.dir.display()
        )));
    }

    Ok(documents)
}

/// Parse one corpus file: a single document object or an array of them.
fn read_document_file(path: &Path) -> Result<Vec<Document>, EngineError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Corpus(format!("failed to read {}: {}", path.display(), e)))?;

    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| EngineError::Corpus(format!("invalid JSON in {}: {}", path.display(), e)))?;

    let docs: Vec<Document> = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|doc| vec![doc])
    }
    .map_err(|e| {
        EngineError::Corpus(format!("unexpected document shape in {}: {}", path.display(), e))
    })?;

    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, EngineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| EngineError::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| EngineError::Config(format!("failed to build glob set: {}", e)))
}
