//! Persistent embedding cache.
//!
//! A SQLite key→vector store under the configured cache directory. Keys are
//! content hashes of `(model identifier, chunk text)`, so an unchanged corpus
//! and model reuse vectors across restarts, and any change naturally misses.
//!
//! The cache is strictly best-effort: an unopenable database degrades to a
//! disabled cache, unreadable or truncated rows are treated as misses, and
//! write failures are warnings. Nothing here is ever fatal — recomputing an
//! embedding is always a valid fallback. Writes are keyed upserts
//! (last-writer-wins), which is sound because values are deterministic for
//! a given key.

use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, vec_to_blob};

pub struct EmbeddingCache {
    pool: Option<SqlitePool>,
}

impl EmbeddingCache {
    /// Open (or create) the cache database under `dir`. Any failure is
    /// reported and yields a disabled cache.
    pub async fn open(dir: &Path) -> Self {
        match Self::try_open(dir).await {
            Ok(pool) => Self { pool: Some(pool) },
            Err(e) => {
                eprintln!(
                    "Warning: embedding cache unavailable ({}), recomputing all vectors",
                    e
                );
                Self::disabled()
            }
        }
    }

    /// A cache that never hits and never stores.
    pub fn disabled() -> Self {
        Self { pool: None }
    }

    async fn try_open(dir: &Path) -> anyhow::Result<SqlitePool> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join("embeddings.sqlite");

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                key        TEXT PRIMARY KEY,
                model      TEXT NOT NULL,
                dims       INTEGER NOT NULL,
                vector     BLOB NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(pool)
    }

    /// Content hash identifying one (model, text) embedding.
    pub fn cache_key(model: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a set of keys. Returns only the hits; anything unreadable or
    /// with the wrong dimensionality counts as a miss.
    pub async fn get_many(&self, keys: &[String], dims: usize) -> HashMap<String, Vec<f32>> {
        let mut hits = HashMap::new();
        let Some(pool) = &self.pool else {
            return hits;
        };

        for key in keys {
            let row = sqlx::query("SELECT vector FROM embeddings WHERE key = ?")
                .bind(key)
                .fetch_optional(pool)
                .await;

            match row {
                Ok(Some(row)) => {
                    let blob: Vec<u8> = row.get("vector");
                    let vec = blob_to_vec(&blob);
                    if vec.len() == dims {
                        hits.insert(key.clone(), vec);
                    }
                    // Wrong length: corrupt or stale row, treat as miss.
                }
                Ok(None) => {}
                Err(e) => {
                    eprintln!("Warning: cache read failed for {}: {}", key, e);
                }
            }
        }

        hits
    }

    /// Store one vector. Upsert, so concurrent writers of the same key are
    /// harmless. Failures are warnings only.
    pub async fn put(&self, key: &str, model: &str, vector: &[f32]) {
        let Some(pool) = &self.pool else {
            return;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO embeddings (key, model, dims, vector, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                vector = excluded.vector,
                created_at = excluded.created_at
            "#,
        )
        .bind(key)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(vec_to_blob(vector))
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await;

        if let Err(e) = result {
            eprintln!("Warning: cache write failed for {}: {}", key, e);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(tmp.path()).await;
        assert!(cache.is_enabled());

        let key = EmbeddingCache::cache_key("model-a", "algum texto");
        let vec = vec![0.25f32, -1.0, 3.5];
        cache.put(&key, "model-a", &vec).await;

        let hits = cache.get_many(&[key.clone()], 3).await;
        assert_eq!(hits.get(&key), Some(&vec));
    }

    #[tokio::test]
    async fn test_miss_for_unknown_key() {
        let tmp = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(tmp.path()).await;
        let hits = cache
            .get_many(&[EmbeddingCache::cache_key("m", "t")], 3)
            .await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_dims_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(tmp.path()).await;

        let key = EmbeddingCache::cache_key("model-a", "texto");
        cache.put(&key, "model-a", &[1.0, 2.0]).await;

        // Caller now expects 4-dim vectors; the stale 2-dim row must not hit.
        let hits = cache.get_many(&[key], 4).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let tmp = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(tmp.path()).await;

        let key = EmbeddingCache::cache_key("model-a", "texto");
        cache.put(&key, "model-a", &[1.0, 1.0]).await;
        cache.put(&key, "model-a", &[2.0, 2.0]).await;

        let hits = cache.get_many(&[key.clone()], 2).await;
        assert_eq!(hits.get(&key), Some(&vec![2.0f32, 2.0]));
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = EmbeddingCache::disabled();
        let key = EmbeddingCache::cache_key("m", "t");
        cache.put(&key, "m", &[1.0]).await;
        assert!(cache.get_many(&[key], 1).await.is_empty());
    }

    #[test]
    fn test_key_depends_on_model_and_text() {
        let a = EmbeddingCache::cache_key("model-a", "texto");
        let b = EmbeddingCache::cache_key("model-b", "texto");
        let c = EmbeddingCache::cache_key("model-a", "outro");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
