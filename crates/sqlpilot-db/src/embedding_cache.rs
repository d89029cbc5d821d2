use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, params};
use sqlpilot_common::{Error, Result};
use tracing::{debug, info};

/// Persistent cache of question embeddings keyed by (model, text).
///
/// Corpus re-indexing at startup only embeds questions the cache has not
/// seen for the configured model; a model change naturally misses every
/// entry and re-embeds from scratch. Misses are silent; the cache never
/// decides ranking, only avoids repeat provider calls.
pub struct EmbeddingCache {
    conn: Mutex<Connection>,
}

impl EmbeddingCache {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening embedding cache at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open embedding cache: {e}")))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory cache: {e}")))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embeddings (
                model TEXT NOT NULL,
                text TEXT NOT NULL,
                dimensions INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (model, text)
            );",
        )
        .map_err(|e| Error::Database(format!("embedding cache migration failed: {e}")))?;
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("embedding cache lock poisoned".into()))
    }

    pub fn get(&self, model: &str, text: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT embedding FROM embeddings WHERE model = ? AND text = ?")
            .map_err(|e| Error::Database(format!("failed to prepare cache lookup: {e}")))?;

        let blob: Option<Vec<u8>> = stmt
            .query_row(params![model, text], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(Error::Database(format!("cache lookup failed: {other}"))),
            })?;

        blob.as_deref().map(blob_to_embedding).transpose()
    }

    pub fn put(&self, model: &str, text: &str, embedding: &[f32]) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (model, text, dimensions, embedding)
             VALUES (?, ?, ?, ?)",
            params![
                model,
                text,
                embedding.len() as i64,
                embedding_to_blob(embedding)
            ],
        )
        .map_err(|e| Error::Database(format!("failed to store embedding: {e}")))?;
        Ok(())
    }

    /// Look up many texts at once; the result is aligned with `texts`, with
    /// `None` marking misses the caller should embed and `put` back.
    pub fn get_many(&self, model: &str, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.get(model, text)?);
        }
        let hits = out.iter().filter(|e| e.is_some()).count();
        debug!("embedding cache: {hits}/{} hits for model {model}", texts.len());
        Ok(out)
    }
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend(v.to_le_bytes());
    }
    bytes
}

fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if !blob.len().is_multiple_of(4) {
        return Err(Error::Database("invalid embedding blob length".into()));
    }

    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::EmbeddingCache;

    #[test]
    fn put_then_get_round_trips() {
        let cache = EmbeddingCache::in_memory().expect("cache should open");
        cache
            .put("model-a", "how many students", &[0.1, -0.5, 2.0])
            .expect("put should succeed");

        let hit = cache
            .get("model-a", "how many students")
            .expect("get should succeed")
            .expect("entry should exist");
        assert_eq!(hit, vec![0.1, -0.5, 2.0]);
    }

    #[test]
    fn lookups_are_keyed_by_model() {
        let cache = EmbeddingCache::in_memory().expect("cache should open");
        cache
            .put("model-a", "question", &[1.0])
            .expect("put should succeed");

        let miss = cache
            .get("model-b", "question")
            .expect("get should succeed");
        assert!(miss.is_none());
    }

    #[test]
    fn get_many_aligns_hits_and_misses() {
        let cache = EmbeddingCache::in_memory().expect("cache should open");
        cache
            .put("m", "cached", &[1.0, 2.0])
            .expect("put should succeed");

        let results = cache
            .get_many("m", &["cached".to_string(), "missing".to_string()])
            .expect("get_many should succeed");

        assert_eq!(results[0], Some(vec![1.0, 2.0]));
        assert_eq!(results[1], None);
    }

    #[test]
    fn replacing_an_entry_keeps_the_latest_vector() {
        let cache = EmbeddingCache::in_memory().expect("cache should open");
        cache.put("m", "q", &[1.0]).expect("first put");
        cache.put("m", "q", &[2.0, 3.0]).expect("second put");

        let hit = cache
            .get("m", "q")
            .expect("get should succeed")
            .expect("entry should exist");
        assert_eq!(hit, vec![2.0, 3.0]);
    }
}
