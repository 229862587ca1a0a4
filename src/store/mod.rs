//! Persistent vector store on SQLite.
//!
//! Every vector lives in the `vectors` table under a collection name, keyed
//! by an id derived from the record's origin. Similarity queries are a full
//! scan with cosine scoring, which is plenty for corpora of this size.

pub mod migrate;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::task;

use crate::error::{DocindexError, Result};
use crate::ingest::{Record, RecordKind};

/// One embedded record ready to be written
#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub id: String,
    pub embedding: Vec<f32>,
    pub record: Record,
}

/// A stored record returned by a similarity query
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub record: Record,
    /// Cosine similarity to the query
    pub score: f32,
    /// 1-based position in the result list
    pub rank: usize,
}

/// Metadata persisted beside each vector (everything but the content)
#[derive(Debug, Serialize, Deserialize)]
struct StoredMetadata {
    source: String,
    path: String,
    parent_folder: String,
    year: i32,
    kind: RecordKind,
    format: String,
    #[serde(default)]
    page: Option<u32>,
}

impl StoredMetadata {
    fn of(record: &Record) -> Self {
        Self {
            source: record.source.clone(),
            path: record.path.clone(),
            parent_folder: record.parent_folder.clone(),
            year: record.year,
            kind: record.kind,
            format: record.format.clone(),
            page: record.page,
        }
    }

    fn into_record(self, content: String) -> Record {
        Record {
            content,
            source: self.source,
            path: self.path,
            parent_folder: self.parent_folder,
            year: self.year,
            kind: self.kind,
            format: self.format,
            page: self.page,
        }
    }
}

/// Stable identifier for the `ordinal`-th record extracted from `path`.
///
/// Reprocessing an unchanged record after a crash maps to the same id, so the
/// upsert overwrites instead of duplicating.
pub fn vector_id(path: &str, ordinal: usize, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Handle on one collection of the vector store
#[derive(Debug, Clone)]
pub struct VectorStore {
    path: PathBuf,
    collection: String,
}

impl VectorStore {
    /// Open (creating if needed) the store at `db_path` and bring its schema up to date.
    pub async fn open(db_path: impl AsRef<Path>, collection: impl Into<String>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path,
            collection: collection.into(),
        };
        store.with_connection(migrate::run_migrations).await?;
        Ok(store)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_connection(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;

        // WAL lets queries run while an ingestion pass writes. synchronous = FULL
        // so a committed upsert survives power loss before the ledger is written.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = FULL; \
             PRAGMA temp_store = MEMORY; \
             PRAGMA busy_timeout = 5000;"
        )?;

        Ok(conn)
    }

    /// Execute a closure with a fresh connection on the blocking pool
    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::open_connection(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DocindexError::InvalidInput(format!("store task failed: {}", e)))?
    }

    /// Insert or replace vectors in a single transaction. All or nothing.
    pub async fn upsert(&self, vectors: Vec<IndexedVector>) -> Result<usize> {
        if vectors.is_empty() {
            return Ok(0);
        }

        let collection = self.collection.clone();
        let indexed_at = chrono::Utc::now().to_rfc3339();

        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO vectors (
                        collection, id, content, source, year,
                        metadata_json, dimensions, embedding, indexed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(collection, id) DO UPDATE SET
                        content = excluded.content,
                        source = excluded.source,
                        year = excluded.year,
                        metadata_json = excluded.metadata_json,
                        dimensions = excluded.dimensions,
                        embedding = excluded.embedding,
                        indexed_at = excluded.indexed_at
                    "#,
                )?;

                for v in &vectors {
                    let metadata = serde_json::to_string(&StoredMetadata::of(&v.record))
                        .map_err(|e| DocindexError::InvalidInput(format!("metadata: {}", e)))?;
                    stmt.execute(params![
                        collection,
                        v.id,
                        v.record.content,
                        v.record.source,
                        v.record.year,
                        metadata,
                        v.embedding.len() as i64,
                        embedding_to_blob(&v.embedding),
                        indexed_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(vectors.len())
        })
        .await
    }

    /// Top-`k` records by cosine similarity to `embedding`.
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        self.query_filtered(embedding, k, None).await
    }

    /// Like [`VectorStore::query`], optionally restricted to one year label.
    pub async fn query_filtered(
        &self,
        embedding: &[f32],
        k: usize,
        year: Option<i32>,
    ) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let collection = self.collection.clone();
        let query_vec = embedding.to_vec();

        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, content, metadata_json, embedding
                FROM vectors
                WHERE collection = ?1 AND dimensions = ?2
                AND (?3 IS NULL OR year = ?3)
                "#,
            )?;
            let mut rows = stmt.query(params![collection, query_vec.len() as i64, year])?;

            let mut scored: Vec<(f32, String, String, String)> = Vec::new();
            while let Some(row) = rows.next()? {
                let blob: Vec<u8> = row.get(3)?;
                let Some(stored) = blob_to_embedding(&blob) else {
                    continue;
                };
                let score = cosine_similarity(&query_vec, &stored);
                scored.push((score, row.get(0)?, row.get(1)?, row.get(2)?));
            }

            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(k);

            scored
                .into_iter()
                .enumerate()
                .map(|(idx, (score, id, content, metadata))| {
                    let metadata: StoredMetadata = serde_json::from_str(&metadata)
                        .map_err(|e| DocindexError::InvalidInput(format!("stored metadata for {}: {}", id, e)))?;
                    Ok(ScoredRecord {
                        id,
                        record: metadata.into_record(content),
                        score,
                        rank: idx + 1,
                    })
                })
                .collect()
        })
        .await
    }

    /// Number of vectors in the collection
    pub async fn count(&self) -> Result<usize> {
        let collection = self.collection.clone();
        self.with_connection(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM vectors WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
        .await
    }

    /// Distinct source file names in the collection, sorted
    pub async fn sources(&self) -> Result<Vec<String>> {
        let collection = self.collection.clone();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT source FROM vectors WHERE collection = ?1 ORDER BY source",
            )?;
            let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }
}

/// Raw little-endian f32 bytes
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }

    blob.chunks(4)
        .map(|bytes| {
            let arr: [u8; 4] = bytes.try_into().ok()?;
            Some(f32::from_le_bytes(arr))
        })
        .collect()
}

/// Cosine similarity; 0.0 when either vector has zero magnitude or lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
