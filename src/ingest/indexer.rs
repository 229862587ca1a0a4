use std::sync::Arc;

use crate::embeddings::Embedder;
use crate::error::{DocindexError, Result};
use crate::ingest::{Fingerprint, Ledger, Record};
use crate::store::{vector_id, IndexedVector, VectorStore};

/// A record waiting for its embedding
struct Buffered {
    id: String,
    record: Record,
}

/// Buffers records and commits them to the vector store in batches.
///
/// A file's ledger entry is only updated after the flush that carries its
/// records has been upserted, and the ledger is written to disk right after.
/// Every mutation goes through `&mut self`, so appends are serialised and a
/// flush never overlaps another one.
pub struct BatchIndexer {
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    ledger: Ledger,
    flush_size: usize,
    buffer: Vec<Buffered>,
    /// Files whose records are all in `buffer`, awaiting the next flush
    pending: Vec<(String, Fingerprint)>,
    vectors_written: usize,
    flushes: usize,
}

impl BatchIndexer {
    pub fn new(embedder: Arc<dyn Embedder>, store: VectorStore, ledger: Ledger, flush_size: usize) -> Self {
        Self {
            embedder,
            store,
            ledger,
            flush_size: flush_size.max(1),
            buffer: Vec::new(),
            pending: Vec::new(),
            vectors_written: 0,
            flushes: 0,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn vectors_written(&self) -> usize {
        self.vectors_written
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Buffer every record of one file. Flushes once the buffer reaches the
    /// flush size; a file's records always go out in the same flush.
    pub async fn add(&mut self, path: &str, fingerprint: Fingerprint, records: Vec<Record>) -> Result<()> {
        for (ordinal, record) in records.into_iter().enumerate() {
            self.buffer.push(Buffered {
                id: vector_id(path, ordinal, &record.content),
                record,
            });
        }
        self.pending.push((path.to_string(), fingerprint));

        if self.buffer.len() >= self.flush_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Embed and upsert everything buffered, then persist the ledger.
    ///
    /// On failure nothing is marked seen and the error lists the files that
    /// were not committed.
    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() && self.buffer.is_empty() {
            return Ok(());
        }

        let written = self.commit_buffer().await.map_err(|e| self.backend_error(e))?;

        for (path, fingerprint) in &self.pending {
            self.ledger.mark_seen(path, fingerprint.clone());
        }
        if let Err(e) = self.ledger.flush() {
            return Err(self.backend_error(format!("ledger flush failed: {}", e)));
        }

        log::info!(
            "Flushed {} vector(s) covering {} file(s); ledger has {} entries",
            written,
            self.pending.len(),
            self.ledger.len()
        );

        self.vectors_written += written;
        self.flushes += 1;
        self.buffer.clear();
        self.pending.clear();
        Ok(())
    }

    /// Flush whatever is left at the end of a run.
    pub async fn finish(&mut self) -> Result<()> {
        self.flush().await
    }

    async fn commit_buffer(&self) -> std::result::Result<usize, String> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = self.buffer.iter().map(|b| b.record.content.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(texts)
            .await
            .map_err(|e| e.to_string())?;

        if embeddings.len() != self.buffer.len() {
            return Err(format!(
                "embedder returned {} vectors for {} records",
                embeddings.len(),
                self.buffer.len()
            ));
        }

        let expected = self.embedder.dimensions();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(format!(
                "embedder returned a {}-dimensional vector, expected {}",
                bad.len(),
                expected
            ));
        }

        let vectors: Vec<IndexedVector> = self
            .buffer
            .iter()
            .zip(embeddings)
            .map(|(b, embedding)| IndexedVector {
                id: b.id.clone(),
                embedding,
                record: b.record.clone(),
            })
            .collect();

        self.store.upsert(vectors).await.map_err(|e| e.to_string())
    }

    fn backend_error(&self, message: String) -> DocindexError {
        let uncommitted: Vec<String> = self.pending.iter().map(|(path, _)| path.clone()).collect();
        log::error!(
            "Flush failed, {} file(s) not committed: {}",
            uncommitted.len(),
            uncommitted.join(", ")
        );
        DocindexError::IndexBackend { message, uncommitted }
    }
}
