//! Watch mode: rerun the incremental pass whenever supported files under the
//! corpus root change.
//!
//! Each settled batch of events triggers one full [`Ingestor::run`]. The
//! ledger makes unchanged files cheap, and running whole passes keeps a single
//! writer on the store and the ledger.

mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::embeddings::Embedder;
use crate::error::{DocindexError, Result};
use crate::ingest::{dispatch, Ingestor, RunOptions};
use crate::store::VectorStore;

/// True when a change at `path` can affect the index: the path is under
/// `root` and has a supported extension. Deleted files count too.
pub fn is_relevant(path: &Path, root: &Path) -> bool {
    if !path.starts_with(root) {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| dispatch(e).is_some())
}

/// Run one pass up front, then one pass per settled batch of relevant changes.
/// Backend failures are logged and retried on the next change.
pub async fn run_watcher(
    ingestor: Ingestor,
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    root: PathBuf,
    debounce_ms: u64,
) -> Result<()> {
    let root = root
        .canonicalize()
        .map_err(|e| DocindexError::Config(format!("corpus root {}: {}", root.display(), e)))?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let watch_root = root.clone();
    std::thread::spawn(move || {
        if let Err(e) = watcher::run_watcher_thread(&watch_root, Duration::from_millis(debounce_ms), tx) {
            log::error!("watcher thread error: {}", e);
        }
    });

    run_pass(&ingestor, &embedder, &store).await;

    while let Some(paths) = rx.recv().await {
        let relevant: Vec<&PathBuf> = paths.iter().filter(|p| is_relevant(p, &root)).collect();
        if relevant.is_empty() {
            continue;
        }
        for p in &relevant {
            log::info!("watch: changed {}", p.display());
        }
        run_pass(&ingestor, &embedder, &store).await;
    }

    Ok(())
}

async fn run_pass(ingestor: &Ingestor, embedder: &Arc<dyn Embedder>, store: &VectorStore) {
    if let Err(e) = ingestor
        .run(embedder.clone(), store.clone(), RunOptions::default())
        .await
    {
        log::error!("watch: ingestion pass failed: {}", e);
    }
}
