//! Watcher thread: notify events, debounced into batches of paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{DocindexError, Result};

/// Watch `root` recursively and send every path that has been quiet for
/// `debounce` as part of one batch. Returns when the receiver is dropped or
/// the watcher fails.
pub fn run_watcher_thread(root: &Path, debounce: Duration, tx: UnboundedSender<Vec<PathBuf>>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::channel::<Vec<PathBuf>>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(ev) = res {
            let _ = event_tx.send(ev.paths);
        }
    })
    .map_err(|e| DocindexError::Config(format!("watcher: {}", e)))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| DocindexError::Config(format!("watch {}: {}", root.display(), e)))?;

    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        match event_rx.recv_timeout(debounce) {
            Ok(paths) => {
                let now = Instant::now();
                for p in paths {
                    pending.insert(p, now);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let ready = take_settled(&mut pending, Instant::now(), debounce);
                if !ready.is_empty() && tx.send(ready).is_err() {
                    return Ok(());
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

/// Remove and return the paths whose last event is at least `debounce` old.
fn take_settled(pending: &mut HashMap<PathBuf, Instant>, now: Instant, debounce: Duration) -> Vec<PathBuf> {
    let mut ready: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, t)| now.duration_since(**t) >= debounce)
        .map(|(p, _)| p.clone())
        .collect();
    for p in &ready {
        pending.remove(p);
    }
    ready.sort();
    ready
}
