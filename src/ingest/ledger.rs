//! Ledger of already-indexed file versions.
//!
//! The ledger is a flat JSON object mapping a corpus-relative path to the
//! fingerprint that was last committed to the vector store. It is read once
//! per run, mutated in memory, and rewritten whole after every successful
//! flush.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{DocindexError, Result};
use crate::ingest::Fingerprint;

/// In-memory view of the ledger file plus its on-disk location.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: BTreeMap<String, Fingerprint>,
}

impl Ledger {
    /// Load the ledger at `path`.
    ///
    /// A missing file yields an empty ledger. A file that cannot be read or
    /// parsed is logged and also treated as empty, so the run reprocesses
    /// everything instead of aborting.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("{}; treating ledger as empty", e);
                BTreeMap::new()
            }
        };
        log::debug!("Ledger {} loaded with {} entries", path.display(), entries.len());
        Self { path, entries }
    }

    /// Last committed fingerprint for `path`, if any.
    pub fn get(&self, path: &str) -> Option<&Fingerprint> {
        self.entries.get(path)
    }

    /// Record `fingerprint` for `path` in memory. Durable only after [`Ledger::flush`].
    pub fn mark_seen(&mut self, path: &str, fingerprint: Fingerprint) {
        self.entries.insert(path.to_string(), fingerprint);
    }

    /// Atomically replace the ledger file with the current mapping.
    ///
    /// The JSON is written to a temporary file in the same directory and
    /// renamed over the target, so readers see either the old or the new
    /// ledger, never a truncated one.
    pub fn flush(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let json = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| DocindexError::InvalidInput(format!("ledger serialization: {}", e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| DocindexError::Io(e.error))?;

        log::debug!("Ledger flushed ({} entries) to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, Fingerprint>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(DocindexError::LedgerCorruption(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    serde_json::from_str(&raw).map_err(|e| {
        DocindexError::LedgerCorruption(format!("cannot parse {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::from(s.to_string())
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = Ledger::load(temp_dir.path().join("controle.json"));
        assert!(ledger.is_empty());
        assert!(ledger.get("a.csv").is_none());
    }

    #[test]
    fn test_corrupt_ledger_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("controle.json");
        fs::write(&path, "{\"a.csv\": \"abc\", broken").unwrap();

        let ledger = Ledger::load(&path);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_wrong_shape_ledger_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("controle.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(Ledger::load(&path).is_empty());
    }

    #[test]
    fn test_mark_seen_is_memory_only_until_flush() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("controle.json");

        let mut ledger = Ledger::load(&path);
        ledger.mark_seen("docs/a.pdf", fp("111"));
        assert_eq!(ledger.get("docs/a.pdf"), Some(&fp("111")));
        assert!(!path.exists());

        ledger.flush().unwrap();
        let reloaded = Ledger::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("docs/a.pdf"), Some(&fp("111")));
    }

    #[test]
    fn test_flush_writes_flat_json_object() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("controle.json");

        let mut ledger = Ledger::load(&path);
        ledger.mark_seen("b.txt", fp("bbb"));
        ledger.mark_seen("a.csv", fp("aaa"));
        ledger.flush().unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["a.csv"], "aaa");
        assert_eq!(value["b.txt"], "bbb");
        // no temp files left behind
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_flush_overwrites_previous_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("controle.json");

        let mut ledger = Ledger::load(&path);
        ledger.mark_seen("a.csv", fp("v1"));
        ledger.flush().unwrap();
        ledger.mark_seen("a.csv", fp("v2"));
        ledger.flush().unwrap();

        assert_eq!(Ledger::load(&path).get("a.csv"), Some(&fp("v2")));
    }

    #[test]
    fn test_flush_into_missing_directory_fails_and_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("controle.json");

        let mut ledger = Ledger::load(&path);
        ledger.mark_seen("a.csv", fp("v1"));
        assert!(ledger.flush().is_err());
        assert!(!path.exists());
    }
}
