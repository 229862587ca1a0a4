use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use crate::error::DocindexError;

/// A file discovered under the corpus root
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the corpus root, forward slashes. Used as the ledger key.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Lowercased extension without the dot
    pub extension: String,
    /// File name without directories
    pub file_name: String,
    /// Name of the directory the file lives in
    pub parent_folder: String,
}

/// Result of one corpus walk
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<SourceFile>,
    /// Entries the walk could not resolve (unreadable directory, dangling
    /// link, symlink loop), keyed by the path as far as it is known
    pub failures: Vec<(String, DocindexError)>,
}

/// Discover every regular file under `root`.
///
/// Recursively walks the whole tree, following symlinks. No extension
/// filtering happens here: the dispatcher decides what is supported so that
/// unsupported files can be counted as skipped. Entries that cannot be
/// resolved are logged and returned as failures; they never stop the walk.
/// Files are sorted by relative path so runs are deterministic.
pub fn discover_files(root: &Path) -> Discovery {
    let mut discovery = Discovery::default();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| relative_to(p, root))
                    .unwrap_or_else(|| root.display().to_string());
                log::warn!("Cannot walk {}: {}", path, e);
                discovery.failures.push((path, DocindexError::Io(e.into())));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        discovery.files.push(SourceFile {
            relative_path: relative_to(path, root),
            absolute_path: path.to_path_buf(),
            extension: extension_of(path),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            parent_folder: parent_folder_of(path),
        });
    }

    discovery.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    log::info!(
        "Discovered {} files in {} ({} unreadable)",
        discovery.files.len(),
        root.display(),
        discovery.failures.len()
    );
    discovery
}

/// `path` relative to `root` with forward slashes; walked paths always start with `root`.
fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Name of the immediate parent directory; empty when there is none.
fn parent_folder_of(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
impl SourceFile {
    /// Build a SourceFile for an existing path outside of a walk.
    pub(crate) fn for_test(root: &Path, path: &Path) -> Self {
        SourceFile {
            relative_path: relative_to(path, root),
            absolute_path: path.to_path_buf(),
            extension: extension_of(path),
            file_name: path.file_name().unwrap().to_string_lossy().to_string(),
            parent_folder: parent_folder_of(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use std::fs;

    #[test]
    fn test_discover_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("auditoria/2021")).unwrap();
        fs::write(root.join("readme.txt"), "root note").unwrap();
        fs::write(root.join("auditoria/contas.csv"), "ano;valor\n").unwrap();
        fs::write(root.join("auditoria/2021/relatorio.PDF"), b"%PDF-1.4").unwrap();
        fs::write(root.join("auditoria/planilha.xlsx"), b"PK").unwrap();

        let discovery = discover_files(root);
        assert!(discovery.failures.is_empty());
        let files = discovery.files;

        // every regular file is discovered, supported or not
        assert_eq!(files.len(), 4);
        let rels: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(
            rels,
            vec![
                "auditoria/2021/relatorio.PDF",
                "auditoria/contas.csv",
                "auditoria/planilha.xlsx",
                "readme.txt",
            ]
        );

        let pdf = &files[0];
        assert_eq!(pdf.extension, "pdf");
        assert_eq!(pdf.file_name, "relatorio.PDF");
        assert_eq!(pdf.parent_folder, "2021");

        let csv = &files[1];
        assert_eq!(csv.parent_folder, "auditoria");
    }

    #[test]
    fn test_root_level_file_parent_is_root_dir_name() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("dados");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();

        let files = discover_files(&root).files;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].parent_folder, "dados");
        assert_eq!(files[0].relative_path, "notes.txt");
    }

    #[test]
    fn test_discover_files_empty() {
        let temp_dir = TempDir::new().unwrap();
        let files = discover_files(temp_dir.path()).files;
        assert_eq!(files.len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_unresolvable_entries_are_reported_not_fatal() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("dados");
        fs::create_dir_all(root.join("contas")).unwrap();
        fs::write(root.join("contas/ok.txt"), "x").unwrap();
        symlink(root.join("contas/apagado.csv"), root.join("contas/morto.csv")).unwrap();
        symlink(&root, root.join("contas/ciclo")).unwrap();

        let discovery = discover_files(&root);

        assert_eq!(discovery.files.len(), 1);
        assert_eq!(discovery.files[0].relative_path, "contas/ok.txt");
        assert_eq!(discovery.failures.len(), 2);
        let mut failed: Vec<&str> = discovery.failures.iter().map(|(p, _)| p.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["contas/ciclo", "contas/morto.csv"]);
        assert!(discovery.failures.iter().all(|(_, e)| e.is_per_file()));
    }
}
