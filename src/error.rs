use thiserror::Error;

/// Main error type for docindex
#[derive(Error, Debug)]
pub enum DocindexError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be decoded with any of the attempted encodings
    #[error("Decode error: {path} is not valid {encoding}")]
    Decode { path: String, encoding: String },

    /// Format-specific parse failure for a single file
    #[error("Extraction error in {path}: {message}")]
    Extraction { path: String, message: String },

    /// Embedding or vector-store failure during a flush
    #[error("Index backend error: {message} ({} file(s) not yet committed)", uncommitted.len())]
    IndexBackend {
        message: String,
        uncommitted: Vec<String>,
    },

    /// Ledger file exists but cannot be parsed
    #[error("Ledger corruption: {0}")]
    LedgerCorruption(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Answer generation errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DocindexError {
    /// Errors scoped to one source file. The orchestrator counts these and
    /// moves on; anything else aborts the run.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            DocindexError::Io(_) | DocindexError::Decode { .. } | DocindexError::Extraction { .. }
        )
    }

    pub(crate) fn extraction(path: &str, message: impl std::fmt::Display) -> Self {
        DocindexError::Extraction {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Convenient Result type using DocindexError
pub type Result<T> = std::result::Result<T, DocindexError>;
