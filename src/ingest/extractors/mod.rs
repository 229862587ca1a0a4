pub mod tabular;
pub mod paginated;
pub mod word;
pub mod plaintext;

use crate::config::IngestConfig;
use crate::error::{DocindexError, Result};
use crate::ingest::{Record, SourceFile, YearDetector};

/// Knobs shared by every extractor
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Tabular sampling cap (rows per file)
    pub max_rows: usize,
    /// Paginated sampling cap (pages per file)
    pub max_pages: usize,
    pub delimiter: u8,
    pub years: YearDetector,
}

impl ExtractOptions {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            max_rows: config.max_rows_per_file,
            max_pages: config.max_pages_per_file,
            delimiter: config.delimiter_byte(),
            years: YearDetector::new(config.content_year_window),
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

/// Turns one source file into zero or more records.
///
/// Errors are scoped to the file: the caller logs them and moves on.
pub trait Extractor: Send + Sync {
    fn extract(&self, file: &SourceFile, options: &ExtractOptions) -> Result<Vec<Record>>;
}

/// Extractor selected for a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    /// Delimited rows (csv)
    Tabular,
    /// Page-oriented documents (pdf)
    Paginated,
    /// Word-processed documents (docx)
    Word,
    /// Plain text (txt)
    PlainText,
}

impl ExtractorKind {
    pub fn extractor(self) -> &'static dyn Extractor {
        match self {
            ExtractorKind::Tabular => &tabular::TabularExtractor,
            ExtractorKind::Paginated => &paginated::PaginatedExtractor,
            ExtractorKind::Word => &word::WordExtractor,
            ExtractorKind::PlainText => &plaintext::PlainTextExtractor,
        }
    }
}

/// Map a file extension to its extractor, case-insensitively.
///
/// Spreadsheets (`xlsx`, `xls`) have no extractor; like any unknown extension
/// they map to `None` and are counted as skipped.
pub fn dispatch(extension: &str) -> Option<ExtractorKind> {
    match extension.to_ascii_lowercase().as_str() {
        "csv" => Some(ExtractorKind::Tabular),
        "pdf" => Some(ExtractorKind::Paginated),
        "docx" | "doc" => Some(ExtractorKind::Word),
        "txt" => Some(ExtractorKind::PlainText),
        _ => None,
    }
}

/// Decode strict UTF-8, dropping a leading byte-order mark.
pub(crate) fn decode_utf8(bytes: &[u8], path: &str) -> Result<String> {
    let text = std::str::from_utf8(bytes).map_err(|_| DocindexError::Decode {
        path: path.to_string(),
        encoding: "UTF-8".to_string(),
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}

/// Decode UTF-8, falling back to Latin-1 (ISO-8859-1) when the bytes are not valid UTF-8.
pub(crate) fn decode_with_fallback(bytes: &[u8], path: &str) -> String {
    match decode_utf8(bytes, path) {
        Ok(text) => text,
        Err(_) => {
            log::debug!("{} is not UTF-8, decoding as Latin-1", path);
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}
