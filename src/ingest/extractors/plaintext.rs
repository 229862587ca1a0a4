use super::{decode_utf8, ExtractOptions, Extractor};
use crate::error::{DocindexError, Result};
use crate::ingest::{Record, RecordKind, SourceFile};

/// Plain text: the whole file is one record. Strict UTF-8.
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extract(&self, file: &SourceFile, options: &ExtractOptions) -> Result<Vec<Record>> {
        let bytes = std::fs::read(&file.absolute_path).map_err(DocindexError::Io)?;
        let content = decode_utf8(&bytes, &file.relative_path)?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Record {
            year: options.years.detect(&file.file_name, &content),
            content,
            source: file.file_name.clone(),
            path: file.relative_path.clone(),
            parent_folder: file.parent_folder.clone(),
            kind: RecordKind::Flat,
            format: file.extension.clone(),
            page: None,
        }])
    }
}
