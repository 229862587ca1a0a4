use super::{ExtractOptions, Extractor};
use crate::error::{DocindexError, Result};
use crate::ingest::{Record, RecordKind, SourceFile};

/// Page-oriented extractor (PDF): one record per page, in document order.
///
/// Only the first `max_pages` pages are looked at. Pages whose text is blank
/// still count against that cap but produce no record.
pub struct PaginatedExtractor;

impl Extractor for PaginatedExtractor {
    fn extract(&self, file: &SourceFile, options: &ExtractOptions) -> Result<Vec<Record>> {
        let bytes = std::fs::read(&file.absolute_path).map_err(DocindexError::Io)?;
        let doc = lopdf::Document::load_mem(&bytes)
            .map_err(|e| DocindexError::extraction(&file.relative_path, e))?;

        let pages = doc.get_pages();
        log::debug!("{}: {} page(s), reading up to {}", file.relative_path, pages.len(), options.max_pages);

        let mut records = Vec::new();
        for &number in pages.keys().take(options.max_pages) {
            let text = doc
                .extract_text(&[number])
                .map_err(|e| DocindexError::extraction(&file.relative_path, format!("page {}: {}", number, e)))?;

            if text.trim().is_empty() {
                continue;
            }

            records.push(Record {
                year: options.years.detect(&file.file_name, &text),
                content: text,
                source: file.file_name.clone(),
                path: file.relative_path.clone(),
                parent_folder: file.parent_folder.clone(),
                kind: RecordKind::Paginated,
                format: file.extension.clone(),
                page: Some(number),
            });
        }

        Ok(records)
    }
}
