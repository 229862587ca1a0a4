use super::{decode_with_fallback, ExtractOptions, Extractor};
use crate::error::{DocindexError, Result};
use crate::ingest::{Record, RecordKind, SourceFile};

/// Columns that may carry the fiscal year, in lookup order.
const YEAR_COLUMNS: &[&str] = &["exercicio", "ano", "num_ano_exercicio"];

/// Delimited-row extractor: one record per non-empty row.
///
/// Header names are trimmed and lowercased. Rows with more fields than the
/// header are skipped; shorter rows are padded with nulls. A cell counts as
/// null when it is empty after trimming, and rows made only of nulls are
/// dropped before the row cap applies.
pub struct TabularExtractor;

impl Extractor for TabularExtractor {
    fn extract(&self, file: &SourceFile, options: &ExtractOptions) -> Result<Vec<Record>> {
        let bytes = std::fs::read(&file.absolute_path).map_err(DocindexError::Io)?;
        let text = decode_with_fallback(&bytes, &file.relative_path);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| DocindexError::extraction(&file.relative_path, e))?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let file_year = options.years.from_file_name(&file.file_name);
        let source_line = format!("SOURCE: {}/{}", file.parent_folder, file.file_name);

        let mut records = Vec::new();
        for (line, result) in reader.records().enumerate() {
            if records.len() >= options.max_rows {
                break;
            }

            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    log::debug!("{}: skipping unreadable row {}: {}", file.relative_path, line + 1, e);
                    continue;
                }
            };

            if row.len() > headers.len() {
                log::debug!(
                    "{}: skipping row {} with {} fields (expected {})",
                    file.relative_path,
                    line + 1,
                    row.len(),
                    headers.len()
                );
                continue;
            }

            let cells: Vec<(&str, &str)> = headers
                .iter()
                .zip(row.iter())
                .filter(|(_, value)| !value.trim().is_empty())
                .map(|(column, value)| (column.as_str(), value))
                .collect();

            if cells.is_empty() {
                continue;
            }

            let year = if file_year != 0 {
                file_year
            } else {
                year_from_columns(&cells)
            };

            let data = cells
                .iter()
                .map(|(column, value)| format!("{}: {}", column.to_uppercase(), value))
                .collect::<Vec<_>>()
                .join(" | ");

            records.push(Record {
                content: format!("{}\nDATA: {}", source_line, data),
                source: file.file_name.clone(),
                path: file.relative_path.clone(),
                parent_folder: file.parent_folder.clone(),
                year,
                kind: RecordKind::Tabular,
                format: file.extension.clone(),
                page: None,
            });
        }

        Ok(records)
    }
}

/// First year column present in the row whose value is purely numeric.
/// No range check is applied here, unlike the name/content heuristic.
fn year_from_columns(cells: &[(&str, &str)]) -> i32 {
    for column in YEAR_COLUMNS {
        let value = cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| *value);
        if let Some(value) = value {
            if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(year) = value.parse() {
                    return year;
                }
            }
        }
    }
    0
}
