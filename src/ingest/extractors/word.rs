use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild, TableRowChild,
};

use super::{ExtractOptions, Extractor};
use crate::error::{DocindexError, Result};
use crate::ingest::{Record, RecordKind, SourceFile};

/// Word-processed documents (docx): the whole body becomes one record.
///
/// Paragraph text, hyperlink text and table cells are kept in document order.
/// A table row becomes one line with its cells joined by ` | `.
pub struct WordExtractor;

impl Extractor for WordExtractor {
    fn extract(&self, file: &SourceFile, options: &ExtractOptions) -> Result<Vec<Record>> {
        let bytes = std::fs::read(&file.absolute_path).map_err(DocindexError::Io)?;
        let doc = docx_rs::read_docx(&bytes)
            .map_err(|e| DocindexError::extraction(&file.relative_path, e))?;

        let mut content = String::new();
        for child in &doc.document.children {
            match child {
                DocumentChild::Paragraph(p) => push_paragraph(p, &mut content),
                DocumentChild::Table(t) => push_table(t, &mut content),
                _ => {}
            }
        }

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

fn push_paragraph(paragraph: &Paragraph, out: &mut String) {
    for child in &paragraph.children {
        push_paragraph_child(child, out);
    }
    out.push('\n');
}

fn push_paragraph_child(child: &ParagraphChild, out: &mut String) {
    match child {
        ParagraphChild::Run(run) => {
            for child in &run.children {
                if let RunChild::Text(t) = child {
                    out.push_str(&t.text);
                }
            }
        }
        ParagraphChild::Hyperlink(link) => {
            for child in &link.children {
                push_paragraph_child(child, out);
            }
        }
        _ => {}
    }
}

fn push_table(table: &Table, out: &mut String) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                let TableRowChild::TableCell(cell) = cell;
                let mut text = String::new();
                for content in &cell.children {
                    match content {
                        TableCellContent::Paragraph(p) => push_paragraph(p, &mut text),
                        TableCellContent::Table(t) => push_table(t, &mut text),
                        _ => {}
                    }
                }
                text.split_whitespace().collect::<Vec<_>>().join(" ")
            })
            .collect();

        if cells.iter().any(|c| !c.is_empty()) {
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
    }
}
