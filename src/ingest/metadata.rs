use regex::Regex;

use super::Record;

/// Four-digit years accepted by the heuristic, 2012 through 2029.
const YEAR_PATTERN: &str = r"(201[2-9]|202[0-9])";

/// Finds a year label for a record.
///
/// Precedence is fixed: a year in the file name wins over one in the
/// content, and only the first `window` characters of the content are
/// searched. The pattern has no word boundaries, so `20215` still yields
/// 2021; the first match wins.
#[derive(Debug, Clone)]
pub struct YearDetector {
    regex: Regex,
    window: usize,
}

impl YearDetector {
    pub fn new(window: usize) -> Self {
        Self {
            regex: Regex::new(YEAR_PATTERN).expect("Invalid regex pattern"),
            window,
        }
    }

    /// First year anywhere in `text`.
    pub fn find(&self, text: &str) -> Option<i32> {
        self.regex
            .find(text)
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Year from the file name only, 0 when absent.
    pub fn from_file_name(&self, file_name: &str) -> i32 {
        self.find(file_name).unwrap_or(0)
    }

    /// Year from the file name, else from the head of `content`, else 0.
    pub fn detect(&self, file_name: &str, content: &str) -> i32 {
        self.find(file_name)
            .or_else(|| self.find(head_chars(content, self.window)))
            .unwrap_or(0)
    }
}

/// The first `n` characters of `text` (not bytes).
fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Normalize a record's metadata before it is buffered.
///
/// An undetermined year (0) becomes `default_year` so every stored vector
/// carries a usable year. Content and source are left alone.
pub fn enrich(mut record: Record, default_year: i32) -> Record {
    if record.year == 0 {
        record.year = default_year;
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RecordKind;

    fn record(year: i32) -> Record {
        Record {
            content: "x".to_string(),
            source: "a.txt".to_string(),
            path: "a.txt".to_string(),
            parent_folder: "dados".to_string(),
            year,
            kind: RecordKind::Flat,
            format: "txt".to_string(),
            page: None,
        }
    }

    #[test]
    fn test_year_bounds() {
        let d = YearDetector::new(1000);
        assert_eq!(d.find("relatorio_2012.pdf"), Some(2012));
        assert_eq!(d.find("relatorio_2029.pdf"), Some(2029));
        assert_eq!(d.find("relatorio_2011.pdf"), None);
        assert_eq!(d.find("relatorio_2030.pdf"), None);
        assert_eq!(d.find("sem ano"), None);
    }

    #[test]
    fn test_first_match_wins_without_boundaries() {
        let d = YearDetector::new(1000);
        assert_eq!(d.find("contas_2019_2023.csv"), Some(2019));
        assert_eq!(d.find("id20215"), Some(2021));
    }

    #[test]
    fn test_file_name_takes_precedence_over_content() {
        let d = YearDetector::new(1000);
        assert_eq!(d.detect("report_2021_q.pdf", "Exercicio 2019"), 2021);
        assert_eq!(d.detect("report.pdf", "Exercicio 2019"), 2019);
        assert_eq!(d.detect("report.pdf", "nada"), 0);
    }

    #[test]
    fn test_content_search_limited_to_window() {
        let d = YearDetector::new(10);
        let content = format!("{}2022", "a".repeat(10));
        assert_eq!(d.detect("x.txt", &content), 0);
        assert_eq!(d.detect("x.txt", "aaaaa2022 tail"), 2022);
    }

    #[test]
    fn test_window_counts_characters_not_bytes() {
        let d = YearDetector::new(8);
        // 4 multi-byte chars followed by a year fits in 8 chars
        assert_eq!(d.detect("x.txt", "ééé 2020 resto"), 2020);
    }

    #[test]
    fn test_enrich_defaults_undetermined_year() {
        assert_eq!(enrich(record(0), 2024).year, 2024);
        assert_eq!(enrich(record(2019), 2024).year, 2019);
    }

    #[test]
    fn test_enrich_keeps_content_and_source() {
        let before = record(0);
        let after = enrich(before.clone(), 2024);
        assert_eq!(after.content, before.content);
        assert_eq!(after.source, before.source);
        assert_eq!(after.kind, before.kind);
    }
}
