use crate::analysis::{Analyzer, ChunkBuilder};
use crate::backend::encoding::{decode, detect_encoding, DetectedEncoding};
use crate::backend::{document_id, guarded, DocumentParser};
use crate::config::ParserConfig;
use crate::error::LedgerError;
use crate::model::{apply_scale, DocumentFormat, DocumentHint, ParsingResult, Table};
use crate::patterns::contains_any;
use crate::taxonomy::Section;
use encoding_rs::{Encoding, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Candidates for delimiter sniffing, most common first.
const SNIFF_DELIMITERS: &[u8] = b",;\t|:";
const BALANCE_SHEET_TERMS: &[&str] = &["assets", "liabilities", "equity", "balance sheet"];
/// First-column labels inspected for balance-sheet line items.
const LABEL_SAMPLE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptEncoding {
    Detected,
    Latin1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Fixed(u8),
    Sniff,
}

#[derive(Debug, Clone, Copy)]
struct ReadAttempt {
    encoding: AttemptEncoding,
    delimiter: Delimiter,
    /// Skip malformed records instead of failing.
    tolerant: bool,
}

const fn attempt(encoding: AttemptEncoding, delimiter: Delimiter, tolerant: bool) -> ReadAttempt {
    ReadAttempt {
        encoding,
        delimiter,
        tolerant,
    }
}

/// Tried in order; the first attempt that yields at least one row and more than
/// one column wins.
const READ_ATTEMPTS: &[ReadAttempt] = &[
    attempt(AttemptEncoding::Detected, Delimiter::Fixed(b','), false),
    attempt(AttemptEncoding::Detected, Delimiter::Fixed(b';'), false),
    attempt(AttemptEncoding::Detected, Delimiter::Fixed(b'\t'), false),
    attempt(AttemptEncoding::Latin1, Delimiter::Fixed(b','), false),
    attempt(AttemptEncoding::Detected, Delimiter::Sniff, false),
    attempt(AttemptEncoding::Detected, Delimiter::Fixed(b','), true),
];

/// A header row plus data rows, every cell trimmed text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Grid {
    /// Drop rows and columns whose cells are all empty. A column is judged by its
    /// data cells only, so an empty column keeps no header either.
    pub fn clean(mut self) -> Grid {
        self.rows.retain(|row| row.iter().any(|c| !c.trim().is_empty()));

        let width = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);
        let keep: Vec<bool> = (0..width)
            .map(|col| {
                self.rows
                    .iter()
                    .any(|row| row.get(col).is_some_and(|c| !c.trim().is_empty()))
            })
            .collect();

        let filter = |cells: &[String]| -> Vec<String> {
            (0..width)
                .filter(|&col| keep[col])
                .map(|col| cells.get(col).map(|c| c.trim().to_string()).unwrap_or_default())
                .collect()
        };
        Grid {
            headers: filter(&self.headers),
            rows: self.rows.iter().map(|row| filter(row)).collect(),
        }
    }

    /// Header and rows joined with `separator`, one line each.
    pub fn to_text(&self, separator: &str) -> String {
        std::iter::once(&self.headers)
            .chain(self.rows.iter())
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .map(|cells| cells.join(separator))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    BalanceSheet,
    TimeSeriesFinancial,
    FinancialData,
    GeneralData,
}

/// Weighted evidence that a grid is a balance sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureAnalysis {
    pub likely_balance_sheet: bool,
    pub confidence_score: f64,
    pub structure_type: StructureType,
    pub time_series: bool,
    pub multi_period: bool,
    /// Distinct section names (`assets`, `liabilities`, `equity`) seen in the first column.
    pub identified_sections: Vec<String>,
}

/// Delimited text back-end.
pub struct CsvBackend {
    analyzer: Analyzer,
    sniff_bytes: usize,
    probe_bytes: usize,
}

impl CsvBackend {
    pub fn new(analyzer: Analyzer, config: &ParserConfig) -> Self {
        CsvBackend {
            analyzer,
            sniff_bytes: config.encoding_sniff_bytes,
            probe_bytes: config.encoding_probe_bytes,
        }
    }

    fn try_parse(
        &self,
        path: &Path,
        hint: Option<&DocumentHint>,
    ) -> Result<ParsingResult, LedgerError> {
        let bytes = std::fs::read(path)?;
        let detected = detect_encoding(&bytes, self.sniff_bytes, self.probe_bytes);
        tracing::info!(encoding = %detected, method = ?detected.method, "detected CSV encoding");

        let (grid, dialect) = read_with_fallbacks(&bytes, detected)?;
        let grid = grid.clean();
        let mut result = ParsingResult::new();
        if dialect.had_errors {
            result.push_warning(format!(
                "some bytes are not valid {} and were replaced",
                dialect.encoding.name()
            ));
        }

        let text = grid.to_text(",");
        let scale = self.analyzer.detect_scale(&text);

        let mut chunks = ChunkBuilder::new(&self.analyzer, document_id(hint));
        chunks.push_text(&text, Some("csv_data"), None, scale);
        result.chunks = chunks.finish();

        result.figures = self.analyzer.figures.extract(&text);
        apply_scale(&mut result.figures, scale);

        let tables = &self.analyzer.tables;
        let mut table = Table::new(grid.headers.clone(), grid.rows.clone());
        table.is_financial = tables.is_financial(&grid.headers, &grid.rows);
        if table.is_financial {
            let columns: Vec<usize> = (1..grid.column_count()).collect();
            table.financial_data = Some(tables.financial_data(&grid.rows, &columns, scale, false));
        }
        let is_financial = table.is_financial;
        result.tables.push(table);

        let structure = analyze_structure(&self.analyzer, &grid, &text, is_financial);
        tracing::debug!(confidence = structure.confidence_score, "CSV structure analysis");

        result.insert_metadata("encoding", dialect.encoding.name());
        result.insert_metadata("detected_encoding", detected.encoding.name());
        result.insert_metadata("encoding_method", detected.method);
        result.insert_metadata("delimiter", (dialect.delimiter as char).to_string());
        result.insert_metadata("tolerant_read", dialect.tolerant);
        result.insert_metadata("row_count", grid.rows.len());
        result.insert_metadata("column_count", grid.column_count());
        result.insert_metadata("columns", &grid.headers);
        result.insert_metadata("structure_analysis", &structure);
        result.insert_metadata(
            "balance_sheet_items",
            tables.balance_sheet_items(&grid.rows, scale),
        );
        result.insert_metadata("scale", scale);

        Ok(result)
    }
}

impl DocumentParser for CsvBackend {
    fn name(&self) -> &str {
        "csv"
    }

    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Csv]
    }

    fn parse(&self, path: &Path, hint: Option<&DocumentHint>) -> ParsingResult {
        guarded(self.name(), path, hint, || self.try_parse(path, hint))
    }
}

struct Dialect {
    encoding: &'static Encoding,
    delimiter: u8,
    tolerant: bool,
    had_errors: bool,
}

fn read_with_fallbacks(
    bytes: &[u8],
    detected: DetectedEncoding,
) -> Result<(Grid, Dialect), LedgerError> {
    for (index, attempt) in READ_ATTEMPTS.iter().enumerate() {
        let encoding = match attempt.encoding {
            AttemptEncoding::Detected => detected.encoding,
            AttemptEncoding::Latin1 => WINDOWS_1252,
        };
        let (text, had_errors) = decode(bytes, encoding);
        let delimiter = match attempt.delimiter {
            Delimiter::Fixed(d) => d,
            Delimiter::Sniff => sniff_delimiter(&text),
        };

        match read_grid(&text, delimiter, attempt.tolerant) {
            Ok(grid) if !grid.rows.is_empty() && grid.column_count() > 1 => {
                tracing::info!(
                    attempt = index,
                    encoding = encoding.name(),
                    delimiter = %(delimiter as char).escape_default(),
                    tolerant = attempt.tolerant,
                    "CSV dialect accepted"
                );
                let dialect = Dialect {
                    encoding,
                    delimiter,
                    tolerant: attempt.tolerant,
                    had_errors,
                };
                return Ok((grid, dialect));
            }
            Ok(grid) => {
                tracing::debug!(
                    attempt = index,
                    rows = grid.rows.len(),
                    columns = grid.column_count(),
                    "CSV read attempt produced no usable table"
                );
            }
            Err(e) => {
                tracing::debug!(attempt = index, error = %e, "CSV read attempt failed");
            }
        }
    }

    Err(LedgerError::Decode(format!(
        "none of {} CSV read attempts produced a table with more than one column",
        READ_ATTEMPTS.len()
    )))
}

fn read_grid(text: &str, delimiter: u8, tolerant: bool) -> Result<Grid, LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(tolerant)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if tolerant => {
                tracing::debug!(error = %e, "skipping malformed CSV record");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if tolerant && record.len() > headers.len() {
            continue;
        }
        let mut row: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(Grid { headers, rows })
}

/// The candidate occurring most often in the first line; `,` on a tie or no hit.
fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    let mut best = b',';
    let mut max_count = 0;
    for &candidate in SNIFF_DELIMITERS {
        let count = first_line.bytes().filter(|&b| b == candidate).count();
        if count > max_count {
            max_count = count;
            best = candidate;
        }
    }
    best
}

/// Score balance-sheet evidence in a grid.
///
/// Signals: +10 per balance-sheet term anywhere in the text, +15 for two or more
/// digit-bearing period headers after the first column, +5 per balance-sheet line
/// item among the first labels (at most +20), and +25 for two or more distinct
/// section names in the first column.
pub fn analyze_structure(
    analyzer: &Analyzer,
    grid: &Grid,
    text: &str,
    is_financial: bool,
) -> StructureAnalysis {
    let lower = text.to_lowercase();
    let mut score: u32 = BALANCE_SHEET_TERMS
        .iter()
        .filter(|term| lower.contains(*term))
        .map(|_| 10)
        .sum();

    let mut time_series = false;
    if grid.column_count() > 2 {
        let period_columns = grid.headers[1..]
            .iter()
            .filter(|h| h.chars().any(|c| c.is_ascii_digit()))
            .count();
        if period_columns >= 2 {
            time_series = true;
            score += 15;
        }
    }

    let line_items = grid
        .rows
        .iter()
        .take(LABEL_SAMPLE)
        .filter_map(|row| row.first())
        .filter(|label| analyzer.classifier.is_line_item(label))
        .count() as u32;
    score += (line_items * 5).min(20);

    let mut sections: Vec<Section> = Vec::new();
    for label in grid.rows.iter().filter_map(|row| row.first()) {
        if let Some(section) = section_label(label) {
            if !sections.contains(&section) {
                sections.push(section);
            }
        }
    }
    if sections.len() >= 2 {
        score += 25;
    }
    sections.sort();

    let confidence_score = (f64::from(score) / 100.0).min(1.0);
    let likely_balance_sheet = confidence_score > 0.3;
    let structure_type = if likely_balance_sheet {
        StructureType::BalanceSheet
    } else if time_series {
        StructureType::TimeSeriesFinancial
    } else if is_financial {
        StructureType::FinancialData
    } else {
        StructureType::GeneralData
    };

    StructureAnalysis {
        likely_balance_sheet,
        confidence_score,
        structure_type,
        time_series,
        multi_period: time_series,
        identified_sections: sections.iter().map(|s| s.group_key().to_string()).collect(),
    }
}

/// Section announced by a first-column label, e.g. "Current assets".
fn section_label(label: &str) -> Option<Section> {
    let lower = label.to_lowercase();
    if lower.contains("assets") {
        Some(Section::Asset)
    } else if contains_any(&lower, &["liabilit", "long-term"]) {
        Some(Section::Liability)
    } else if contains_any(&lower, &["equity", "stockholders", "shareholders"]) {
        Some(Section::Equity)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{AssetCategory, Category, LiabilityCategory};
    use std::io::Write;

    fn backend() -> CsvBackend {
        let config = ParserConfig::default();
        CsvBackend::new(Analyzer::new(&config), &config)
    }

    fn write_csv(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content).unwrap();
        file
    }

    fn grid(headers: &[&str], rows: &[&[&str]]) -> Grid {
        Grid {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_balance_sheet_scenario() {
        let file = write_csv(
            b"Item,2023,2022\nCash and equivalents,1000,900\nAccounts payable,500,450\nTotal assets,1500,1350\n",
        );
        let result = backend().parse(file.path(), None);
        assert!(result.success, "errors: {:?}", result.errors);

        let structure: StructureAnalysis =
            serde_json::from_value(result.metadata["structure_analysis"].clone()).unwrap();
        assert!(structure.confidence_score > 0.3);
        assert!(structure.likely_balance_sheet);
        assert!(structure.time_series);
        assert_eq!(structure.structure_type, StructureType::BalanceSheet);

        let data = result.tables[0].financial_data.as_ref().unwrap();
        let categories: Vec<Category> = data.line_items.iter().map(|i| i.category).collect();
        assert!(categories.contains(&Category::Asset(AssetCategory::CashAndEquivalents)));
        assert!(categories.contains(&Category::Liability(LiabilityCategory::AccountsPayable)));
        assert!(data.totals.contains_key("total assets"));

        assert_eq!(result.chunks[0].section_type.as_deref(), Some("csv_data"));
        assert_eq!(result.metadata["delimiter"], ",");
        assert_eq!(result.metadata["row_count"], 3);
    }

    #[test]
    fn test_semicolon_file() {
        let file = write_csv(b"Post;2023\nKassa;100\nSkulder;200\n");
        let result = backend().parse(file.path(), None);
        assert!(result.success);
        assert_eq!(result.metadata["delimiter"], ";");
        assert_eq!(result.tables[0].column_count, 2);
    }

    #[test]
    fn test_tolerant_read_skips_long_records() {
        let file = write_csv(b"Item,2023\nCash,100\nDebt,200,extra\n");
        let result = backend().parse(file.path(), None);
        assert!(result.success);
        assert_eq!(result.metadata["tolerant_read"], true);
        assert_eq!(result.tables[0].row_count, 1);
    }

    #[test]
    fn test_single_column_file_fails() {
        let file = write_csv(b"just\none\ncolumn\n");
        let result = backend().parse(file.path(), None);
        assert!(!result.success);
        assert!(result.errors[0].contains("CSV read attempts"));
    }

    #[test]
    fn test_latin1_file() {
        let file = write_csv(b"Post,2023\nF\xF6rr\xE5d,100\nKassa,200\n");
        let result = backend().parse(file.path(), None);
        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(result.tables[0].row_count, 2);
        assert_eq!(result.tables[0].rows[1][0], "Kassa");
        assert_ne!(result.metadata["encoding"], "UTF-8");
    }

    #[test]
    fn test_clean_drops_empty_rows_and_columns() {
        let cleaned = grid(
            &["Item", "", "2023"],
            &[&["Cash", "", "1"], &["", "", ""], &["Debt", "", "2"]],
        )
        .clean();
        assert_eq!(cleaned.headers, vec!["Item", "2023"]);
        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.to_text(","), "Item,2023\nCash,1\nDebt,2");
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a|b|c\n1|2|3"), b'|');
        assert_eq!(sniff_delimiter("plain"), b',');
    }

    #[test]
    fn test_structure_sections_and_cap() {
        let analyzer = Analyzer::new(&ParserConfig::default());
        let g = grid(
            &["Line", "Amount"],
            &[
                &["Current assets", "1"],
                &["Cash", "1"],
                &["Inventory", "1"],
                &["Receivables", "1"],
                &["Goodwill", "1"],
                &["Intangible", "1"],
                &["Current liabilities", "1"],
                &["Shareholders equity", "1"],
            ],
        );
        let text = g.to_text(",");
        let s = analyze_structure(&analyzer, &g, &text, true);
        assert_eq!(s.identified_sections, vec!["assets", "liabilities", "equity"]);
        // 30 (terms) + 20 (capped items) + 25 (sections)
        assert!((s.confidence_score - 0.75).abs() < 1e-9);
        assert!(!s.time_series);
    }
}
