use crate::analysis::{Analyzer, ChunkBuilder};
use crate::backend::csv::Grid;
use crate::backend::{document_id, guarded, DocumentParser};
use crate::error::LedgerError;
use crate::model::{
    apply_scale, BalanceSheetItems, DocumentFormat, DocumentHint, ParsingResult, ScaleHint, Table,
};
use crate::patterns::contains_any;
use calamine::{Data, Reader};
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;

const SHEET_TERMS: &[&str] = &[
    "assets",
    "liabilities",
    "equity",
    "current assets",
    "long-term debt",
];

/// How strongly one sheet looks like the balance sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetScore {
    pub sheet: String,
    pub score: u32,
}

/// Workbook back-end for `.xlsx` and `.xls`.
pub struct SpreadsheetBackend {
    analyzer: Analyzer,
}

impl SpreadsheetBackend {
    pub fn new(analyzer: Analyzer) -> Self {
        SpreadsheetBackend { analyzer }
    }

    fn try_parse(
        &self,
        path: &Path,
        hint: Option<&DocumentHint>,
    ) -> Result<ParsingResult, LedgerError> {
        let bytes = std::fs::read(path)?;
        // Content decides between the binary and the zipped workbook, not the extension.
        let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let mut result = ParsingResult::new();
        let mut sheets: Vec<(String, Grid)> = Vec::new();
        for name in workbook.sheet_names() {
            match workbook.worksheet_range(&name) {
                Ok(range) => sheets.push((name, range_to_grid(&range))),
                Err(e) => {
                    tracing::warn!(sheet = %name, error = %e, "skipping unreadable sheet");
                    result.push_warning(format!("sheet '{name}' could not be read: {e}"));
                }
            }
        }
        if sheets.is_empty() {
            return Err(LedgerError::Spreadsheet("no readable sheets found in workbook".into()));
        }

        let mut chunks = ChunkBuilder::new(&self.analyzer, document_id(hint));
        let mut items = BalanceSheetItems::default();
        let mut scores = Vec::with_capacity(sheets.len());

        for (name, grid) in &sheets {
            let grid = grid.clone().clean();
            let text = grid.to_text("\t");
            let is_financial = self.analyzer.tables.is_financial(&grid.headers, &grid.rows);
            scores.push(SheetScore {
                sheet: name.clone(),
                score: score_sheet(name, &text, is_financial),
            });
            if grid.headers.is_empty() && grid.rows.is_empty() {
                tracing::debug!(sheet = %name, "empty sheet");
                continue;
            }

            let scale = self.analyzer.detect_scale(&text);
            chunks.push_text(&text, Some(&format!("sheet_{name}")), None, scale);
            result.tables.push(self.sheet_table(name, &grid, is_financial, scale));

            let mut figures = self.analyzer.figures.extract(&text);
            apply_scale(&mut figures, scale);
            result.figures.extend(figures);
            items.extend(self.analyzer.tables.balance_sheet_items(&grid.rows, scale));
        }
        result.chunks = chunks.finish();

        let best = best_sheet(&scores);
        tracing::info!(
            sheets = sheets.len(),
            balance_sheet = best.map(|s| s.sheet.as_str()),
            "workbook parsed"
        );

        result.insert_metadata("sheet_count", sheets.len());
        result.insert_metadata(
            "sheet_names",
            sheets.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
        );
        result.insert_metadata("balance_sheet_sheet", best.map(|s| s.sheet.as_str()));
        result.insert_metadata(
            "balance_sheet_confidence",
            best.map_or(0.0, |s| confidence(s.score)),
        );
        result.insert_metadata("sheet_scores", &scores);
        result.insert_metadata("balance_sheet_items", &items);
        result.insert_metadata(
            "file_format",
            DocumentFormat::from_path(path).map_or("", |f| f.extension()),
        );

        Ok(result)
    }

    fn sheet_table(&self, name: &str, grid: &Grid, is_financial: bool, scale: ScaleHint) -> Table {
        let mut table = Table::new(grid.headers.clone(), grid.rows.clone());
        table.source = Some(name.to_string());
        table.is_financial = is_financial;
        if is_financial {
            let columns: Vec<usize> = (1..grid.column_count()).collect();
            table.financial_data = Some(
                self.analyzer
                    .tables
                    .financial_data(&grid.rows, &columns, scale, false),
            );
        }
        table
    }
}

impl DocumentParser for SpreadsheetBackend {
    fn name(&self) -> &str {
        "spreadsheet"
    }

    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Xlsx, DocumentFormat::Xls]
    }

    fn parse(&self, path: &Path, hint: Option<&DocumentHint>) -> ParsingResult {
        guarded(self.name(), path, hint, || self.try_parse(path, hint))
    }
}

/// First used row becomes the header, every other row is data.
fn range_to_grid(range: &calamine::Range<Data>) -> Grid {
    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    Grid {
        headers,
        rows: rows.collect(),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::Empty => String::new(),
        _ => format!("{cell}"),
    }
}

/// Name and content evidence that a sheet holds the balance sheet.
///
/// Name: "balance" with "sheet" +50, "balance" alone +30, an abbreviation or
/// "position" +20. Content: +10 per balance-sheet term, +30 when both total
/// assets and total liabilities appear, +20 for a financial table.
fn score_sheet(name: &str, text: &str, is_financial: bool) -> u32 {
    let name = name.to_lowercase();
    let mut score = if name.contains("balance") && name.contains("sheet") {
        50
    } else if name.contains("balance") {
        30
    } else if contains_any(&name, &["bs", "bsheet", "position"]) {
        20
    } else {
        0
    };

    if text.trim().is_empty() {
        return score;
    }
    let lower = text.to_lowercase();
    score += SHEET_TERMS.iter().filter(|t| lower.contains(*t)).count() as u32 * 10;
    if lower.contains("total assets") && lower.contains("total liabilities") {
        score += 30;
    }
    if is_financial {
        score += 20;
    }
    score
}

/// Highest score; the earliest sheet wins a tie.
fn best_sheet(scores: &[SheetScore]) -> Option<&SheetScore> {
    scores
        .iter()
        .fold(None, |best: Option<&SheetScore>, s| match best {
            Some(b) if b.score >= s.score => Some(b),
            _ => Some(s),
        })
}

fn confidence(score: u32) -> f64 {
    (f64::from(score) / 100.0).min(1.0)
}
