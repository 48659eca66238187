use crate::analysis::classify::CategoryClassifier;
use crate::analysis::figures::{parse_amount_cell, FigureExtractor};
use crate::model::{
    apply_scale, BalanceSheetItems, FinancialData, FinancialFigure, ScaleHint, Table,
};
use crate::patterns::{contains_any, PatternLibrary};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A run needs at least this many qualifying lines to count as a table.
const MIN_TABLE_ROWS: usize = 3;
/// A line qualifies when it carries at least this many figures.
const MIN_ROW_FIGURES: usize = 2;
/// Rows inspected by the layout-text financial check.
const LAYOUT_SAMPLE_ROWS: usize = 5;
/// Header terms that mark a column as holding amounts.
const AMOUNT_HEADER_TERMS: &[&str] = &["amount", "balance", "current", "year"];

#[derive(Debug, Clone)]
pub struct DetectedRow {
    /// The line, trimmed.
    pub text: String,
    pub line_index: usize,
    pub figures: Vec<FinancialFigure>,
}

/// A contiguous run of figure-dense lines.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    pub rows: Vec<DetectedRow>,
    pub row_count: usize,
    /// Index of the first line of the run.
    pub start_line: usize,
    pub is_financial: bool,
}

/// Finds tabular structure in lines and grids and decides whether it is financial.
#[derive(Clone)]
pub struct TableDetector {
    patterns: &'static PatternLibrary,
    figures: FigureExtractor,
    classifier: CategoryClassifier,
}

impl TableDetector {
    pub fn new(
        patterns: &'static PatternLibrary,
        figures: FigureExtractor,
        classifier: CategoryClassifier,
    ) -> Self {
        TableDetector {
            patterns,
            figures,
            classifier,
        }
    }

    /// Runs of at least three consecutive lines that each hold two or more figures.
    pub fn detect<S: AsRef<str>>(&self, lines: &[S]) -> Vec<DetectedTable> {
        let mut tables = Vec::new();
        let mut current: Vec<DetectedRow> = Vec::new();

        for (line_index, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            let figures = self.figures.extract(line);
            if figures.len() >= MIN_ROW_FIGURES {
                current.push(DetectedRow {
                    text: line.trim().to_string(),
                    line_index,
                    figures,
                });
            } else {
                self.close_run(&mut current, &mut tables);
            }
        }
        self.close_run(&mut current, &mut tables);

        tables
    }

    fn close_run(&self, current: &mut Vec<DetectedRow>, tables: &mut Vec<DetectedTable>) {
        let rows = std::mem::take(current);
        if rows.len() < MIN_TABLE_ROWS {
            return;
        }
        let is_financial = rows.iter().any(|row| {
            let first_cell = split_by_whitespace_gaps(&row.text)
                .first()
                .map(|c| c.to_lowercase())
                .unwrap_or_default();
            contains_any(&first_cell, self.patterns.first_column_terms)
                || row.figures.iter().any(|f| is_large(f.amount))
        });
        tables.push(DetectedTable {
            start_line: rows[0].line_index,
            row_count: rows.len(),
            rows,
            is_financial,
        });
    }

    /// Financial check for cell grids: financial header terms, financial
    /// first-column labels, or any numeric cell above 1000 in magnitude.
    pub fn is_financial(&self, headers: &[String], rows: &[Vec<String>]) -> bool {
        let header_hit = headers
            .iter()
            .any(|h| contains_any(&h.to_lowercase(), self.patterns.header_terms));
        if header_hit {
            return true;
        }

        let first_column_hit = rows.iter().filter_map(|r| r.first()).any(|label| {
            contains_any(&label.to_lowercase(), self.patterns.first_column_terms)
        });
        if first_column_hit {
            return true;
        }

        rows.iter()
            .flatten()
            .filter_map(|cell| parse_amount_cell(cell))
            .any(is_large)
    }

    /// Financial check for tables recovered from layout text: financial header
    /// terms, or a figure in any of the first five rows.
    pub fn is_financial_layout(&self, headers: &[String], rows: &[Vec<String>]) -> bool {
        if rows.is_empty() {
            return false;
        }
        let header_hit = headers
            .iter()
            .any(|h| contains_any(&h.to_lowercase(), self.patterns.header_terms));
        header_hit
            || rows
                .iter()
                .take(LAYOUT_SAMPLE_ROWS)
                .any(|row| self.figures.has_figure(&row.join(" ")))
    }

    /// Columns whose header names an amount, a balance, a period or a year.
    pub fn amount_columns(&self, headers: &[String]) -> Vec<usize> {
        headers
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                let lower = h.to_lowercase();
                contains_any(&lower, AMOUNT_HEADER_TERMS) || self.patterns.year.is_match(&lower)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Build the structured payload of a financial table.
    ///
    /// The first column holds labels; figures come from `amount_columns`. Rows
    /// without a label are skipped, as are rows without any figure unless
    /// `require_figures` is off and the label names a balance-sheet item. Included
    /// rows whose label mentions "total" are also recorded as declared totals.
    pub fn financial_data(
        &self,
        rows: &[Vec<String>],
        amount_columns: &[usize],
        scale: ScaleHint,
        require_figures: bool,
    ) -> FinancialData {
        let mut line_items = Vec::new();
        let mut totals = BTreeMap::new();

        for (position, row) in rows.iter().enumerate() {
            let Some(label) = row.first().map(|l| l.trim()) else {
                continue;
            };
            if label.is_empty() {
                continue;
            }

            let mut figures: Vec<FinancialFigure> = amount_columns
                .iter()
                .filter(|&&col| col > 0)
                .filter_map(|&col| row.get(col))
                .flat_map(|cell| self.figures.extract(cell))
                .collect();
            if figures.is_empty() && (require_figures || !self.classifier.is_line_item(label)) {
                continue;
            }
            apply_scale(&mut figures, scale);

            let lower = label.to_lowercase();
            if lower.contains("total") {
                totals.insert(lower, figures.clone());
            }
            line_items.push(self.classifier.line_item(label, figures, position));
        }

        let currency = line_items
            .iter()
            .flat_map(|item| item.figures.iter())
            .map(|f| f.currency.as_str())
            .find(|c| *c != self.figures.default_currency())
            .unwrap_or(self.figures.default_currency())
            .to_string();

        FinancialData {
            line_items,
            totals,
            currency,
            scale,
        }
    }

    /// Group rows whose first-column label names a balance-sheet item.
    pub fn balance_sheet_items(&self, rows: &[Vec<String>], scale: ScaleHint) -> BalanceSheetItems {
        let mut items = BalanceSheetItems::default();

        for (position, row) in rows.iter().enumerate() {
            let Some(label) = row.first() else {
                continue;
            };
            if label.trim().is_empty() || !self.classifier.is_line_item(label) {
                continue;
            }
            let mut figures = self.figures.extract(&row[1..].join(" "));
            apply_scale(&mut figures, scale);
            items.push(self.classifier.line_item(label, figures, position));
        }

        items
    }

    /// Recover tables from layout-preserving page text.
    ///
    /// Each detected run becomes a table whose cells are split on gaps of two or
    /// more spaces. A leading row made only of periods (`2023  2022`) is the
    /// header; otherwise the non-empty line right above the run is, when it splits
    /// into at least two cells. Short headers are right-aligned with the columns.
    pub fn layout_tables(
        &self,
        lines: &[String],
        page_number: Option<usize>,
        scale: ScaleHint,
    ) -> Vec<Table> {
        self.detect(lines)
            .into_iter()
            .map(|detected| {
                let mut rows: Vec<Vec<String>> = detected
                    .rows
                    .iter()
                    .map(|r| to_cells(&r.text))
                    .collect();

                let mut headers = if rows.first().is_some_and(|r| self.is_period_row(r)) {
                    rows.remove(0)
                } else {
                    detected
                        .start_line
                        .checked_sub(1)
                        .and_then(|i| lines.get(i))
                        .map(|line| to_cells(line))
                        .filter(|cells| cells.len() >= 2)
                        .unwrap_or_default()
                };

                let width = rows.iter().map(Vec::len).max().unwrap_or(0);
                if !headers.is_empty() && headers.len() < width {
                    let mut padded = vec![String::new(); width - headers.len()];
                    padded.append(&mut headers);
                    headers = padded;
                }

                let mut table = Table::new(headers, rows);
                table.page_number = page_number;
                table.source = page_number.map(|n| format!("page_{n}"));
                table.is_financial = self.is_financial_layout(&table.headers, &table.rows);
                if table.is_financial {
                    let mut columns = self.amount_columns(&table.headers);
                    if columns.is_empty() {
                        columns = (1..table.column_count).collect();
                    }
                    table.financial_data =
                        Some(self.financial_data(&table.rows, &columns, scale, true));
                }
                table
            })
            .collect()
    }

    fn is_period_row(&self, cells: &[String]) -> bool {
        !cells.is_empty() && cells.iter().all(|c| self.patterns.year.is_match(c))
    }
}

fn to_cells(line: &str) -> Vec<String> {
    split_by_whitespace_gaps(line)
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn is_large(amount: Decimal) -> bool {
    amount.abs() > Decimal::ONE_THOUSAND
}

/// Split a line on gaps of two or more whitespace characters.
pub fn split_by_whitespace_gaps(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = None;
    let mut gap_start = 0;
    let mut space_count = 0;

    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if space_count == 0 {
                gap_start = i;
            }
            space_count += 1;
            if space_count == 2 {
                if let Some(s) = start.take() {
                    segments.push(&line[s..gap_start]);
                }
            }
        } else {
            if start.is_none() {
                start = Some(i);
            }
            space_count = 0;
        }
    }

    if let Some(s) = start {
        segments.push(line[s..].trim_end());
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::library;
    use crate::taxonomy::{AssetCategory, Category};
    use rust_decimal_macros::dec;

    fn detector() -> TableDetector {
        TableDetector::new(
            library(),
            FigureExtractor::new(library(), 50, "USD"),
            CategoryClassifier::new(library()),
        )
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_three_rows_make_a_table() {
        let lines = ["Notes", "Cash 10 20", "Debt 30 40", "Stock 50 60", "End"];
        let tables = detector().detect(&lines);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count, 3);
        assert_eq!(tables[0].start_line, 1);
        assert!(tables[0].is_financial);
    }

    #[test]
    fn test_two_rows_are_not_a_table() {
        let lines = ["Cash 10 20", "Debt 30 40", "End"];
        assert!(detector().detect(&lines).is_empty());
    }

    #[test]
    fn test_run_at_end_of_input_is_closed() {
        let lines = ["Revenue 10 20", "Costs 30 40", "Margin 50 60"];
        let tables = detector().detect(&lines);
        assert_eq!(tables.len(), 1);
        assert!(!tables[0].is_financial);
    }

    #[test]
    fn test_is_financial_grid() {
        let d = detector();
        let headers = vec!["Item".to_string(), "2023".to_string()];
        assert!(d.is_financial(&headers, &grid(&[&["Cash", "5"]])));
        assert!(d.is_financial(&headers, &grid(&[&["Widgets", "1,500"]])));
        assert!(!d.is_financial(&headers, &grid(&[&["Widgets", "15"]])));
        assert!(d.is_financial(&["Total".to_string()], &[]));
    }

    #[test]
    fn test_is_financial_layout_checks_first_rows() {
        let d = detector();
        let rows = grid(&[&["Widgets", "12"]]);
        assert!(d.is_financial_layout(&[], &rows));
        assert!(!d.is_financial_layout(&[], &grid(&[&["Widgets", "n/a"]])));
        assert!(!d.is_financial_layout(&["Total".to_string()], &[]));
    }

    #[test]
    fn test_financial_data_records_totals() {
        let d = detector();
        let rows = grid(&[
            &["Cash and equivalents", "1000", "900"],
            &["Current assets", "", ""],
            &["Total assets", "1500", "1350"],
        ]);
        let data = d.financial_data(&rows, &[1, 2], ScaleHint::Thousands, true);
        assert_eq!(data.line_items.len(), 2);
        assert_eq!(
            data.line_items[0].category,
            Category::Asset(AssetCategory::CashAndEquivalents)
        );
        assert_eq!(data.line_items[1].position, 2);
        let total = &data.totals["total assets"];
        assert_eq!(total[0].amount, dec!(1500));
        assert_eq!(total[0].scaled_amount(), Some(dec!(1500000)));
        assert_eq!(data.currency, "USD");

        // Named balance-sheet rows survive without figures when allowed.
        let data = d.financial_data(&rows, &[1, 2], ScaleHint::Units, false);
        assert_eq!(data.line_items.len(), 3);
        assert!(data.line_items[1].figures.is_empty());
    }

    #[test]
    fn test_amount_columns() {
        let headers: Vec<String> = ["Item", "FY 2023", "Notes", "Balance"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(detector().amount_columns(&headers), vec![1, 3]);
    }

    #[test]
    fn test_layout_tables_take_period_row_as_header() {
        let lines: Vec<String> = [
            "Balance Sheet",
            "                         2023        2022",
            "Cash and equivalents     1,000       900",
            "Inventory                400         350",
            "Total assets             1,400       1,250",
            "",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let tables = detector().layout_tables(&lines, Some(2), ScaleHint::Units);
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.headers, vec!["", "2023", "2022"]);
        assert_eq!(table.row_count, 3);
        assert_eq!(table.rows[0], vec!["Cash and equivalents", "1,000", "900"]);
        assert_eq!(table.page_number, Some(2));
        assert!(table.is_financial);
        let data = table.financial_data.as_ref().unwrap();
        assert_eq!(data.line_items.len(), 3);
        assert!(data.totals.contains_key("total assets"));
    }

    #[test]
    fn test_layout_tables_use_line_above_as_header() {
        let lines: Vec<String> = [
            "Item                 Amount      Notes",
            "Cash                 1,000       12",
            "Receivables          400         13",
            "Payables             350         14",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let tables = detector().layout_tables(&lines, None, ScaleHint::Units);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["Item", "Amount", "Notes"]);
        let data = tables[0].financial_data.as_ref().unwrap();
        // Only the amount column feeds the line items.
        assert!(data.line_items.iter().all(|i| i.figures.len() == 1));
    }

    #[test]
    fn test_split_by_whitespace_gaps() {
        assert_eq!(
            split_by_whitespace_gaps("  Cash and equivalents   1,000  900 "),
            vec!["Cash and equivalents", "1,000", "900"]
        );
        assert_eq!(split_by_whitespace_gaps("Cash 100"), vec!["Cash 100"]);
        assert!(split_by_whitespace_gaps("   ").is_empty());
    }
}
