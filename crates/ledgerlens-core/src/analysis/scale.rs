use crate::model::ScaleHint;
use crate::patterns::{PatternLibrary, StatementKind};
use serde::{Deserialize, Serialize};

/// The document's stated magnitude unit. Thousands, millions and billions are
/// checked in that order and the first hit wins.
pub fn detect_scale(patterns: &PatternLibrary, text: &str) -> ScaleHint {
    patterns
        .scales
        .iter()
        .find(|(_, regex)| regex.is_match(text))
        .map(|(scale, _)| *scale)
        .unwrap_or_default()
}

/// Dates in order of pattern, then position. Captured parts are joined with `-`
/// in the order they appear, so `31/12/2023` becomes `31-12-2023`.
pub fn extract_dates(patterns: &PatternLibrary, text: &str) -> Vec<String> {
    let mut dates = Vec::new();
    for regex in &patterns.dates {
        for caps in regex.captures_iter(text) {
            let parts: Vec<&str> = caps.iter().skip(1).flatten().map(|m| m.as_str()).collect();
            dates.push(parts.join("-"));
        }
    }
    dates
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSection {
    #[serde(rename = "type")]
    pub kind: StatementKind,
    pub title: String,
    pub line_number: usize,
    /// Byte offset of the line in the scanned text.
    pub start_position: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub sections: Vec<StatementSection>,
    pub has_balance_sheet: bool,
    pub has_income_statement: bool,
    pub has_cash_flow: bool,
}

/// Record the first line announcing each statement kind.
pub fn detect_statements(patterns: &PatternLibrary, text: &str) -> DocumentStructure {
    let mut structure = DocumentStructure::default();
    let mut offset = 0;

    for (line_number, line) in text.split('\n').enumerate() {
        for (kind, regexes) in &patterns.statements {
            if structure.sections.iter().any(|s| s.kind == *kind) {
                continue;
            }
            if regexes.iter().any(|r| r.is_match(line)) {
                structure.sections.push(StatementSection {
                    kind: *kind,
                    title: line.trim().to_string(),
                    line_number,
                    start_position: offset,
                });
                match kind {
                    StatementKind::BalanceSheet => structure.has_balance_sheet = true,
                    StatementKind::IncomeStatement => structure.has_income_statement = true,
                    StatementKind::CashFlow => structure.has_cash_flow = true,
                }
            }
        }
        offset += line.len() + 1;
    }

    structure
}
