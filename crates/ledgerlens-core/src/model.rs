use crate::taxonomy::{Category, Section};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Magnitude unit stated by a document (e.g. "in thousands").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleHint {
    #[default]
    Units,
    Thousands,
    Millions,
    Billions,
}

impl ScaleHint {
    pub fn multiplier(&self) -> Decimal {
        match self {
            ScaleHint::Units => Decimal::ONE,
            ScaleHint::Thousands => Decimal::from(1_000u32),
            ScaleHint::Millions => Decimal::from(1_000_000u32),
            ScaleHint::Billions => Decimal::from(1_000_000_000u32),
        }
    }
}

impl fmt::Display for ScaleHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleHint::Units => write!(f, "units"),
            ScaleHint::Thousands => write!(f, "thousands"),
            ScaleHint::Millions => write!(f, "millions"),
            ScaleHint::Billions => write!(f, "billions"),
        }
    }
}

/// A currency amount recognized in text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialFigure {
    pub amount: Decimal,
    /// ISO-4217 code.
    pub currency: String,
    /// The numeral exactly as matched, thousands separators included.
    pub raw_text: String,
    /// Text surrounding the first occurrence of `raw_text`.
    pub context: String,
    #[serde(default)]
    pub scale: ScaleHint,
}

impl FinancialFigure {
    /// Amount with the document scale applied. `None` on overflow.
    pub fn scaled_amount(&self) -> Option<Decimal> {
        self.amount.checked_mul(self.scale.multiplier())
    }
}

/// Set the document/sheet scale on every figure.
pub fn apply_scale(figures: &mut [FinancialFigure], scale: ScaleHint) {
    for figure in figures {
        figure.scale = scale;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_type: Option<String>,
    pub financial_figures: Vec<FinancialFigure>,
}

/// A labelled entry of a statement with its amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    pub category: Category,
    pub section: Option<Section>,
    pub figures: Vec<FinancialFigure>,
    /// Row index for tabular sources, character offset for free text.
    pub position: usize,
    /// The label matched specific patterns of more than one section.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ambiguous: bool,
}

impl LineItem {
    pub fn new(
        label: impl Into<String>,
        category: Category,
        figures: Vec<FinancialFigure>,
        position: usize,
    ) -> Self {
        LineItem {
            label: label.into(),
            section: category.section(),
            category,
            figures,
            position,
            ambiguous: false,
        }
    }
}

/// Line items grouped by section, as handed to the structured-data loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceSheetItems {
    pub assets: Vec<LineItem>,
    pub liabilities: Vec<LineItem>,
    pub equity: Vec<LineItem>,
}

impl BalanceSheetItems {
    /// Add an item to its section. Items without a section are dropped.
    pub fn push(&mut self, item: LineItem) {
        match item.section {
            Some(Section::Asset) => self.assets.push(item),
            Some(Section::Liability) => self.liabilities.push(item),
            Some(Section::Equity) => self.equity.push(item),
            None => {}
        }
    }

    pub fn extend(&mut self, other: BalanceSheetItems) {
        self.assets.extend(other.assets);
        self.liabilities.extend(other.liabilities);
        self.equity.extend(other.equity);
    }

    pub fn len(&self) -> usize {
        self.assets.len() + self.liabilities.len() + self.equity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Structured payload of a financial table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialData {
    pub line_items: Vec<LineItem>,
    /// Declared totals keyed by lower-cased label. Never checked against each other.
    pub totals: BTreeMap<String, Vec<FinancialFigure>>,
    pub currency: String,
    pub scale: ScaleHint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub column_count: usize,
    pub is_financial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_data: Option<FinancialData>,
    /// Sheet name, page label, or other origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let column_count = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(headers.len()))
            .max()
            .unwrap_or(0);
        Table {
            row_count: rows.len(),
            column_count,
            headers,
            rows,
            is_financial: false,
            financial_data: None,
            source: None,
            page_number: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BalanceSheet,
    IncomeStatement,
    CashFlowStatement,
    AnnualReport,
    QuarterlyReport,
    SecFiling10k,
    SecFiling10q,
    Other,
}

impl DocumentType {
    pub fn from_str_loose(s: &str) -> Option<DocumentType> {
        let lower = s.trim().to_lowercase().replace(['-', ' '], "_");
        match lower.as_str() {
            "balance_sheet" | "bs" => Some(DocumentType::BalanceSheet),
            "income_statement" | "p&l" | "profit_and_loss" => Some(DocumentType::IncomeStatement),
            "cash_flow" | "cash_flow_statement" => Some(DocumentType::CashFlowStatement),
            "annual_report" => Some(DocumentType::AnnualReport),
            "quarterly_report" => Some(DocumentType::QuarterlyReport),
            "10k" | "10_k" | "sec_filing_10k" => Some(DocumentType::SecFiling10k),
            "10q" | "10_q" | "sec_filing_10q" => Some(DocumentType::SecFiling10q),
            "other" => Some(DocumentType::Other),
            _ => None,
        }
    }
}

/// Caller-supplied expectations about a document. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentHint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<String>,
}

/// File formats recognized by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Xlsx,
    Xls,
    Csv,
    Xml,
    Xbrl,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<DocumentFormat> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "xlsx" => Some(DocumentFormat::Xlsx),
            "xls" => Some(DocumentFormat::Xls),
            "csv" => Some(DocumentFormat::Csv),
            "xml" => Some(DocumentFormat::Xml),
            "xbrl" => Some(DocumentFormat::Xbrl),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Xls => "xls",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Xml => "xml",
            DocumentFormat::Xbrl => "xbrl",
        }
    }
}

/// Uniform output of every back-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingResult {
    pub success: bool,
    pub chunks: Vec<DocumentChunk>,
    pub tables: Vec<Table>,
    pub figures: Vec<FinancialFigure>,
    pub metadata: Map<String, Value>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParsingResult {
    pub fn new() -> Self {
        ParsingResult {
            success: false,
            chunks: Vec::new(),
            tables: Vec::new(),
            figures: Vec::new(),
            metadata: Map::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let mut result = ParsingResult::new();
        result.errors.push(error.into());
        result
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.success = false;
        self.errors.push(error.into());
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn insert_metadata(&mut self, key: &str, value: impl Serialize) {
        // Serializing our own model types cannot fail; fall back to null regardless.
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.metadata.insert(key.to_string(), value);
    }

    /// Mark the result successful when it satisfies the output contract:
    /// no errors and at least one chunk or table.
    pub fn finalize(mut self) -> Self {
        self.success =
            self.errors.is_empty() && (!self.chunks.is_empty() || !self.tables.is_empty());
        if self.errors.is_empty() && !self.success {
            self.errors
                .push("no chunks or tables could be extracted from the document".into());
        }
        self
    }
}

impl Default for ParsingResult {
    fn default() -> Self {
        Self::new()
    }
}
