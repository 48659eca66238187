//! Process-wide catalogs of regexes and keywords.
//!
//! Built once on first use and shared by reference; nothing here is mutated after
//! construction. Order matters in several tables: currency patterns are applied in
//! declaration order, and category patterns decide by first match (assets, then
//! liabilities, then equity).

use crate::model::ScaleHint;
use crate::taxonomy::{AssetCategory, Category, EquityCategory, LiabilityCategory, Section};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub struct CurrencyPattern {
    /// `None` for the catch-all numeral pattern, which takes the configured default.
    pub currency: Option<&'static str>,
    /// Group 1 captures the numeral.
    pub regex: Regex,
}

pub struct CategoryPattern {
    pub category: Category,
    pub regexes: Vec<Regex>,
}

/// Financial statement kinds recognized by section headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
}

impl StatementKind {
    pub fn key(&self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "balance_sheet",
            StatementKind::IncomeStatement => "income_statement",
            StatementKind::CashFlow => "cash_flow",
        }
    }
}

pub struct PatternLibrary {
    pub currencies: Vec<CurrencyPattern>,
    /// Specific category patterns in precedence order.
    pub categories: Vec<CategoryPattern>,
    /// Coarse per-section keywords used when no specific pattern matches.
    pub section_keywords: Vec<(Section, &'static [&'static str])>,
    /// Terms that make a first-column label a balance-sheet line item.
    pub line_item_terms: &'static [&'static str],
    /// Terms that make a table header financial.
    pub header_terms: &'static [&'static str],
    /// Terms that make first-column labels financial.
    pub first_column_terms: &'static [&'static str],
    /// Terms that make an XML tag a financial candidate.
    pub tag_terms: &'static [&'static str],
    /// Checked in order; the first hit wins.
    pub scales: Vec<(ScaleHint, Regex)>,
    pub dates: Vec<Regex>,
    pub statements: Vec<(StatementKind, Vec<Regex>)>,
    pub year: Regex,
}

const ASSET_KEYWORDS: &[&str] = &[
    "asset", "cash", "receivable", "inventory", "property", "equipment", "investment",
];
const LIABILITY_KEYWORDS: &[&str] =
    &["liabilit", "payable", "debt", "loan", "obligation", "accrued"];
const EQUITY_KEYWORDS: &[&str] = &["equity", "capital", "earnings", "retained", "stock"];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern is valid")
}

fn res(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| re(&format!("(?i){p}"))).collect()
}

static LIBRARY: LazyLock<PatternLibrary> = LazyLock::new(build);

/// The shared pattern library.
pub fn library() -> &'static PatternLibrary {
    &LIBRARY
}

fn build() -> PatternLibrary {
    let currencies = vec![
        CurrencyPattern {
            currency: Some("USD"),
            regex: re(r"\$\s*([0-9,]+(?:\.[0-9]{2})?)"),
        },
        CurrencyPattern {
            currency: Some("EUR"),
            regex: re(r"€\s*([0-9,]+(?:\.[0-9]{2})?)"),
        },
        CurrencyPattern {
            currency: Some("GBP"),
            regex: re(r"£\s*([0-9,]+(?:\.[0-9]{2})?)"),
        },
        CurrencyPattern {
            currency: None,
            regex: re(r"([0-9,]+(?:\.[0-9]{2})?)"),
        },
    ];

    let categories = vec![
        asset(AssetCategory::CashAndEquivalents, &[
            r"cash\s+and\s+cash\s+equivalents",
            r"cash\s+equivalents",
            r"cash",
            r"short.term\s+investments",
            r"marketable\s+securities",
        ]),
        asset(AssetCategory::AccountsReceivable, &[
            r"accounts\s+receivable",
            r"receivables",
            r"trade\s+receivables",
            r"net\s+receivables",
        ]),
        asset(AssetCategory::Inventory, &[
            r"inventory",
            r"inventories",
            r"raw\s+materials",
            r"work\s+in\s+process",
            r"finished\s+goods",
        ]),
        asset(AssetCategory::PropertyPlantEquipment, &[
            r"property,?\s+plant\s+and\s+equipment",
            r"\bppe\b",
            r"fixed\s+assets",
            r"plant\s+and\s+equipment",
        ]),
        asset(AssetCategory::PrepaidExpenses, &[r"prepaid", r"prepayments"]),
        asset(AssetCategory::ShortTermInvestments, &[
            r"trading\s+securities",
            r"held.for.trading",
            r"time\s+deposits",
        ]),
        asset(AssetCategory::IntangibleAssets, &[r"intangible"]),
        asset(AssetCategory::Goodwill, &[r"goodwill"]),
        asset(AssetCategory::LongTermInvestments, &[
            r"long.term\s+investments",
            r"equity.method\s+investments",
            r"investments\s+in\s+(?:associates|affiliates)",
        ]),
        asset(AssetCategory::Other, &[
            r"deferred\s+tax\s+assets?",
            r"other\s+(?:current\s+|non.?current\s+)?assets",
        ]),
        liability(LiabilityCategory::AccountsPayable, &[
            r"accounts\s+payable",
            r"trade\s+payables",
            r"payables",
        ]),
        liability(LiabilityCategory::ShortTermDebt, &[
            r"short.term\s+debt",
            r"current\s+portion.*debt",
            r"notes\s+payable",
        ]),
        liability(LiabilityCategory::LongTermDebt, &[
            r"long.term\s+debt",
            r"debt.*long.term",
            r"bonds\s+payable",
        ]),
        liability(LiabilityCategory::AccruedLiabilities, &[
            r"accrued\s+(?:liabilities|expenses)",
            r"accruals",
        ]),
        liability(LiabilityCategory::DeferredRevenue, &[
            r"deferred\s+revenue",
            r"unearned\s+revenue",
            r"contract\s+liabilities",
        ]),
        liability(LiabilityCategory::DeferredTaxLiabilities, &[
            r"deferred\s+tax",
            r"deferred\s+income\s+tax",
        ]),
        liability(LiabilityCategory::PensionObligations, &[
            r"pension",
            r"post.?retirement\s+benefit",
        ]),
        equity(EquityCategory::ShareCapital, &[
            r"common\s+stock",
            r"share\s+capital",
            r"capital\s+stock",
            r"ordinary\s+shares",
        ]),
        equity(EquityCategory::RetainedEarnings, &[
            r"retained\s+earnings",
            r"accumulated\s+earnings",
            r"earnings\s+retained",
        ]),
        equity(EquityCategory::AdditionalPaidInCapital, &[
            r"additional\s+paid.in\s+capital",
            r"share\s+premium",
            r"capital\s+surplus",
        ]),
        equity(EquityCategory::AccumulatedOtherComprehensiveIncome, &[
            r"accumulated\s+other\s+comprehensive",
        ]),
        equity(EquityCategory::TreasuryStock, &[r"treasury\s+(?:stock|shares)"]),
        equity(EquityCategory::NonControllingInterests, &[
            r"non.?controlling\s+interests?",
            r"minority\s+interests?",
        ]),
    ];

    let section_keywords = vec![
        (Section::Asset, ASSET_KEYWORDS),
        (Section::Liability, LIABILITY_KEYWORDS),
        (Section::Equity, EQUITY_KEYWORDS),
    ];

    let scales = vec![
        (ScaleHint::Thousands, re(r"(?i)(?:in\s+)?thousands?")),
        (ScaleHint::Millions, re(r"(?i)(?:in\s+)?millions?")),
        (ScaleHint::Billions, re(r"(?i)(?:in\s+)?billions?")),
    ];

    let dates = res(&[
        r"(\d{4})-(\d{2})-(\d{2})",
        r"(\d{2})/(\d{2})/(\d{4})",
        r"(\d{1,2})\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})",
    ]);

    let statements = vec![
        (
            StatementKind::BalanceSheet,
            res(&[
                r"balance\s+sheet",
                r"statement\s+of\s+financial\s+position",
                r"consolidated\s+balance\s+sheet",
            ]),
        ),
        (
            StatementKind::IncomeStatement,
            res(&[
                r"income\s+statement",
                r"statement\s+of\s+operations",
                r"profit\s+and\s+loss",
            ]),
        ),
        (
            StatementKind::CashFlow,
            res(&[r"cash\s+flow", r"statement\s+of\s+cash\s+flows"]),
        ),
    ];

    PatternLibrary {
        currencies,
        categories,
        section_keywords,
        line_item_terms: &[
            "cash", "receivable", "inventory", "asset", "property", "equipment", "investment",
            "goodwill", "intangible", "payable", "debt", "liabilit", "loan", "obligation",
            "accrued", "equity", "capital", "earnings", "retained", "stock", "share",
        ],
        header_terms: &[
            "assets", "liabilities", "equity", "amount", "balance", "total", "current",
            "long-term", "cash", "receivables", "inventory", "debt", "capital", "earnings",
            "value", "year",
        ],
        first_column_terms: &[
            "cash", "receivable", "inventory", "payable", "debt", "equity", "asset", "liabilit",
        ],
        tag_terms: &[
            "asset", "liabilit", "equity", "cash", "receivable", "inventory", "payable", "debt",
            "capital", "earnings", "balance",
        ],
        scales,
        dates,
        statements,
        year: re(r"\b(?:19|20)\d{2}\b"),
    }
}

fn asset(category: AssetCategory, patterns: &[&str]) -> CategoryPattern {
    CategoryPattern {
        category: Category::Asset(category),
        regexes: res(patterns),
    }
}

fn liability(category: LiabilityCategory, patterns: &[&str]) -> CategoryPattern {
    CategoryPattern {
        category: Category::Liability(category),
        regexes: res(patterns),
    }
}

fn equity(category: EquityCategory, patterns: &[&str]) -> CategoryPattern {
    CategoryPattern {
        category: Category::Equity(category),
        regexes: res(patterns),
    }
}

/// True if `text` (already lower-cased) contains any of `terms`.
pub fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}
