use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level balance-sheet section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Asset,
    Liability,
    Equity,
}

impl Section {
    /// Namespace prefix used in category codes (`asset_`, `liability_`, `equity_`).
    pub fn prefix(&self) -> &'static str {
        match self {
            Section::Asset => "asset",
            Section::Liability => "liability",
            Section::Equity => "equity",
        }
    }

    /// Plural key used when grouping items (`assets`, `liabilities`, `equity`).
    pub fn group_key(&self) -> &'static str {
        match self {
            Section::Asset => "assets",
            Section::Liability => "liabilities",
            Section::Equity => "equity",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

macro_rules! category_enum {
    ($name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            fn from_code(code: &str) -> Option<$name> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

category_enum!(AssetCategory {
    CashAndEquivalents => "cash_and_equivalents",
    AccountsReceivable => "accounts_receivable",
    Inventory => "inventory",
    PrepaidExpenses => "prepaid_expenses",
    ShortTermInvestments => "short_term_investments",
    PropertyPlantEquipment => "property_plant_equipment",
    IntangibleAssets => "intangible_assets",
    Goodwill => "goodwill",
    LongTermInvestments => "long_term_investments",
    Other => "other",
});

category_enum!(LiabilityCategory {
    AccountsPayable => "accounts_payable",
    ShortTermDebt => "short_term_debt",
    AccruedLiabilities => "accrued_liabilities",
    DeferredRevenue => "deferred_revenue",
    LongTermDebt => "long_term_debt",
    DeferredTaxLiabilities => "deferred_tax_liabilities",
    PensionObligations => "pension_obligations",
    Other => "other",
});

category_enum!(EquityCategory {
    ShareCapital => "share_capital",
    RetainedEarnings => "retained_earnings",
    AdditionalPaidInCapital => "additional_paid_in_capital",
    AccumulatedOtherComprehensiveIncome => "accumulated_other_comprehensive_income",
    TreasuryStock => "treasury_stock",
    NonControllingInterests => "non_controlling_interests",
    Other => "other",
});

/// A taxonomy entry. Serialized as its namespaced code, e.g. `asset_cash_and_equivalents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Category {
    Asset(AssetCategory),
    Liability(LiabilityCategory),
    Equity(EquityCategory),
    Unknown,
}

impl Category {
    /// The section is derived from the namespace only; `Unknown` has none.
    pub fn section(&self) -> Option<Section> {
        match self {
            Category::Asset(_) => Some(Section::Asset),
            Category::Liability(_) => Some(Section::Liability),
            Category::Equity(_) => Some(Section::Equity),
            Category::Unknown => None,
        }
    }

    /// The `*_other` category of a section.
    pub fn other_in(section: Section) -> Category {
        match section {
            Section::Asset => Category::Asset(AssetCategory::Other),
            Section::Liability => Category::Liability(LiabilityCategory::Other),
            Section::Equity => Category::Equity(EquityCategory::Other),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Category::Unknown)
    }

    pub fn code(&self) -> String {
        match self {
            Category::Asset(c) => format!("asset_{}", c.code()),
            Category::Liability(c) => format!("liability_{}", c.code()),
            Category::Equity(c) => format!("equity_{}", c.code()),
            Category::Unknown => "unknown".to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl From<Category> for String {
    fn from(c: Category) -> String {
        c.code()
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "unknown" {
            return Ok(Category::Unknown);
        }
        let parsed = if let Some(rest) = s.strip_prefix("asset_") {
            AssetCategory::from_code(rest).map(Category::Asset)
        } else if let Some(rest) = s.strip_prefix("liability_") {
            LiabilityCategory::from_code(rest).map(Category::Liability)
        } else if let Some(rest) = s.strip_prefix("equity_") {
            EquityCategory::from_code(rest).map(Category::Equity)
        } else {
            None
        };
        parsed.ok_or_else(|| format!("unknown category code '{s}'"))
    }
}
