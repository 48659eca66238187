//! XML and XBRL back-end.
//!
//! XBRL instances are read through their contexts, units and a fixed catalog of
//! balance-sheet concepts. Any other XML is walked element by element for tags
//! and text that look financial. Both paths chunk an indented text rendering of
//! the whole tree.

pub mod tree;

use crate::analysis::classify::split_concept_name;
use crate::analysis::figures::parse_amount_cell;
use crate::analysis::{Analyzer, ChunkBuilder};
use crate::backend::encoding::decode;
use crate::backend::{document_id, guarded, DocumentParser};
use crate::error::LedgerError;
use crate::model::{
    apply_scale, BalanceSheetItems, DocumentFormat, DocumentHint, FinancialData, FinancialFigure,
    LineItem, ParsingResult, ScaleHint, Table,
};
use crate::patterns::contains_any;
use crate::taxonomy::{Category, Section};
use encoding_rs::UTF_8;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tree::{parse_tree, XmlElement};

/// A balance-sheet concept and the element names it is reported under.
struct Concept {
    name: &'static str,
    tags: &'static [&'static str],
}

const fn concept(name: &'static str, tags: &'static [&'static str]) -> Concept {
    Concept { name, tags }
}

/// Matched on local name, so `us-gaap:`, `ifrs-full:` and unprefixed tags all count.
const CONCEPTS: &[Concept] = &[
    concept("Assets", &["Assets"]),
    concept("CurrentAssets", &["AssetsCurrent", "CurrentAssets"]),
    concept(
        "CashAndCashEquivalents",
        &["CashAndCashEquivalentsAtCarryingValue", "CashAndCashEquivalents"],
    ),
    concept("AccountsReceivable", &["AccountsReceivableNetCurrent"]),
    concept("Inventory", &["InventoryNet", "Inventories"]),
    concept(
        "PropertyPlantEquipment",
        &["PropertyPlantAndEquipmentNet", "PropertyPlantAndEquipment"],
    ),
    concept("Liabilities", &["Liabilities"]),
    concept("CurrentLiabilities", &["LiabilitiesCurrent", "CurrentLiabilities"]),
    concept(
        "AccountsPayable",
        &["AccountsPayableCurrent", "TradeAndOtherCurrentPayables"],
    ),
    concept("LongTermDebt", &["LongTermDebtNoncurrent"]),
    concept("StockholdersEquity", &["StockholdersEquity", "Equity"]),
    concept(
        "RetainedEarnings",
        &["RetainedEarningsAccumulatedDeficit", "RetainedEarnings"],
    ),
];

/// Document and entity information reported under `entity_info`.
const DEI_ELEMENTS: &[&str] = &[
    "EntityRegistrantName",
    "EntityCentralIndexKey",
    "TradingSymbol",
    "EntityFilerCategory",
    "DocumentPeriodEndDate",
];

/// Child element names that only occur in XBRL instances.
const XBRL_CHILDREN: &[&str] = &["context", "unit", "schemaRef"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityIdentifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Instant(String),
    Range { start: String, end: String },
}

impl Period {
    /// The date the period ends on.
    pub fn end(&self) -> &str {
        match self {
            Period::Instant(date) => date,
            Period::Range { end, .. } => end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XbrlContext {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XbrlUnit {
    pub id: String,
    pub measure: String,
}

impl XbrlUnit {
    /// ISO currency code of an `iso4217:XXX` measure.
    pub fn currency(&self) -> Option<&str> {
        let code = self.measure.rsplit(':').next()?;
        (code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())).then_some(code)
    }
}

/// A reported value of a catalog concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XbrlFact {
    /// Catalog concept, e.g. `CashAndCashEquivalents`.
    pub concept: String,
    /// Element name as written.
    pub tag: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    /// Resolved from `context_ref`; absent when the reference is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<XbrlContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<XbrlUnit>,
}

impl XbrlFact {
    pub fn scale_hint(&self) -> ScaleHint {
        match self.scale.as_deref().map(str::trim) {
            Some("3") => ScaleHint::Thousands,
            Some("6") => ScaleHint::Millions,
            Some("9") => ScaleHint::Billions,
            _ => ScaleHint::Units,
        }
    }
}

/// Facts grouped by balance-sheet section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactBuckets {
    pub assets: Vec<XbrlFact>,
    pub liabilities: Vec<XbrlFact>,
    pub equity: Vec<XbrlFact>,
}

impl FactBuckets {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.liabilities.is_empty() && self.equity.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (Section, &XbrlFact)> {
        self.assets
            .iter()
            .map(|f| (Section::Asset, f))
            .chain(self.liabilities.iter().map(|f| (Section::Liability, f)))
            .chain(self.equity.iter().map(|f| (Section::Equity, f)))
    }
}

/// Section of a catalog concept, judged by keywords in its name.
fn concept_section(concept: &str) -> Option<Section> {
    let lower = concept.to_lowercase();
    if contains_any(&lower, &["asset", "cash", "receivable", "inventory", "property"]) {
        Some(Section::Asset)
    } else if contains_any(&lower, &["liabilit", "payable", "debt"]) {
        Some(Section::Liability)
    } else if contains_any(&lower, &["equity", "stockholder", "retained"]) {
        Some(Section::Equity)
    } else {
        None
    }
}

/// True for XBRL instances: an "xbrl" token in the root tag or its attributes,
/// or a context, unit or schemaRef child.
pub fn is_xbrl(root: &XmlElement) -> bool {
    if root.name.to_lowercase().contains("xbrl") {
        return true;
    }
    let in_attributes = root
        .attributes
        .iter()
        .any(|(k, v)| k.to_lowercase().contains("xbrl") || v.to_lowercase().contains("xbrl"));
    in_attributes
        || root
            .children
            .iter()
            .any(|c| XBRL_CHILDREN.iter().any(|n| c.local_name().eq_ignore_ascii_case(n)))
}

pub fn extract_contexts(root: &XmlElement) -> BTreeMap<String, XbrlContext> {
    let mut contexts = BTreeMap::new();
    for element in root.iter().filter(|e| e.local_name() == "context") {
        let Some(id) = element.attr("id") else {
            continue;
        };
        let entity = element.find("identifier").map(|identifier| EntityIdentifier {
            scheme: identifier.attr("scheme").map(str::to_string),
            value: identifier.text.clone(),
        });
        let period = element.find("period").and_then(|period| {
            if let Some(instant) = period.find("instant") {
                return Some(Period::Instant(instant.text.clone()));
            }
            match (period.find("startDate"), period.find("endDate")) {
                (Some(start), Some(end)) => Some(Period::Range {
                    start: start.text.clone(),
                    end: end.text.clone(),
                }),
                _ => None,
            }
        });
        contexts.insert(
            id.to_string(),
            XbrlContext {
                id: id.to_string(),
                entity,
                period,
            },
        );
    }
    contexts
}

pub fn extract_units(root: &XmlElement) -> BTreeMap<String, XbrlUnit> {
    root.iter()
        .filter(|e| e.local_name() == "unit")
        .filter_map(|unit| {
            let id = unit.attr("id")?;
            let measure = unit.find("measure")?;
            Some((
                id.to_string(),
                XbrlUnit {
                    id: id.to_string(),
                    measure: measure.text.clone(),
                },
            ))
        })
        .collect()
}

/// Catalog facts bucketed by section, catalog order first, then document order.
pub fn extract_facts(
    root: &XmlElement,
    contexts: &BTreeMap<String, XbrlContext>,
    units: &BTreeMap<String, XbrlUnit>,
) -> FactBuckets {
    let mut buckets = FactBuckets::default();
    for concept in CONCEPTS {
        let Some(section) = concept_section(concept.name) else {
            continue;
        };
        for element in root.iter().filter(|e| concept.tags.contains(&e.local_name())) {
            let context_ref = element.attr("contextRef").map(str::to_string);
            let unit_ref = element.attr("unitRef").map(str::to_string);
            let fact = XbrlFact {
                concept: concept.name.to_string(),
                tag: element.name.clone(),
                value: element.text.clone(),
                context: context_ref.as_ref().and_then(|r| contexts.get(r)).cloned(),
                unit: unit_ref.as_ref().and_then(|r| units.get(r)).cloned(),
                context_ref,
                unit_ref,
                decimals: element.attr("decimals").map(str::to_string),
                scale: element.attr("scale").map(str::to_string),
            };
            match section {
                Section::Asset => buckets.assets.push(fact),
                Section::Liability => buckets.liabilities.push(fact),
                Section::Equity => buckets.equity.push(fact),
            }
        }
    }
    buckets
}

/// `dei:` document and entity information.
pub fn extract_entity_info(root: &XmlElement) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    for name in DEI_ELEMENTS {
        let found = root
            .iter()
            .find(|e| e.prefix() == Some("dei") && e.local_name() == *name);
        if let Some(element) = found {
            info.insert(name.to_string(), element.text.clone());
        }
    }
    info
}

/// Latest instant or end date among the contexts.
pub fn reporting_period(contexts: &BTreeMap<String, XbrlContext>) -> Option<String> {
    contexts
        .values()
        .filter_map(|c| c.period.as_ref())
        .map(|p| p.end().trim())
        .filter(|d| !d.is_empty())
        .max()
        .map(str::to_string)
}

pub struct XmlBackend {
    analyzer: Analyzer,
}

impl XmlBackend {
    pub fn new(analyzer: Analyzer) -> Self {
        XmlBackend { analyzer }
    }

    fn try_parse(
        &self,
        path: &Path,
        hint: Option<&DocumentHint>,
    ) -> Result<ParsingResult, LedgerError> {
        let bytes = std::fs::read(path)?;
        let (xml, had_errors) = decode(&bytes, UTF_8);
        let root = parse_tree(&xml)?;

        let mut result = ParsingResult::new();
        if had_errors {
            result.push_warning("document is not valid UTF-8; malformed bytes were replaced");
        }

        let xbrl = is_xbrl(&root);
        tracing::info!(xbrl, root = %root.name, "parsing XML document");

        let text = root.to_indented_text();
        let scale = self.analyzer.detect_scale(&text);

        let mut chunks = ChunkBuilder::new(&self.analyzer, document_id(hint));
        let section = if xbrl { "xbrl_data" } else { "xml_data" };
        chunks.push_text(&text, Some(section), None, scale);
        result.chunks = chunks.finish();

        result.figures = self.analyzer.figures.extract(&text);
        apply_scale(&mut result.figures, scale);

        let namespaces: BTreeMap<&str, &str> = root
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        result.insert_metadata("is_xbrl", xbrl);
        result.insert_metadata("document_type", if xbrl { "xbrl" } else { "xml" });
        result.insert_metadata("namespaces", namespaces);
        result.insert_metadata("scale", scale);

        if xbrl {
            self.parse_xbrl(&root, &mut result);
        } else {
            let items = self.xml_line_items(&root);
            tracing::debug!(items = items.len(), "plain XML candidates classified");
            result.insert_metadata("balance_sheet_items", items);
        }

        Ok(result)
    }

    fn parse_xbrl(&self, root: &XmlElement, result: &mut ParsingResult) {
        let contexts = extract_contexts(root);
        let units = extract_units(root);
        let facts = extract_facts(root, &contexts, &units);
        tracing::debug!(
            contexts = contexts.len(),
            units = units.len(),
            facts = facts.assets.len() + facts.liabilities.len() + facts.equity.len(),
            "XBRL instance read"
        );

        if !facts.is_empty() {
            let (table, items) = self.fact_table(&facts);
            result.tables.push(table);
            result.insert_metadata("balance_sheet_items", items);
        }

        result.insert_metadata("entity_info", extract_entity_info(root));
        result.insert_metadata("reporting_period", reporting_period(&contexts));
        result.insert_metadata("contexts", &contexts);
        result.insert_metadata("units", &units);
        result.insert_metadata("balance_sheet_data", &facts);
    }

    /// One row per fact: concept tag, raw value, context and unit references.
    fn fact_table(&self, facts: &FactBuckets) -> (Table, BalanceSheetItems) {
        let default_currency = self.analyzer.figures.default_currency();
        let mut rows = Vec::new();
        let mut line_items = Vec::new();
        let mut items = BalanceSheetItems::default();

        for (position, (section, fact)) in facts.iter().enumerate() {
            let local = fact.tag.rsplit(':').next().unwrap_or(&fact.tag);
            rows.push(vec![
                local.to_string(),
                fact.value.clone(),
                fact.context_ref.clone().unwrap_or_default(),
                fact.unit_ref.clone().unwrap_or_default(),
            ]);

            let figures: Vec<FinancialFigure> = parse_amount_cell(&fact.value)
                .map(|amount| FinancialFigure {
                    amount,
                    currency: fact
                        .unit
                        .as_ref()
                        .and_then(XbrlUnit::currency)
                        .unwrap_or(default_currency)
                        .to_string(),
                    raw_text: fact.value.clone(),
                    context: fact.context_ref.clone().unwrap_or_default(),
                    scale: fact.scale_hint(),
                })
                .into_iter()
                .collect();

            let label = split_concept_name(local);
            let mut category = self.analyzer.classifier.classify(&label);
            if category.is_unknown() {
                category = Category::other_in(section);
            }
            let mut item = LineItem::new(label.clone(), category, figures, position);
            item.ambiguous = self.analyzer.classifier.is_ambiguous(&label);
            items.push(item.clone());
            line_items.push(item);
        }

        let currency = line_items
            .iter()
            .flat_map(|item| item.figures.iter())
            .map(|f| f.currency.clone())
            .next()
            .unwrap_or_else(|| default_currency.to_string());

        let headers = ["Line Item", "Amount", "Context", "Unit"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mut table = Table::new(headers, rows);
        table.source = Some("xbrl".into());
        table.is_financial = true;
        table.financial_data = Some(FinancialData {
            line_items,
            totals: BTreeMap::new(),
            currency,
            scale: ScaleHint::Units,
        });
        (table, items)
    }

    /// Elements whose tag names a financial term or whose text holds a figure,
    /// classified on tag and text together.
    fn xml_line_items(&self, root: &XmlElement) -> BalanceSheetItems {
        let classifier = &self.analyzer.classifier;
        let mut items = BalanceSheetItems::default();

        for (position, element) in root.iter().enumerate() {
            let tag = element.local_name();
            let tag_hit = contains_any(&tag.to_lowercase(), self.analyzer.patterns.tag_terms);
            if !tag_hit && !self.analyzer.figures.has_figure(&element.text) {
                continue;
            }

            let category = classifier.classify_any(&[tag, &element.text]);
            if category.section().is_none() {
                continue;
            }
            let label = element.attr("name").unwrap_or(tag);
            let value = element.attr("value").unwrap_or(&element.text);
            let figures = self.analyzer.figures.extract(value);
            let mut item = LineItem::new(label, category, figures, position);
            item.ambiguous = classifier.is_ambiguous(label);
            items.push(item);
        }
        items
    }
}

impl DocumentParser for XmlBackend {
    fn name(&self) -> &str {
        "xml"
    }

    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Xml, DocumentFormat::Xbrl]
    }

    fn parse(&self, path: &Path, hint: Option<&DocumentHint>) -> ParsingResult {
        guarded(self.name(), path, hint, || self.try_parse(path, hint))
    }
}
