use crate::analysis::figures::{context_slice, FigureExtractor};
use crate::model::{BalanceSheetItems, FinancialFigure, LineItem};
use crate::patterns::{contains_any, PatternLibrary};
use crate::taxonomy::{Category, Section};

/// Maps line-item labels onto the balance-sheet taxonomy.
///
/// Specific category patterns are tried in library order (assets, then
/// liabilities, then equity) and the first match wins. Labels that match none fall
/// back to the coarse section keywords and land in that section's `other`
/// category; anything else is `Unknown`.
#[derive(Clone, Copy)]
pub struct CategoryClassifier {
    patterns: &'static PatternLibrary,
}

impl CategoryClassifier {
    pub fn new(patterns: &'static PatternLibrary) -> Self {
        CategoryClassifier { patterns }
    }

    pub fn classify(&self, label: &str) -> Category {
        self.classify_any(&[label])
    }

    /// Classify an entity known by several strings, e.g. an XML tag and its text.
    /// Each specific pattern is tried against every input before moving on; the
    /// keyword fallback only looks at the first input.
    pub fn classify_any(&self, inputs: &[&str]) -> Category {
        let specific = self
            .patterns
            .categories
            .iter()
            .find(|p| p.regexes.iter().any(|r| inputs.iter().any(|t| r.is_match(t))));
        if let Some(pattern) = specific {
            return pattern.category;
        }

        inputs
            .first()
            .and_then(|primary| self.keyword_section(primary))
            .map(Category::other_in)
            .unwrap_or(Category::Unknown)
    }

    /// The first section whose coarse keywords occur in `label`.
    pub fn keyword_section(&self, label: &str) -> Option<Section> {
        let lower = label.to_lowercase();
        self.patterns
            .section_keywords
            .iter()
            .find(|(_, keywords)| contains_any(&lower, keywords))
            .map(|(section, _)| *section)
    }

    /// Distinct sections whose specific patterns match `label`, in precedence order.
    pub fn matching_sections(&self, label: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        for pattern in &self.patterns.categories {
            let Some(section) = pattern.category.section() else {
                continue;
            };
            if !sections.contains(&section) && pattern.regexes.iter().any(|r| r.is_match(label)) {
                sections.push(section);
            }
        }
        sections
    }

    pub fn is_ambiguous(&self, label: &str) -> bool {
        self.matching_sections(label).len() > 1
    }

    /// True if the label names a balance-sheet line item at all.
    pub fn is_line_item(&self, label: &str) -> bool {
        contains_any(&label.to_lowercase(), self.patterns.line_item_terms)
    }

    /// Build a classified LineItem, flagging cross-section ambiguity.
    pub fn line_item(
        &self,
        label: &str,
        figures: Vec<FinancialFigure>,
        position: usize,
    ) -> LineItem {
        let label = label.trim();
        let mut item = LineItem::new(label, self.classify(label), figures, position);
        item.ambiguous = self.is_ambiguous(label);
        item
    }

    /// Search free text for every specific category pattern and keep the hits that
    /// have at least one figure within `window` characters.
    ///
    /// Every hit is reported, so nested phrases such as "cash" inside
    /// "cash and cash equivalents" produce one item per matching pattern.
    pub fn scan_line_items(
        &self,
        text: &str,
        figures: &FigureExtractor,
        window: usize,
    ) -> BalanceSheetItems {
        let mut items = BalanceSheetItems::default();

        for pattern in &self.patterns.categories {
            for regex in &pattern.regexes {
                for m in regex.find_iter(text) {
                    let amounts = figures.extract(context_slice(text, m.start(), m.end(), window));
                    if amounts.is_empty() {
                        continue;
                    }
                    let mut item = LineItem::new(m.as_str(), pattern.category, amounts, m.start());
                    item.ambiguous = self.is_ambiguous(m.as_str());
                    items.push(item);
                }
            }
        }

        items
    }
}

/// Turn an XBRL concept name into words: `CashAndCashEquivalentsAtCarryingValue`
/// becomes `Cash And Cash Equivalents At Carrying Value`.
pub fn split_concept_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower)
            {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}
