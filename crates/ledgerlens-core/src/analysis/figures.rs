use crate::model::{FinancialFigure, ScaleHint};
use crate::patterns::PatternLibrary;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Finds currency amounts in free text.
///
/// Every currency pattern is applied independently, so a symbol-prefixed amount
/// such as `$1,234.56` yields one figure from its symbol pattern and a second one
/// from the catch-all numeral pattern. Callers that need distinct amounts must
/// deduplicate themselves.
#[derive(Clone)]
pub struct FigureExtractor {
    patterns: &'static PatternLibrary,
    context_window: usize,
    default_currency: String,
}

impl FigureExtractor {
    pub fn new(
        patterns: &'static PatternLibrary,
        context_window: usize,
        default_currency: &str,
    ) -> Self {
        FigureExtractor {
            patterns,
            context_window,
            default_currency: default_currency.to_string(),
        }
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }

    /// All figures in `text`, in pattern order then match order.
    pub fn extract(&self, text: &str) -> Vec<FinancialFigure> {
        let mut figures = Vec::new();

        for pattern in &self.patterns.currencies {
            let currency = pattern.currency.unwrap_or(self.default_currency.as_str());
            for caps in pattern.regex.captures_iter(text) {
                let Some(raw) = caps.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                let Some(amount) = parse_numeral(raw) else {
                    tracing::trace!(raw, "skipping numeral that does not parse");
                    continue;
                };
                figures.push(FinancialFigure {
                    amount,
                    currency: currency.to_string(),
                    raw_text: raw.to_string(),
                    context: first_occurrence_context(text, raw, self.context_window),
                    scale: ScaleHint::Units,
                });
            }
        }

        figures
    }

    /// True if `text` contains at least one figure.
    pub fn has_figure(&self, text: &str) -> bool {
        self.patterns.currencies.iter().any(|p| {
            p.regex
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .any(|m| parse_numeral(m.as_str()).is_some())
        })
    }
}

/// Parse a matched numeral after stripping thousands separators.
///
/// Bare separators (",", ",,") and numerals beyond decimal precision return `None`.
pub fn parse_numeral(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parse a table cell as an amount: currency symbols, thousands separators and
/// whitespace are ignored and `(1,234)` reads as negative.
pub fn parse_amount_cell(cell: &str) -> Option<Decimal> {
    let trimmed = cell.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -value } else { value })
}

/// Up to `window` characters on each side of the first occurrence of `needle`.
fn first_occurrence_context(text: &str, needle: &str, window: usize) -> String {
    match text.find(needle) {
        Some(pos) => context_around(text, pos, pos + needle.len(), window),
        None => String::new(),
    }
}

/// Slice `text[start..end]` widened by up to `window` characters on each side.
/// `start` and `end` must lie on char boundaries.
pub fn context_around(text: &str, start: usize, end: usize, window: usize) -> String {
    context_slice(text, start, end, window).to_string()
}

pub(crate) fn context_slice(text: &str, start: usize, end: usize, window: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let to = text[end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::library;
    use rust_decimal_macros::dec;

    fn extractor() -> FigureExtractor {
        FigureExtractor::new(library(), 50, "USD")
    }

    #[test]
    fn test_dollar_amount() {
        let figures = extractor().extract("$1,234.56");
        assert_eq!(figures[0].amount, dec!(1234.56));
        assert_eq!(figures[0].currency, "USD");
        assert_eq!(figures[0].raw_text, "1,234.56");
        // Symbol pattern and catch-all both report the amount.
        assert_eq!(figures.len(), 2);
        assert!(figures.iter().all(|f| f.amount == dec!(1234.56)));
    }

    #[test]
    fn test_no_numerals() {
        assert!(extractor().extract("abc").is_empty());
        assert!(!extractor().has_figure("abc"));
    }

    #[test]
    fn test_euro_and_default_currency() {
        let figures = extractor().extract("Cash €500");
        assert_eq!(figures[0].currency, "EUR");
        assert_eq!(figures[0].amount, dec!(500));
        assert_eq!(figures[1].currency, "USD");

        let figures = FigureExtractor::new(library(), 50, "SEK").extract("Cash 500");
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].currency, "SEK");
    }

    #[test]
    fn test_bare_separator_dropped() {
        let figures = extractor().extract("a, b");
        assert!(figures.is_empty());
    }

    #[test]
    fn test_context_uses_first_occurrence() {
        let text = format!("Cash 100{}Debt 100", " ".repeat(80));
        let figures = extractor().extract(&text);
        assert_eq!(figures.len(), 2);
        assert_eq!(figures[0].context, figures[1].context);
        assert!(figures[0].context.starts_with("Cash 100"));
    }

    #[test]
    fn test_context_window_is_char_safe() {
        let text = "ååååå 42 ööööö";
        let start = text.find("42").unwrap();
        assert_eq!(context_around(text, start, start + 2, 2), "å 42 ö");
        assert_eq!(context_around(text, start, start + 2, 100), text);
    }

    #[test]
    fn test_parse_amount_cell() {
        assert_eq!(parse_amount_cell(" $1,500 "), Some(dec!(1500)));
        assert_eq!(parse_amount_cell("(2,000)"), Some(dec!(-2000)));
        assert_eq!(parse_amount_cell("Cash"), None);
        assert_eq!(parse_amount_cell(""), None);
    }

    #[test]
    fn test_parse_numeral_rejects_overlong() {
        assert_eq!(parse_numeral("1,000"), Some(dec!(1000)));
        assert_eq!(parse_numeral(&"9".repeat(40)), None);
    }
}
