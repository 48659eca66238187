use ledgerlens_core::model::{BalanceSheetItems, LineItem, ParsingResult, Table};
use serde_json::Value;

pub fn print(result: &ParsingResult) {
    let status = if result.success { "ok" } else { "FAILED" };
    println!(
        "Status: {}  ({} chunk(s), {} table(s), {} figure(s))\n",
        status,
        result.chunks.len(),
        result.tables.len(),
        result.figures.len()
    );

    print_metadata(result);

    for (i, table) in result.tables.iter().enumerate() {
        print_table(i, table);
    }

    // Back-ends store their grouped line items as metadata
    if let Some(items) = result
        .metadata
        .get("balance_sheet_items")
        .and_then(|v| serde_json::from_value::<BalanceSheetItems>(v.clone()).ok())
        .filter(|items| !items.is_empty())
    {
        println!("=== Balance sheet items ===\n");
        print_section("Assets", &items.assets);
        print_section("Liabilities", &items.liabilities);
        print_section("Equity", &items.equity);
    }

    if !result.warnings.is_empty() {
        println!("Warnings:");
        for w in &result.warnings {
            println!("  - {w}");
        }
        println!();
    }

    if !result.errors.is_empty() {
        println!("Errors:");
        for e in &result.errors {
            println!("  - {e}");
        }
        println!();
    }
}

/// Scalar metadata only; nested values are available through `--output json`.
fn print_metadata(result: &ParsingResult) {
    let scalars: Vec<(&String, String)> = result
        .metadata
        .iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s.clone())),
            Value::Number(n) => Some((key, n.to_string())),
            Value::Bool(b) => Some((key, b.to_string())),
            _ => None,
        })
        .collect();

    if scalars.is_empty() {
        return;
    }
    let width = scalars.iter().map(|(k, _)| k.len()).max().unwrap_or(10);
    for (key, value) in &scalars {
        println!("  {:<width$}  {}", key, value, width = width);
    }
    println!();
}

fn print_table(index: usize, table: &Table) {
    let mut title = format!("=== Table {} ===", index + 1);
    if let Some(ref source) = table.source {
        title.push_str(&format!("  [{source}]"));
    }
    if let Some(page) = table.page_number {
        title.push_str(&format!("  (page {page})"));
    }
    println!("{title}\n");
    println!(
        "  {} row(s) x {} column(s){}",
        table.row_count,
        table.column_count,
        if table.is_financial { ", financial" } else { "" }
    );

    let Some(ref data) = table.financial_data else {
        println!();
        return;
    };
    println!("  Currency: {}  Scale: {}\n", data.currency, data.scale);
    print_items(&data.line_items);

    if !data.totals.is_empty() {
        println!("  Totals:");
        for (label, figures) in &data.totals {
            let amounts: Vec<String> = figures.iter().map(|f| f.raw_text.clone()).collect();
            println!("    {}  {}", label, amounts.join("  "));
        }
        println!();
    }
}

fn print_section(name: &str, items: &[LineItem]) {
    if items.is_empty() {
        return;
    }
    println!("  {name}:");
    print_items(items);
}

fn print_items(items: &[LineItem]) {
    if items.is_empty() {
        return;
    }
    let max_label = items.iter().map(|i| i.label.chars().count()).max().unwrap_or(10);

    for item in items {
        let amounts: Vec<String> = item
            .figures
            .iter()
            .map(|f| format!("{} {}", f.amount, f.currency))
            .collect();
        let ambiguous_marker = if item.ambiguous { " (?)" } else { "" };
        println!(
            "    {:<width$}  {:<24}  -> {}{}",
            item.label,
            amounts.join(", "),
            item.category,
            ambiguous_marker,
            width = max_label
        );
    }
    println!();
}
