//! End-to-end tests for parse_document() and the dispatcher.
//!
//! PDF tests use a MockSource that returns pre-built PageContent without
//! invoking pdftotext, so these tests run without poppler-utils.

use ledgerlens_core::analysis::Analyzer;
use ledgerlens_core::backend::pdf::extract::{ExtractionMethod, PageContent, PdfTextSource};
use ledgerlens_core::backend::{Dispatcher, PdfBackend};
use ledgerlens_core::config::ParserConfig;
use ledgerlens_core::error::LedgerError;
use ledgerlens_core::model::{BalanceSheetItems, DocumentHint, DocumentType, ScaleHint};
use ledgerlens_core::{parse_document, DocumentParser};
use ledgerlens_core::taxonomy::{
    AssetCategory, Category, EquityCategory, LiabilityCategory, Section,
};
use rust_decimal_macros::dec;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn write_file(content: &[u8], suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content).unwrap();
    file
}

fn balance_sheet_items(value: &serde_json::Value) -> BalanceSheetItems {
    serde_json::from_value(value.clone()).unwrap()
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------
#[test]
fn csv_balance_sheet_with_hint() {
    let file = write_file(
        b"Line item,2023,2022\n\
          Cash and cash equivalents,\"1,500\",\"1,200\"\n\
          Inventory,800,750\n\
          Accounts payable,700,650\n\
          Retained earnings,1600,1300\n\
          Total assets,2300,1950\n",
        ".csv",
    );
    let id = Uuid::new_v4();
    let hint = DocumentHint {
        document_id: Some(id),
        document_type: Some(DocumentType::BalanceSheet),
        company: Some("Example AB".into()),
        fiscal_period: Some("FY2023".into()),
    };

    let result = parse_document(file.path(), Some(&hint), &ParserConfig::default());
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.errors.is_empty());

    assert!(!result.chunks.is_empty());
    assert!(result.chunks.iter().all(|c| c.document_id == id));
    assert_eq!(result.metadata["hint"]["company"], "Example AB");
    assert_eq!(result.metadata["hint"]["document_type"], "balance_sheet");

    let table = &result.tables[0];
    assert!(table.is_financial);
    let data = table.financial_data.as_ref().unwrap();
    let cash = &data.line_items[0];
    assert_eq!(cash.category, Category::Asset(AssetCategory::CashAndEquivalents));
    assert_eq!(cash.figures[0].amount, dec!(1500));
    assert!(data.totals.contains_key("total assets"));

    let items = balance_sheet_items(&result.metadata["balance_sheet_items"]);
    assert!(items
        .liabilities
        .iter()
        .any(|i| i.category == Category::Liability(LiabilityCategory::AccountsPayable)));
    assert!(items
        .equity
        .iter()
        .any(|i| i.category == Category::Equity(EquityCategory::RetainedEarnings)));
}

#[test]
fn csv_without_hint_gets_fresh_document_id() {
    let file = write_file(b"Item,2023\nCash,100\nDebt,200\n", ".csv");
    let config = ParserConfig::default();

    let first = parse_document(file.path(), None, &config);
    let second = parse_document(file.path(), None, &config);
    assert!(first.success && second.success);
    assert_ne!(first.chunks[0].document_id, second.chunks[0].document_id);
    assert!(first.metadata.get("hint").is_none());
}

#[test]
fn csv_content_with_unknown_extension() {
    let file = write_file(b"Item;2023\nCash;100\nLoans;200\n", ".export");
    let result = parse_document(file.path(), None, &ParserConfig::default());
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.metadata["delimiter"], ";");
}

#[test]
fn unsupported_content_is_an_error_result() {
    let file = write_file(b"plain words without any structure", ".bin");
    let result = parse_document(file.path(), None, &ParserConfig::default());
    assert!(!result.success);
    assert!(result.chunks.is_empty());
    assert!(result.errors[0].starts_with("unsupported document format"));
}

// ---------------------------------------------------------------------------
// XBRL / XML
// ---------------------------------------------------------------------------
const XBRL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
            xmlns:us-gaap="http://fasb.org/us-gaap/2023"
            xmlns:dei="http://xbrl.sec.gov/dei/2023">
  <dei:EntityRegistrantName>Example Corp</dei:EntityRegistrantName>
  <dei:TradingSymbol>EXMP</dei:TradingSymbol>
  <xbrli:context id="c2023">
    <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000999999</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:instant>2023-12-31</xbrli:instant></xbrli:period>
  </xbrli:context>
  <xbrli:context id="c2022">
    <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000999999</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:instant>2022-12-31</xbrli:instant></xbrli:period>
  </xbrli:context>
  <xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
  <us-gaap:Assets contextRef="c2023" unitRef="usd">5000</us-gaap:Assets>
  <us-gaap:Assets contextRef="c2022" unitRef="usd">4200</us-gaap:Assets>
  <us-gaap:Liabilities contextRef="c2023" unitRef="usd">3000</us-gaap:Liabilities>
  <us-gaap:StockholdersEquity contextRef="missing" unitRef="usd">2000</us-gaap:StockholdersEquity>
</xbrli:xbrl>"#;

#[test]
fn xbrl_filing_end_to_end() {
    let file = write_file(XBRL.as_bytes(), ".xbrl");
    let result = parse_document(file.path(), None, &ParserConfig::default());
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.metadata["is_xbrl"], true);
    assert_eq!(result.metadata["entity_info"]["TradingSymbol"], "EXMP");
    assert_eq!(result.metadata["reporting_period"], "2023-12-31");

    let data = &result.metadata["balance_sheet_data"];
    assert_eq!(data["assets"].as_array().unwrap().len(), 2);
    assert_eq!(data["assets"][1]["context"]["period"]["instant"], "2022-12-31");
    assert_eq!(data["liabilities"].as_array().unwrap().len(), 1);
    // An undefined contextRef keeps the fact, without a resolved context.
    assert_eq!(data["equity"][0]["context_ref"], "missing");
    assert!(data["equity"][0].get("context").is_none());

    let table = &result.tables[0];
    assert_eq!(table.source.as_deref(), Some("xbrl"));
    assert_eq!(table.row_count, 4);
    let items = balance_sheet_items(&result.metadata["balance_sheet_items"]);
    assert_eq!(items.assets.len(), 2);
    assert_eq!(items.liabilities[0].section, Some(Section::Liability));
    assert_eq!(items.equity[0].section, Some(Section::Equity));
}

#[test]
fn plain_xml_is_not_xbrl() {
    let file = write_file(
        br#"<statement currency="USD">
  <line><CashBalance>$2,500</CashBalance></line>
  <line><LongTermDebt>$4,000</LongTermDebt></line>
</statement>"#,
        ".xml",
    );
    let result = parse_document(file.path(), None, &ParserConfig::default());
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.metadata["is_xbrl"], false);
    assert_eq!(result.chunks[0].section_type.as_deref(), Some("xml_data"));
    assert!(result.figures.iter().any(|f| f.amount == dec!(2500)));
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------
fn write_single_sheet_workbook(name: &str, rows: &[&[&str]]) -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    let mut zip = ZipWriter::new(file.reopen().unwrap());
    let options = SimpleFileOptions::default();

    zip.start_file("xl/workbook.xml", options).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{name}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    )
    .unwrap();

    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
    )
    .unwrap();

    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            let cell_ref = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            if value.parse::<f64>().is_ok() {
                sheet.push_str(&format!(r#"<c r="{cell_ref}"><v>{value}</v></c>"#));
            } else {
                sheet.push_str(&format!(
                    r#"<c r="{cell_ref}" t="inlineStr"><is><t>{value}</t></is></c>"#
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");
    zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    zip.write_all(sheet.as_bytes()).unwrap();

    zip.finish().unwrap();
    file
}

#[test]
fn xlsx_balance_sheet_end_to_end() {
    let file = write_single_sheet_workbook(
        "Statement of Financial Position",
        &[
            &["Amounts in thousands", "2023"],
            &["Inventory", "320"],
            &["Trade payables", "210"],
            &["Share capital", "100"],
        ],
    );
    let result = parse_document(file.path(), None, &ParserConfig::default());
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.metadata["sheet_count"], 1);
    assert_eq!(result.metadata["balance_sheet_sheet"], "Statement of Financial Position");

    let items = balance_sheet_items(&result.metadata["balance_sheet_items"]);
    assert_eq!(items.assets[0].category, Category::Asset(AssetCategory::Inventory));
    assert_eq!(
        items.liabilities[0].category,
        Category::Liability(LiabilityCategory::AccountsPayable)
    );
    assert_eq!(
        items.equity[0].category,
        Category::Equity(EquityCategory::ShareCapital)
    );

    assert!(result
        .figures
        .iter()
        .all(|f| f.scale == ScaleHint::Thousands));
}

// ---------------------------------------------------------------------------
// PDF (mock text sources)
// ---------------------------------------------------------------------------
struct MockSource {
    method: ExtractionMethod,
    pages: Result<Vec<PageContent>, String>,
}

impl PdfTextSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn method(&self) -> ExtractionMethod {
        self.method
    }

    fn extract_pages(&self, _path: &Path) -> Result<Vec<PageContent>, LedgerError> {
        self.pages.clone().map_err(LedgerError::Extraction)
    }

    fn page_count(&self, _path: &Path) -> Result<usize, LedgerError> {
        self.pages
            .as_ref()
            .map(Vec::len)
            .map_err(|e| LedgerError::Extraction(e.clone()))
    }
}

fn pdf_dispatcher(sources: Vec<Box<dyn PdfTextSource>>) -> Dispatcher {
    let config = ParserConfig::default();
    let pdf = PdfBackend::with_sources(Analyzer::new(&config), sources, config.min_text_chars);
    let backends: Vec<Box<dyn DocumentParser>> = vec![Box::new(pdf)];
    Dispatcher::with_backends(backends, config.max_file_size_mb)
}

const ANNUAL_REPORT_PAGES: [&str; 2] = [
    "Annual Report 2023\n\
     Letter to shareholders: we grew revenue across all regions and kept costs flat.",
    "Consolidated Balance Sheet\n\
     (in millions)\n\
     Cash and cash equivalents          $1,500          $1,200\n\
     Accounts receivable                  $900            $850\n\
     Long-term debt                     $2,000          $2,100\n\
     Retained earnings                  $3,400          $3,000\n\
     Closing remarks follow on the next page.",
];

#[test]
fn pdf_falls_back_when_layout_tool_is_missing() {
    let pages: Vec<PageContent> = ANNUAL_REPORT_PAGES
        .iter()
        .enumerate()
        .map(|(i, text)| PageContent::new(i + 1, text))
        .collect();
    let dispatcher = pdf_dispatcher(vec![
        Box::new(MockSource {
            method: ExtractionMethod::Layout,
            pages: Err("pdftotext not installed".into()),
        }),
        Box::new(MockSource {
            method: ExtractionMethod::Plain,
            pages: Ok(pages),
        }),
    ]);

    let file = write_file(b"%PDF-1.4\n", ".pdf");
    let result = dispatcher.parse(file.path(), None);
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.metadata["extraction_method"], "plain");
    assert_eq!(result.metadata["scale"], "millions");
    assert_eq!(result.metadata["page_count"], 2);

    // Tables come from layout text only.
    assert!(result.tables.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.starts_with("table extraction failed")));

    assert!(result.chunks.iter().any(|c| c.page_number == Some(2)));
    let items = balance_sheet_items(&result.metadata["balance_sheet_items"]);
    assert!(items
        .assets
        .iter()
        .any(|i| i.category == Category::Asset(AssetCategory::CashAndEquivalents)));
    assert!(items
        .liabilities
        .iter()
        .any(|i| i.category == Category::Liability(LiabilityCategory::LongTermDebt)));
}

#[test]
fn pdf_without_text_fails() {
    let dispatcher = pdf_dispatcher(vec![
        Box::new(MockSource {
            method: ExtractionMethod::Layout,
            pages: Ok(vec![PageContent::new(1, "")]),
        }),
        Box::new(MockSource {
            method: ExtractionMethod::Ocr,
            pages: Err("tesseract not installed".into()),
        }),
    ]);
    let file = write_file(b"%PDF-1.4\n", ".pdf");
    let result = dispatcher.parse(file.path(), None);
    assert!(!result.success);
    assert_eq!(result.errors, vec!["Failed to extract text from PDF".to_string()]);
}
