use ledgerlens_core::config::{load_config, ParserConfig};
use ledgerlens_core::error::LedgerError;
use ledgerlens_core::model::{DocumentHint, DocumentType};
use std::path::PathBuf;

use crate::output;

pub struct ParseArgs {
    pub input_file: PathBuf,
    pub output_format: String,
    pub output_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub document_type: Option<DocumentType>,
    pub company: Option<String>,
    pub period: Option<String>,
}

/// clap value parser for `--document-type`.
pub fn parse_document_type(s: &str) -> Result<DocumentType, String> {
    DocumentType::from_str_loose(s).ok_or_else(|| {
        format!(
            "unknown document type '{s}' (expected balance_sheet, income_statement, \
             cash_flow_statement, annual_report, quarterly_report, 10k, 10q or other)"
        )
    })
}

pub fn run(args: ParseArgs) -> Result<(), LedgerError> {
    let config = match &args.config_file {
        Some(path) => load_config(path)?,
        None => ParserConfig::default(),
    };
    tracing::debug!(?config, file = %args.input_file.display(), "parser config resolved");

    let hint = DocumentHint {
        document_id: None,
        document_type: args.document_type,
        company: args.company,
        fiscal_period: args.period,
    };
    let has_hint =
        hint.document_type.is_some() || hint.company.is_some() || hint.fiscal_period.is_some();

    let result = ledgerlens_core::parse_document(
        &args.input_file,
        has_hint.then_some(&hint),
        &config,
    );

    match args.output_file {
        Some(path) => {
            // Always write JSON when saving to file
            output::json::write(&result, &path)?;
            eprintln!(
                "Parsed {} chunk(s) and {} table(s), written to {}",
                result.chunks.len(),
                result.tables.len(),
                path.display()
            );
            for w in &result.warnings {
                eprintln!("  warning: {w}");
            }
        }
        None => match args.output_format.as_str() {
            "json" => output::json::print(&result)?,
            _ => output::table::print(&result),
        },
    }

    if result.success {
        Ok(())
    } else {
        Err(LedgerError::Extraction(format!(
            "could not parse {}: {}",
            args.input_file.display(),
            result.errors.join("; ")
        )))
    }
}
