use ledgerlens_core::error::LedgerError;
use ledgerlens_core::model::ParsingResult;
use std::path::Path;

pub fn print(result: &ParsingResult) -> Result<(), LedgerError> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{json}");
    Ok(())
}

pub fn write(result: &ParsingResult, path: &Path) -> Result<(), LedgerError> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    Ok(())
}
