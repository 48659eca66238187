use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables shared by every back-end.
///
/// Missing keys in a JSON config take the defaults below; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Characters of context kept on each side of a figure.
    pub context_window: usize,
    /// Characters scanned on each side of a free-text label for its amounts.
    pub line_item_window: usize,
    /// PDF text shorter than this (after trimming) triggers the next extraction method.
    pub min_text_chars: usize,
    pub ocr_enabled: bool,
    pub ocr_language: String,
    pub ocr_dpi: u32,
    pub max_file_size_mb: u64,
    /// Currency assigned by the catch-all numeral pattern.
    pub default_currency: String,
    pub encoding_sniff_bytes: usize,
    pub encoding_probe_bytes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            chunk_size: 500,
            chunk_overlap: 100,
            context_window: 50,
            line_item_window: 100,
            min_text_chars: 100,
            ocr_enabled: true,
            ocr_language: "eng".into(),
            ocr_dpi: 200,
            max_file_size_mb: 50,
            default_currency: "USD".into(),
            encoding_sniff_bytes: 10_000,
            encoding_probe_bytes: 1_000,
        }
    }
}

/// Load a config from a JSON file.
pub fn load_config(path: &Path) -> Result<ParserConfig, LedgerError> {
    let content = std::fs::read_to_string(path).map_err(|e| LedgerError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let config: ParserConfig =
        serde_json::from_str(&content).map_err(|e| LedgerError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a config from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<ParserConfig, LedgerError> {
    let config: ParserConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ParserConfig) -> Result<(), LedgerError> {
    if config.chunk_size == 0 {
        return Err(LedgerError::ConfigInvalid(
            "chunk_size must be greater than 0".into(),
        ));
    }

    if config.chunk_overlap >= config.chunk_size {
        return Err(LedgerError::ConfigInvalid(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            config.chunk_overlap, config.chunk_size
        )));
    }

    if config.min_text_chars == 0 {
        return Err(LedgerError::ConfigInvalid(
            "min_text_chars must be greater than 0".into(),
        ));
    }

    if config.ocr_dpi == 0 {
        return Err(LedgerError::ConfigInvalid(
            "ocr_dpi must be greater than 0".into(),
        ));
    }

    let currency = config.default_currency.as_str();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LedgerError::ConfigInvalid(format!(
            "default_currency '{}' is not a three-letter currency code",
            currency
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_takes_defaults() {
        let config = parse_config_str("{}").unwrap();
        assert_eq!(config, ParserConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = parse_config_str(r#"{ "chunk_size": 800, "ocr_enabled": false }"#).unwrap();
        assert_eq!(config.chunk_size, 800);
        assert!(!config.ocr_enabled);
        assert_eq!(config.chunk_overlap, 100);
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_rejected() {
        assert!(parse_config_str(r#"{ "chunk_size": 100, "chunk_overlap": 100 }"#).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(parse_config_str(r#"{ "chunk_sise": 100 }"#).is_err());
    }

    #[test]
    fn test_bad_currency_rejected() {
        assert!(parse_config_str(r#"{ "default_currency": "dollars" }"#).is_err());
    }
}
