use ledgerlens_core::config::{load_config, ParserConfig};
use ledgerlens_core::error::LedgerError;
use std::path::Path;

/// Print the default config as JSON, ready to be edited and passed to `parse --config`.
pub fn defaults() -> Result<(), LedgerError> {
    println!("{}", serde_json::to_string_pretty(&ParserConfig::default())?);
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), LedgerError> {
    let config = load_config(file)?;

    println!("Config '{}' is valid.", file.display());
    println!(
        "  Chunks: {} chars, {} overlap",
        config.chunk_size, config.chunk_overlap
    );
    println!(
        "  OCR: {}",
        if config.ocr_enabled {
            format!("{} at {} dpi", config.ocr_language, config.ocr_dpi)
        } else {
            "disabled".to_string()
        }
    );
    println!("  Default currency: {}", config.default_currency);

    // Settings that are legal but likely to surprise (warnings, not errors)
    let mut warnings = Vec::new();
    if config.max_file_size_mb == 0 {
        warnings.push("max_file_size_mb is 0; every non-empty file will be rejected".to_string());
    }
    if config.encoding_probe_bytes > config.encoding_sniff_bytes {
        warnings.push(format!(
            "encoding_probe_bytes ({}) exceeds encoding_sniff_bytes ({})",
            config.encoding_probe_bytes, config.encoding_sniff_bytes
        ));
    }
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }

    Ok(())
}
