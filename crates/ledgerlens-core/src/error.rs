use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("decoding failed: {0}")]
    Decode(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("{tool} not found. Install poppler-utils / tesseract-ocr and make sure it is on PATH")]
    ToolNotFound { tool: String },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("file is {size_mb} MB, above the {limit_mb} MB limit")]
    FileTooLarge { size_mb: u64, limit_mb: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for LedgerError {
    fn from(e: quick_xml::Error) -> Self {
        LedgerError::Xml(e.to_string())
    }
}

impl From<calamine::Error> for LedgerError {
    fn from(e: calamine::Error) -> Self {
        LedgerError::Spreadsheet(e.to_string())
    }
}

impl From<csv::Error> for LedgerError {
    fn from(e: csv::Error) -> Self {
        LedgerError::Csv(e.to_string())
    }
}
