pub mod csv;
pub mod encoding;
pub mod pdf;
pub mod spreadsheet;
pub mod xml;

use crate::analysis::Analyzer;
use crate::config::ParserConfig;
use crate::error::LedgerError;
use crate::model::{DocumentFormat, DocumentHint, ParsingResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use uuid::Uuid;

pub use self::csv::CsvBackend;
pub use self::pdf::PdfBackend;
pub use self::spreadsheet::SpreadsheetBackend;
pub use self::xml::XmlBackend;

/// Leading bytes read for content sniffing.
const SNIFF_LEN: usize = 8192;
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Contract shared by every format back-end.
pub trait DocumentParser: Send + Sync {
    /// Name of this back-end (for diagnostics).
    fn name(&self) -> &str;

    /// Formats this back-end reads.
    fn formats(&self) -> &[DocumentFormat];

    /// True iff the path's extension is one of `formats`. Content is not inspected.
    fn can_handle(&self, path: &Path) -> bool {
        DocumentFormat::from_path(path).is_some_and(|f| self.formats().contains(&f))
    }

    /// Parse a document. Never fails: internal errors become an unsuccessful
    /// result carrying the error message.
    fn parse(&self, path: &Path, hint: Option<&DocumentHint>) -> ParsingResult;
}

/// Run a back-end body and turn its outcome into a finished result.
pub(crate) fn guarded<F>(
    backend: &str,
    path: &Path,
    hint: Option<&DocumentHint>,
    body: F,
) -> ParsingResult
where
    F: FnOnce() -> Result<ParsingResult, LedgerError>,
{
    let result = match body() {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(backend, path = %path.display(), error = %e, "parse failed");
            ParsingResult::failure(format!("{backend} parsing failed: {e}"))
        }
    };
    finish(result, hint)
}

/// Attach the caller's hint and settle `success`.
fn finish(mut result: ParsingResult, hint: Option<&DocumentHint>) -> ParsingResult {
    if let Some(hint) = hint {
        result.insert_metadata("hint", hint);
    }
    result.finalize()
}

/// Parent id for every chunk of a document.
pub(crate) fn document_id(hint: Option<&DocumentHint>) -> Uuid {
    hint.and_then(|h| h.document_id).unwrap_or_else(Uuid::new_v4)
}

/// Picks a back-end for a file and runs it.
pub struct Dispatcher {
    backends: Vec<Box<dyn DocumentParser>>,
    max_file_size_mb: u64,
}

impl Dispatcher {
    /// The four built-in back-ends sharing one set of analysis services.
    pub fn new(config: &ParserConfig) -> Self {
        let analyzer = Analyzer::new(config);
        let backends: Vec<Box<dyn DocumentParser>> = vec![
            Box::new(PdfBackend::new(analyzer.clone(), config)),
            Box::new(SpreadsheetBackend::new(analyzer.clone())),
            Box::new(CsvBackend::new(analyzer.clone(), config)),
            Box::new(XmlBackend::new(analyzer)),
        ];
        Dispatcher::with_backends(backends, config.max_file_size_mb)
    }

    pub fn with_backends(backends: Vec<Box<dyn DocumentParser>>, max_file_size_mb: u64) -> Self {
        Dispatcher {
            backends,
            max_file_size_mb,
        }
    }

    pub fn backends(&self) -> &[Box<dyn DocumentParser>] {
        &self.backends
    }

    /// Back-end by extension, then by sniffing the leading bytes.
    pub fn backend_for(&self, path: &Path) -> Option<&dyn DocumentParser> {
        if let Some(backend) = self.backends.iter().find(|b| b.can_handle(path)) {
            return Some(backend.as_ref());
        }
        let format = sniff_file(path).ok().flatten()?;
        tracing::debug!(path = %path.display(), ?format, "format chosen by content");
        self.backends
            .iter()
            .find(|b| b.formats().contains(&format))
            .map(|b| b.as_ref())
    }

    pub fn parse(&self, path: &Path, hint: Option<&DocumentHint>) -> ParsingResult {
        if let Err(e) = self.check_size(path) {
            tracing::warn!(path = %path.display(), error = %e, "document rejected");
            return finish(ParsingResult::failure(e.to_string()), hint);
        }
        match self.backend_for(path) {
            Some(backend) => {
                tracing::info!(
                    backend = backend.name(),
                    path = %path.display(),
                    "parsing document"
                );
                backend.parse(path, hint)
            }
            None => {
                let e = LedgerError::UnsupportedFormat(path.display().to_string());
                tracing::warn!(path = %path.display(), error = %e, "document rejected");
                finish(ParsingResult::failure(e.to_string()), hint)
            }
        }
    }

    fn check_size(&self, path: &Path) -> Result<(), LedgerError> {
        let size = std::fs::metadata(path)?.len();
        let limit = self.max_file_size_mb.saturating_mul(1024 * 1024);
        if size > limit {
            return Err(LedgerError::FileTooLarge {
                size_mb: size.div_ceil(1024 * 1024),
                limit_mb: self.max_file_size_mb,
            });
        }
        Ok(())
    }
}

fn sniff_file(path: &Path) -> Result<Option<DocumentFormat>, LedgerError> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(sniff_format(&head))
}

/// Guess a format from leading bytes.
pub fn sniff_format(head: &[u8]) -> Option<DocumentFormat> {
    if head.starts_with(b"%PDF") {
        return Some(DocumentFormat::Pdf);
    }
    if head.starts_with(ZIP_MAGIC) {
        return Some(DocumentFormat::Xlsx);
    }
    if head.starts_with(OLE2_MAGIC) {
        return Some(DocumentFormat::Xls);
    }

    let body = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);
    let first = body.iter().copied().find(|b| !b.is_ascii_whitespace())?;
    if first == b'<' {
        return Some(DocumentFormat::Xml);
    }

    let first_line = body.split(|&b| b == b'\n').next().unwrap_or_default();
    if first_line.iter().any(|b| matches!(b, b',' | b';' | b'\t')) && !first_line.contains(&0) {
        return Some(DocumentFormat::Csv);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(b"%PDF-1.7\n"), Some(DocumentFormat::Pdf));
        assert_eq!(sniff_format(b"PK\x03\x04rest"), Some(DocumentFormat::Xlsx));
        assert_eq!(sniff_format(OLE2_MAGIC), Some(DocumentFormat::Xls));
        assert_eq!(
            sniff_format(b"\xEF\xBB\xBF  <?xml version=\"1.0\"?>"),
            Some(DocumentFormat::Xml)
        );
        assert_eq!(sniff_format(b"Item;2023\nCash;1"), Some(DocumentFormat::Csv));
        assert_eq!(sniff_format(b"just some words"), None);
        assert_eq!(sniff_format(b""), None);
    }

    #[test]
    fn test_can_handle_is_extension_only() {
        let dispatcher = Dispatcher::new(&ParserConfig::default());
        let csv = dispatcher.backend_for(Path::new("/nonexistent/report.CSV"));
        assert_eq!(csv.map(|b| b.name()), Some("csv"));
        let xbrl = dispatcher.backend_for(Path::new("/nonexistent/filing.xbrl"));
        assert_eq!(xbrl.map(|b| b.name()), Some("xml"));
        assert!(dispatcher.backend_for(Path::new("/nonexistent/notes.txt")).is_none());
    }

    #[test]
    fn test_unknown_extension_is_sniffed() {
        let mut file = tempfile::Builder::new().suffix(".dat").tempfile().unwrap();
        file.write_all(b"Item,2023\nCash,100\n").unwrap();
        let dispatcher = Dispatcher::new(&ParserConfig::default());
        let backend = dispatcher.backend_for(file.path()).unwrap();
        assert_eq!(backend.name(), "csv");
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(&vec![b'a'; 2 * 1024 * 1024]).unwrap();
        let config = ParserConfig {
            max_file_size_mb: 1,
            ..ParserConfig::default()
        };
        let result = Dispatcher::new(&config).parse(file.path(), None);
        assert!(!result.success);
        assert!(result.errors[0].contains("above the 1 MB limit"));
    }

    #[test]
    fn test_rejected_documents_keep_the_hint() {
        let hint = DocumentHint {
            company: Some("Acme".into()),
            ..DocumentHint::default()
        };
        let config = ParserConfig {
            max_file_size_mb: 1,
            ..ParserConfig::default()
        };
        let dispatcher = Dispatcher::new(&config);

        let mut large = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        large.write_all(&vec![b'a'; 2 * 1024 * 1024]).unwrap();
        let mut unknown = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        unknown.write_all(b"\x00\x01 opaque bytes").unwrap();

        for path in [large.path(), unknown.path()] {
            let result = dispatcher.parse(path, Some(&hint));
            assert!(!result.success);
            assert_eq!(result.errors.len(), 1);
            assert_eq!(result.metadata["hint"]["company"], "Acme");
        }
    }

    #[test]
    fn test_missing_file_is_error_result() {
        let result = Dispatcher::new(&ParserConfig::default())
            .parse(Path::new("/nonexistent/report.csv"), None);
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
    }
}
