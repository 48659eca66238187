//! PDF text sources.
//!
//! Three ways of getting text out of a PDF, tried in this order by the PDF
//! back-end: layout-preserving `pdftotext`, lopdf content-stream text, and OCR
//! over rasterized pages (`pdftoppm` + `tesseract`).

use crate::error::LedgerError;
use serde::Serialize;
use std::path::Path;
use std::process::{Command, Output};

/// Text of a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub page_number: usize,
    pub lines: Vec<String>,
}

impl PageContent {
    pub fn new(page_number: usize, text: &str) -> Self {
        PageContent {
            page_number,
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Keeps column alignment, so tables can be recovered from the text.
    Layout,
    Plain,
    Ocr,
}

/// One way of turning a PDF into page text.
pub trait PdfTextSource: Send + Sync {
    /// Name of this source (for diagnostics).
    fn name(&self) -> &str;

    fn method(&self) -> ExtractionMethod;

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, LedgerError>;

    fn page_count(&self, path: &Path) -> Result<usize, LedgerError>;
}

/// Run an external tool, mapping a missing binary and a non-zero exit to errors.
fn run_tool(tool: &str, command: &mut Command) -> Result<Output, LedgerError> {
    let output = command.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LedgerError::ToolNotFound { tool: tool.into() }
        } else {
            LedgerError::Extraction(format!("{tool} failed: {e}"))
        }
    })?;

    if !output.status.success() {
        return Err(LedgerError::ToolFailed {
            tool: tool.into(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Page count as reported by `pdfinfo`.
fn pdfinfo_pages(path: &Path) -> Result<usize, LedgerError> {
    let output = run_tool("pdfinfo", Command::new("pdfinfo").arg(path))?;
    let info = String::from_utf8_lossy(&output.stdout);
    parse_pdfinfo_pages(&info)
        .ok_or_else(|| LedgerError::Extraction("pdfinfo reported no page count".into()))
}

fn parse_pdfinfo_pages(info: &str) -> Option<usize> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// `pdftotext -layout` from poppler-utils.
#[derive(Debug, Default, Clone, Copy)]
pub struct LayoutExtractor;

impl LayoutExtractor {
    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl PdfTextSource for LayoutExtractor {
    fn name(&self) -> &str {
        "pdftotext"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Layout
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, LedgerError> {
        let output = run_tool(
            "pdftotext",
            Command::new("pdftotext").arg("-layout").arg(path).arg("-"),
        )?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(split_form_feeds(&text))
    }

    fn page_count(&self, path: &Path) -> Result<usize, LedgerError> {
        pdfinfo_pages(path)
    }
}

/// pdftotext separates pages with a form feed and ends the last one with one too.
fn split_form_feeds(text: &str) -> Vec<PageContent> {
    text.split('\x0c')
        .enumerate()
        .map(|(i, page)| PageContent::new(i + 1, page))
        .filter(|p| !p.lines.is_empty() || p.page_number == 1)
        .collect()
}

/// Text drawn by the content streams, read with lopdf. No layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainExtractor;

impl PlainExtractor {
    fn load(path: &Path) -> Result<lopdf::Document, LedgerError> {
        lopdf::Document::load(path).map_err(|e| LedgerError::Extraction(format!("lopdf: {e}")))
    }
}

impl PdfTextSource for PlainExtractor {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Plain
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, LedgerError> {
        let document = Self::load(path)?;
        let mut pages = Vec::new();
        for (index, page_number) in document.get_pages().into_keys().enumerate() {
            match document.extract_text(&[page_number]) {
                Ok(text) => pages.push(PageContent::new(index + 1, &text)),
                Err(e) => {
                    tracing::debug!(
                        page = page_number,
                        error = %e,
                        "lopdf could not read page text"
                    );
                }
            }
        }
        Ok(pages)
    }

    fn page_count(&self, path: &Path) -> Result<usize, LedgerError> {
        Ok(Self::load(path)?.get_pages().len())
    }
}

/// Rasterize each page with `pdftoppm` and recognize it with `tesseract`.
#[derive(Debug, Clone)]
pub struct OcrExtractor {
    language: String,
    dpi: u32,
}

impl OcrExtractor {
    pub fn new(language: impl Into<String>, dpi: u32) -> Self {
        OcrExtractor {
            language: language.into(),
            dpi,
        }
    }

    fn recognize_page(&self, path: &Path, page_number: usize) -> Result<String, LedgerError> {
        // The image lives only as long as this directory, which is removed on every return.
        let workdir = tempfile::tempdir()?;
        let stem = workdir.path().join("page");
        let page = page_number.to_string();
        let dpi = self.dpi.to_string();
        run_tool(
            "pdftoppm",
            Command::new("pdftoppm")
                .arg("-png")
                .arg("-singlefile")
                .args(["-r", dpi.as_str()])
                .args(["-f", page.as_str(), "-l", page.as_str()])
                .arg(path)
                .arg(&stem),
        )?;

        let image = stem.with_extension("png");
        let output = run_tool(
            "tesseract",
            Command::new("tesseract")
                .arg(&image)
                .arg("stdout")
                .args(["-l", self.language.as_str()]),
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PdfTextSource for OcrExtractor {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<PageContent>, LedgerError> {
        let count = self.page_count(path)?;
        let mut pages = Vec::with_capacity(count);
        for page_number in 1..=count {
            let text = self.recognize_page(path, page_number)?;
            if !text.trim().is_empty() {
                pages.push(PageContent::new(page_number, &text));
            }
        }
        Ok(pages)
    }

    fn page_count(&self, path: &Path) -> Result<usize, LedgerError> {
        pdfinfo_pages(path)
    }
}
