pub mod extract;

use crate::analysis::{Analyzer, ChunkBuilder};
use crate::backend::{document_id, guarded, DocumentParser};
use crate::config::ParserConfig;
use crate::error::LedgerError;
use crate::model::{apply_scale, DocumentFormat, DocumentHint, ParsingResult};
use extract::{
    ExtractionMethod, LayoutExtractor, OcrExtractor, PageContent, PdfTextSource, PlainExtractor,
};
use std::path::Path;

const OCR_WARNING: &str = "Text extracted using OCR - accuracy may be lower";
const NO_TEXT_ERROR: &str = "Failed to extract text from PDF";

/// PDF back-end. Text comes from the first source in the chain that yields
/// enough characters; tables always come from the layout-preserving source.
pub struct PdfBackend {
    analyzer: Analyzer,
    sources: Vec<Box<dyn PdfTextSource>>,
    min_text_chars: usize,
}

/// Output of one source in the chain.
struct Extraction<'a> {
    source: &'a dyn PdfTextSource,
    pages: Vec<PageContent>,
    chars: usize,
}

impl PdfBackend {
    /// pdftotext, then lopdf, then OCR when enabled.
    pub fn new(analyzer: Analyzer, config: &ParserConfig) -> Self {
        let mut sources: Vec<Box<dyn PdfTextSource>> =
            vec![Box::new(LayoutExtractor), Box::new(PlainExtractor)];
        if config.ocr_enabled {
            sources.push(Box::new(OcrExtractor::new(
                config.ocr_language.clone(),
                config.ocr_dpi,
            )));
        }
        PdfBackend::with_sources(analyzer, sources, config.min_text_chars)
    }

    /// Use a custom, ordered chain of text sources.
    pub fn with_sources(
        analyzer: Analyzer,
        sources: Vec<Box<dyn PdfTextSource>>,
        min_text_chars: usize,
    ) -> Self {
        PdfBackend {
            analyzer,
            sources,
            min_text_chars,
        }
    }

    fn try_parse(
        &self,
        path: &Path,
        hint: Option<&DocumentHint>,
    ) -> Result<ParsingResult, LedgerError> {
        let mut layout: Option<Result<Vec<PageContent>, String>> = None;
        let mut best: Option<Extraction> = None;

        for source in &self.sources {
            let pages = match source.extract_pages(path) {
                Ok(pages) => pages,
                Err(e) => {
                    tracing::warn!(
                        source = source.name(),
                        error = %e,
                        "PDF text extraction failed"
                    );
                    if source.method() == ExtractionMethod::Layout && layout.is_none() {
                        layout = Some(Err(e.to_string()));
                    }
                    continue;
                }
            };
            let chars = text_chars(&pages);
            tracing::debug!(source = source.name(), chars, "PDF text extracted");
            if source.method() == ExtractionMethod::Layout && layout.is_none() {
                layout = Some(Ok(pages.clone()));
            }

            let accepted = chars >= self.min_text_chars;
            if best.as_ref().map_or(true, |b| chars > b.chars) {
                best = Some(Extraction {
                    source: source.as_ref(),
                    pages,
                    chars,
                });
            }
            if accepted {
                break;
            }
        }

        let Some(extraction) = best.filter(|b| b.chars > 0) else {
            tracing::warn!(path = %path.display(), "no PDF text source produced any text");
            return Ok(ParsingResult::failure(NO_TEXT_ERROR));
        };
        let method = extraction.source.method();
        tracing::info!(
            source = extraction.source.name(),
            ?method,
            chars = extraction.chars,
            "PDF extraction method chosen"
        );

        let mut result = ParsingResult::new();
        if extraction.chars < self.min_text_chars {
            result.push_warning(format!(
                "only {} characters of text could be extracted; results may be incomplete",
                extraction.chars
            ));
        }
        if method == ExtractionMethod::Ocr {
            result.push_warning(OCR_WARNING);
        }

        let pages: Vec<PageContent> = extraction.pages.iter().map(clean_page).collect();
        let text = pages
            .iter()
            .filter(|p| !p.lines.is_empty())
            .map(PageContent::text)
            .collect::<Vec<_>>()
            .join("\n");
        let scale = self.analyzer.detect_scale(&text);

        let mut chunks = ChunkBuilder::new(&self.analyzer, document_id(hint));
        for page in &pages {
            chunks.push_text(&page.text(), None, Some(page.page_number), scale);
        }
        result.chunks = chunks.finish();

        match layout {
            Some(Ok(layout_pages)) => {
                for page in &layout_pages {
                    result.tables.extend(self.analyzer.tables.layout_tables(
                        &page.lines,
                        Some(page.page_number),
                        scale,
                    ));
                }
            }
            Some(Err(e)) => result.push_warning(format!("table extraction failed: {e}")),
            None => {}
        }

        result.figures = self.analyzer.figures.extract(&text);
        apply_scale(&mut result.figures, scale);

        result.insert_metadata("page_count", self.page_count(path));
        result.insert_metadata("scale", scale);
        result.insert_metadata("dates", self.analyzer.extract_dates(&text));
        result.insert_metadata("balance_sheet_items", self.analyzer.scan_line_items(&text, scale));
        result.insert_metadata("document_structure", self.analyzer.detect_statements(&text));
        result.insert_metadata("extraction_method", method);
        result.insert_metadata("extraction_source", extraction.source.name());
        result.insert_metadata("text_chars", extraction.chars);

        Ok(result)
    }

    /// From the layout source, then the plain one; 0 when neither can open the file.
    fn page_count(&self, path: &Path) -> usize {
        [ExtractionMethod::Layout, ExtractionMethod::Plain]
            .iter()
            .flat_map(|method| self.sources.iter().filter(move |s| s.method() == *method))
            .find_map(|source| match source.page_count(path) {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::debug!(source = source.name(), error = %e, "page count unavailable");
                    None
                }
            })
            .unwrap_or(0)
    }
}

impl DocumentParser for PdfBackend {
    fn name(&self) -> &str {
        "pdf"
    }

    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Pdf]
    }

    fn parse(&self, path: &Path, hint: Option<&DocumentHint>) -> ParsingResult {
        guarded(self.name(), path, hint, || self.try_parse(path, hint))
    }
}

fn text_chars(pages: &[PageContent]) -> usize {
    pages
        .iter()
        .map(|p| p.text().trim().chars().count())
        .sum()
}

/// Collapse whitespace runs, drop control characters and blank lines.
fn clean_page(page: &PageContent) -> PageContent {
    let lines = page
        .lines
        .iter()
        .map(|line| {
            line.split_whitespace()
                .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect();
    PageContent {
        page_number: page.page_number,
        lines,
    }
}
