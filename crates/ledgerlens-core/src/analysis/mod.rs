pub mod chunk;
pub mod classify;
pub mod figures;
pub mod scale;
pub mod tables;

use crate::config::ParserConfig;
use crate::model::{apply_scale, BalanceSheetItems, DocumentChunk, ScaleHint};
use crate::patterns::{library, PatternLibrary};
use chunk::Chunker;
use classify::CategoryClassifier;
use figures::FigureExtractor;
use scale::DocumentStructure;
use tables::TableDetector;
use uuid::Uuid;

/// The shared text services every back-end composes.
///
/// Holds only read-only state, so one instance can serve any number of parses.
#[derive(Clone)]
pub struct Analyzer {
    pub patterns: &'static PatternLibrary,
    pub figures: FigureExtractor,
    pub classifier: CategoryClassifier,
    pub tables: TableDetector,
    pub chunker: Chunker,
    line_item_window: usize,
}

impl Analyzer {
    pub fn new(config: &ParserConfig) -> Self {
        let patterns = library();
        let figures =
            FigureExtractor::new(patterns, config.context_window, &config.default_currency);
        let classifier = CategoryClassifier::new(patterns);
        Analyzer {
            patterns,
            tables: TableDetector::new(patterns, figures.clone(), classifier),
            figures,
            classifier,
            chunker: Chunker::new(config.chunk_size, config.chunk_overlap),
            line_item_window: config.line_item_window,
        }
    }

    pub fn detect_scale(&self, text: &str) -> ScaleHint {
        scale::detect_scale(self.patterns, text)
    }

    pub fn extract_dates(&self, text: &str) -> Vec<String> {
        scale::extract_dates(self.patterns, text)
    }

    pub fn detect_statements(&self, text: &str) -> DocumentStructure {
        scale::detect_statements(self.patterns, text)
    }

    /// Free-text line items with the document scale applied to their figures.
    pub fn scan_line_items(&self, text: &str, scale: ScaleHint) -> BalanceSheetItems {
        let mut items = self
            .classifier
            .scan_line_items(text, &self.figures, self.line_item_window);
        for item in items
            .assets
            .iter_mut()
            .chain(items.liabilities.iter_mut())
            .chain(items.equity.iter_mut())
        {
            apply_scale(&mut item.figures, scale);
        }
        items
    }
}

/// Numbers chunks consecutively across every call for one document.
pub struct ChunkBuilder<'a> {
    analyzer: &'a Analyzer,
    document_id: Uuid,
    chunks: Vec<DocumentChunk>,
}

impl<'a> ChunkBuilder<'a> {
    pub fn new(analyzer: &'a Analyzer, document_id: Uuid) -> Self {
        ChunkBuilder {
            analyzer,
            document_id,
            chunks: Vec::new(),
        }
    }

    /// Split `text` and append the pieces with their figures.
    pub fn push_text(
        &mut self,
        text: &str,
        section_type: Option<&str>,
        page_number: Option<usize>,
        scale: ScaleHint,
    ) {
        for piece in self.analyzer.chunker.split(text) {
            let mut financial_figures = self.analyzer.figures.extract(&piece);
            apply_scale(&mut financial_figures, scale);
            self.chunks.push(DocumentChunk {
                document_id: self.document_id,
                chunk_index: self.chunks.len(),
                text: piece,
                page_number,
                section_type: section_type.map(str::to_string),
                financial_figures,
            });
        }
    }

    pub fn finish(self) -> Vec<DocumentChunk> {
        self.chunks
    }
}
