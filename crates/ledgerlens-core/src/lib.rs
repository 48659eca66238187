pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod patterns;
pub mod taxonomy;

use backend::Dispatcher;
use config::ParserConfig;
use model::{DocumentHint, ParsingResult};
use std::path::Path;

pub use backend::DocumentParser;
pub use error::LedgerError;

/// Main API entry point: parse one financial document with the built-in back-ends.
///
/// The back-end is chosen by file extension, falling back to the leading bytes.
/// Never fails: every problem is reported in the returned result's `errors`.
pub fn parse_document(
    path: &Path,
    hint: Option<&DocumentHint>,
    config: &ParserConfig,
) -> ParsingResult {
    Dispatcher::new(config).parse(path, hint)
}
