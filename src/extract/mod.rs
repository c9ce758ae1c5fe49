//! Format-specific text extraction.
//!
//! Each supported format implements [`ContentExtractor`]: bytes in, an
//! ordered list of `(locator, text)` segments plus the format's metadata
//! record out. The extractor for a document is selected once, from its
//! declared kind, and carried as a typed value; nothing downstream branches
//! on file extensions.
//!
//! Extraction failures are terminal for a pipeline run and are never
//! retried; identical input fails identically.

mod csv;
mod pdf;
mod website;
mod xlsx;

pub use self::csv::CsvExtractor;
pub use self::pdf::PdfExtractor;
pub use self::website::WebsiteExtractor;
pub use self::xlsx::XlsxExtractor;

use crate::error::ExtractError;
use crate::models::{DocumentDetails, DocumentKind, Locator};

/// One extracted fragment of source text, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub locator: Locator,
    pub text: String,
}

/// Everything a single extraction pass produces.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub details: DocumentDetails,
    pub segments: Vec<Segment>,
}

/// Per-format extraction contract.
pub trait ContentExtractor: Send + Sync {
    fn kind(&self) -> DocumentKind;

    /// Extract ordered segments and metadata from raw source bytes.
    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError>;
}

/// Select the extractor for a document's declared kind.
///
/// `source_name` is the document's name; for websites that is the URL the
/// bytes were fetched from, which the extractor needs for its metadata.
pub fn extractor_for(kind: DocumentKind, source_name: &str) -> Box<dyn ContentExtractor> {
    match kind {
        DocumentKind::Pdf => Box::new(PdfExtractor),
        DocumentKind::Csv => Box::new(CsvExtractor),
        DocumentKind::Xlsx => Box::new(XlsxExtractor),
        DocumentKind::Website => Box::new(WebsiteExtractor::new(source_name.to_string())),
    }
}
