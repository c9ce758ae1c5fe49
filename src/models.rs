//! Core data models for the ingestion pipeline and retrieval engine.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the system. Documents move through a small status machine
//! (PROCESSING → READY | ERROR) driven by the ingestion coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared format of an admitted document, fixed at admission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Csv,
    Xlsx,
    Website,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Csv => "csv",
            DocumentKind::Xlsx => "xlsx",
            DocumentKind::Website => "website",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(DocumentKind::Pdf),
            "csv" => Ok(DocumentKind::Csv),
            "xlsx" => Ok(DocumentKind::Xlsx),
            "website" => Ok(DocumentKind::Website),
            other => Err(format!("unknown document kind: {other}")),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a document is meant to be queried. Structured documents share the
/// same status model but no SQL execution path exists in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Semantic,
    Structured,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Semantic => "semantic",
            RetrievalMode::Structured => "structured",
        }
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(RetrievalMode::Semantic),
            "structured" => Ok(RetrievalMode::Structured),
            other => Err(format!("unknown retrieval mode: {other}")),
        }
    }
}

/// Lifecycle status of a document.
///
/// A pipeline run moves a document from `Processing` to exactly one of
/// `Ready` or `Error`; a reprocess request resets it to `Processing` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    /// Wire representation, as exposed to external consumers.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "PROCESSING",
            DocumentStatus::Ready => "READY",
            DocumentStatus::Error => "ERROR",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(DocumentStatus::Processing),
            "READY" => Ok(DocumentStatus::Ready),
            "ERROR" => Ok(DocumentStatus::Error),
            other => Err(format!("unknown document status: {other}")),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One admitted file or URL.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Original filename, or the URL for websites. Used in citations.
    pub name: String,
    pub kind: DocumentKind,
    pub mode: RetrievalMode,
    pub status: DocumentStatus,
    /// Human-readable failure detail, present only when status is `Error`.
    pub error_detail: Option<String>,
    pub description: Option<String>,
    /// Opaque reference into the blob store holding the raw source bytes.
    pub source_ref: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Human-meaningful position of a chunk within its source document,
/// attached for citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// 1-based page number of a PDF.
    Page { page: u32 },
    /// 1-based data row of a CSV.
    Row { row: u64 },
    /// Sheet name plus 1-based row within that sheet.
    SheetRow { sheet: String, row: u64 },
    /// 0-based section index within a scraped web page.
    Section { section: u32 },
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Page { page } => write!(f, "page {page}"),
            Locator::Row { row } => write!(f, "row {row}"),
            Locator::SheetRow { sheet, row } => write!(f, "sheet '{sheet}', row {row}"),
            Locator::Section { section } => write!(f, "section {section}"),
        }
    }
}

/// Format-specific metadata, exactly one record per document, replaced
/// wholesale on reprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocumentDetails {
    Pdf {
        page_count: u32,
        title: Option<String>,
        author: Option<String>,
    },
    Csv {
        row_count: u64,
        column_count: u32,
    },
    Xlsx {
        sheet_count: u32,
        row_count: u64,
        column_count: u32,
    },
    Website {
        url: String,
        domain: String,
        title: Option<String>,
    },
}

/// A chunk before embedding: ordinal, locator, and text only.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub ordinal: i64,
    pub locator: Locator,
    pub text: String,
}

/// A fully embedded, persisted retrieval fragment.
///
/// Ordinals for a document's chunk set are contiguous from 0 with no gaps
/// or duplicates; the store enforces uniqueness per document.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub ordinal: i64,
    pub locator: Locator,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: i64,
}

/// A retrieval hit returned to the chat collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub document_name: String,
    pub ordinal: i64,
    pub locator: Locator,
    pub text: String,
    pub score: f64,
}
