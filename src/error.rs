//! Error taxonomy for the ingestion pipeline and retrieval engine.
//!
//! Each pipeline stage has its own error enum so the coordinator can
//! pattern-match on the failing stage. Extraction and chunking errors are
//! terminal for a run; embedding errors are retried inside the client and
//! only surface here once retries are exhausted.

use thiserror::Error;

/// Source content could not be turned into text segments.
///
/// Never retried: extraction is deterministic for identical input, so a
/// corrupt or mismatched source fails the run outright.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("source bytes unavailable: {0}")]
    Source(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("CSV parsing failed: {0}")]
    Csv(String),
    #[error("XLSX extraction failed: {0}")]
    Xlsx(String),
    #[error("HTML extraction failed: {0}")]
    Html(String),
    #[error("document produced no extractable content")]
    Empty,
}

/// Chunker configuration or invariant violation.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("chunk window must be greater than zero")]
    ZeroWindow,
    #[error("chunk overlap {overlap} must be smaller than window {window}")]
    OverlapTooLarge { window: usize, overlap: usize },
}

/// Embedding provider failure.
///
/// `Transport` and `Provider` are transient and consumed by the retry loop;
/// `Exhausted` is what callers see after the last attempt. `Dimensions` is a
/// deployment configuration error and is never retried.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider request failed: {0}")]
    Transport(String),
    #[error("embedding provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("embedding response missing vector")]
    MalformedResponse,
    #[error("embedding has {got} dimensions, expected {expected}")]
    Dimensions { expected: usize, got: usize },
    #[error("embedding failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Storage failure (document/chunk persistence or blob access).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document not found: {0}")]
    MissingDocument(String),
    #[error("blob store error: {0}")]
    Blob(String),
    #[error("stored record is malformed: {0}")]
    Corrupt(String),
}

/// Any terminal pipeline failure, captured at the coordinator boundary and
/// recorded as the document's error detail.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Retrieval failure: either the query embedding or the chunk read failed.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
