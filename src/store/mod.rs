//! Persistence contract for documents and chunks.
//!
//! The [`ChunkStore`] trait defines every storage operation the pipeline
//! and retrieval engine need, enabling pluggable backends (SQLite for
//! production, in-memory for tests). The critical guarantee is
//! [`replace_chunks`](ChunkStore::replace_chunks): it swaps a document's
//! entire chunk set and metadata record atomically: readers never observe
//! a state mid-replace, and a failed replace leaves the prior set intact.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Chunk, Document, DocumentDetails, DocumentStatus};

/// A chunk eligible for retrieval, joined with its document's name for
/// citation rendering.
#[derive(Debug, Clone)]
pub struct ReadyChunk {
    pub chunk: Chunk,
    pub document_name: String,
}

/// Abstract storage backend for documents, details, and chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert a newly admitted document (status `Processing`).
    async fn insert_document(&self, doc: &Document) -> Result<(), StoreError>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError>;

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;

    /// Update a document's status, replacing its error detail (cleared when
    /// `error_detail` is `None`).
    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        error_detail: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn get_details(&self, id: &str) -> Result<Option<DocumentDetails>, StoreError>;

    /// Atomically delete all existing chunks for the document, write the new
    /// set, and replace the metadata record, or fail leaving everything
    /// untouched.
    async fn replace_chunks(
        &self,
        document_id: &str,
        details: &DocumentDetails,
        chunks: &[Chunk],
    ) -> Result<(), StoreError>;

    /// All chunks of one document, ordered by ordinal.
    async fn chunks_for(&self, document_id: &str) -> Result<Vec<Chunk>, StoreError>;

    /// Every chunk belonging to a READY document, ordered by
    /// (document id, ordinal). `allowed` narrows to a caller-supplied
    /// document subset; it never widens past READY.
    async fn ready_chunks(&self, allowed: Option<&[String]>)
        -> Result<Vec<ReadyChunk>, StoreError>;

    /// Delete a document, cascading to its chunks and metadata record.
    async fn delete_document(&self, id: &str) -> Result<(), StoreError>;
}
