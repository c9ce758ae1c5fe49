//! Ingestion pipeline orchestration.
//!
//! [`IngestionCoordinator`] drives each document through
//! extract → chunk → embed → persist and owns the status machine:
//! a run moves the document from PROCESSING to exactly one of READY or
//! ERROR. Every stage error is caught here, recorded as the document's
//! error detail, and never propagated further.
//!
//! Embedding is all-or-nothing per document: every chunk's vector is
//! produced before anything is persisted, so a partial embedding failure
//! leaves no trace of the run and READY always implies fully embedded.
//!
//! Concurrency: distinct documents run in parallel, bounded by a worker
//! semaphore sized to the embedding provider's rate limits. A per-document
//! run lock guarantees at most one active run per document id; a reprocess
//! request that arrives while a run is in flight is rejected as busy rather
//! than interleaved.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::chunk::{chunk_segments, ChunkSettings};
use crate::embedding::Embedder;
use crate::error::{ExtractError, PipelineError, StoreError};
use crate::extract::extractor_for;
use crate::models::{Chunk, Document, DocumentKind, DocumentStatus, RetrievalMode};
use crate::store::ChunkStore;

/// Answer to a reprocess request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReprocessOutcome {
    Accepted,
    /// A run for this document is already in flight; the request was not
    /// queued and must be retried later.
    Busy,
}

struct Inner {
    store: Arc<dyn ChunkStore>,
    blobs: Arc<dyn BlobStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkSettings,
    workers: Semaphore,
    active: Mutex<HashSet<String>>,
}

/// Orchestrates pipeline runs over the shared store.
#[derive(Clone)]
pub struct IngestionCoordinator {
    inner: Arc<Inner>,
}

/// Holds a document's run lock; releasing it on drop keeps the lock
/// balanced on every exit path, including panics inside a run.
struct RunGuard {
    inner: Arc<Inner>,
    id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.inner.active.lock().unwrap().remove(&self.id);
    }
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkSettings,
        workers: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                blobs,
                embedder,
                chunking,
                workers: Semaphore::new(workers.max(1)),
                active: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Admit a new document: store its source bytes, create the record in
    /// PROCESSING, and enqueue a pipeline run. Returns the document id.
    pub async fn admit(
        &self,
        bytes: Vec<u8>,
        name: &str,
        kind: DocumentKind,
        mode: RetrievalMode,
        description: Option<String>,
    ) -> Result<String, StoreError> {
        let source_ref = self.inner.blobs.put(&bytes).await?;
        let now = chrono::Utc::now().timestamp();
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            kind,
            mode,
            status: DocumentStatus::Processing,
            error_detail: None,
            description,
            source_ref,
            created_at: now,
            updated_at: now,
        };
        self.inner.store.insert_document(&doc).await?;
        tracing::info!(document_id = %doc.id, kind = %kind, "document admitted");

        // A freshly minted uuid cannot already hold the run lock.
        if let Some(guard) = self.try_acquire(&doc.id) {
            self.spawn_run(guard);
        }

        Ok(doc.id)
    }

    /// Request a fresh pipeline run for an existing document.
    ///
    /// Rejected with [`ReprocessOutcome::Busy`] when a run for the document
    /// is already in flight; two runs for one document never interleave.
    pub async fn reprocess(&self, id: &str) -> Result<ReprocessOutcome, StoreError> {
        let doc = self
            .inner
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| StoreError::MissingDocument(id.to_string()))?;

        let guard = match self.try_acquire(&doc.id) {
            Some(guard) => guard,
            None => {
                tracing::warn!(document_id = %id, "reprocess rejected, run in flight");
                return Ok(ReprocessOutcome::Busy);
            }
        };

        self.inner
            .store
            .set_status(id, DocumentStatus::Processing, None)
            .await?;
        tracing::info!(document_id = %id, "reprocess accepted");
        self.spawn_run(guard);

        Ok(ReprocessOutcome::Accepted)
    }

    /// Poll until the document's current run has settled into READY or
    /// ERROR. Intended for the CLI and tests; callers wanting a bound wrap
    /// this in a timeout.
    pub async fn wait_for(&self, id: &str) -> Result<DocumentStatus, StoreError> {
        loop {
            let doc = self
                .inner
                .store
                .get_document(id)
                .await?
                .ok_or_else(|| StoreError::MissingDocument(id.to_string()))?;
            let active = self.inner.active.lock().unwrap().contains(id);
            if doc.status != DocumentStatus::Processing && !active {
                return Ok(doc.status);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    fn try_acquire(&self, id: &str) -> Option<RunGuard> {
        let mut active = self.inner.active.lock().unwrap();
        if active.contains(id) {
            return None;
        }
        active.insert(id.to_string());
        Some(RunGuard {
            inner: Arc::clone(&self.inner),
            id: id.to_string(),
        })
    }

    fn spawn_run(&self, guard: RunGuard) {
        let this = self.clone();
        tokio::spawn(async move {
            this.execute(guard).await;
        });
    }

    async fn execute(&self, guard: RunGuard) {
        let id = guard.id.clone();

        let _permit = match self.inner.workers.acquire().await {
            Ok(permit) => permit,
            // The semaphore is never closed while the coordinator lives.
            Err(_) => return,
        };

        match self.run_pipeline(&id).await {
            Ok(chunk_count) => {
                if let Err(err) = self
                    .inner
                    .store
                    .set_status(&id, DocumentStatus::Ready, None)
                    .await
                {
                    tracing::error!(document_id = %id, error = %err, "failed to mark document ready");
                } else {
                    tracing::info!(document_id = %id, chunks = chunk_count, "document ready");
                }
            }
            Err(err) => {
                let detail = err.to_string();
                tracing::error!(document_id = %id, error = %detail, "pipeline run failed");
                if let Err(err) = self
                    .inner
                    .store
                    .set_status(&id, DocumentStatus::Error, Some(&detail))
                    .await
                {
                    tracing::error!(document_id = %id, error = %err, "failed to record pipeline error");
                }
            }
        }

        drop(guard);
    }

    /// The stages of one run, strictly sequential. Nothing is persisted
    /// until every chunk has its embedding.
    async fn run_pipeline(&self, id: &str) -> Result<usize, PipelineError> {
        let doc = self
            .inner
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| StoreError::MissingDocument(id.to_string()))?;

        let bytes = self
            .inner
            .blobs
            .fetch(&doc.source_ref)
            .await
            .map_err(|e| ExtractError::Source(e.to_string()))?;

        let extractor = extractor_for(doc.kind, &doc.name);
        let extraction = extractor.extract(&bytes)?;
        tracing::debug!(
            document_id = %id,
            segments = extraction.segments.len(),
            "extraction complete"
        );

        let drafts = chunk_segments(doc.kind, &extraction.segments, &self.inner.chunking)?;

        let now = chrono::Utc::now().timestamp();
        let mut chunks = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let embedding = self.inner.embedder.embed(&draft.text).await?;
            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: id.to_string(),
                ordinal: draft.ordinal,
                locator: draft.locator,
                text: draft.text,
                embedding,
                created_at: now,
            });
        }

        self.inner
            .store
            .replace_chunks(id, &extraction.details, &chunks)
            .await?;

        Ok(chunks.len())
    }
}
