//! In-memory [`ChunkStore`] implementation for tests.
//!
//! All state lives in one `RwLock`-guarded map, so `replace_chunks` is
//! trivially atomic to readers.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Chunk, Document, DocumentDetails, DocumentStatus};

use super::{ChunkStore, ReadyChunk};

struct StoredDoc {
    doc: Document,
    details: Option<DocumentDetails>,
    chunks: Vec<Chunk>,
}

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, StoredDoc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<(), StoreError> {
        let mut docs = self.docs.write().unwrap();
        docs.insert(
            doc.id.clone(),
            StoredDoc {
                doc: doc.clone(),
                details: None,
                chunks: Vec::new(),
            },
        );
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(id).map(|s| s.doc.clone()))
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let docs = self.docs.read().unwrap();
        let mut all: Vec<Document> = docs.values().map(|s| s.doc.clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        error_detail: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut docs = self.docs.write().unwrap();
        let stored = docs
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingDocument(id.to_string()))?;
        stored.doc.status = status;
        stored.doc.error_detail = error_detail.map(|s| s.to_string());
        stored.doc.updated_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    async fn get_details(&self, id: &str) -> Result<Option<DocumentDetails>, StoreError> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(id).and_then(|s| s.details.clone()))
    }

    async fn replace_chunks(
        &self,
        document_id: &str,
        details: &DocumentDetails,
        chunks: &[Chunk],
    ) -> Result<(), StoreError> {
        let mut docs = self.docs.write().unwrap();
        let stored = docs
            .get_mut(document_id)
            .ok_or_else(|| StoreError::MissingDocument(document_id.to_string()))?;
        stored.details = Some(details.clone());
        stored.chunks = chunks.to_vec();
        Ok(())
    }

    async fn chunks_for(&self, document_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let docs = self.docs.read().unwrap();
        let mut chunks = docs
            .get(document_id)
            .map(|s| s.chunks.clone())
            .unwrap_or_default();
        chunks.sort_by_key(|c| c.ordinal);
        Ok(chunks)
    }

    async fn ready_chunks(
        &self,
        allowed: Option<&[String]>,
    ) -> Result<Vec<ReadyChunk>, StoreError> {
        let docs = self.docs.read().unwrap();
        let mut out: Vec<ReadyChunk> = docs
            .values()
            .filter(|s| s.doc.status == DocumentStatus::Ready)
            .filter(|s| {
                allowed
                    .map(|ids| ids.iter().any(|id| *id == s.doc.id))
                    .unwrap_or(true)
            })
            .flat_map(|s| {
                s.chunks.iter().map(|c| ReadyChunk {
                    chunk: c.clone(),
                    document_name: s.doc.name.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| {
            a.chunk
                .document_id
                .cmp(&b.chunk.document_id)
                .then(a.chunk.ordinal.cmp(&b.chunk.ordinal))
        });
        Ok(out)
    }

    async fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        let mut docs = self.docs.write().unwrap();
        docs.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, Locator, RetrievalMode};

    fn doc(id: &str, status: DocumentStatus) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{id}.pdf"),
            kind: DocumentKind::Pdf,
            mode: RetrievalMode::Semantic,
            status,
            error_detail: None,
            description: None,
            source_ref: format!("blob-{id}"),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn chunk(doc_id: &str, ordinal: i64) -> Chunk {
        Chunk {
            id: format!("{doc_id}-{ordinal}"),
            document_id: doc_id.to_string(),
            ordinal,
            locator: Locator::Page {
                page: ordinal as u32 + 1,
            },
            text: format!("chunk {ordinal}"),
            embedding: vec![0.0, 1.0],
            created_at: 0,
        }
    }

    fn details() -> DocumentDetails {
        DocumentDetails::Pdf {
            page_count: 2,
            title: None,
            author: None,
        }
    }

    #[tokio::test]
    async fn replace_swaps_the_whole_chunk_set() {
        let store = MemoryStore::new();
        store
            .insert_document(&doc("d1", DocumentStatus::Processing))
            .await
            .unwrap();

        store
            .replace_chunks(
                "d1",
                &details(),
                &[chunk("d1", 0), chunk("d1", 1), chunk("d1", 2)],
            )
            .await
            .unwrap();
        store
            .replace_chunks("d1", &details(), &[chunk("d1", 0), chunk("d1", 1)])
            .await
            .unwrap();

        let chunks = store.chunks_for("d1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[1].ordinal, 1);
    }

    #[tokio::test]
    async fn ready_chunks_exclude_non_ready_documents() {
        let store = MemoryStore::new();
        store
            .insert_document(&doc("a", DocumentStatus::Processing))
            .await
            .unwrap();
        store
            .insert_document(&doc("b", DocumentStatus::Processing))
            .await
            .unwrap();
        store
            .replace_chunks("a", &details(), &[chunk("a", 0)])
            .await
            .unwrap();
        store
            .replace_chunks("b", &details(), &[chunk("b", 0)])
            .await
            .unwrap();
        store
            .set_status("a", DocumentStatus::Ready, None)
            .await
            .unwrap();

        let ready = store.ready_chunks(None).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].chunk.document_id, "a");
    }

    #[tokio::test]
    async fn allowed_filter_only_narrows() {
        let store = MemoryStore::new();
        for id in ["a", "b"] {
            store
                .insert_document(&doc(id, DocumentStatus::Processing))
                .await
                .unwrap();
            store
                .replace_chunks(id, &details(), &[chunk(id, 0)])
                .await
                .unwrap();
            store
                .set_status(id, DocumentStatus::Ready, None)
                .await
                .unwrap();
        }

        let narrowed = store
            .ready_chunks(Some(&["b".to_string()]))
            .await
            .unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].chunk.document_id, "b");

        // An allowed id that is not READY stays excluded.
        store
            .set_status("b", DocumentStatus::Processing, None)
            .await
            .unwrap();
        let none = store
            .ready_chunks(Some(&["b".to_string()]))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn delete_cascades_chunks_and_details() {
        let store = MemoryStore::new();
        store
            .insert_document(&doc("d1", DocumentStatus::Processing))
            .await
            .unwrap();
        store
            .replace_chunks("d1", &details(), &[chunk("d1", 0)])
            .await
            .unwrap();
        store.delete_document("d1").await.unwrap();

        assert!(store.get_document("d1").await.unwrap().is_none());
        assert!(store.chunks_for("d1").await.unwrap().is_empty());
        assert!(store.get_details("d1").await.unwrap().is_none());
    }
}
