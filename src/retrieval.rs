//! Similarity retrieval over embedded chunks.
//!
//! Embeds the query, scores every chunk belonging to a READY document by
//! cosine similarity, and returns the top `k` above the score floor.
//! Ordering is fully deterministic: descending score, then ascending
//! (document id, ordinal). Chunks of PROCESSING or ERROR documents are
//! invisible here by construction: the store only ever hands back
//! READY-scoped chunks.

use std::sync::Arc;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::RetrieveError;
use crate::models::RetrievedChunk;
use crate::store::ChunkStore;

pub struct RetrievalEngine {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Retrieve the `k` most similar READY chunks scoring at least
    /// `min_score`. `allowed` narrows the search to a document subset and
    /// never widens past READY. No match is an empty result, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        min_score: f64,
        allowed: Option<&[String]>,
    ) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(query).await?;
        let candidates = self.store.ready_chunks(allowed).await?;
        tracing::debug!(candidates = candidates.len(), "scoring ready chunks");

        let mut results: Vec<RetrievedChunk> = candidates
            .into_iter()
            .filter_map(|ready| {
                let score = cosine_similarity(&query_vec, &ready.chunk.embedding) as f64;
                if score < min_score {
                    return None;
                }
                Some(RetrievedChunk {
                    document_id: ready.chunk.document_id,
                    document_name: ready.document_name,
                    ordinal: ready.chunk.ordinal,
                    locator: ready.chunk.locator,
                    text: ready.chunk.text,
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document_id.cmp(&b.document_id))
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        results.truncate(k);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;
    use crate::models::{
        Chunk, Document, DocumentDetails, DocumentKind, DocumentStatus, Locator, RetrievalMode,
    };
    use crate::store::memory::MemoryStore;
    use crate::store::ChunkStore;
    use async_trait::async_trait;

    /// Always embeds to the unit x-axis, so a chunk's score equals the
    /// first component of its (normalized) stored vector.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![1.0, 0.0])
        }

        fn dims(&self) -> usize {
            2
        }
    }

    fn doc(id: &str, status: DocumentStatus) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{id}.csv"),
            kind: DocumentKind::Csv,
            mode: RetrievalMode::Semantic,
            status,
            error_detail: None,
            description: None,
            source_ref: format!("blob-{id}"),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn chunk(doc_id: &str, ordinal: i64, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: format!("{doc_id}-{ordinal}"),
            document_id: doc_id.to_string(),
            ordinal,
            locator: Locator::Row {
                row: ordinal as u64 + 1,
            },
            text: format!("{doc_id} row {ordinal}"),
            embedding,
            created_at: 0,
        }
    }

    fn details() -> DocumentDetails {
        DocumentDetails::Csv {
            row_count: 3,
            column_count: 1,
        }
    }

    async fn seed(store: &MemoryStore, id: &str, status: DocumentStatus, chunks: Vec<Chunk>) {
        store.insert_document(&doc(id, status)).await.unwrap();
        store.replace_chunks(id, &details(), &chunks).await.unwrap();
        store.set_status(id, status, None).await.unwrap();
    }

    fn engine(store: Arc<MemoryStore>) -> RetrievalEngine {
        RetrievalEngine::new(store, Arc::new(AxisEmbedder))
    }

    #[tokio::test]
    async fn only_ready_documents_are_searched() {
        let store = Arc::new(MemoryStore::new());
        seed(
            &store,
            "ready",
            DocumentStatus::Ready,
            vec![chunk("ready", 0, vec![1.0, 0.0])],
        )
        .await;
        seed(
            &store,
            "processing",
            DocumentStatus::Processing,
            vec![chunk("processing", 0, vec![1.0, 0.0])],
        )
        .await;

        let results = engine(store)
            .retrieve("query", 10, 0.0, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "ready");
    }

    #[tokio::test]
    async fn results_sorted_by_score_with_deterministic_ties() {
        let store = Arc::new(MemoryStore::new());
        // b scores 1.0; a and c tie at ~0.707, broken by doc id then ordinal.
        seed(
            &store,
            "c",
            DocumentStatus::Ready,
            vec![chunk("c", 0, vec![1.0, 1.0])],
        )
        .await;
        seed(
            &store,
            "a",
            DocumentStatus::Ready,
            vec![
                chunk("a", 1, vec![1.0, 1.0]),
                chunk("a", 0, vec![1.0, 1.0]),
            ],
        )
        .await;
        seed(
            &store,
            "b",
            DocumentStatus::Ready,
            vec![chunk("b", 0, vec![1.0, 0.0])],
        )
        .await;

        let results = engine(store)
            .retrieve("query", 10, 0.0, None)
            .await
            .unwrap();
        let order: Vec<(&str, i64)> = results
            .iter()
            .map(|r| (r.document_id.as_str(), r.ordinal))
            .collect();
        assert_eq!(order, vec![("b", 0), ("a", 0), ("a", 1), ("c", 0)]);
    }

    #[tokio::test]
    async fn min_score_filters_and_empty_is_not_an_error() {
        let store = Arc::new(MemoryStore::new());
        seed(
            &store,
            "d",
            DocumentStatus::Ready,
            vec![chunk("d", 0, vec![0.0, 1.0])], // orthogonal to the query
        )
        .await;

        let results = engine(store)
            .retrieve("query", 5, 0.5, None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn k_caps_the_result_count() {
        let store = Arc::new(MemoryStore::new());
        seed(
            &store,
            "d",
            DocumentStatus::Ready,
            (0..5).map(|i| chunk("d", i, vec![1.0, 0.0])).collect(),
        )
        .await;

        let results = engine(store)
            .retrieve("query", 3, 0.0, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn allowed_subset_narrows_results() {
        let store = Arc::new(MemoryStore::new());
        seed(
            &store,
            "a",
            DocumentStatus::Ready,
            vec![chunk("a", 0, vec![1.0, 0.0])],
        )
        .await;
        seed(
            &store,
            "b",
            DocumentStatus::Ready,
            vec![chunk("b", 0, vec![1.0, 0.0])],
        )
        .await;

        let results = engine(store)
            .retrieve("query", 10, 0.0, Some(&["a".to_string()]))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "a");
    }
}
