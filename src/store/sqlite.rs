//! SQLite-backed [`ChunkStore`] implementation.
//!
//! `replace_chunks` runs inside one transaction so readers either see the
//! old chunk set or the complete new one. Cascade deletion of chunks and
//! the details record rides on `ON DELETE CASCADE` foreign keys (the pool
//! enables the `foreign_keys` pragma).

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::StoreError;
use crate::models::{Chunk, Document, DocumentDetails, DocumentStatus, Locator};

use super::{ChunkStore, ReadyChunk};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Document, StoreError> {
    let kind: String = row.get("kind");
    let mode: String = row.get("mode");
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        name: row.get("name"),
        kind: kind.parse().map_err(StoreError::Corrupt)?,
        mode: mode.parse().map_err(StoreError::Corrupt)?,
        status: status.parse().map_err(StoreError::Corrupt)?,
        error_detail: row.get("error_detail"),
        description: row.get("description"),
        source_ref: row.get("source_ref"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn chunk_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk, StoreError> {
    let locator_json: String = row.get("locator_json");
    let locator: Locator = serde_json::from_str(&locator_json)
        .map_err(|e| StoreError::Corrupt(format!("chunk locator: {e}")))?;
    let blob: Vec<u8> = row.get("embedding");
    Ok(Chunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        ordinal: row.get("ordinal"),
        locator,
        text: row.get("text"),
        embedding: blob_to_vec(&blob),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, name, kind, mode, status, error_detail,
                                   description, source_ref, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.name)
        .bind(doc.kind.as_str())
        .bind(doc.mode.as_str())
        .bind(doc.status.as_str())
        .bind(&doc.error_detail)
        .bind(&doc.description)
        .bind(&doc.source_ref)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| document_from_row(&r)).transpose()
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query("SELECT * FROM documents ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        error_detail: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE documents SET status = ?, error_detail = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(error_detail)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingDocument(id.to_string()));
        }
        Ok(())
    }

    async fn get_details(&self, id: &str) -> Result<Option<DocumentDetails>, StoreError> {
        let row = sqlx::query("SELECT details_json FROM document_details WHERE document_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            let json: String = r.get("details_json");
            serde_json::from_str(&json)
                .map_err(|e| StoreError::Corrupt(format!("document details: {e}")))
        })
        .transpose()
    }

    async fn replace_chunks(
        &self,
        document_id: &str,
        details: &DocumentDetails,
        chunks: &[Chunk],
    ) -> Result<(), StoreError> {
        let details_json = serde_json::to_string(details)
            .map_err(|e| StoreError::Corrupt(format!("document details: {e}")))?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(StoreError::MissingDocument(document_id.to_string()));
        }

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO document_details (document_id, details_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                details_json = excluded.details_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(document_id)
        .bind(&details_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for chunk in chunks {
            let locator_json = serde_json::to_string(&chunk.locator)
                .map_err(|e| StoreError::Corrupt(format!("chunk locator: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, ordinal, locator_json, text, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.ordinal)
            .bind(&locator_json)
            .bind(&chunk.text)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn chunks_for(&self, document_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chunks WHERE document_id = ? ORDER BY ordinal ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(chunk_from_row).collect()
    }

    async fn ready_chunks(
        &self,
        allowed: Option<&[String]>,
    ) -> Result<Vec<ReadyChunk>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, c.ordinal, c.locator_json, c.text,
                   c.embedding, c.created_at, d.name AS document_name
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.status = 'READY'
            ORDER BY c.document_id ASC, c.ordinal ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk = chunk_from_row(row)?;
            if let Some(ids) = allowed {
                if !ids.iter().any(|id| *id == chunk.document_id) {
                    continue;
                }
            }
            out.push(ReadyChunk {
                chunk,
                document_name: row.get("document_name"),
            });
        }
        Ok(out)
    }

    async fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        // FK cascade removes chunks and the details record.
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
