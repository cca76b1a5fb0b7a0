//! C5: wrapper over an embedded LanceDB connection realizing the vector
//! store contract from the core spec (deterministic `chunk_id` primary key,
//! batched upserts, cosine/IP similarity on normalized vectors, dimension
//! validation on open).

use crate::schema::{
    chunk_schema_with_models, records_to_batch, row_to_record, VectorRecord, EMBEDDING_MODEL_KEY, RERANKER_MODEL_KEY,
};
use arrow_array::RecordBatchIterator;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use rcp_common::error::RcpError;
use std::path::Path;
use std::sync::Arc;

/// Default upsert batch size, amortizing network/IO round-trips (§4.5).
pub const DEFAULT_BATCH_SIZE: usize = 500;

fn lance_err(e: lancedb::Error) -> RcpError {
    RcpError::ExternalUnavailable(format!("vector store error: {e}"))
}

/// A scored hit returned from a similarity query, paired with the chunk
/// metadata/text stored alongside the embedding.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub score: f32,
    pub text: String,
    pub source_id: String,
    pub section_number: String,
    pub section_title: String,
    pub chunk_index: i64,
}

/// Top-level connection to the embedded vector store, one LanceDB database
/// per data directory, one table per named collection.
#[derive(Clone)]
pub struct VectorStore {
    conn: Connection,
}

impl VectorStore {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, RcpError> {
        let path = data_dir.as_ref();
        if !path.exists() {
            std::fs::create_dir_all(path)
                .map_err(|e| RcpError::ExternalUnavailable(format!("creating vector data dir: {e}")))?;
        }
        let conn = lancedb::connect(&path.to_string_lossy())
            .execute()
            .await
            .map_err(lance_err)?;
        Ok(Self { conn })
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, RcpError> {
        self.conn.table_names().execute().await.map_err(lance_err)
    }

    pub async fn delete_collection(&self, name: &str) -> Result<(), RcpError> {
        self.conn.drop_table(name).await.map_err(lance_err)
    }

    /// Opens (creating if absent) the named collection, validating that its
    /// embedding dimension matches `dim` when it already exists — a
    /// mismatch is a fatal configuration error, per §4.5. Also validates
    /// (and, on first creation, stamps) the collection's bound
    /// `embedding_model_id`/`reranker_model_id` (§3, §4.6): a collection
    /// refuses to open against a caller bound to a different model id.
    pub async fn collection(
        &self,
        name: &str,
        dim: usize,
        embedding_model_id: &str,
        reranker_model_id: &str,
    ) -> Result<VectorCollection, RcpError> {
        let existing = self.conn.table_names().execute().await.map_err(lance_err)?;
        let table = if existing.iter().any(|t| t == name) {
            let table = self.conn.open_table(name).execute().await.map_err(lance_err)?;
            let schema = table.schema().await.map_err(lance_err)?;
            let field = schema
                .field_with_name("vector")
                .map_err(|_| RcpError::ConfigError(format!("collection {name} has no vector column")))?;
            if let arrow_schema::DataType::FixedSizeList(_, list_dim) = field.data_type() {
                if *list_dim as usize != dim {
                    return Err(RcpError::ConfigError(format!(
                        "collection {name} embedding dimension mismatch: expected {dim}, found {list_dim}"
                    )));
                }
            }
            let bound_embedding = schema.metadata.get(EMBEDDING_MODEL_KEY).map(String::as_str).unwrap_or("");
            if !bound_embedding.is_empty() && bound_embedding != embedding_model_id {
                return Err(RcpError::ConfigError(format!(
                    "collection {name} is bound to embedding model '{bound_embedding}', refusing to query with '{embedding_model_id}'"
                )));
            }
            let bound_reranker = schema.metadata.get(RERANKER_MODEL_KEY).map(String::as_str).unwrap_or("");
            if !bound_reranker.is_empty() && !reranker_model_id.is_empty() && bound_reranker != reranker_model_id {
                return Err(RcpError::ConfigError(format!(
                    "collection {name} is bound to reranker model '{bound_reranker}', refusing to query with '{reranker_model_id}'"
                )));
            }
            table
        } else {
            let schema = chunk_schema_with_models(dim, embedding_model_id, reranker_model_id);
            let empty = RecordBatchIterator::new(Vec::<Result<_, arrow_schema::ArrowError>>::new(), schema);
            self.conn
                .create_table(name, Box::new(empty))
                .execute()
                .await
                .map_err(lance_err)?
        };
        Ok(VectorCollection {
            table,
            conn: self.conn.clone(),
            name: name.to_string(),
            dim,
            embedding_model_id: embedding_model_id.to_string(),
            reranker_model_id: reranker_model_id.to_string(),
        })
    }
}

pub struct VectorCollection {
    table: lancedb::Table,
    conn: Connection,
    name: String,
    dim: usize,
    embedding_model_id: String,
    reranker_model_id: String,
}

impl VectorCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embedding_model_id(&self) -> &str {
        &self.embedding_model_id
    }

    pub fn reranker_model_id(&self) -> &str {
        &self.reranker_model_id
    }

    async fn reopen(&self) -> Result<lancedb::Table, RcpError> {
        self.conn.open_table(&self.name).execute().await.map_err(lance_err)
    }

    /// Upserts `records` in chunks of `batch_size`. LanceDB has no native
    /// upsert, so each batch is applied as delete-by-id-then-insert, the
    /// same pattern used for single-row embedding updates elsewhere in this
    /// stack.
    pub async fn upsert_batch(&self, records: &[VectorRecord], batch_size: usize) -> Result<(), RcpError> {
        if records.is_empty() {
            return Ok(());
        }
        let batch_size = batch_size.max(1);
        for chunk in records.chunks(batch_size) {
            let ids: Vec<String> = chunk.iter().map(|r| format!("'{}'", escape(&r.chunk_id))).collect();
            let table = self.reopen().await?;
            table
                .delete(&format!("chunk_id IN ({})", ids.join(",")))
                .await
                .map_err(lance_err)?;

            let batch = records_to_batch(chunk, self.dim)?;
            let schema = batch.schema();
            let iter = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table.add(iter).execute().await.map_err(lance_err)?;
        }
        Ok(())
    }

    pub async fn exists(&self, chunk_id: &str) -> Result<bool, RcpError> {
        let table = self.reopen().await?;
        let mut stream = table
            .query()
            .only_if(format!("chunk_id = '{}'", escape(chunk_id)))
            .limit(1)
            .execute()
            .await
            .map_err(lance_err)?;
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(lance_err)?;
            if batch.num_rows() > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fetches stored text/metadata for a set of ids without a similarity
    /// search, used to hydrate BM25-only candidates before reranking (the
    /// vector index is the authoritative store for chunk text, §4.8).
    /// `score` on the returned rows is always `0.0` and should be ignored.
    pub async fn get_by_ids(&self, chunk_ids: &[String]) -> Result<Vec<ScoredChunk>, RcpError> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.reopen().await?;
        let ids: Vec<String> = chunk_ids.iter().map(|id| format!("'{}'", escape(id))).collect();
        let mut stream = table
            .query()
            .only_if(format!("chunk_id IN ({})", ids.join(",")))
            .execute()
            .await
            .map_err(lance_err)?;

        let mut out = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(lance_err)?;
            for row in 0..batch.num_rows() {
                let rec = row_to_record(&batch, row);
                out.push(ScoredChunk {
                    chunk_id: rec.chunk_id,
                    score: 0.0,
                    text: rec.text,
                    source_id: rec.source_id,
                    section_number: rec.section_number,
                    section_title: rec.section_title,
                    chunk_index: rec.chunk_index,
                });
            }
        }
        Ok(out)
    }

    /// Whether any chunk from `source_id` is already present, used by the
    /// indexing pipeline's resume-safety check (§4.9 step 2).
    pub async fn source_exists(&self, source_id: &str) -> Result<bool, RcpError> {
        let table = self.reopen().await?;
        let mut stream = table
            .query()
            .only_if(format!("source_id = '{}'", escape(source_id)))
            .limit(1)
            .execute()
            .await
            .map_err(lance_err)?;
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(lance_err)?;
            if batch.num_rows() > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn delete(&self, chunk_id: &str) -> Result<(), RcpError> {
        let table = self.reopen().await?;
        table
            .delete(&format!("chunk_id = '{}'", escape(chunk_id)))
            .await
            .map_err(lance_err)
    }

    pub async fn count(&self) -> Result<usize, RcpError> {
        let table = self.reopen().await?;
        table.count_rows(None).await.map_err(lance_err)
    }

    /// Cosine-similarity query. Vectors are expected to be L2-normalized by
    /// the embedding service when the collection normalizes, making
    /// LanceDB's default distance usable directly as a similarity proxy
    /// (smaller distance == larger similarity; this wrapper inverts it to a
    /// `[-1, 1]`-ish similarity score by `1.0 - distance`).
    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, RcpError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let table = self.reopen().await?;
        let mut stream = table
            .vector_search(vector.to_vec())
            .map_err(lance_err)?
            .limit(top_k)
            .execute()
            .await
            .map_err(lance_err)?;

        let mut out = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(lance_err)?;
            let distance_col = batch.column_by_name("_distance");
            for row in 0..batch.num_rows() {
                let rec = row_to_record(&batch, row);
                let distance = distance_col
                    .and_then(|c| c.as_any().downcast_ref::<arrow_array::Float32Array>())
                    .map(|a| a.value(row))
                    .unwrap_or(0.0);
                out.push(ScoredChunk {
                    chunk_id: rec.chunk_id,
                    score: 1.0 - distance,
                    text: rec.text,
                    source_id: rec.source_id,
                    section_number: rec.section_number,
                    section_title: rec.section_title,
                    chunk_index: rec.chunk_index,
                });
            }
        }
        Ok(out)
    }
}

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_doubles_single_quotes() {
        assert_eq!(escape("o'brien"), "o''brien");
    }
}
