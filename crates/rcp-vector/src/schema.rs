//! Arrow schema and record-batch conversion for the chunk vector table.

use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use rcp_common::error::RcpError;
use std::collections::HashMap;
use std::sync::Arc;

/// Schema metadata keys carrying the collection's bound model ids (§3, §4.6:
/// "the embedding model used at query time MUST be the one bound to the
/// target collection").
pub const EMBEDDING_MODEL_KEY: &str = "rcp.embedding_model_id";
pub const RERANKER_MODEL_KEY: &str = "rcp.reranker_model_id";

/// One chunk's vector-store record: its embedding plus the citation metadata
/// and text the hybrid retriever needs at rerank time (the vector store is
/// the authoritative source of chunk `text`, per the adopted design note).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub source_id: String,
    pub section_number: String,
    pub section_title: String,
    pub chunk_index: i64,
}

pub fn chunk_schema(dim: usize) -> Arc<Schema> {
    chunk_schema_with_models(dim, "", "")
}

/// Same as [`chunk_schema`], but stamping the collection's bound model ids
/// into the schema metadata so a later `open_table` can validate them.
pub fn chunk_schema_with_models(dim: usize, embedding_model_id: &str, reranker_model_id: &str) -> Arc<Schema> {
    let fields = vec![
        Field::new("chunk_id", DataType::Utf8, false),
        Field::new("source_id", DataType::Utf8, false),
        Field::new("section_number", DataType::Utf8, false),
        Field::new("section_title", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int64, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), dim as i32),
            false,
        ),
    ];
    let metadata = HashMap::from([
        (EMBEDDING_MODEL_KEY.to_string(), embedding_model_id.to_string()),
        (RERANKER_MODEL_KEY.to_string(), reranker_model_id.to_string()),
    ]);
    Arc::new(Schema::new(fields).with_metadata(metadata))
}

fn arrow_err(e: arrow_schema::ArrowError) -> RcpError {
    RcpError::Internal(format!("arrow error: {e}"))
}

pub fn records_to_batch(records: &[VectorRecord], dim: usize) -> Result<RecordBatch, RcpError> {
    let schema = chunk_schema(dim);

    let chunk_id = StringArray::from(records.iter().map(|r| r.chunk_id.as_str()).collect::<Vec<_>>());
    let source_id = StringArray::from(records.iter().map(|r| r.source_id.as_str()).collect::<Vec<_>>());
    let section_number =
        StringArray::from(records.iter().map(|r| r.section_number.as_str()).collect::<Vec<_>>());
    let section_title =
        StringArray::from(records.iter().map(|r| r.section_title.as_str()).collect::<Vec<_>>());
    let chunk_index = Int64Array::from(records.iter().map(|r| r.chunk_index).collect::<Vec<_>>());
    let text = StringArray::from(records.iter().map(|r| r.text.as_str()).collect::<Vec<_>>());

    let flat: Vec<f32> = records.iter().flat_map(|r| r.vector.iter().copied()).collect();
    let values = Float32Array::from(flat);
    let vector = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, false)),
        dim as i32,
        Arc::new(values),
        None,
    )
    .map_err(arrow_err)?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(chunk_id) as Arc<dyn Array>,
            Arc::new(source_id),
            Arc::new(section_number),
            Arc::new(section_title),
            Arc::new(chunk_index),
            Arc::new(text),
            Arc::new(vector),
        ],
    )
    .map_err(arrow_err)
}

pub fn row_to_record(batch: &RecordBatch, row: usize) -> VectorRecord {
    let get_str = |col: usize| -> String {
        batch
            .column(col)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("string column")
            .value(row)
            .to_string()
    };
    let get_i64 = |col: usize| -> i64 {
        batch
            .column(col)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("int64 column")
            .value(row)
    };
    VectorRecord {
        chunk_id: get_str(0),
        source_id: get_str(1),
        section_number: get_str(2),
        section_title: get_str(3),
        chunk_index: get_i64(4),
        text: get_str(5),
        vector: Vec::new(),
    }
}
