use anyhow::{bail, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ROW_ID_COLUMN: &str = "row_id";
pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

/// Layout of a chunk index table: metadata position plus embedding.
pub fn build_index_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ROW_ID_COLUMN, DataType::Int64, false),
		Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// One record batch holding `vectors`, each tagged with its metadata position.
pub fn index_batch(row_ids: &[i64], vectors: &[Vec<f32>]) -> Result<RecordBatch> {
	if row_ids.len() != vectors.len() {
		bail!("{} row ids for {} vectors", row_ids.len(), vectors.len());
	}
	let dim = vectors.first().map_or(0, Vec::len);
	if vectors.iter().any(|v| v.len() != dim) {
		bail!("vectors must share one dimension");
	}
	let dim = i32::try_from(dim)?;
	let lists = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	let batch = RecordBatch::try_new(build_index_schema(dim), vec![
		Arc::new(Int64Array::from(row_ids.to_vec())),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(lists, dim)),
	])?;
	Ok(batch)
}
