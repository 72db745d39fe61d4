//! corpus-vector
//!
//! LanceDB-backed nearest-neighbor queries over chunk embeddings. The table
//! carries a `row_id` column with each vector's metadata position; rows are
//! returned in ascending `_distance` under the table's metric.

pub mod schema;

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{Array, Float32Array, Int64Array, RecordBatch};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Table};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};

use corpus_core::traits::{Neighbor, VectorIndex};

use crate::schema::{DISTANCE_COLUMN, ROW_ID_COLUMN};

/// Synchronous handle over one LanceDB table.
///
/// The async client runs on a runtime owned by the handle. Calls made from
/// inside another tokio runtime fail with an error instead of blocking it;
/// async callers go through `spawn_blocking`.
pub struct LanceVectorIndex {
	table: Table,
	// Taken on drop and shut down in the background.
	runtime: Option<Runtime>,
}

/// Blocking on the owned runtime from an async task would panic.
fn ensure_blocking_context(operation: &str) -> Result<()> {
	if Handle::try_current().is_ok() {
		bail!("{operation} called from inside an async runtime; run it via spawn_blocking");
	}
	Ok(())
}

impl LanceVectorIndex {
	pub fn open(path: &Path, table_name: &str) -> Result<Self> {
		ensure_blocking_context("opening the vector index")?;
		let runtime = Runtime::new().context("starting vector index runtime")?;
		let uri = path.to_string_lossy().to_string();
		let table = runtime.block_on(async {
			let db = connect(&uri).execute().await?;
			db.open_table(table_name).execute().await
		}).with_context(|| format!("opening table '{table_name}' at {uri}"))?;
		let rows = runtime.block_on(table.count_rows(None)).unwrap_or_default();
		info!(path = %uri, table = table_name, rows, "opened vector index");
		Ok(Self { table, runtime: Some(runtime) })
	}

	fn runtime(&self) -> Result<&Runtime> {
		self.runtime.as_ref().ok_or_else(|| anyhow!("vector index runtime already shut down"))
	}
}

impl Drop for LanceVectorIndex {
	fn drop(&mut self) {
		if let Some(runtime) = self.runtime.take() {
			runtime.shutdown_background();
		}
	}
}

impl VectorIndex for LanceVectorIndex {
	fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
		if k == 0 {
			return Ok(Vec::new());
		}
		ensure_blocking_context("vector query")?;
		let batches: Vec<RecordBatch> = self.runtime()?.block_on(async {
			let stream = self.table.vector_search(vector.to_vec())?.limit(k).execute().await?;
			stream.try_collect::<Vec<_>>().await
		})?;
		let mut neighbors = Vec::with_capacity(k);
		for batch in &batches {
			read_neighbors(batch, &mut neighbors)?;
		}
		neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		neighbors.truncate(k);
		debug!(k, returned = neighbors.len(), "vector query");
		Ok(neighbors)
	}
}

fn read_neighbors(batch: &RecordBatch, out: &mut Vec<Neighbor>) -> Result<()> {
	let ids = batch
		.column_by_name(ROW_ID_COLUMN)
		.and_then(|c| c.as_any().downcast_ref::<Int64Array>())
		.ok_or_else(|| anyhow!("result batch lacks Int64 column '{ROW_ID_COLUMN}'"))?;
	let distances = batch
		.column_by_name(DISTANCE_COLUMN)
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| anyhow!("result batch lacks Float32 column '{DISTANCE_COLUMN}'"))?;
	for i in 0..batch.num_rows() {
		if ids.is_null(i) || distances.is_null(i) {
			continue;
		}
		let index = usize::try_from(ids.value(i)).with_context(|| format!("negative row id {}", ids.value(i)))?;
		out.push(Neighbor { index, distance: distances.value(i) });
	}
	Ok(())
}
