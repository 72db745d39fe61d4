use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use corpus_core::{CorpusChunk, FacetCatalog};
use tracing::info;

use crate::normalize::normalize;

/// Ordered, read-only chunk table paired 1:1 with the vector index.
///
/// Every chunk's folded text is computed once here so matchers never re-fold
/// chunk text per request.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    chunks: Vec<CorpusChunk>,
    normalized: Vec<String>,
}

impl MetadataTable {
    /// Build from chunks in index order; `index` is reassigned from position.
    pub fn from_chunks(chunks: Vec<CorpusChunk>) -> Self {
        let chunks: Vec<CorpusChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, mut c)| {
                c.index = i;
                c
            })
            .collect();
        let normalized = chunks.iter().map(|c| normalize(&c.snippet)).collect();
        Self { chunks, normalized }
    }

    /// Read the JSON array written by ingestion.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading metadata table {}", path.display()))?;
        let chunks: Vec<CorpusChunk> =
            serde_json::from_str(&raw).with_context(|| format!("parsing metadata table {}", path.display()))?;
        let table = Self::from_chunks(chunks);
        info!(path = %path.display(), count = table.len(), "loaded metadata table");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CorpusChunk> {
        self.chunks.get(index)
    }

    pub fn chunks(&self) -> &[CorpusChunk] {
        &self.chunks
    }

    /// Folded text of the chunk at `index`.
    pub fn normalized(&self, index: usize) -> Option<&str> {
        self.normalized.get(index).map(String::as_str)
    }

    /// Chunks paired with their folded text, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&CorpusChunk, &str)> {
        self.chunks.iter().zip(self.normalized.iter().map(String::as_str))
    }

    pub fn facets(&self) -> FacetCatalog {
        FacetCatalog::from_chunks(&self.chunks)
    }
}
