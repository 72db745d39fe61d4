/// Text embedding model. Implementations must be deterministic for identical input.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model (cache key component).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder '{}' returned no vector", self.model_id()))
    }
}

/// One nearest-neighbor hit: position in the metadata table and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Prebuilt nearest-neighbor index over chunk embeddings.
///
/// `query` returns at most `k` neighbors ordered by ascending distance. Index
/// positions correspond 1:1 with the paired metadata table.
pub trait VectorIndex: Send + Sync {
    fn query(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<Neighbor>>;
}
