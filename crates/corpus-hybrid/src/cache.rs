//! Process-scoped resource memoization.
//!
//! Loaded assets are memoized per key for the lifetime of the cache. Loads run
//! outside the lock, so concurrent first access may load a key more than once;
//! the first value inserted wins and every caller sees that one.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use corpus_core::traits::{Embedder, VectorIndex};
use corpus_core::{Error, Result};
use corpus_embed::l2_normalize;
use corpus_text::MetadataTable;
use corpus_vector::LanceVectorIndex;

/// Source of the engine's expensive assets.
pub trait ResourceLoader: Send + Sync {
    fn load_index(&self, path: &Path) -> anyhow::Result<Arc<dyn VectorIndex>>;
    fn load_metadata(&self, path: &Path) -> anyhow::Result<MetadataTable>;
    fn load_embedder(&self, model_id: &str) -> anyhow::Result<Arc<dyn Embedder>>;
}

type EmbedderFactory = dyn Fn(&str) -> anyhow::Result<Arc<dyn Embedder>> + Send + Sync;

/// Loads a LanceDB table, a JSON metadata table and an embedder by model id.
pub struct DiskLoader {
    table_name: String,
    embedder_factory: Box<EmbedderFactory>,
}

impl DiskLoader {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self { table_name: table_name.into(), embedder_factory: Box::new(corpus_embed::load_embedder) }
    }

    /// Resolve embedders through `factory` instead of the built-in models.
    pub fn with_embedder_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<Arc<dyn Embedder>> + Send + Sync + 'static,
    {
        self.embedder_factory = Box::new(factory);
        self
    }
}

impl ResourceLoader for DiskLoader {
    fn load_index(&self, path: &Path) -> anyhow::Result<Arc<dyn VectorIndex>> {
        Ok(Arc::new(LanceVectorIndex::open(path, &self.table_name)?))
    }

    fn load_metadata(&self, path: &Path) -> anyhow::Result<MetadataTable> {
        MetadataTable::load(path)
    }

    fn load_embedder(&self, model_id: &str) -> anyhow::Result<Arc<dyn Embedder>> {
        (self.embedder_factory)(model_id)
    }
}

/// Unbounded memo table.
pub struct Memo<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Memo<K, V> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        load: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E> {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let value = load()?;
        Ok(self.entries.write().entry(key.clone()).or_insert(value).clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for Memo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Capacity-bounded LRU of unit-normalized query vectors keyed by
/// `(query, model id)`.
pub struct QueryEmbeddingCache {
    entries: Mutex<LruCache<(String, String), Arc<[f32]>>>,
}

impl QueryEmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get(&self, query: &str, model_id: &str) -> Option<Arc<[f32]>> {
        self.entries.lock().get(&(query.to_string(), model_id.to_string())).cloned()
    }

    pub fn insert(&self, query: &str, model_id: &str, vector: Arc<[f32]>) {
        self.entries.lock().put((query.to_string(), model_id.to_string()), vector);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

/// The four memo tables around one [`ResourceLoader`].
pub struct ResourceCache {
    loader: Arc<dyn ResourceLoader>,
    indexes: Memo<PathBuf, Arc<dyn VectorIndex>>,
    tables: Memo<PathBuf, Arc<MetadataTable>>,
    embedders: Memo<String, Arc<dyn Embedder>>,
    queries: QueryEmbeddingCache,
}

impl ResourceCache {
    pub fn new(loader: Arc<dyn ResourceLoader>, query_capacity: usize) -> Self {
        Self {
            loader,
            indexes: Memo::new(),
            tables: Memo::new(),
            embedders: Memo::new(),
            queries: QueryEmbeddingCache::new(query_capacity),
        }
    }

    pub fn index(&self, path: &Path) -> Result<Arc<dyn VectorIndex>> {
        self.indexes.get_or_try_insert_with(&path.to_path_buf(), || {
            self.loader.load_index(path).map_err(|e| {
                error!(path = %path.display(), "failed to load vector index: {e:#}");
                Error::unavailable(format!("vector index {}", path.display()), &e)
            })
        })
    }

    pub fn metadata(&self, path: &Path) -> Result<Arc<MetadataTable>> {
        self.tables.get_or_try_insert_with(&path.to_path_buf(), || {
            let table = self.loader.load_metadata(path).map_err(|e| {
                error!(path = %path.display(), "failed to load metadata table: {e:#}");
                Error::unavailable(format!("metadata table {}", path.display()), &e)
            })?;
            Ok(Arc::new(table))
        })
    }

    pub fn embedder(&self, model_id: &str) -> Result<Arc<dyn Embedder>> {
        self.embedders.get_or_try_insert_with(&model_id.to_string(), || {
            self.loader.load_embedder(model_id).map_err(|e| {
                error!(model_id, "failed to load embedder: {e:#}");
                Error::unavailable(format!("embedder {model_id}"), &e)
            })
        })
    }

    /// Unit-normalized embedding of `query`, computed on a miss.
    pub fn query_embedding(&self, embedder: &dyn Embedder, query: &str) -> Result<Arc<[f32]>> {
        let model_id = embedder.model_id();
        if let Some(v) = self.queries.get(query, model_id) {
            debug!(query, model_id, "query embedding cache hit");
            return Ok(v);
        }
        let mut vector = embedder.embed(query).map_err(|e| Error::search_failed(&e.context("embedding query")))?;
        l2_normalize(&mut vector);
        let vector: Arc<[f32]> = vector.into();
        self.queries.insert(query, model_id, Arc::clone(&vector));
        Ok(vector)
    }

    pub fn query_cache(&self) -> &QueryEmbeddingCache {
        &self.queries
    }

    /// Number of loaded indexes, metadata tables and embedders.
    pub fn loaded(&self) -> (usize, usize, usize) {
        (self.indexes.len(), self.tables.len(), self.embedders.len())
    }
}
