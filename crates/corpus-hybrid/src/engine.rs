use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use corpus_core::config::{Config, SearchSettings, SnippetOptions};
use corpus_core::traits::{Embedder, Neighbor, VectorIndex};
use corpus_core::{Error, FacetCatalog, MatchResult, Result, SearchRequest, SearchType};
use corpus_text::{MatchContext, MetadataTable, PreparedQuery, SnippetExtractor};

use crate::cache::{ResourceCache, ResourceLoader};
use crate::merge::{rank, reconcile};
use crate::semantic::semantic_matches;

/// Hybrid passage search over one metadata table and its paired vector index.
///
/// Holds the resource cache explicitly; independent engines never share
/// loaded assets. `search` is synchronous and safe to call from many threads;
/// async request handlers call it through `tokio::task::spawn_blocking`.
pub struct HybridSearchEngine {
    cache: ResourceCache,
    settings: SearchSettings,
    snippets: SnippetExtractor,
    base_dir: PathBuf,
}

/// Vector-side resources of one request.
struct VectorSide {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl HybridSearchEngine {
    pub fn new(loader: Arc<dyn ResourceLoader>, settings: SearchSettings, snippets: SnippetOptions) -> Self {
        let cache = ResourceCache::new(loader, settings.query_cache_capacity);
        Self { cache, settings, snippets: SnippetExtractor::new(snippets), base_dir: PathBuf::from(".") }
    }

    pub fn from_config(config: &Config, loader: Arc<dyn ResourceLoader>) -> Result<Self> {
        Ok(Self::new(loader, config.search_settings()?, config.snippet_options()?))
    }

    /// Directory relative asset paths resolve against (default: working directory).
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Distinct author, group and book title values of the corpus.
    pub fn facets(&self) -> Result<FacetCatalog> {
        Ok(self.metadata()?.facets())
    }

    pub fn search(&self, request: &SearchRequest) -> Result<Vec<MatchResult>> {
        request.validate()?;
        let query = PreparedQuery::new(&request.query)?;
        let table = self.metadata()?;
        let ctx = MatchContext {
            table: &table,
            query: &query,
            filters: &request.filters,
            min_snippet_length: request.min_snippet_length,
            snippets: self.snippets,
        };
        let none = HashSet::new();

        let candidates = match request.search_type {
            SearchType::Exact => ctx.exact_matches(&none),
            SearchType::AllWords => ctx.all_words_matches(&none),
            SearchType::Semantic => {
                let side = self.vector_side()?;
                let neighbors = self.neighbors(&side, &query, request.top_k)?.map_err(|e| Error::search_failed(&e))?;
                semantic_matches(&ctx, &neighbors, &none, request.top_k).matches
            }
            SearchType::All => {
                let side = self.vector_side()?;
                let mut textual = ctx.exact_matches(&none);
                let mut matched: HashSet<usize> = textual.iter().map(|c| c.index).collect();
                let all_words = ctx.all_words_matches(&matched);
                matched.extend(all_words.iter().map(|c| c.index));
                textual.extend(all_words);
                let neighbors = self.neighbors(&side, &query, request.top_k)?.unwrap_or_else(|e| {
                    warn!(query = query.raw(), "vector index query failed, returning textual matches only: {e:#}");
                    Vec::new()
                });
                reconcile(textual, semantic_matches(&ctx, &neighbors, &matched, request.top_k))
            }
        };

        let results = rank(candidates, request.top_k);
        info!(
            query = query.raw(),
            search_type = %request.search_type,
            top_k = request.top_k,
            count = results.len(),
            "search complete"
        );
        Ok(results)
    }

    fn metadata(&self) -> Result<Arc<MetadataTable>> {
        self.cache.metadata(&self.settings.metadata_path(&self.base_dir))
    }

    fn vector_side(&self) -> Result<VectorSide> {
        let index = self.cache.index(&self.settings.index_path(&self.base_dir))?;
        let embedder = self.cache.embedder(&self.settings.model_id)?;
        Ok(VectorSide { index, embedder })
    }

    /// Embed the query (errors propagate) and run one over-fetching neighbor
    /// query (its error is returned for the caller to decide on).
    fn neighbors(
        &self,
        side: &VectorSide,
        query: &PreparedQuery,
        top_k: usize,
    ) -> Result<anyhow::Result<Vec<Neighbor>>> {
        let vector = self.cache.query_embedding(side.embedder.as_ref(), query.raw())?;
        let k = top_k.saturating_mul(self.settings.overfetch_factor);
        Ok(side.index.query(&vector, k))
    }
}
