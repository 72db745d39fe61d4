//! corpus-hybrid
//!
//! Combines the Exact, All-Words and Semantic matchers into one ranked result
//! list. Assets are loaded through a [`ResourceLoader`] and memoized in a
//! [`ResourceCache`] owned by the engine.

pub mod cache;
pub mod engine;
pub mod merge;
pub mod semantic;

pub use cache::{DiskLoader, Memo, QueryEmbeddingCache, ResourceCache, ResourceLoader};
pub use engine::HybridSearchEngine;
pub use semantic::SemanticMatches;
