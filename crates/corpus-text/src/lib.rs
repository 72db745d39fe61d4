//! corpus-text
//!
//! Text side of the passage search engine: folding, highlighting, snippet
//! extraction with markup sanitizing, the metadata table, and the Exact and
//! All-Words matchers.

pub mod highlight;
pub mod matcher;
pub mod metadata;
pub mod normalize;
pub mod query;
pub mod sanitize;
pub mod snippet;

pub use matcher::{MatchContext, ALL_WORDS_DISTANCE, EXACT_DISTANCE};
pub use metadata::MetadataTable;
pub use normalize::{normalize, FoldedText};
pub use query::PreparedQuery;
pub use snippet::{Snippet, SnippetExtractor};
