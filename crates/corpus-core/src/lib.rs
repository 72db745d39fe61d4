//! corpus-core
//!
//! Shared vocabulary of the passage search engine: chunk and result types,
//! facet filters, collaborator traits, errors and configuration.

pub mod config;
pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use filter::Filters;
pub use types::{
    Candidate, CorpusChunk, Facet, FacetCatalog, MatchCategory, MatchResult, PageNumber, SearchRequest, SearchType,
};
