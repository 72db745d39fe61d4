//! Facet-equality filters.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{CorpusChunk, Facet};

/// Required facet values. A chunk passes when every listed facet equals the
/// given value exactly; an empty set passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<Facet, String>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(facet name, value)` pairs as they arrive from a request.
    /// Unknown facet names are rejected; empty values are ignored.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut filters = Self::new();
        for (name, value) in pairs {
            let facet: Facet = name.as_ref().parse()?;
            let value = value.into();
            if !value.is_empty() {
                filters.insert(facet, value);
            }
        }
        Ok(filters)
    }

    pub fn insert(&mut self, facet: Facet, value: impl Into<String>) {
        self.0.insert(facet, value.into());
    }

    pub fn get(&self, facet: Facet) -> Option<&str> {
        self.0.get(&facet).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Facet, &str)> {
        self.0.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn passes(&self, chunk: &CorpusChunk) -> bool {
        passes(chunk, self)
    }
}

/// True iff `chunk` carries every required facet value.
pub fn passes(chunk: &CorpusChunk, filters: &Filters) -> bool {
    filters.iter().all(|(facet, value)| chunk.facet(facet) == value)
}
