//! Domain types shared by the matchers, the merger and callers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::filter::Filters;

pub const DEFAULT_TOP_K: usize = 50;
pub const DEFAULT_MIN_SNIPPET_LENGTH: usize = 10;

/// Page reference as written by ingestion: a number for paginated sources,
/// a free-form label (`"N/A"`, `"xii"`) otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageNumber {
    Number(u32),
    Label(String),
}

impl Default for PageNumber {
    fn default() -> Self {
        PageNumber::Label("N/A".to_string())
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageNumber::Number(n) => write!(f, "{n}"),
            PageNumber::Label(s) => f.write_str(s),
        }
    }
}

fn unknown() -> String {
    "Unknown".to_string()
}
fn not_available() -> String {
    "N/A".to_string()
}

/// One indexed passage of the corpus plus its bibliographic metadata.
///
/// - `index`: position in the metadata table; the paired vector index stores
///   the embedding of this chunk at the same position
/// - `priority`: editorial importance, higher is more important
/// - `snippet`: raw chunk text as extracted from the source document
///
/// Missing display fields fall back to the defaults the serving layer has
/// always shown (`"Unknown"`, `"N/A"`, empty paths, priority 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusChunk {
    #[serde(skip)]
    pub index: usize,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub pdf_url: String,
    #[serde(default = "unknown")]
    pub book_title: String,
    #[serde(default = "unknown")]
    pub author: String,
    #[serde(default = "unknown")]
    pub group: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "not_available")]
    pub chapter_name: String,
    #[serde(default)]
    pub page_number: PageNumber,
    pub snippet: String,
}

impl CorpusChunk {
    /// Value of the given facet on this chunk.
    pub fn facet(&self, facet: Facet) -> &str {
        match facet {
            Facet::Author => &self.author,
            Facet::Group => &self.group,
            Facet::BookTitle => &self.book_title,
        }
    }
}

/// Metadata fields a caller may filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Author,
    Group,
    BookTitle,
}

impl Facet {
    pub const ALL: [Facet; 3] = [Facet::Author, Facet::Group, Facet::BookTitle];

    pub fn as_str(self) -> &'static str {
        match self {
            Facet::Author => "author",
            Facet::Group => "group",
            Facet::BookTitle => "book_title",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Facet::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("unknown facet '{s}' (expected author, group or book_title)"))
            })
    }
}

/// Which strategies a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    All,
    Exact,
    AllWords,
    Semantic,
}

impl SearchType {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchType::All => "all",
            SearchType::Exact => "exact",
            SearchType::AllWords => "all_words",
            SearchType::Semantic => "semantic",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(SearchType::All),
            "exact" => Ok(SearchType::Exact),
            "all_words" => Ok(SearchType::AllWords),
            "semantic" => Ok(SearchType::Semantic),
            other => Err(Error::InvalidArgument(format!(
                "unknown search_type '{other}' (expected all, exact, all_words or semantic)"
            ))),
        }
    }
}

/// Kind of evidence behind a match. Lower rank is stronger evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchCategory {
    /// Normalized query is a literal substring of the chunk.
    Exact,
    /// Every query word occurs in the chunk and the vector index also ranked it close.
    Confirmed,
    /// Every query word occurs in the chunk.
    AllWords,
    /// Vector neighbor only.
    Semantic,
}

impl MatchCategory {
    pub fn rank(self) -> u8 {
        match self {
            MatchCategory::Exact => 1,
            MatchCategory::Confirmed => 2,
            MatchCategory::AllWords => 3,
            MatchCategory::Semantic => 4,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(MatchCategory::Exact),
            2 => Some(MatchCategory::Confirmed),
            3 => Some(MatchCategory::AllWords),
            4 => Some(MatchCategory::Semantic),
            _ => None,
        }
    }
}

impl Serialize for MatchCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.rank())
    }
}

impl<'de> Deserialize<'de> for MatchCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let rank = u8::deserialize(deserializer)?;
        MatchCategory::from_rank(rank)
            .ok_or_else(|| serde::de::Error::custom(format!("category_priority out of range: {rank}")))
    }
}

/// A ranked search hit as returned to callers.
///
/// Carries the display fields of the matched chunk, the processed snippet and
/// the ranking signals. The chunk position is deliberately absent; the engine
/// tracks it in [`Candidate`] while merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub author: String,
    pub book_title: String,
    pub chapter_name: String,
    pub file_path: String,
    pub group: String,
    pub page_number: PageNumber,
    pub pdf_url: String,
    pub priority: i64,
    #[serde(rename = "category_priority")]
    pub category: MatchCategory,
    pub snippet: String,
    pub distance: f32,
}

impl MatchResult {
    pub fn from_chunk(chunk: &CorpusChunk, category: MatchCategory, distance: f32, snippet: String) -> Self {
        Self {
            author: chunk.author.clone(),
            book_title: chunk.book_title.clone(),
            chapter_name: chunk.chapter_name.clone(),
            file_path: chunk.file_path.clone(),
            group: chunk.group.clone(),
            page_number: chunk.page_number.clone(),
            pdf_url: chunk.pdf_url.clone(),
            priority: chunk.priority,
            category,
            snippet,
            distance,
        }
    }

    pub fn category_priority(&self) -> u8 {
        self.category.rank()
    }

    /// Ranking order: category ascending, priority descending, distance ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| self.distance.total_cmp(&other.distance))
    }
}

/// A match still tied to its corpus position, used for dedup and reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub result: MatchResult,
}

impl Candidate {
    pub fn new(chunk: &CorpusChunk, category: MatchCategory, distance: f32, snippet: String) -> Self {
        Self { index: chunk.index, result: MatchResult::from_chunk(chunk, category, distance, snippet) }
    }

    pub fn into_result(self) -> MatchResult {
        self.result
    }
}

/// Parameters of one search call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub filters: Filters,
    pub search_type: SearchType,
    pub top_k: usize,
    pub min_snippet_length: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: Filters::default(),
            search_type: SearchType::default(),
            top_k: DEFAULT_TOP_K,
            min_snippet_length: DEFAULT_MIN_SNIPPET_LENGTH,
        }
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn min_snippet_length(mut self, min_snippet_length: usize) -> Self {
        self.min_snippet_length = min_snippet_length;
        self
    }

    pub fn filter(mut self, facet: Facet, value: impl Into<String>) -> Self {
        self.filters.insert(facet, value);
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".to_string()));
        }
        if self.top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Distinct facet values present in a corpus, for building filter pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCatalog {
    pub authors: Vec<String>,
    pub groups: Vec<String>,
    pub book_titles: Vec<String>,
}

impl FacetCatalog {
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a CorpusChunk>) -> Self {
        let (mut authors, mut groups, mut titles) = (BTreeSet::new(), BTreeSet::new(), BTreeSet::new());
        for c in chunks {
            authors.insert(c.author.as_str());
            groups.insert(c.group.as_str());
            titles.insert(c.book_title.as_str());
        }
        let owned = |set: BTreeSet<&str>| -> Vec<String> { set.into_iter().map(str::to_string).collect() };
        Self { authors: owned(authors), groups: owned(groups), book_titles: owned(titles) }
    }

    pub fn values(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Author => &self.authors,
            Facet::Group => &self.groups,
            Facet::BookTitle => &self.book_titles,
        }
    }
}
