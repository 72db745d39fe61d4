//! Semantic matcher: turns vector neighbors into candidates.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use corpus_core::traits::Neighbor;
use corpus_core::{Candidate, MatchCategory};
use corpus_text::MatchContext;

/// Output of the semantic stage.
#[derive(Debug, Clone, Default)]
pub struct SemanticMatches {
    /// Accepted neighbors not matched by an earlier stage, nearest first.
    pub matches: Vec<Candidate>,
    /// Distances of neighbors that an earlier stage already matched.
    pub confirmations: HashMap<usize, f32>,
}

impl SemanticMatches {
    /// Semantic distance of `index`, whether it was emitted or only confirmed.
    pub fn distance_of(&self, index: usize) -> Option<f32> {
        self.confirmations
            .get(&index)
            .copied()
            .or_else(|| self.matches.iter().find(|c| c.index == index).map(|c| c.result.distance))
    }
}

/// Walk `neighbors` (ascending distance) and accept at most `top_k` of them.
///
/// Excluded indices are never emitted but are recorded as confirmations,
/// including those past the point where `top_k` was reached. Indices beyond
/// the metadata table are skipped with a warning.
pub fn semantic_matches(
    ctx: &MatchContext<'_>,
    neighbors: &[Neighbor],
    exclude: &HashSet<usize>,
    top_k: usize,
) -> SemanticMatches {
    let mut out = SemanticMatches::default();
    let mut seen = HashSet::new();
    let mut stale = 0usize;
    for n in neighbors {
        if exclude.contains(&n.index) {
            out.confirmations.entry(n.index).or_insert(n.distance);
            continue;
        }
        if out.matches.len() >= top_k || !seen.insert(n.index) {
            continue;
        }
        if n.index >= ctx.table.len() {
            stale += 1;
            warn!(index = n.index, table_len = ctx.table.len(), "vector neighbor outside metadata table, skipping");
            continue;
        }
        if let Some(candidate) = ctx.candidate(n.index, MatchCategory::Semantic, n.distance) {
            out.matches.push(candidate);
        }
    }
    info!(
        query = ctx.query.raw(),
        neighbors = neighbors.len(),
        count = out.matches.len(),
        confirmed = out.confirmations.len(),
        stale,
        "semantic matches"
    );
    out
}
