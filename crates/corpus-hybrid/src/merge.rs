//! Cross-strategy reconciliation and final ordering.

use std::collections::HashSet;

use tracing::debug;

use corpus_core::{Candidate, MatchCategory, MatchResult};

use crate::semantic::SemanticMatches;

/// Promote all-words hits the vector index also ranked close, then append the
/// semantic hits no textual stage produced.
pub fn reconcile(mut textual: Vec<Candidate>, semantic: SemanticMatches) -> Vec<Candidate> {
    for c in textual.iter_mut().filter(|c| c.result.category == MatchCategory::AllWords) {
        if let Some(distance) = semantic.distance_of(c.index) {
            debug!(index = c.index, distance, "all-words match confirmed by vector index");
            c.result.category = MatchCategory::Confirmed;
            c.result.distance = distance;
        }
    }
    let present: HashSet<usize> = textual.iter().map(|c| c.index).collect();
    textual.extend(semantic.matches.into_iter().filter(|c| !present.contains(&c.index)));
    textual
}

/// Sort by `(category, -priority, distance)` with the corpus position as the
/// final tie-break, keep the strongest hit per position, cut to `top_k` and
/// drop the positions.
pub fn rank(mut candidates: Vec<Candidate>, top_k: usize) -> Vec<MatchResult> {
    candidates.sort_by(|a, b| a.result.rank_cmp(&b.result).then_with(|| a.index.cmp(&b.index)));
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.index))
        .take(top_k)
        .map(Candidate::into_result)
        .collect()
}
