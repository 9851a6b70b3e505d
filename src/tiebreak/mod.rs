//! Tie detection and ranking over `name -> score` maps.
//!
//! Pure helpers shared by the group-stage engine (within-group advancement)
//! and the series runner (cross-event tie detection). None of them mutate
//! their input. Names with equal scores are always ordered alphabetically,
//! case-insensitive.

use std::collections::BTreeMap;

use crate::models::compare_names;

/// Scores keyed by participant display name.
pub type ScoreMap = BTreeMap<String, i64>;

/// Every entry sorted by score descending, ties alphabetical.
pub fn rank(scores: &ScoreMap) -> Vec<(String, i64)> {
    let mut ranked: Vec<(String, i64)> = scores.iter().map(|(n, s)| (n.clone(), *s)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| compare_names(&a.0, &b.0)));
    ranked
}

/// Partition into runs of equal score, highest first.
///
/// Every name appears in exactly one tier; singleton tiers are kept.
pub fn score_tiers(scores: &ScoreMap) -> Vec<Vec<String>> {
    let mut tiers: Vec<Vec<String>> = Vec::new();
    let mut last: Option<i64> = None;
    for (name, score) in rank(scores) {
        match (last, tiers.last_mut()) {
            (Some(prev), Some(tier)) if prev == score => tier.push(name),
            _ => tiers.push(vec![name]),
        }
        last = Some(score);
    }
    tiers
}

/// Subsets of two or more names sharing a score, highest score first.
pub fn detect_ties(scores: &ScoreMap) -> Vec<Vec<String>> {
    score_tiers(scores)
        .into_iter()
        .filter(|tier| tier.len() >= 2)
        .collect()
}

/// Whether two or more names share the highest score.
pub fn is_top_tied(scores: &ScoreMap) -> bool {
    score_tiers(scores)
        .first()
        .map(|tier| tier.len() > 1)
        .unwrap_or(false)
}

/// The top `n` scorers. Everyone tied with the entry at the cutoff is
/// included, so the result may be longer than `n`.
pub fn select_top(scores: &ScoreMap, n: usize) -> Vec<String> {
    let mut selected = Vec::new();
    for tier in score_tiers(scores) {
        if selected.len() >= n {
            break;
        }
        selected.extend(tier);
    }
    selected
}

/// The single highest scorer, or `None` if the top is tied or the map is empty.
pub fn champion(scores: &ScoreMap) -> Option<String> {
    match score_tiers(scores).into_iter().next() {
        Some(mut tier) if tier.len() == 1 => tier.pop(),
        _ => None,
    }
}
