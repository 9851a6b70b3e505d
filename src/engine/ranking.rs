//! Tie-break chain for ranking a group.
//!
//! Order of criteria: points, head-to-head points among the tied set,
//! score differential, wins. Whatever is still tied after the last step stays
//! together as one tier, ordered alphabetically.

use crate::models::{name_key, Group, MatchResult, StandingSnapshot};
use crate::tiebreak::{self, ScoreMap};

/// Rank a group's members into tiers, best first.
///
/// `results` should be the results of the phase the group belongs to; only
/// matches between members of the same tied set count towards head-to-head.
pub fn rank_group(group: &Group, results: &[MatchResult]) -> Vec<Vec<String>> {
    let standing = |name: &str| group.standing(name).cloned().unwrap_or_default();
    let names: Vec<String> = group
        .members
        .iter()
        .map(|m| m.name.clone())
        .collect();

    let tiers = refine(vec![names], |_, name| i64::from(standing(name).points));
    let tiers = refine(tiers, |tied, name| head_to_head_points(name, tied, results));
    let tiers = refine(tiers, |_, name| standing(name).score_differential);
    refine(tiers, |_, name| i64::from(standing(name).wins))
}

/// Names sharing first place after the full chain.
pub fn top_contenders(group: &Group, results: &[MatchResult]) -> Vec<String> {
    rank_group(group, results)
        .into_iter()
        .next()
        .unwrap_or_default()
}

/// 1-based position per member. Members of one tier share a position.
pub fn positions(group: &Group, results: &[MatchResult]) -> Vec<(String, u32)> {
    let mut out = Vec::with_capacity(group.members.len());
    let mut position = 1u32;
    for tier in rank_group(group, results) {
        let size = tier.len() as u32;
        out.extend(tier.into_iter().map(|name| (name, position)));
        position += size;
    }
    out
}

/// Ranked standings rows for a group.
pub fn snapshot(group: &Group, results: &[MatchResult]) -> Vec<StandingSnapshot> {
    positions(group, results)
        .into_iter()
        .filter_map(|(name, position)| {
            group.standing(&name).map(|standing| StandingSnapshot {
                group: group.name.clone(),
                position,
                standing: standing.clone(),
            })
        })
        .collect()
}

/// Points `name` earned in matches played against other members of `tied`.
fn head_to_head_points(name: &str, tied: &[String], results: &[MatchResult]) -> i64 {
    let tied_keys: Vec<String> = tied.iter().map(|n| name_key(n)).collect();
    let in_tied = |n: &str| tied_keys.contains(&name_key(n));
    results
        .iter()
        .filter(|r| in_tied(&r.player1) && in_tied(&r.player2))
        .filter_map(|r| r.points_for(name))
        .map(i64::from)
        .sum()
}

/// Split every tier of two or more by `score`, keeping overall order.
fn refine<F>(tiers: Vec<Vec<String>>, score: F) -> Vec<Vec<String>>
where
    F: Fn(&[String], &str) -> i64,
{
    tiers
        .into_iter()
        .flat_map(|tier| {
            if tier.len() < 2 {
                return vec![tier];
            }
            let scores: ScoreMap = tier
                .iter()
                .map(|name| (name.clone(), score(&tier, name)))
                .collect();
            tiebreak::score_tiers(&scores)
        })
        .collect()
}
