//! Group and standing models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::matches::{MatchOutcome, Side};
use super::participant::{name_key, Participant};
use super::tournament::TournamentPhase;

/// Per-participant accumulator within one phase.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupStanding {
    pub participant: String,
    pub points: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub score_differential: i64,
}

impl GroupStanding {
    /// A zeroed standing.
    pub fn new(participant: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            ..Default::default()
        }
    }

    pub fn matches_played(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Fold one match into this standing.
    ///
    /// `side` is the side this participant played; `own` and `other` are the
    /// raw game scores from this participant's perspective.
    pub fn apply(&mut self, outcome: MatchOutcome, side: Side, own: i64, other: i64) {
        let (p1, p2) = outcome.points();
        self.points += match side {
            Side::Player1 => p1,
            Side::Player2 => p2,
        };
        match outcome.winner() {
            Some(winner) if winner == side => self.wins += 1,
            Some(_) => self.losses += 1,
            None if outcome == MatchOutcome::Draw => self.draws += 1,
            // Mutual error counts as a loss for both sides.
            None => self.losses += 1,
        }
        self.score_differential += own - other;
    }
}

/// A set of participants that play a full round robin inside one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: u32,

    /// Human-readable label, e.g. "Group 3", "Final", "Tiebreaker"
    pub name: String,

    pub phase: TournamentPhase,

    /// Members in seeding order
    pub members: Vec<Participant>,

    /// Standings keyed by case-folded name
    pub standings: BTreeMap<String, GroupStanding>,

    pub complete: bool,
}

impl Group {
    /// Build a group with a zeroed standing for every member.
    pub fn new(id: u32, name: impl Into<String>, phase: TournamentPhase, members: Vec<Participant>) -> Self {
        let standings = members
            .iter()
            .map(|m| (m.key(), GroupStanding::new(m.name.clone())))
            .collect();
        Self {
            id,
            name: name.into(),
            phase,
            members,
            standings,
            complete: false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.standings.contains_key(&name_key(name))
    }

    pub fn standing(&self, name: &str) -> Option<&GroupStanding> {
        self.standings.get(&name_key(name))
    }

    pub fn standing_mut(&mut self, name: &str) -> Option<&mut GroupStanding> {
        self.standings.get_mut(&name_key(name))
    }

    /// Number of round-robin matches this group plays.
    pub fn match_count(&self) -> usize {
        let n = self.members.len();
        n * n.saturating_sub(1) / 2
    }

    /// Sum of points across all members.
    pub fn total_points(&self) -> u32 {
        self.standings.values().map(|s| s.points).sum()
    }
}

/// One row of a live standings snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingSnapshot {
    pub group: String,
    pub position: u32,
    pub standing: GroupStanding,
}
