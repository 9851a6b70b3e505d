//! Tournament state model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TournamentId;
use super::matches::{GameType, MatchResult};
use super::participant::Participant;
use super::standing::{Group, GroupStanding, StandingSnapshot};

/// Stage of the group-stage state machine.
///
/// Variants are ordered by progression so `a < b` means `a` comes first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TournamentPhase {
    #[default]
    NotStarted,
    InitialGroups,
    FinalGroup,
    Tiebreaker,
    Completed,
}

impl TournamentPhase {
    /// Whether results may be recorded in this phase.
    pub fn accepts_results(&self) -> bool {
        matches!(
            self,
            TournamentPhase::InitialGroups | TournamentPhase::FinalGroup | TournamentPhase::Tiebreaker
        )
    }
}

impl fmt::Display for TournamentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TournamentPhase::NotStarted => "not started",
            TournamentPhase::InitialGroups => "initial groups",
            TournamentPhase::FinalGroup => "final group",
            TournamentPhase::Tiebreaker => "tiebreaker",
            TournamentPhase::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Entry in the phase history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: TournamentPhase,

    /// Index of the first match result recorded in this phase
    pub first_result: usize,

    /// Index of the first sudden-death result, if sudden death was played
    #[serde(default)]
    pub sudden_death_from: Option<usize>,

    pub started_at: DateTime<Utc>,
}

/// Top-level aggregate for one tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentState {
    pub id: TournamentId,
    pub game_type: GameType,
    pub phase: TournamentPhase,

    /// Every phase entered, in order
    pub phase_history: Vec<PhaseRecord>,

    /// Everyone entered at initialization
    pub participants: Vec<Participant>,

    /// Groups of the active phase
    pub groups: Vec<Group>,

    /// Groups of finished phases, oldest first
    pub archived_groups: Vec<Group>,

    /// Every recorded result in chronological order
    pub match_results: Vec<MatchResult>,

    /// Running totals across all phases, keyed by case-folded name
    pub totals: std::collections::BTreeMap<String, GroupStanding>,

    /// Set once the phase is `Completed`
    pub champion: Option<String>,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TournamentState {
    pub fn is_completed(&self) -> bool {
        self.phase == TournamentPhase::Completed
    }

    /// Phases entered so far, in order.
    pub fn phases(&self) -> Vec<TournamentPhase> {
        self.phase_history.iter().map(|r| r.phase).collect()
    }

    /// Round-robin results recorded while `phase` was active. Sudden-death
    /// matches are excluded.
    pub fn results_in_phase(&self, phase: TournamentPhase) -> &[MatchResult] {
        let Some(pos) = self.phase_history.iter().position(|r| r.phase == phase) else {
            return &[];
        };
        let record = &self.phase_history[pos];
        let end = record
            .sudden_death_from
            .unwrap_or_else(|| self.phase_end(pos));
        &self.match_results[record.first_result..end]
    }

    /// Sudden-death matches played to settle the tiebreaker, in order.
    pub fn sudden_death_results(&self) -> &[MatchResult] {
        let Some(pos) = self
            .phase_history
            .iter()
            .position(|r| r.sudden_death_from.is_some())
        else {
            return &[];
        };
        let start = self.phase_history[pos]
            .sudden_death_from
            .unwrap_or(self.match_results.len());
        &self.match_results[start..self.phase_end(pos)]
    }

    fn phase_end(&self, pos: usize) -> usize {
        self.phase_history
            .get(pos + 1)
            .map(|next| next.first_result)
            .unwrap_or(self.match_results.len())
    }

    /// Group of the active phase containing `name`.
    pub fn active_group_of(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(name))
    }
}

/// Read-only summary of one group in the active phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub name: String,
    pub members: Vec<String>,
    pub standings: Vec<StandingSnapshot>,
    pub complete: bool,
}

/// Read-only summary of the active phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub tournament_id: TournamentId,
    pub phase: TournamentPhase,
    pub groups: Vec<GroupSummary>,
    pub total_pairings: usize,
    pub recorded: usize,
    pub outstanding: usize,
}

/// A participant's placement once a tournament has finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRanking {
    /// 1 = champion
    pub rank: u32,
    pub participant: String,

    /// Furthest phase whose group this participant played in
    pub stage_reached: TournamentPhase,

    /// Position inside that last group (1-based)
    pub group_position: u32,

    /// Totals across every phase of the tournament
    pub points: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub score_differential: i64,

    pub is_champion: bool,
}
