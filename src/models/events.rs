//! Progress events streamed to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{SeriesId, TournamentId};
use super::matches::{GameType, MatchOutcome, MatchResult};
use super::standing::StandingSnapshot;
use super::tournament::TournamentPhase;

/// How a sudden-death pairing was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// A played match produced a winner
    Decisive,
    /// Every attempt was drawn or errored; a fair coin decided
    CoinFlip,
}

/// Event emitted while a tournament or series runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TournamentEvent {
    PhaseStarted {
        tournament_id: TournamentId,
        phase: TournamentPhase,
        groups: Vec<String>,
        pairings: usize,
    },
    MatchCompleted {
        tournament_id: TournamentId,
        /// Submission index within the batch
        index: usize,
        player1: String,
        player2: String,
        outcome: MatchOutcome,
        player1_score: i64,
        player2_score: i64,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    },
    StandingsUpdated {
        tournament_id: TournamentId,
        standings: Vec<StandingSnapshot>,
    },
    PhaseAdvanced {
        tournament_id: TournamentId,
        from: TournamentPhase,
        to: TournamentPhase,
    },
    SuddenDeathResolved {
        tournament_id: TournamentId,
        winner: String,
        loser: String,
        attempts: u32,
        method: ResolutionMethod,
    },
    TournamentCompleted {
        tournament_id: TournamentId,
        game_type: GameType,
        champion: String,
    },
    SeriesStepCompleted {
        series_id: SeriesId,
        game_type: GameType,
        step: usize,
        total: usize,
        champion: String,
    },
    SeriesCompleted {
        series_id: SeriesId,
        champion: Option<String>,
    },
}

impl TournamentEvent {
    /// `MatchCompleted` for `result`, played as item `index` of its batch.
    pub fn match_completed(tournament_id: TournamentId, index: usize, result: &MatchResult) -> Self {
        TournamentEvent::MatchCompleted {
            tournament_id,
            index,
            player1: result.player1.clone(),
            player2: result.player2.clone(),
            outcome: result.outcome,
            player1_score: result.player1_score,
            player2_score: result.player2_score,
            started_at: result.started_at,
            ended_at: result.ended_at,
        }
    }

    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            TournamentEvent::PhaseStarted { .. } => "phase_started",
            TournamentEvent::MatchCompleted { .. } => "match_completed",
            TournamentEvent::StandingsUpdated { .. } => "standings_updated",
            TournamentEvent::PhaseAdvanced { .. } => "phase_advanced",
            TournamentEvent::SuddenDeathResolved { .. } => "sudden_death_resolved",
            TournamentEvent::TournamentCompleted { .. } => "tournament_completed",
            TournamentEvent::SeriesStepCompleted { .. } => "series_step_completed",
            TournamentEvent::SeriesCompleted { .. } => "series_completed",
        }
    }
}
