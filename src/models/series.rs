//! Series model — aggregated results across several tournaments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SeriesId;
use super::participant::{compare_names, name_key};
use super::tournament::{FinalRanking, TournamentState};

/// Lifecycle of a series run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Per-bot totals across every tournament of a series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BotSeriesStats {
    pub participant: String,
    pub total_score: i64,
    pub total_wins: u32,
    pub total_losses: u32,
    pub total_draws: u32,

    /// Number of tournaments won
    pub tournament_wins: u32,

    /// Final rank in each tournament, in run order
    pub placements: Vec<u32>,

    /// Score per game type
    pub scores_by_game: BTreeMap<String, i64>,
}

impl BotSeriesStats {
    pub fn new(participant: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            ..Default::default()
        }
    }

    /// Series ordering: score, wins, fewest losses, tournament wins, name.
    pub fn compare(&self, other: &Self) -> std::cmp::Ordering {
        other
            .total_score
            .cmp(&self.total_score)
            .then_with(|| other.total_wins.cmp(&self.total_wins))
            .then_with(|| self.total_losses.cmp(&other.total_losses))
            .then_with(|| other.tournament_wins.cmp(&self.tournament_wins))
            .then_with(|| compare_names(&self.participant, &other.participant))
    }
}

/// State of a series, built incrementally between tournaments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesState {
    pub id: SeriesId,
    pub status: SeriesStatus,

    /// Finished tournaments in run order
    pub tournaments: Vec<TournamentState>,

    /// Aggregates keyed by case-folded name
    pub bots: BTreeMap<String, BotSeriesStats>,

    pub champion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for SeriesState {
    fn default() -> Self {
        Self {
            id: SeriesId::generate(),
            status: SeriesStatus::Idle,
            tournaments: Vec::new(),
            bots: BTreeMap::new(),
            champion: None,
            started_at: None,
            completed_at: None,
        }
    }
}

impl SeriesState {
    /// Append a finished tournament and fold its rankings into the totals.
    pub fn fold_tournament(&mut self, tournament: TournamentState, rankings: &[FinalRanking]) {
        let game = tournament.game_type.to_string();
        for ranking in rankings {
            let stats = self
                .bots
                .entry(name_key(&ranking.participant))
                .or_insert_with(|| BotSeriesStats::new(ranking.participant.clone()));
            stats.total_score += i64::from(ranking.points);
            stats.total_wins += ranking.wins;
            stats.total_losses += ranking.losses;
            stats.total_draws += ranking.draws;
            stats.placements.push(ranking.rank);
            if ranking.is_champion {
                stats.tournament_wins += 1;
            }
            *stats.scores_by_game.entry(game.clone()).or_insert(0) += i64::from(ranking.points);
        }
        self.tournaments.push(tournament);
    }

    /// Bots sorted by the series ordering.
    pub fn leaderboard(&self) -> Vec<BotSeriesStats> {
        let mut rows: Vec<BotSeriesStats> = self.bots.values().cloned().collect();
        rows.sort_by(|a, b| a.compare(b));
        rows
    }

    /// Total score per bot, keyed by display name.
    pub fn score_map(&self) -> BTreeMap<String, i64> {
        self.bots
            .values()
            .map(|s| (s.participant.clone(), s.total_score))
            .collect()
    }

    /// Resolve the champion and mark the series completed.
    pub fn finish(&mut self) -> Option<String> {
        self.champion = self.leaderboard().first().map(|s| s.participant.clone());
        self.status = SeriesStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.champion.clone()
    }
}
