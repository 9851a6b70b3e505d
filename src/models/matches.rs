//! Pairing and match result models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::participant::{name_key, Participant};

/// Points awarded for a win (including a win by opponent error).
pub const WIN_POINTS: u32 = 3;

/// Points awarded to each side of a draw.
pub const DRAW_POINTS: u32 = 1;

/// Game a tournament is played in (e.g. "rpsls", "colonel-blotto").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameType(String);

impl GameType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GameType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A scheduled one-off match between two distinct participants.
///
/// Pairings are unordered: (A, B) and (B, A) name the same match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub player1: Participant,
    pub player2: Participant,
}

impl Pairing {
    pub fn new(player1: Participant, player2: Participant) -> Self {
        Self { player1, player2 }
    }

    /// Order-independent lookup key.
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.player1.name, &self.player2.name)
    }
}

impl fmt::Display for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.player1.name, self.player2.name)
    }
}

/// Case-folded, sorted pair of names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (a, b) = (name_key(a), name_key(b));
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Which side of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Player1,
    Player2,
}

/// Outcome of a single match from player 1's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Player1Wins,
    Player2Wins,
    Draw,
    /// Player 1 crashed or timed out; player 2 takes the win.
    Player1Error,
    /// Player 2 crashed or timed out; player 1 takes the win.
    Player2Error,
    BothError,
}

impl MatchOutcome {
    /// Points awarded as (player 1, player 2).
    pub fn points(self) -> (u32, u32) {
        match self {
            MatchOutcome::Player1Wins | MatchOutcome::Player2Error => (WIN_POINTS, 0),
            MatchOutcome::Player2Wins | MatchOutcome::Player1Error => (0, WIN_POINTS),
            MatchOutcome::Draw => (DRAW_POINTS, DRAW_POINTS),
            MatchOutcome::BothError => (0, 0),
        }
    }

    /// The winning side, if any.
    pub fn winner(self) -> Option<Side> {
        match self {
            MatchOutcome::Player1Wins | MatchOutcome::Player2Error => Some(Side::Player1),
            MatchOutcome::Player2Wins | MatchOutcome::Player1Error => Some(Side::Player2),
            MatchOutcome::Draw | MatchOutcome::BothError => None,
        }
    }

    pub fn is_decisive(self) -> bool {
        self.winner().is_some()
    }

    pub fn is_draw(self) -> bool {
        self == MatchOutcome::Draw
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchOutcome::Player1Wins => "1-0",
            MatchOutcome::Player2Wins => "0-1",
            MatchOutcome::Draw => "1/2",
            MatchOutcome::Player1Error => "err-1",
            MatchOutcome::Player2Error => "1-err",
            MatchOutcome::BothError => "err-err",
        };
        write!(f, "{}", s)
    }
}

/// Immutable record of one played match, produced by a match executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub player1: String,
    pub player2: String,
    pub outcome: MatchOutcome,
    pub player1_score: i64,
    pub player2_score: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    /// Free-form game log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl MatchResult {
    /// Create a result with zero scores and both timestamps set to now.
    pub fn new(player1: impl Into<String>, player2: impl Into<String>, outcome: MatchOutcome) -> Self {
        let now = Utc::now();
        Self {
            player1: player1.into(),
            player2: player2.into(),
            outcome,
            player1_score: 0,
            player2_score: 0,
            started_at: now,
            ended_at: now,
            log: None,
        }
    }

    /// Builder method to set scores.
    pub fn with_scores(mut self, player1_score: i64, player2_score: i64) -> Self {
        self.player1_score = player1_score;
        self.player2_score = player2_score;
        self
    }

    /// Builder method to set the time window.
    pub fn with_times(mut self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.ended_at = ended_at;
        self
    }

    /// Builder method to attach a game log.
    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(&self.player1, &self.player2)
    }

    /// Name of the winning participant, if the outcome is decisive.
    pub fn winner_name(&self) -> Option<&str> {
        match self.outcome.winner()? {
            Side::Player1 => Some(&self.player1),
            Side::Player2 => Some(&self.player2),
        }
    }

    /// Points earned by `name` in this match, or `None` if it did not play.
    pub fn points_for(&self, name: &str) -> Option<u32> {
        let (p1, p2) = self.outcome.points();
        let key = name_key(name);
        if name_key(&self.player1) == key {
            Some(p1)
        } else if name_key(&self.player2) == key {
            Some(p2)
        } else {
            None
        }
    }
}
