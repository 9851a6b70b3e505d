//! Match execution boundary.
//!
//! The engine never plays a game itself; it hands a pairing to a
//! `MatchExecutor` and scores whatever `MatchResult` comes back. Bot loading,
//! sandboxing and game rules all live behind this trait.

pub mod simulated;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::models::{GameType, MatchResult, Pairing, Participant};

/// Errors a match executor can raise.
///
/// A bot crashing or timing out is not an error here: that is reported as an
/// `*Error` outcome inside an `Ok(MatchResult)`.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Match execution failed: {0}")]
    Failed(String),

    #[error("Match timed out after {0:?}")]
    Timeout(Duration),

    #[error("Match cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything an executor needs to play one match.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub player1: Participant,
    pub player2: Participant,
    pub game_type: GameType,

    /// Per-move limit, enforced by the executor
    pub move_timeout: Duration,
}

impl MatchRequest {
    pub fn new(pairing: &Pairing, game_type: GameType, move_timeout: Duration) -> Self {
        Self {
            player1: pairing.player1.clone(),
            player2: pairing.player2.clone(),
            game_type,
            move_timeout,
        }
    }
}

/// Plays a single match between two participants.
#[async_trait]
pub trait MatchExecutor: Send + Sync {
    /// Executor identifier for logging.
    fn name(&self) -> &'static str;

    /// Play the match. Implementations should return promptly with
    /// `ExecutorError::Cancelled` once `cancel` fires.
    async fn execute(
        &self,
        request: MatchRequest,
        cancel: CancelToken,
    ) -> Result<MatchResult, ExecutorError>;
}
