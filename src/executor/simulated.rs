//! Simulated executor producing random outcomes.
//!
//! Stands in for a real game runner in the `simulate` command and in tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{ExecutorError, MatchExecutor, MatchRequest};
use crate::cancel::CancelToken;
use crate::models::{MatchOutcome, MatchResult};

/// Outcome weights for the simulator.
#[derive(Debug, Clone)]
pub struct SimulationProfile {
    /// Probability a match is drawn
    pub draw_rate: f64,

    /// Probability one side errors
    pub error_rate: f64,

    /// Upper bound on simulated match latency
    pub max_latency: Duration,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            draw_rate: 0.15,
            error_rate: 0.02,
            max_latency: Duration::from_millis(20),
        }
    }
}

/// Executor that rolls outcomes and scores from a seeded RNG.
pub struct SimulatedExecutor {
    profile: SimulationProfile,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(profile: SimulationProfile, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            profile,
            rng: Mutex::new(rng),
        }
    }

    /// Roll outcome, scores and latency in one critical section.
    fn roll(&self) -> (MatchOutcome, i64, i64, Duration) {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let roll: f64 = rng.gen();
        let outcome = if roll < self.profile.error_rate {
            match rng.gen_range(0..3) {
                0 => MatchOutcome::Player1Error,
                1 => MatchOutcome::Player2Error,
                _ => MatchOutcome::BothError,
            }
        } else if roll < self.profile.error_rate + self.profile.draw_rate {
            MatchOutcome::Draw
        } else if rng.gen_bool(0.5) {
            MatchOutcome::Player1Wins
        } else {
            MatchOutcome::Player2Wins
        };

        let (p1, p2) = match outcome {
            MatchOutcome::Player1Wins => {
                let loser: i64 = rng.gen_range(0..50);
                (loser + rng.gen_range(1..50), loser)
            }
            MatchOutcome::Player2Wins => {
                let loser: i64 = rng.gen_range(0..50);
                (loser, loser + rng.gen_range(1..50))
            }
            MatchOutcome::Draw => {
                let both: i64 = rng.gen_range(0..50);
                (both, both)
            }
            _ => (0, 0),
        };

        let max_ms = self.profile.max_latency.as_millis() as u64;
        let latency = if max_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.gen_range(0..=max_ms))
        };

        (outcome, p1, p2, latency)
    }
}

#[async_trait]
impl MatchExecutor for SimulatedExecutor {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn execute(
        &self,
        request: MatchRequest,
        cancel: CancelToken,
    ) -> Result<MatchResult, ExecutorError> {
        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        let started_at = Utc::now();
        let (outcome, p1, p2, latency) = self.roll();

        if !latency.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        }

        debug!(
            game = %request.game_type,
            player1 = %request.player1,
            player2 = %request.player2,
            %outcome,
            "Simulated match"
        );

        Ok(
            MatchResult::new(request.player1.name, request.player2.name, outcome)
                .with_scores(p1, p2)
                .with_times(started_at, Utc::now()),
        )
    }
}
