//! Observer and result-logger sinks.
//!
//! Both sinks are best effort: a failing sink is logged and otherwise ignored,
//! never surfaced to the engine or scheduler.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{MatchResult, TournamentEvent};

/// Errors raised by observer and logger sinks.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Receives progress events (dashboards, live views).
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &TournamentEvent) -> Result<(), ObserverError>;
}

/// Receives every recorded match with the label of the group it was played in.
pub trait ResultLogger: Send + Sync {
    fn log_result(&self, result: &MatchResult, group: &str) -> Result<(), ObserverError>;
}

/// Deliver `event`, swallowing any failure.
pub fn publish(observer: Option<&Arc<dyn EventObserver>>, event: &TournamentEvent) {
    if let Some(observer) = observer {
        if let Err(e) = observer.on_event(event) {
            warn!(event = event.kind(), error = %e, "Observer failed, continuing");
        }
    }
}

/// Log `result`, swallowing any failure.
pub fn log_result(logger: Option<&Arc<dyn ResultLogger>>, result: &MatchResult, group: &str) {
    if let Some(logger) = logger {
        if let Err(e) = logger.log_result(result, group) {
            warn!(
                player1 = %result.player1,
                player2 = %result.player2,
                error = %e,
                "Result logger failed, continuing"
            );
        }
    }
}

/// Observer that writes every event through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl EventObserver for TracingObserver {
    fn on_event(&self, event: &TournamentEvent) -> Result<(), ObserverError> {
        match event {
            TournamentEvent::PhaseStarted {
                tournament_id,
                phase,
                groups,
                pairings,
            } => info!(
                tournament = %tournament_id.short(),
                %phase,
                groups = groups.len(),
                pairings,
                "Phase started"
            ),
            TournamentEvent::MatchCompleted {
                player1,
                player2,
                outcome,
                player1_score,
                player2_score,
                ..
            } => tracing::debug!(
                "{} vs {}: {} ({}-{})",
                player1,
                player2,
                outcome,
                player1_score,
                player2_score
            ),
            TournamentEvent::StandingsUpdated { standings, .. } => {
                if let Some(leader) = standings.iter().find(|s| s.position == 1) {
                    tracing::trace!(
                        leader = %leader.standing.participant,
                        points = leader.standing.points,
                        "Standings updated"
                    );
                }
            }
            TournamentEvent::PhaseAdvanced {
                tournament_id,
                from,
                to,
            } => info!(tournament = %tournament_id.short(), %from, %to, "Phase advanced"),
            TournamentEvent::SuddenDeathResolved {
                winner,
                loser,
                attempts,
                method,
                ..
            } => info!(%winner, %loser, attempts, ?method, "Sudden death resolved"),
            TournamentEvent::TournamentCompleted {
                game_type,
                champion,
                ..
            } => info!(game = %game_type, %champion, "Tournament completed"),
            TournamentEvent::SeriesStepCompleted {
                game_type,
                step,
                total,
                champion,
                ..
            } => info!(game = %game_type, step, total, %champion, "Series step completed"),
            TournamentEvent::SeriesCompleted { champion, .. } => {
                info!(champion = ?champion, "Series completed")
            }
        }
        Ok(())
    }
}
