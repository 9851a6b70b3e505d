//! Series orchestrator.
//!
//! Runs one tournament per game type, strictly one after another, and folds
//! each tournament's final rankings into series-wide totals. The accumulated
//! state sits behind a read/write lock so observers can poll it mid-series.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::config::TournamentConfig;
use crate::engine::{EngineError, GroupStageEngine};
use crate::executor::MatchExecutor;
use crate::models::{GameType, Participant, SeriesState, SeriesStatus, TournamentEvent};
use crate::observer::{self, EventObserver, ResultLogger};
use crate::scheduler::{MatchScheduler, SchedulerError};
use crate::tiebreak;

/// Series errors.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Series already running")]
    AlreadyRunning,

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Runs a full series of tournaments.
pub struct SeriesOrchestrator {
    executor: Arc<dyn MatchExecutor>,
    config: TournamentConfig,
    observer: Option<Arc<dyn EventObserver>>,
    result_logger: Option<Arc<dyn ResultLogger>>,
    state: Arc<RwLock<SeriesState>>,
}

impl SeriesOrchestrator {
    /// Create a new series orchestrator. `config` is the base configuration
    /// every tournament starts from.
    pub fn new(executor: Arc<dyn MatchExecutor>, config: TournamentConfig) -> Self {
        Self {
            executor,
            config,
            observer: None,
            result_logger: None,
            state: Arc::new(RwLock::new(SeriesState::default())),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_result_logger(mut self, logger: Arc<dyn ResultLogger>) -> Self {
        self.result_logger = Some(logger);
        self
    }

    /// Snapshot of the series so far.
    pub async fn state(&self) -> SeriesState {
        self.state.read().await.clone()
    }

    /// Shared handle for observers that poll from another task.
    pub fn state_handle(&self) -> Arc<RwLock<SeriesState>> {
        self.state.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.status == SeriesStatus::Running
    }

    /// Run one tournament per entry of `game_types`, in order.
    pub async fn run_series(
        &self,
        participants: Vec<Participant>,
        game_types: Vec<GameType>,
        cancel: &CancelToken,
    ) -> Result<SeriesState, SeriesError> {
        if game_types.is_empty() {
            return Err(SeriesError::InvalidInput(
                "at least one game type required".to_string(),
            ));
        }

        {
            let mut state = self.state.write().await;
            if state.status == SeriesStatus::Running {
                return Err(SeriesError::AlreadyRunning);
            }
            *state = SeriesState {
                status: SeriesStatus::Running,
                started_at: Some(Utc::now()),
                ..Default::default()
            };
        }

        match self.run_all(participants, &game_types, cancel).await {
            Ok(()) => Ok(self.state().await),
            Err(e) => {
                error!(error = %e, "Series failed");
                let mut state = self.state.write().await;
                state.status = SeriesStatus::Failed;
                state.completed_at = Some(Utc::now());
                Err(e)
            }
        }
    }

    async fn run_all(
        &self,
        participants: Vec<Participant>,
        game_types: &[GameType],
        cancel: &CancelToken,
    ) -> Result<(), SeriesError> {
        let series_id = self.state.read().await.id;
        let total = game_types.len();
        info!(
            series = %series_id.short(),
            participants = participants.len(),
            tournaments = total,
            "Starting series"
        );

        for (step, game_type) in game_types.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Series cancelled");
                return Err(SchedulerError::Cancelled.into());
            }

            let config = self.tournament_config(step);
            let mut engine = GroupStageEngine::new(self.executor.clone());
            if let Some(observer) = &self.observer {
                engine = engine.with_observer(observer.clone());
            }
            if let Some(logger) = &self.result_logger {
                engine = engine.with_result_logger(logger.clone());
            }
            engine.initialize(participants.clone(), game_type.clone(), &config)?;

            let mut scheduler = MatchScheduler::new(self.executor.clone(), config);
            if let Some(observer) = &self.observer {
                scheduler = scheduler.with_observer(observer.clone());
            }
            if let Some(logger) = &self.result_logger {
                scheduler = scheduler.with_result_logger(logger.clone());
            }

            let tournament = scheduler.run_tournament(&mut engine, cancel).await?.clone();
            let rankings = engine.final_rankings()?;
            let champion = tournament.champion.clone().unwrap_or_default();

            self.state.write().await.fold_tournament(tournament, &rankings);

            info!(
                game = %game_type,
                step = step + 1,
                total,
                %champion,
                "Series step completed"
            );
            observer::publish(
                self.observer.as_ref(),
                &TournamentEvent::SeriesStepCompleted {
                    series_id,
                    game_type: game_type.clone(),
                    step: step + 1,
                    total,
                    champion,
                },
            );
        }

        let champion = {
            let mut state = self.state.write().await;
            let scores = state.score_map();
            if tiebreak::is_top_tied(&scores) {
                let tied = tiebreak::detect_ties(&scores);
                warn!(
                    tied = ?tied.first(),
                    "Series top score tied, decided by secondary keys"
                );
            }
            state.finish()
        };

        info!(series = %series_id.short(), champion = ?champion, "Series completed");
        observer::publish(
            self.observer.as_ref(),
            &TournamentEvent::SeriesCompleted {
                series_id,
                champion,
            },
        );
        Ok(())
    }

    /// Per-tournament config. A seeded base gives each step its own
    /// reproducible seed.
    fn tournament_config(&self, step: usize) -> TournamentConfig {
        TournamentConfig {
            seed: self.config.seed.map(|seed| seed.wrapping_add(step as u64)),
            ..self.config.clone()
        }
    }
}
