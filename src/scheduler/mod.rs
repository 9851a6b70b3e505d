//! Concurrent match scheduler.
//!
//! Runs a batch of pairings on a bounded pool of tokio tasks. Results come
//! back in completion order, are announced to the observer straight away, and
//! are buffered by submission index so the engine only ever sees them in the
//! order they were submitted.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::TournamentConfig;
use crate::engine::{EngineError, GroupStageEngine};
use crate::executor::{ExecutorError, MatchExecutor, MatchRequest};
use crate::models::{MatchResult, Pairing, TournamentEvent, TournamentState};
use crate::observer::{self, EventObserver, ResultLogger};

/// Errors that abort a batch.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Engine error: {0}")]
    Engine(EngineError),

    #[error("Executor error: {0}")]
    Executor(ExecutorError),

    #[error("Batch cancelled")]
    Cancelled,

    #[error("Match worker lost after {recorded} of {total} results")]
    WorkerLost { recorded: usize, total: usize },
}

impl From<EngineError> for SchedulerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Cancelled => SchedulerError::Cancelled,
            other => SchedulerError::Engine(other),
        }
    }
}

impl From<ExecutorError> for SchedulerError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::Cancelled => SchedulerError::Cancelled,
            other => SchedulerError::Executor(other),
        }
    }
}

/// Summary of a finished batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub submitted: usize,
    pub recorded: usize,
    pub duration: Duration,
}

/// Executes pairings with bounded parallelism and feeds results to an engine.
pub struct MatchScheduler {
    executor: Arc<dyn MatchExecutor>,
    config: TournamentConfig,
    observer: Option<Arc<dyn EventObserver>>,
    result_logger: Option<Arc<dyn ResultLogger>>,
}

impl MatchScheduler {
    pub fn new(executor: Arc<dyn MatchExecutor>, config: TournamentConfig) -> Self {
        Self {
            executor,
            config,
            observer: None,
            result_logger: None,
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

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    /// Play `pairings` and record every result in `engine`, in submission
    /// order.
    ///
    /// Returns once all of them are recorded. The first executor error or
    /// cancellation aborts the batch: results already recorded stay, anything
    /// still buffered or in flight is discarded.
    pub async fn run_batch(
        &self,
        engine: &mut GroupStageEngine,
        pairings: Vec<Pairing>,
        cancel: &CancelToken,
    ) -> Result<BatchReport, SchedulerError> {
        let start = Instant::now();
        let total = pairings.len();
        let state = engine.state()?;
        let tournament_id = state.id;
        let game_type = state.game_type.clone();

        if total == 0 {
            return Ok(BatchReport {
                submitted: 0,
                recorded: 0,
                duration: start.elapsed(),
            });
        }

        let parallel = self.config.max_parallel_matches.max(1);
        info!(
            tournament = %tournament_id.short(),
            pairings = total,
            parallel,
            executor = self.executor.name(),
            "Running batch"
        );

        let semaphore = Arc::new(Semaphore::new(parallel));
        let (tx, mut rx) = mpsc::channel::<(usize, Result<MatchResult, ExecutorError>)>(total);
        let move_timeout = self.config.move_timeout();

        for (index, pairing) in pairings.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            let executor = self.executor.clone();
            let cancel = cancel.clone();
            let request = MatchRequest::new(&pairing, game_type.clone(), move_timeout);

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                // The batch already failed or was cancelled.
                if tx.is_closed() || cancel.is_cancelled() {
                    return;
                }
                let result = executor.execute(request, cancel).await;
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut buffer: BTreeMap<usize, MatchResult> = BTreeMap::new();
        let mut next_index = 0;

        while next_index < total {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(recorded = next_index, total, "Batch cancelled");
                    return Err(SchedulerError::Cancelled);
                }
                received = rx.recv() => received,
            };

            let Some((index, outcome)) = received else {
                error!(recorded = next_index, total, "Match workers exited early");
                return Err(SchedulerError::WorkerLost {
                    recorded: next_index,
                    total,
                });
            };

            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!(index, error = %e, "Match execution failed, aborting batch");
                    return Err(e.into());
                }
            };

            observer::publish(
                self.observer.as_ref(),
                &TournamentEvent::match_completed(tournament_id, index, &result),
            );
            buffer.insert(index, result);

            while let Some(result) = buffer.remove(&next_index) {
                let group = engine.group_label(&result.player1).unwrap_or_default();
                engine.record_result(result.clone())?;
                observer::log_result(self.result_logger.as_ref(), &result, &group);

                if self.observer.is_some() {
                    let standings = engine.standings_snapshot()?;
                    observer::publish(
                        self.observer.as_ref(),
                        &TournamentEvent::StandingsUpdated {
                            tournament_id,
                            standings,
                        },
                    );
                }
                next_index += 1;
            }
            debug!(recorded = next_index, buffered = buffer.len(), "Drained results");
        }

        let duration = start.elapsed();
        info!(recorded = total, ?duration, "Batch complete");
        Ok(BatchReport {
            submitted: total,
            recorded: total,
            duration,
        })
    }

    /// Drive an initialized engine through every phase to completion.
    pub async fn run_tournament<'e>(
        &self,
        engine: &'e mut GroupStageEngine,
        cancel: &CancelToken,
    ) -> Result<&'e TournamentState, SchedulerError> {
        while !engine.is_completed() {
            if cancel.is_cancelled() {
                return Err(SchedulerError::Cancelled);
            }
            let pairings = engine.next_pairings()?;
            self.run_batch(engine, pairings, cancel).await?;
            engine.advance(cancel).await?;
        }
        Ok(engine.state()?)
    }
}
