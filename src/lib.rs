//! # Bot Tournament
//!
//! Group-stage tournament engine for bot competitions.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (participants, matches, standings, tournament and series state)
//! - **tiebreak**: Pure helpers over name → score maps
//! - **engine**: Phase state machine, tie-break chain and sudden death
//! - **scheduler**: Bounded-parallel match execution with in-order recording
//! - **series**: Sequential tournaments aggregated into one champion
//! - **executor**: Match execution boundary and a simulated executor
//! - **observer**: Event and result sinks
//! - **storage**: JSONL result log
//! - **config**: Configuration loading and validation

pub mod cancel;
pub mod config;
pub mod engine;
pub mod executor;
pub mod models;
pub mod observer;
pub mod scheduler;
pub mod series;
pub mod storage;
pub mod tiebreak;

pub use cancel::CancelToken;
pub use engine::{EngineError, GroupStageEngine};
pub use executor::{ExecutorError, MatchExecutor, MatchRequest};
pub use models::*;
pub use scheduler::{BatchReport, MatchScheduler, SchedulerError};
pub use series::{SeriesError, SeriesOrchestrator};
