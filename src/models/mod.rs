//! Core data models for the tournament engine.

mod events;
mod ids;
mod matches;
mod participant;
mod series;
mod standing;
mod tournament;

pub use events::*;
pub use ids::*;
pub use matches::*;
pub use participant::*;
pub use series::*;
pub use standing::*;
pub use tournament::*;
