//! Environmental simulation: per-tank water state advanced tick by tick.
//!
//! - `events`: feeding, aerator failure and water renewal, plus the scheduler
//! - `state`: per-tank state store, one lock per tank
//! - `engine`: the tick itself

pub mod engine;
pub mod events;
pub mod state;

pub use engine::SimulationEngine;
pub use events::{Event, EventKind, EventScheduler};
pub use state::{SimulationState, TankStateStore};
