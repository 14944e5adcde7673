//! AquaWatch: aquaculture water-quality monitoring and feed planning.
//!
//! ## Architecture
//!
//! - **Simulation**: per-tank environmental model producing bounded readings
//! - **Severity**: stateless classification against operational/critical bands
//! - **Alerting**: hysteresis state machine over severity transitions
//! - **Feeding**: genetic dosage search, environment score and meal plans
//! - **Storage**: repository traits with in-memory and sled backends
//! - **Pipeline**: async tick loop wiring the above together

pub mod alerting;
pub mod analytics;
pub mod config;
pub mod feeding;
pub mod pipeline;
pub mod severity;
pub mod simulation;
pub mod storage;
pub mod types;

pub use config::AquaConfig;
pub use severity::{Severity, ThresholdConfig};
pub use types::{AlertEvent, FeedPlan, Metric, Reading, Tank, TankProfile};
