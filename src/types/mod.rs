//! Core domain types shared across simulation, alerting and feeding.

mod alert;
mod feed;
mod reading;
mod tank;

pub use alert::AlertEvent;
pub use feed::{FeedPlan, FeedStrategy, Meal};
pub use reading::{Metric, Reading, ReadingError};
pub use tank::{MetricProfile, Tank, TankError, TankProfile};
