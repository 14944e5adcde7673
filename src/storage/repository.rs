//! Repository traits: pluggable storage backends for the core.
//!
//! The simulation, alerting and feeding code only ever talks to these
//! traits, so backends can be swapped without touching them:
//! - `InMemoryStore`: RwLock-guarded vectors for tests and ephemeral runs
//! - `SledStore`: embedded key-value store for the daemon
//!
//! Implementations must be thread-safe (Send + Sync) for shared access
//! across tasks and worker threads. No implementation retries; failures are
//! returned to the caller as-is.

use chrono::{DateTime, Utc};

use crate::types::{AlertEvent, FeedPlan, Metric, Reading, Tank};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e.to_string())
    }
}

impl From<sled::Error> for RepositoryError {
    fn from(e: sled::Error) -> Self {
        RepositoryError::Storage(e.to_string())
    }
}

/// Registered tanks.
pub trait TankRepository: Send + Sync {
    fn get(&self, tank_id: u32) -> Result<Option<Tank>, RepositoryError>;

    /// All tanks ordered by id.
    fn list(&self) -> Result<Vec<Tank>, RepositoryError>;

    /// Insert or replace by id.
    fn upsert(&self, tank: &Tank) -> Result<(), RepositoryError>;
}

/// Sensor reading history.
pub trait SensorRepository: Send + Sync {
    fn add(&self, reading: &Reading) -> Result<(), RepositoryError>;

    /// Most recent reading of a tank, by timestamp.
    fn latest(&self, tank_id: u32) -> Result<Option<Reading>, RepositoryError>;

    /// Up to `limit` most recent readings, newest first.
    fn recent(&self, tank_id: u32, limit: usize) -> Result<Vec<Reading>, RepositoryError>;
}

/// Alert records.
pub trait AlertRepository: Send + Sync {
    /// Persist a new alert and return it with its assigned id.
    fn save(&self, alert: &AlertEvent) -> Result<AlertEvent, RepositoryError>;

    /// Unresolved alerts of a tank, oldest first.
    fn list_open(&self, tank_id: u32) -> Result<Vec<AlertEvent>, RepositoryError>;

    /// Resolve every open alert for `(tank_id, metric)`; returns how many.
    fn resolve_open(
        &self,
        tank_id: u32,
        metric: Metric,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;
}

/// Feed recommendations.
pub trait FeedPlanRepository: Send + Sync {
    fn save(&self, plan: &FeedPlan) -> Result<(), RepositoryError>;

    fn latest(&self, tank_id: u32) -> Result<Option<FeedPlan>, RepositoryError>;
}
