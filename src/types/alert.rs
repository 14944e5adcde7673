//! Alert records produced by the alerting state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::Metric;
use crate::severity::Severity;

/// A water-quality alert for one metric of one tank.
///
/// `id` is assigned by the alert repository on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    #[serde(default)]
    pub id: Option<u64>,
    pub tank_id: u32,
    pub metric: Metric,
    pub severity: Severity,
    pub value: f64,
    pub threshold: f64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertEvent {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Mark resolved; already-resolved alerts keep their original timestamp.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> bool {
        if self.resolved_at.is_some() {
            return false;
        }
        self.resolved_at = Some(at);
        true
    }
}
