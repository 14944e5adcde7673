//! Hysteresis alerting.
//!
//! Per (tank, metric) the state is the severity of the last reading this
//! monitor processed for that tank, in processing order. Alerts are raised
//! only when the severity changes to a degraded level and are resolved when
//! the metric classifies NORMAL again, so an uninterrupted degraded run
//! produces one alert per level entered rather than one per reading.
//!
//! Escalation WARNING -> CRITICAL raises a second alert; both stay open until
//! the metric recovers. A tank the monitor has not seen yet starts from its
//! open alerts (the newest open alert per metric gives its severity), and
//! from NORMAL when it has none, so a restart picks up where the previous
//! process left off regardless of stored reading timestamps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::severity::{classify_metric, reported_threshold, Severity, ThresholdConfig};
use crate::storage::{AlertRepository, RepositoryError, SensorRepository};
use crate::types::{AlertEvent, Metric, Reading};

/// What a severity transition asks the monitor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    /// Metric is back to NORMAL
    Resolve,
    /// Entered a degraded level
    Raise,
    /// Same degraded level as before
    Hold,
}

/// Pure transition function of the alerting state machine.
pub fn transition(previous: Severity, current: Severity) -> AlertAction {
    match current {
        Severity::Normal => AlertAction::Resolve,
        _ if current != previous => AlertAction::Raise,
        _ => AlertAction::Hold,
    }
}

/// Result of processing one reading.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorOutcome {
    pub raised: Vec<AlertEvent>,
    pub resolved: usize,
    pub severity: Severity,
}

/// Human-readable alert text.
pub fn describe(metric: Metric, value: f64, threshold: f64, severity: Severity) -> String {
    match metric {
        Metric::Oxygen => format!(
            "Dissolved oxygen below minimum ({value:.1}% < {threshold}%). Severity: {severity}"
        ),
        Metric::Turbidity => {
            format!("Turbidity above limit ({value:.1} NTU > {threshold}). Severity: {severity}")
        }
        Metric::Temperature => format!(
            "Temperature outside the ideal range (limit {threshold} °C). Measured: {value:.1} °C. Severity: {severity}"
        ),
        Metric::Ph => format!(
            "pH outside the ideal range (limit {threshold}). Measured: {value:.2}. Severity: {severity}"
        ),
    }
}

/// Last processed severity per metric, `None` until seeded.
type SeveritySlot = Arc<Mutex<Option<[Severity; 4]>>>;

pub struct AlertMonitor {
    thresholds: ThresholdConfig,
    sensors: Arc<dyn SensorRepository>,
    alerts: Arc<dyn AlertRepository>,
    last_seen: RwLock<HashMap<u32, SeveritySlot>>,
}

impl AlertMonitor {
    pub fn new(
        thresholds: ThresholdConfig,
        sensors: Arc<dyn SensorRepository>,
        alerts: Arc<dyn AlertRepository>,
    ) -> Self {
        Self {
            thresholds,
            sensors,
            alerts,
            last_seen: RwLock::new(HashMap::new()),
        }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Apply the transition rule to each metric of `reading`, then persist
    /// the reading.
    ///
    /// Alert changes are written before the reading and the tracked severity
    /// only advances once its alert change is stored, so a failed save is
    /// retried by the next reading instead of being lost. Readings for one
    /// tank are serialized; different tanks proceed in parallel.
    /// Repository errors are returned as-is; nothing is retried here.
    pub fn process(&self, reading: &Reading) -> Result<MonitorOutcome, RepositoryError> {
        let tank_id = reading.tank_id();
        let slot = self.slot(tank_id);
        let mut tracked = lock_tracked(&slot, tank_id);
        let before = match *tracked {
            Some(seen) => seen,
            None => self.severities_from_open_alerts(tank_id)?,
        };
        let mut seen = before;

        let mut outcome = MonitorOutcome::default();
        let now = Utc::now();

        for metric in Metric::ALL {
            let current = classify_metric(reading, metric, &self.thresholds);
            outcome.severity = outcome.severity.max(current);

            match transition(before[metric.index()], current) {
                AlertAction::Resolve => {
                    let n = self.alerts.resolve_open(tank_id, metric, now)?;
                    if n > 0 {
                        info!(tank_id, metric = %metric, resolved = n, "alerts resolved");
                    }
                    outcome.resolved += n;
                }
                AlertAction::Raise => {
                    let value = reading.value(metric);
                    let threshold =
                        reported_threshold(metric, value, self.thresholds.for_metric(metric));
                    let alert = AlertEvent {
                        id: None,
                        tank_id,
                        metric,
                        severity: current,
                        value,
                        threshold,
                        description: describe(metric, value, threshold, current),
                        created_at: now,
                        resolved_at: None,
                    };
                    let saved = self.alerts.save(&alert)?;
                    warn!(
                        tank_id,
                        metric = %metric,
                        severity = %current,
                        value = format_args!("{value:.3}"),
                        threshold,
                        "alert raised"
                    );
                    outcome.raised.push(saved);
                }
                AlertAction::Hold => {}
            }

            seen[metric.index()] = current;
            *tracked = Some(seen);
        }

        self.sensors.add(reading)?;
        debug!(tank_id, ts = %reading.timestamp(), "reading saved");
        Ok(outcome)
    }

    /// Severity the monitor currently tracks for `(tank_id, metric)`, if the
    /// tank has been processed or reconciled.
    pub fn tracked_severity(&self, tank_id: u32, metric: Metric) -> Option<Severity> {
        let slot = self.read_map().get(&tank_id).cloned()?;
        let tracked = lock_tracked(&slot, tank_id);
        tracked.map(|seen| seen[metric.index()])
    }

    fn severities_from_open_alerts(&self, tank_id: u32) -> Result<[Severity; 4], RepositoryError> {
        let mut seen = [Severity::Normal; 4];
        // Oldest first, so the newest open alert of a metric wins
        for alert in self.alerts.list_open(tank_id)? {
            seen[alert.metric.index()] = alert.severity;
        }
        Ok(seen)
    }

    fn slot(&self, tank_id: u32) -> SeveritySlot {
        if let Some(slot) = self.read_map().get(&tank_id) {
            return Arc::clone(slot);
        }
        let mut map = self
            .last_seen
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(tank_id).or_default())
    }

    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<u32, SeveritySlot>> {
        self.last_seen
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve open alerts whose metric is NORMAL in the tank's latest
    /// reading. Covers alerts left open by a crash or by a reading that was
    /// stored without going through [`AlertMonitor::process`].
    ///
    /// A resolved metric is tracked as NORMAL afterwards, so the next
    /// degraded reading opens a fresh alert.
    pub fn reconcile(&self, tank_ids: &[u32], at: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut resolved = 0;
        for &tank_id in tank_ids {
            let Some(latest) = self.sensors.latest(tank_id)? else {
                continue;
            };
            let slot = self.slot(tank_id);
            let mut tracked = lock_tracked(&slot, tank_id);

            let open = self.alerts.list_open(tank_id)?;
            let mut metrics: Vec<Metric> = open.iter().map(|a| a.metric).collect();
            metrics.sort_unstable();
            metrics.dedup();

            for metric in metrics {
                if classify_metric(&latest, metric, &self.thresholds) != Severity::Normal {
                    continue;
                }
                resolved += self.alerts.resolve_open(tank_id, metric, at)?;
                if let Some(seen) = tracked.as_mut() {
                    seen[metric.index()] = Severity::Normal;
                }
            }
        }
        if resolved > 0 {
            info!(resolved, "reconciliation resolved stale alerts");
        }
        Ok(resolved)
    }
}

fn lock_tracked(slot: &Mutex<Option<[Severity; 4]>>, tank_id: u32) -> MutexGuard<'_, Option<[Severity; 4]>> {
    slot.lock().unwrap_or_else(|poisoned| {
        warn!(tank_id, "alert state lock poisoned, recovering");
        poisoned.into_inner()
    })
}
