//! Per-tank summary over the most recent readings.

use serde::Serialize;
use tracing::info;

use crate::severity::Severity;
use crate::storage::{AlertRepository, RepositoryError, SensorRepository};
use crate::types::{Metric, Reading};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TankSummary {
    pub tank_id: u32,
    /// Readings the averages were computed over
    pub count: usize,
    pub avg_temperature: Option<f64>,
    pub avg_ph: Option<f64>,
    pub avg_oxygen: Option<f64>,
    pub avg_turbidity: Option<f64>,
    pub open_alerts: usize,
    /// Highest severity among open alerts
    pub worst_open: Option<Severity>,
}

impl TankSummary {
    pub fn average(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Temperature => self.avg_temperature,
            Metric::Ph => self.avg_ph,
            Metric::Oxygen => self.avg_oxygen,
            Metric::Turbidity => self.avg_turbidity,
        }
    }
}

/// Mean rounded to two decimals; `None` for no readings.
fn mean(readings: &[Reading], metric: Metric) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let sum: f64 = readings.iter().map(|r| r.value(metric)).sum();
    let avg = sum / readings.len() as f64;
    Some((avg * 100.0).round() / 100.0)
}

/// Averages over the last `last_n` readings plus open alert counts.
pub fn summarize(
    sensors: &dyn SensorRepository,
    alerts: &dyn AlertRepository,
    tank_id: u32,
    last_n: usize,
) -> Result<TankSummary, RepositoryError> {
    let readings = sensors.recent(tank_id, last_n)?;
    let open = alerts.list_open(tank_id)?;

    let summary = TankSummary {
        tank_id,
        count: readings.len(),
        avg_temperature: mean(&readings, Metric::Temperature),
        avg_ph: mean(&readings, Metric::Ph),
        avg_oxygen: mean(&readings, Metric::Oxygen),
        avg_turbidity: mean(&readings, Metric::Turbidity),
        open_alerts: open.len(),
        worst_open: open.iter().map(|a| a.severity).max(),
    };
    info!(tank_id, count = summary.count, open_alerts = summary.open_alerts, "analytics generated");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use chrono::{Duration, Utc};

    #[test]
    fn empty_tank_has_no_averages() {
        let store = InMemoryStore::new();
        let summary = summarize(&store, &store, 1, 50).unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average(Metric::Oxygen), None);
        assert_eq!(summary.worst_open, None);
    }

    #[test]
    fn averages_are_rounded_and_windowed() {
        let store = InMemoryStore::new();
        let t0 = Utc::now();
        for (i, oxygen) in [10.0, 70.0, 80.0, 90.333].into_iter().enumerate() {
            let at = t0 + Duration::seconds(i as i64 * 30);
            store
                .add(&Reading::new(2, 26.0, 7.0, oxygen, 20.0, at).unwrap())
                .unwrap();
        }
        let summary = summarize(&store, &store, 2, 3).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.avg_oxygen, Some(80.11));
        assert_eq!(summary.avg_ph, Some(7.0));
    }
}
