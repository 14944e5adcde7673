//! In-memory repositories for tests and ephemeral runs.
//!
//! Thread-safe via `RwLock`. Not durable, data lost on restart.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::repository::{
    AlertRepository, FeedPlanRepository, RepositoryError, SensorRepository, TankRepository,
};
use crate::types::{AlertEvent, FeedPlan, Metric, Reading, Tank};

/// Readings kept before the oldest are evicted.
const MAX_READINGS: usize = 200_000;

/// Feed plans kept before the oldest are evicted.
const MAX_PLANS: usize = 10_000;

pub struct InMemoryStore {
    tanks: RwLock<Vec<Tank>>,
    readings: RwLock<VecDeque<Reading>>,
    alerts: RwLock<Vec<AlertEvent>>,
    plans: RwLock<VecDeque<FeedPlan>>,
    next_alert_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tanks: RwLock::new(Vec::new()),
            readings: RwLock::new(VecDeque::new()),
            alerts: RwLock::new(Vec::new()),
            plans: RwLock::new(VecDeque::new()),
            next_alert_id: AtomicU64::new(1),
        }
    }

    /// Store pre-populated with `tanks`.
    pub fn with_tanks(tanks: impl IntoIterator<Item = Tank>) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.tanks.write() {
            guard.extend(tanks);
            guard.sort_by_key(|t| t.id);
        }
        store
    }

    /// Every alert ever saved, open or not.
    pub fn all_alerts(&self) -> Result<Vec<AlertEvent>, RepositoryError> {
        let alerts = self
            .alerts
            .read()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(alerts.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TankRepository for InMemoryStore {
    fn get(&self, tank_id: u32) -> Result<Option<Tank>, RepositoryError> {
        let tanks = self
            .tanks
            .read()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(tanks.iter().find(|t| t.id == tank_id).cloned())
    }

    fn list(&self) -> Result<Vec<Tank>, RepositoryError> {
        let tanks = self
            .tanks
            .read()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(tanks.clone())
    }

    fn upsert(&self, tank: &Tank) -> Result<(), RepositoryError> {
        let mut tanks = self
            .tanks
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        match tanks.iter_mut().find(|t| t.id == tank.id) {
            Some(existing) => *existing = tank.clone(),
            None => {
                tanks.push(tank.clone());
                tanks.sort_by_key(|t| t.id);
            }
        }
        Ok(())
    }
}

impl SensorRepository for InMemoryStore {
    fn add(&self, reading: &Reading) -> Result<(), RepositoryError> {
        let mut readings = self
            .readings
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        readings.push_back(*reading);

        // Evict oldest if over limit
        if readings.len() > MAX_READINGS {
            readings.pop_front();
        }
        Ok(())
    }

    fn latest(&self, tank_id: u32) -> Result<Option<Reading>, RepositoryError> {
        let readings = self
            .readings
            .read()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(readings
            .iter()
            .filter(|r| r.tank_id() == tank_id)
            .max_by_key(|r| r.timestamp())
            .copied())
    }

    fn recent(&self, tank_id: u32, limit: usize) -> Result<Vec<Reading>, RepositoryError> {
        let readings = self
            .readings
            .read()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let mut out: Vec<Reading> = readings
            .iter()
            .filter(|r| r.tank_id() == tank_id)
            .copied()
            .collect();
        out.sort_by_key(|r| std::cmp::Reverse(r.timestamp()));
        out.truncate(limit);
        Ok(out)
    }
}

impl AlertRepository for InMemoryStore {
    fn save(&self, alert: &AlertEvent) -> Result<AlertEvent, RepositoryError> {
        let mut alerts = self
            .alerts
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let mut stored = alert.clone();
        stored.id = Some(self.next_alert_id.fetch_add(1, Ordering::Relaxed));
        alerts.push(stored.clone());
        Ok(stored)
    }

    fn list_open(&self, tank_id: u32) -> Result<Vec<AlertEvent>, RepositoryError> {
        let alerts = self
            .alerts
            .read()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(alerts
            .iter()
            .filter(|a| a.tank_id == tank_id && a.is_open())
            .cloned()
            .collect())
    }

    fn resolve_open(
        &self,
        tank_id: u32,
        metric: Metric,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut alerts = self
            .alerts
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let mut resolved = 0;
        for alert in alerts
            .iter_mut()
            .filter(|a| a.tank_id == tank_id && a.metric == metric)
        {
            if alert.resolve(at) {
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}

impl FeedPlanRepository for InMemoryStore {
    fn save(&self, plan: &FeedPlan) -> Result<(), RepositoryError> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        plans.push_back(plan.clone());
        if plans.len() > MAX_PLANS {
            plans.pop_front();
        }
        Ok(())
    }

    fn latest(&self, tank_id: u32) -> Result<Option<FeedPlan>, RepositoryError> {
        let plans = self
            .plans
            .read()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(plans.iter().rev().find(|p| p.tank_id == tank_id).cloned())
    }
}
