//! Sled-backed repositories.
//!
//! One tree per record kind, JSON values. Keys are big-endian so sled's
//! byte ordering is also chronological:
//! - `tanks`: tank id
//! - `readings`: tank id ++ timestamp millis ++ sequence
//! - `alerts`: sled-generated id
//! - `open_alerts`: tank id ++ metric ++ alert id, empty value; an entry
//!   exists exactly while the alert is unresolved
//! - `feed_plans`: tank id ++ created_at millis ++ sequence
//!
//! The sequence is a sled-generated id, so two records stamped in the same
//! millisecond are both kept. Alert writes touch `alerts` and `open_alerts`
//! in one transaction.
//!
//! Writes are not flushed individually. Sled flushes in the background; on
//! crash at most the last few writes are lost, which the monitoring loop
//! regenerates on the next ticks anyway.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::Transactional;

use super::repository::{
    AlertRepository, FeedPlanRepository, RepositoryError, SensorRepository, TankRepository,
};
use crate::types::{AlertEvent, FeedPlan, Metric, Reading, Tank};

#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
    tanks: sled::Tree,
    readings: sled::Tree,
    alerts: sled::Tree,
    open_alerts: sled::Tree,
    plans: sled::Tree,
}

impl SledStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Throwaway store that is deleted on drop.
    pub fn temporary() -> Result<Self, RepositoryError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, RepositoryError> {
        Ok(Self {
            tanks: db.open_tree("tanks")?,
            readings: db.open_tree("readings")?,
            alerts: db.open_tree("alerts")?,
            open_alerts: db.open_tree("open_alerts")?,
            plans: db.open_tree("feed_plans")?,
            db: Arc::new(db),
        })
    }

    /// Drop every record of every kind.
    pub fn clear(&self) -> Result<(), RepositoryError> {
        for tree in [
            &self.tanks,
            &self.readings,
            &self.alerts,
            &self.open_alerts,
            &self.plans,
        ] {
            tree.clear()?;
        }
        Ok(())
    }

    pub fn reading_count(&self) -> usize {
        self.readings.len()
    }

    /// Number of unresolved alerts across all tanks.
    pub fn open_alert_count(&self) -> usize {
        self.open_alerts.len()
    }

    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), RepositoryError> {
        self.db.flush()?;
        Ok(())
    }

    fn tank_time_key(&self, tank_id: u32, at: DateTime<Utc>) -> Result<[u8; 20], RepositoryError> {
        let mut key = [0u8; 20];
        key[..4].copy_from_slice(&tank_id.to_be_bytes());
        key[4..12].copy_from_slice(&time_key(at));
        key[12..].copy_from_slice(&self.db.generate_id()?.to_be_bytes());
        Ok(key)
    }
}

/// Order-preserving encoding of a signed millisecond timestamp.
fn time_key(at: DateTime<Utc>) -> [u8; 8] {
    ((at.timestamp_millis() as u64) ^ (1 << 63)).to_be_bytes()
}

fn open_key(tank_id: u32, metric: Metric, id: u64) -> [u8; 13] {
    let mut key = [0u8; 13];
    key[..4].copy_from_slice(&tank_id.to_be_bytes());
    key[4] = metric.index() as u8;
    key[5..].copy_from_slice(&id.to_be_bytes());
    key
}

/// Alert id stored in the tail of an `open_alerts` key.
fn open_key_id(key: &[u8]) -> Option<u64> {
    let tail: [u8; 8] = key.get(5..13)?.try_into().ok()?;
    Some(u64::from_be_bytes(tail))
}

fn decode<T: DeserializeOwned>(value: &[u8]) -> Result<T, RepositoryError> {
    Ok(serde_json::from_slice(value)?)
}

fn from_transaction(e: TransactionError<RepositoryError>) -> RepositoryError {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => e.into(),
    }
}

impl TankRepository for SledStore {
    fn get(&self, tank_id: u32) -> Result<Option<Tank>, RepositoryError> {
        self.tanks
            .get(tank_id.to_be_bytes())?
            .map(|v| decode(&v))
            .transpose()
    }

    fn list(&self) -> Result<Vec<Tank>, RepositoryError> {
        self.tanks
            .iter()
            .map(|item| {
                let (_key, value) = item?;
                decode(&value)
            })
            .collect()
    }

    fn upsert(&self, tank: &Tank) -> Result<(), RepositoryError> {
        let value = serde_json::to_vec(tank)?;
        self.tanks.insert(tank.id.to_be_bytes(), value)?;
        Ok(())
    }
}

impl SensorRepository for SledStore {
    fn add(&self, reading: &Reading) -> Result<(), RepositoryError> {
        let key = self.tank_time_key(reading.tank_id(), reading.timestamp())?;
        let value = serde_json::to_vec(reading)?;
        self.readings.insert(key, value)?;
        Ok(())
    }

    fn latest(&self, tank_id: u32) -> Result<Option<Reading>, RepositoryError> {
        match self.readings.scan_prefix(tank_id.to_be_bytes()).next_back() {
            Some(item) => {
                let (_key, value) = item?;
                decode(&value).map(Some)
            }
            None => Ok(None),
        }
    }

    fn recent(&self, tank_id: u32, limit: usize) -> Result<Vec<Reading>, RepositoryError> {
        self.readings
            .scan_prefix(tank_id.to_be_bytes())
            .rev()
            .take(limit)
            .map(|item| {
                let (_key, value) = item?;
                decode(&value)
            })
            .collect()
    }
}

impl AlertRepository for SledStore {
    fn save(&self, alert: &AlertEvent) -> Result<AlertEvent, RepositoryError> {
        let id = self.db.generate_id()?;
        let mut stored = alert.clone();
        stored.id = Some(id);
        let value = serde_json::to_vec(&stored)?;
        let index = stored
            .is_open()
            .then(|| open_key(stored.tank_id, stored.metric, id));

        let result: TransactionResult<(), RepositoryError> = (&self.alerts, &self.open_alerts)
            .transaction(|(alerts, open)| {
                alerts.insert(&id.to_be_bytes()[..], value.clone())?;
                if let Some(key) = index {
                    open.insert(&key[..], Vec::<u8>::new())?;
                }
                Ok(())
            });
        result.map_err(from_transaction)?;
        Ok(stored)
    }

    fn list_open(&self, tank_id: u32) -> Result<Vec<AlertEvent>, RepositoryError> {
        let mut open = Vec::new();
        for item in self.open_alerts.scan_prefix(tank_id.to_be_bytes()) {
            let (key, _) = item?;
            let Some(id) = open_key_id(&key) else {
                continue;
            };
            if let Some(value) = self.alerts.get(id.to_be_bytes())? {
                open.push(decode::<AlertEvent>(&value)?);
            }
        }
        // Index order is per metric; ids are monotonic, so this is age order
        open.sort_by_key(|a| a.id);
        Ok(open)
    }

    fn resolve_open(
        &self,
        tank_id: u32,
        metric: Metric,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut prefix = [0u8; 5];
        prefix[..4].copy_from_slice(&tank_id.to_be_bytes());
        prefix[4] = metric.index() as u8;

        let mut resolved = 0;
        for item in self.open_alerts.scan_prefix(prefix) {
            let (key, _) = item?;
            let Some(id) = open_key_id(&key) else {
                continue;
            };
            // Another writer may resolve the same alert; only one counts it.
            let result: TransactionResult<bool, RepositoryError> = (&self.alerts, &self.open_alerts)
                .transaction(|(alerts, open)| {
                    let Some(value) = alerts.get(&id.to_be_bytes()[..])? else {
                        open.remove(&key[..])?;
                        return Ok(false);
                    };
                    let mut alert: AlertEvent =
                        decode(&value).map_err(ConflictableTransactionError::Abort)?;
                    let changed = alert.resolve(at);
                    if changed {
                        let updated = serde_json::to_vec(&alert)
                            .map_err(|e| ConflictableTransactionError::Abort(e.into()))?;
                        alerts.insert(&id.to_be_bytes()[..], updated)?;
                    }
                    open.remove(&key[..])?;
                    Ok(changed)
                });
            if result.map_err(from_transaction)? {
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}

impl FeedPlanRepository for SledStore {
    fn save(&self, plan: &FeedPlan) -> Result<(), RepositoryError> {
        let key = self.tank_time_key(plan.tank_id, plan.created_at)?;
        self.plans.insert(key, serde_json::to_vec(plan)?)?;
        Ok(())
    }

    fn latest(&self, tank_id: u32) -> Result<Option<FeedPlan>, RepositoryError> {
        match self.plans.scan_prefix(tank_id.to_be_bytes()).next_back() {
            Some(item) => {
                let (_key, value) = item?;
                decode(&value).map(Some)
            }
            None => Ok(None),
        }
    }
}
