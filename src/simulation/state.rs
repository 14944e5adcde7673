//! Per-tank simulation state and the store that owns it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rand::rngs::StdRng;
use serde::Serialize;
use tracing::warn;

use super::events::Event;
use crate::types::{Metric, TankProfile};

/// Current metric values and slow-moving accumulators for one tank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationState {
    pub temperature: f64,
    pub ph: f64,
    pub oxygen: f64,
    pub turbidity: f64,
    pub tick: u64,
    /// Organic load in [0, max], raises turbidity and consumes oxygen
    pub bio_load: f64,
    /// Day index of the last daily event roll
    pub last_event_day: Option<i64>,
}

impl SimulationState {
    /// State at the profile baseline, tick 0.
    pub fn at_baseline(profile: &TankProfile, bio_load: f64) -> Self {
        Self {
            temperature: profile.temperature.base,
            ph: profile.ph.base,
            oxygen: profile.oxygen.base,
            turbidity: profile.turbidity.base,
            tick: 0,
            bio_load,
            last_event_day: None,
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Ph => self.ph,
            Metric::Oxygen => self.oxygen,
            Metric::Turbidity => self.turbidity,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::Temperature => self.temperature = value,
            Metric::Ph => self.ph = value,
            Metric::Oxygen => self.oxygen = value,
            Metric::Turbidity => self.turbidity = value,
        }
    }
}

/// Everything the engine keeps for one tank between ticks.
#[derive(Debug)]
pub struct TankSim {
    pub profile: TankProfile,
    pub state: SimulationState,
    pub events: Vec<Event>,
    pub rng: StdRng,
}

type Slot = Arc<Mutex<TankSim>>;

/// Tank id -> simulation slot. Each tank sits behind its own mutex so
/// different tanks can step in parallel; the outer lock is held only long
/// enough to find or insert a slot.
#[derive(Default)]
pub struct TankStateStore {
    tanks: RwLock<HashMap<u32, Slot>>,
}

impl TankStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `tank_id`, created with `init` on first use.
    pub fn slot_or_insert_with(&self, tank_id: u32, init: impl FnOnce() -> TankSim) -> Slot {
        if let Some(slot) = self.read_map().get(&tank_id) {
            return Arc::clone(slot);
        }
        let mut map = self.write_map();
        Arc::clone(
            map.entry(tank_id)
                .or_insert_with(|| Arc::new(Mutex::new(init()))),
        )
    }

    /// Copy of the current state, if the tank has stepped at least once.
    pub fn snapshot(&self, tank_id: u32) -> Option<SimulationState> {
        let slot = self.read_map().get(&tank_id).cloned()?;
        let sim = lock_slot(&slot, tank_id);
        Some(sim.state)
    }

    pub fn active_events(&self, tank_id: u32) -> Vec<Event> {
        let Some(slot) = self.read_map().get(&tank_id).cloned() else {
            return Vec::new();
        };
        let sim = lock_slot(&slot, tank_id);
        sim.events.clone()
    }

    /// Forget a tank; its next step starts again from the baseline.
    pub fn reset(&self, tank_id: u32) -> bool {
        self.write_map().remove(&tank_id).is_some()
    }

    pub fn clear(&self) {
        self.write_map().clear();
    }

    pub fn tank_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.read_map().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u32, Slot>> {
        self.tanks.read().unwrap_or_else(|poisoned| {
            warn!("tank state map lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u32, Slot>> {
        self.tanks.write().unwrap_or_else(|poisoned| {
            warn!("tank state map lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Lock one tank. A panic mid-step leaves values that are still clamped on
/// the next step, so the state is reused rather than discarded.
pub(crate) fn lock_slot(slot: &Mutex<TankSim>, tank_id: u32) -> MutexGuard<'_, TankSim> {
    slot.lock().unwrap_or_else(|poisoned| {
        warn!(tank_id, "tank state lock poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sim(tank_id: u32) -> TankSim {
        let profile = TankProfile::for_tank(tank_id);
        TankSim {
            state: SimulationState::at_baseline(&profile, 0.1),
            profile,
            events: Vec::new(),
            rng: StdRng::seed_from_u64(u64::from(tank_id)),
        }
    }

    #[test]
    fn init_runs_once_per_tank() {
        let store = TankStateStore::new();
        let a = store.slot_or_insert_with(1, || sim(1));
        lock_slot(&a, 1).state.tick = 7;

        let b = store.slot_or_insert_with(1, || panic!("already initialized"));
        assert_eq!(lock_slot(&b, 1).state.tick, 7);
        assert_eq!(store.snapshot(1).unwrap().tick, 7);
        assert!(store.snapshot(2).is_none());
    }

    #[test]
    fn reset_forgets_tank() {
        let store = TankStateStore::new();
        store.slot_or_insert_with(3, || sim(3));
        store.slot_or_insert_with(1, || sim(1));
        assert_eq!(store.tank_ids(), vec![1, 3]);
        assert!(store.reset(3));
        assert!(!store.reset(3));
        assert_eq!(store.tank_ids(), vec![1]);
    }

    #[test]
    fn baseline_state_matches_profile() {
        let profile = TankProfile::for_tank(2);
        let state = SimulationState::at_baseline(&profile, 0.1);
        assert_eq!(state.value(Metric::Temperature), 27.0);
        assert_eq!(state.value(Metric::Oxygen), 88.0);
        assert_eq!(state.last_event_day, None);
    }
}
