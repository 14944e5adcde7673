//! Environmental simulation engine.
//!
//! Each tick moves a tank's metrics toward a diurnal target shifted by the
//! accumulated bio-load, then layers event effects, weak cross-metric
//! coupling and the occasional sensor spike on top. Output is always clamped
//! to the hard physical bounds.

use std::collections::HashMap;
use std::f64::consts::TAU;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, trace};

use super::events::{decay_events, Event, EventKind, EventScheduler};
use super::state::{lock_slot, SimulationState, TankSim, TankStateStore};
use crate::config::defaults::MINUTES_PER_DAY;
use crate::config::{AquaConfig, SimulationConfig};
use crate::types::{Metric, MetricProfile, Reading, TankProfile};

// ============================================================================
// Physics Constants
// ============================================================================

/// Minute of day at which each metric's diurnal cycle peaks.
const TEMPERATURE_PEAK_MINUTE: f64 = 900.0;
const PH_PEAK_MINUTE: f64 = 900.0;
const OXYGEN_PEAK_MINUTE: f64 = 960.0;
const TURBIDITY_PEAK_MINUTE: f64 = 0.0;

/// Fraction of the profile variance used by the diurnal swing.
const TEMPERATURE_SWING: f64 = 0.7;
const PH_SWING: f64 = 0.8;
const OXYGEN_SWING: f64 = 0.7;
const TURBIDITY_SWING: f64 = 0.5;

/// Target shift per unit of bio-load.
const BIO_TURBIDITY: f64 = 8.0;
const BIO_OXYGEN: f64 = 3.0;
const BIO_PH: f64 = 0.06;

/// (approach rate, uniform noise half-width) per metric.
const TEMPERATURE_SMOOTHING: (f64, f64) = (0.12, 0.15);
const PH_SMOOTHING: (f64, f64) = (0.10, 0.03);
const OXYGEN_SMOOTHING: (f64, f64) = (0.15, 1.2);
const TURBIDITY_SMOOTHING: (f64, f64) = (0.18, 1.0);

/// Oxygen lost per degree above the baseline temperature.
const OXYGEN_PER_DEGREE: f64 = 0.35;
/// Turbidity lost per pH unit above the baseline pH.
const TURBIDITY_PER_PH: f64 = 0.6;

const SPIKE_TEMPERATURE: f64 = 4.0;
const SPIKE_PH: f64 = 1.2;
const SPIKE_OXYGEN_DROP: (f64, f64) = (15.0, 35.0);
const SPIKE_TURBIDITY_RISE: (f64, f64) = (45.0, 90.0);

/// Golden-ratio multiplier spreading tank ids across the seed space.
const TANK_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// `base + variance * swing * sin(2π (minute - peak) / 1440)`
pub fn diurnal_target(profile: &MetricProfile, swing: f64, peak_minute: f64, minute: f64) -> f64 {
    let phase = TAU * (minute - peak_minute) / f64::from(MINUTES_PER_DAY);
    profile.base + profile.variance * swing * phase.sin()
}

fn approach<R: Rng + ?Sized>(prev: f64, target: f64, (k, noise): (f64, f64), rng: &mut R) -> f64 {
    prev + k * (target - prev) + rng.gen_range(-noise..=noise)
}

pub struct SimulationEngine {
    config: SimulationConfig,
    profiles: HashMap<u32, TankProfile>,
    bio_load_initial: f64,
    seed: u64,
    store: TankStateStore,
}

impl SimulationEngine {
    /// `seed` of `None` draws one from entropy; the chosen seed is logged so
    /// a run can be replayed.
    pub fn new(config: SimulationConfig, profiles: HashMap<u32, TankProfile>, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        debug!(seed, tanks = profiles.len(), "simulation engine created");
        Self {
            bio_load_initial: config.bio_load.initial,
            config,
            profiles,
            seed,
            store: TankStateStore::new(),
        }
    }

    /// Engine for every tank in `config`; an explicit `seed` overrides the
    /// configured one.
    pub fn from_config(config: &AquaConfig, seed: Option<u64>) -> Self {
        Self::new(
            config.simulation.clone(),
            config.profiles(),
            seed.or(config.simulation.seed),
        )
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Configured profile, or the derived one for unknown ids.
    pub fn profile(&self, tank_id: u32) -> TankProfile {
        self.profiles
            .get(&tank_id)
            .copied()
            .unwrap_or_else(|| TankProfile::derived(tank_id))
    }

    pub fn states(&self) -> &TankStateStore {
        &self.store
    }

    /// Advance one tick at `minute_of_day`, stamped with the current time.
    pub fn step(&self, tank_id: u32, minute_of_day: u32) -> Reading {
        let now = Utc::now();
        let day = i64::from(now.date_naive().num_days_from_ce());
        self.advance(tank_id, minute_of_day % MINUTES_PER_DAY, day, now)
    }

    /// Advance one tick at a given local instant.
    pub fn step_at(&self, tank_id: u32, at: DateTime<FixedOffset>) -> Reading {
        let minute = at.hour() * 60 + at.minute();
        let day = i64::from(at.date_naive().num_days_from_ce());
        self.advance(tank_id, minute, day, at.with_timezone(&Utc))
    }

    /// Step several tanks in parallel, results in input order.
    pub fn step_many(&self, tank_ids: &[u32], at: DateTime<FixedOffset>) -> Vec<Reading> {
        tank_ids.par_iter().map(|&id| self.step_at(id, at)).collect()
    }

    /// Force an event onto a tank, creating its state if needed.
    pub fn inject_event(&self, tank_id: u32, event: Event) {
        let slot = self
            .store
            .slot_or_insert_with(tank_id, || self.init_tank(tank_id));
        let mut sim = lock_slot(&slot, tank_id);
        debug!(tank_id, kind = %event.kind, ticks = event.remaining_ticks, "event injected");
        sim.events.push(event);
    }

    fn init_tank(&self, tank_id: u32) -> TankSim {
        let profile = self.profile(tank_id);
        let seed = self.seed ^ u64::from(tank_id).wrapping_mul(TANK_SEED_MIX);
        TankSim {
            state: SimulationState::at_baseline(&profile, self.bio_load_initial),
            profile,
            events: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn advance(&self, tank_id: u32, minute: u32, day: i64, timestamp: DateTime<Utc>) -> Reading {
        let slot = self
            .store
            .slot_or_insert_with(tank_id, || self.init_tank(tank_id));
        let mut guard = lock_slot(&slot, tank_id);
        let sim = &mut *guard;

        decay_events(&mut sim.events);
        let scheduler = EventScheduler::new(&self.config);
        if let Some(event) = scheduler.roll_daily(day, &mut sim.state.last_event_day, &mut sim.rng) {
            debug!(tank_id, kind = %event.kind, ticks = event.remaining_ticks, "event started");
            sim.events.push(event);
        }
        for event in scheduler.roll_tick(minute, &sim.events, &mut sim.rng) {
            debug!(tank_id, kind = %event.kind, ticks = event.remaining_ticks, "event started");
            sim.events.push(event);
        }
        self.update_bio_load(sim);

        let profile = sim.profile;
        let rng = &mut sim.rng;
        let state = &mut sim.state;
        let m = f64::from(minute);
        let bio = state.bio_load;

        let temp_target = diurnal_target(&profile.temperature, TEMPERATURE_SWING, TEMPERATURE_PEAK_MINUTE, m);
        let ph_target = diurnal_target(&profile.ph, PH_SWING, PH_PEAK_MINUTE, m) - BIO_PH * bio;
        let oxygen_target =
            diurnal_target(&profile.oxygen, OXYGEN_SWING, OXYGEN_PEAK_MINUTE, m) - BIO_OXYGEN * bio;
        let turbidity_target = diurnal_target(&profile.turbidity, TURBIDITY_SWING, TURBIDITY_PEAK_MINUTE, m)
            + BIO_TURBIDITY * bio;

        let mut temperature = approach(state.temperature, temp_target, TEMPERATURE_SMOOTHING, rng);
        let mut ph = approach(state.ph, ph_target, PH_SMOOTHING, rng);
        let mut oxygen = approach(state.oxygen, oxygen_target, OXYGEN_SMOOTHING, rng);
        let mut turbidity = approach(state.turbidity, turbidity_target, TURBIDITY_SMOOTHING, rng);

        for event in &sim.events {
            let s = event.intensity();
            match event.kind {
                EventKind::Feeding => {
                    turbidity += 12.0 * s + rng.gen_range(0.0..=4.0);
                    oxygen -= 3.0 * s + rng.gen_range(0.0..=1.0);
                    ph -= 0.03 * s;
                }
                EventKind::AeratorFailure => {
                    oxygen -= 25.0 * s + rng.gen_range(3.0..=7.0);
                    turbidity += 3.0 * s + rng.gen_range(0.0..=2.0);
                }
                EventKind::WaterRenewal => {
                    turbidity -= 10.0 * s;
                    temperature -= 0.4 * s;
                    ph -= 0.02 * s;
                }
            }
        }

        oxygen -= OXYGEN_PER_DEGREE * (temperature - profile.temperature.base);
        turbidity -= TURBIDITY_PER_PH * (ph - profile.ph.base);

        let mut values = [temperature, ph, oxygen, turbidity];
        let spike_p = self.config.spike_probability.clamp(0.0, 1.0);
        if rng.gen_bool(spike_p) {
            let idx = rng.gen_range(0..Metric::ALL.len());
            let delta = match Metric::ALL[idx] {
                Metric::Temperature => random_sign(rng) * SPIKE_TEMPERATURE,
                Metric::Ph => random_sign(rng) * SPIKE_PH,
                Metric::Oxygen => -rng.gen_range(SPIKE_OXYGEN_DROP.0..=SPIKE_OXYGEN_DROP.1),
                Metric::Turbidity => rng.gen_range(SPIKE_TURBIDITY_RISE.0..=SPIKE_TURBIDITY_RISE.1),
            };
            trace!(tank_id, metric = %Metric::ALL[idx], delta, "sensor spike");
            values[idx] += delta;
        }

        for (metric, value) in Metric::ALL.into_iter().zip(values) {
            // A non-finite value would poison every later tick.
            let value = if value.is_finite() {
                value
            } else {
                state.value(metric)
            };
            state.set(metric, metric.clamp(value));
        }
        state.tick += 1;

        Reading::clamped(
            tank_id,
            state.temperature,
            state.ph,
            state.oxygen,
            state.turbidity,
            timestamp,
        )
    }

    fn update_bio_load(&self, sim: &mut TankSim) {
        let b = &self.config.bio_load;
        let renewing = sim.events.iter().any(|e| e.kind == EventKind::WaterRenewal);
        sim.state.bio_load = if renewing {
            (sim.state.bio_load - b.renewal_drop_per_tick).max(0.0)
        } else {
            (sim.state.bio_load + b.growth_per_hour * self.config.tick_hours()).min(b.max)
        };
    }
}

fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    if rng.gen_bool(0.5) {
        1.0
    } else {
        -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn engine(config: SimulationConfig) -> SimulationEngine {
        SimulationEngine::new(config, HashMap::new(), Some(7))
    }

    fn calm() -> SimulationConfig {
        SimulationConfig {
            spike_probability: 0.0,
            aerator_failure_rate_per_hour: 0.0,
            water_renewal_probability_per_day: 0.0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn diurnal_peaks_at_peak_minute() {
        let p = MetricProfile::new(26.0, 2.0);
        assert!((diurnal_target(&p, 0.7, 900.0, 900.0) - 26.0).abs() < 1e-9);
        assert!((diurnal_target(&p, 0.7, 900.0, 1260.0) - 27.4).abs() < 1e-9);
    }

    #[test]
    fn first_step_starts_from_baseline() {
        let engine = engine(calm());
        let reading = engine.step(1, 0);
        assert!((reading.temperature() - 26.0).abs() < 0.5);
        assert_eq!(engine.states().snapshot(1).unwrap().tick, 1);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 7, 55, 0)
            .unwrap();
        let a = engine(SimulationConfig::default());
        let b = engine(SimulationConfig::default());
        for _ in 0..50 {
            assert_eq!(a.step_at(2, at), b.step_at(2, at));
        }
    }

    #[test]
    fn renewal_lowers_bio_load() {
        let engine = engine(calm());
        engine.step(1, 0);
        let before = engine.states().snapshot(1).unwrap().bio_load;
        engine.inject_event(1, Event::new(EventKind::WaterRenewal, 10, 1.0));
        engine.step(1, 1);
        let after = engine.states().snapshot(1).unwrap().bio_load;
        assert!((before - after - 0.015).abs() < 1e-12);
    }

    #[test]
    fn step_many_keeps_order() {
        let engine = engine(calm());
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .unwrap();
        let readings = engine.step_many(&[4, 1, 9], at);
        let ids: Vec<u32> = readings.iter().map(Reading::tank_id).collect();
        assert_eq!(ids, vec![4, 1, 9]);
        assert_eq!(engine.profile(9), TankProfile::derived(9));
    }
}
