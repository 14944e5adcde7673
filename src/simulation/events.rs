//! Discrete water events and the scheduler that starts them.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::defaults::MINUTES_PER_DAY;
use crate::config::{MinuteRange, SimulationConfig, StrengthRange};

/// Floor of the decay curve so a fading event never vanishes abruptly.
const MIN_DECAY: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Feeding,
    AeratorFailure,
    WaterRenewal,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Feeding => "feeding",
            EventKind::AeratorFailure => "aerator_failure",
            EventKind::WaterRenewal => "water_renewal",
        };
        write!(f, "{name}")
    }
}

/// An active event on one tank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub remaining_ticks: u32,
    /// Peak effect in [0, 1]
    pub strength: f64,
}

impl Event {
    /// Strength is clamped to [0, 1] and duration to at least one tick.
    pub fn new(kind: EventKind, remaining_ticks: u32, strength: f64) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            kind,
            remaining_ticks: remaining_ticks.max(1),
            strength,
        }
    }

    /// `max(0.15, t / (t + 1))` for `t` remaining ticks.
    pub fn decay(&self) -> f64 {
        let t = f64::from(self.remaining_ticks);
        (t / (t + 1.0)).max(MIN_DECAY)
    }

    /// Effective scale applied to this tick's deltas.
    pub fn intensity(&self) -> f64 {
        self.strength * self.decay()
    }
}

/// Count down every event by one tick and drop the expired ones.
pub fn decay_events(events: &mut Vec<Event>) {
    for event in events.iter_mut() {
        event.remaining_ticks = event.remaining_ticks.saturating_sub(1);
    }
    events.retain(|e| e.remaining_ticks > 0);
}

/// Decides when events start. Holds no state of its own; the caller owns
/// the event list and the last-seen day.
pub struct EventScheduler<'a> {
    config: &'a SimulationConfig,
}

impl<'a> EventScheduler<'a> {
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self { config }
    }

    /// `max(1, round(minutes / minutes_per_tick))`
    pub fn ticks_for_minutes(&self, minutes: u32) -> u32 {
        let minutes_per_tick = (self.config.tick_interval_secs.max(1) as f64) / 60.0;
        let ticks = (f64::from(minutes) / minutes_per_tick).round();
        if ticks >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            (ticks as u32).max(1)
        }
    }

    /// Probability of an aerator failure starting on one tick.
    pub fn aerator_probability_per_tick(&self) -> f64 {
        (self.config.aerator_failure_rate_per_hour * self.config.tick_hours()).clamp(0.0, 1.0)
    }

    /// True when `minute_of_day` is within the feed window of any feed time,
    /// measured around the clock.
    pub fn in_feed_window(&self, minute_of_day: u32) -> bool {
        let minute = minute_of_day % MINUTES_PER_DAY;
        self.config.feed_times_minutes.iter().any(|&feed| {
            let d = minute.abs_diff(feed % MINUTES_PER_DAY);
            d.min(MINUTES_PER_DAY - d) <= self.config.feed_window_minutes
        })
    }

    /// Once per day index: maybe start a water renewal.
    pub fn roll_daily<R: Rng + ?Sized>(
        &self,
        day: i64,
        last_event_day: &mut Option<i64>,
        rng: &mut R,
    ) -> Option<Event> {
        if *last_event_day == Some(day) {
            return None;
        }
        *last_event_day = Some(day);

        let p = self.config.water_renewal_probability_per_day.clamp(0.0, 1.0);
        rng.gen_bool(p).then(|| {
            self.sample_event(
                EventKind::WaterRenewal,
                &self.config.water_renewal_minutes,
                &self.config.water_renewal_strength,
                rng,
            )
        })
    }

    /// Per tick: feeding inside a feed window, aerator failure by chance.
    pub fn roll_tick<R: Rng + ?Sized>(
        &self,
        minute_of_day: u32,
        active: &[Event],
        rng: &mut R,
    ) -> Vec<Event> {
        let mut started = Vec::new();

        let feeding_active = active.iter().any(|e| e.kind == EventKind::Feeding);
        if !feeding_active && self.in_feed_window(minute_of_day) {
            started.push(Event::new(
                EventKind::Feeding,
                self.ticks_for_minutes(self.config.feeding_duration_minutes),
                self.config.feeding_strength,
            ));
        }

        // Failures may overlap and stack.
        if rng.gen_bool(self.aerator_probability_per_tick()) {
            started.push(self.sample_event(
                EventKind::AeratorFailure,
                &self.config.aerator_failure_minutes,
                &self.config.aerator_failure_strength,
                rng,
            ));
        }

        started
    }

    fn sample_event<R: Rng + ?Sized>(
        &self,
        kind: EventKind,
        minutes: &MinuteRange,
        strength: &StrengthRange,
        rng: &mut R,
    ) -> Event {
        let minutes = rng.gen_range(minutes.min..=minutes.max.max(minutes.min));
        let strength = rng.gen_range(strength.min..=strength.max.max(strength.min));
        Event::new(kind, self.ticks_for_minutes(minutes), strength)
    }
}
