//! Water-quality readings and the metrics they carry.
//!
//! A [`Reading`] can only be built through [`Reading::new`] (or
//! deserialization, which routes through the same checks), so every value in
//! circulation is finite and inside its hard physical bound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::defaults::{OXYGEN_BOUNDS, PH_BOUNDS, TEMPERATURE_BOUNDS, TURBIDITY_BOUNDS};

// ============================================================================
// Metric
// ============================================================================

/// One of the four monitored water-quality metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Ph,
    Oxygen,
    Turbidity,
}

impl Metric {
    /// All metrics in reporting order.
    pub const ALL: [Metric; 4] = [
        Metric::Temperature,
        Metric::Ph,
        Metric::Oxygen,
        Metric::Turbidity,
    ];

    /// Position in [`Metric::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Ph => "ph",
            Metric::Oxygen => "oxygen",
            Metric::Turbidity => "turbidity",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Ph => "",
            Metric::Oxygen => "%",
            Metric::Turbidity => "NTU",
        }
    }

    /// Inclusive physical range `(min, max)` for this metric.
    pub fn hard_bounds(self) -> (f64, f64) {
        match self {
            Metric::Temperature => TEMPERATURE_BOUNDS,
            Metric::Ph => PH_BOUNDS,
            Metric::Oxygen => OXYGEN_BOUNDS,
            Metric::Turbidity => TURBIDITY_BOUNDS,
        }
    }

    /// Clamp a value into the hard bound.
    pub fn clamp(self, value: f64) -> f64 {
        let (min, max) = self.hard_bounds();
        value.clamp(min, max)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Rejection reasons for externally supplied measurements.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadingError {
    #[error("{metric} value {value} is outside the physical range {min}-{max}")]
    OutOfBounds {
        metric: Metric,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{metric} value is not a finite number")]
    NonFinite { metric: Metric },
}

/// A single timestamped sample of all four metrics for one tank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReading")]
pub struct Reading {
    tank_id: u32,
    temperature: f64,
    ph: f64,
    oxygen: f64,
    turbidity: f64,
    timestamp: DateTime<Utc>,
}

/// Unvalidated wire shape used during deserialization.
#[derive(Deserialize)]
struct RawReading {
    tank_id: u32,
    temperature: f64,
    ph: f64,
    oxygen: f64,
    turbidity: f64,
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawReading> for Reading {
    type Error = ReadingError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        Reading::new(
            raw.tank_id,
            raw.temperature,
            raw.ph,
            raw.oxygen,
            raw.turbidity,
            raw.timestamp,
        )
    }
}

impl Reading {
    /// Build a reading, rejecting any value outside its hard bound.
    pub fn new(
        tank_id: u32,
        temperature: f64,
        ph: f64,
        oxygen: f64,
        turbidity: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ReadingError> {
        for (metric, value) in [
            (Metric::Temperature, temperature),
            (Metric::Ph, ph),
            (Metric::Oxygen, oxygen),
            (Metric::Turbidity, turbidity),
        ] {
            check_bounds(metric, value)?;
        }
        Ok(Self {
            tank_id,
            temperature,
            ph,
            oxygen,
            turbidity,
            timestamp,
        })
    }

    /// Build a reading from simulator output, forcing each value into range.
    pub(crate) fn clamped(
        tank_id: u32,
        temperature: f64,
        ph: f64,
        oxygen: f64,
        turbidity: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tank_id,
            temperature: Metric::Temperature.clamp(temperature),
            ph: Metric::Ph.clamp(ph),
            oxygen: Metric::Oxygen.clamp(oxygen),
            turbidity: Metric::Turbidity.clamp(turbidity),
            timestamp,
        }
    }

    pub fn tank_id(&self) -> u32 {
        self.tank_id
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn ph(&self) -> f64 {
        self.ph
    }

    pub fn oxygen(&self) -> f64 {
        self.oxygen
    }

    pub fn turbidity(&self) -> f64 {
        self.turbidity
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Value of one metric.
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Ph => self.ph,
            Metric::Oxygen => self.oxygen,
            Metric::Turbidity => self.turbidity,
        }
    }
}

fn check_bounds(metric: Metric, value: f64) -> Result<(), ReadingError> {
    if !value.is_finite() {
        return Err(ReadingError::NonFinite { metric });
    }
    let (min, max) = metric.hard_bounds();
    if value < min || value > max {
        return Err(ReadingError::OutOfBounds {
            metric,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_values_on_the_bounds() {
        let r = Reading::new(1, 0.0, 14.0, 100.0, 0.0, Utc::now()).unwrap();
        assert_eq!(r.value(Metric::Ph), 14.0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = Reading::new(1, 26.0, 14.5, 80.0, 20.0, Utc::now()).unwrap_err();
        assert!(matches!(err, ReadingError::OutOfBounds { metric: Metric::Ph, .. }));

        let err = Reading::new(1, 26.0, 7.0, 80.0, 250.0, Utc::now()).unwrap_err();
        assert!(matches!(err, ReadingError::OutOfBounds { metric: Metric::Turbidity, .. }));
    }

    #[test]
    fn rejects_nan() {
        let err = Reading::new(1, f64::NAN, 7.0, 80.0, 20.0, Utc::now()).unwrap_err();
        assert_eq!(err, ReadingError::NonFinite { metric: Metric::Temperature });
    }

    #[test]
    fn deserialization_applies_the_same_validation() {
        let ok = r#"{"tank_id":2,"temperature":26.0,"ph":7.1,"oxygen":85.0,"turbidity":21.0,"timestamp":"2024-05-01T10:00:00Z"}"#;
        let reading: Reading = serde_json::from_str(ok).unwrap();
        assert_eq!(reading.tank_id(), 2);

        let bad = r#"{"tank_id":2,"temperature":60.0,"ph":7.1,"oxygen":85.0,"turbidity":21.0,"timestamp":"2024-05-01T10:00:00Z"}"#;
        assert!(serde_json::from_str::<Reading>(bad).is_err());
    }

    #[test]
    fn clamped_forces_values_into_range() {
        let r = Reading::clamped(1, -3.0, 15.0, 120.0, 500.0, Utc::now());
        assert_eq!(r.temperature(), 0.0);
        assert_eq!(r.ph(), 14.0);
        assert_eq!(r.oxygen(), 100.0);
        assert_eq!(r.turbidity(), 200.0);
    }
}
