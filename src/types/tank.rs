//! Tanks and their simulated water profiles.

use serde::{Deserialize, Serialize};

use super::reading::Metric;

/// Validation failures for tank records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TankError {
    #[error("tank {0}: name must not be blank")]
    BlankName(u32),
    #[error("tank {id}: capacity must be > 0 liters (got {capacity})")]
    InvalidCapacity { id: u32, capacity: f64 },
}

/// A fish tank as registered with the farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: u32,
    pub name: String,
    pub capacity_liters: f64,
    pub fish_count: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Tank {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        capacity_liters: f64,
        fish_count: u32,
    ) -> Result<Self, TankError> {
        let tank = Self {
            id,
            name: name.into(),
            capacity_liters,
            fish_count,
            active: true,
        };
        tank.validate()?;
        Ok(tank)
    }

    pub fn validate(&self) -> Result<(), TankError> {
        if self.name.trim().is_empty() {
            return Err(TankError::BlankName(self.id));
        }
        if !self.capacity_liters.is_finite() || self.capacity_liters <= 0.0 {
            return Err(TankError::InvalidCapacity {
                id: self.id,
                capacity: self.capacity_liters,
            });
        }
        Ok(())
    }

    /// Water volume in cubic meters, floored at one liter.
    pub fn volume_m3(&self) -> f64 {
        (self.capacity_liters / 1000.0).max(0.001)
    }

    /// Fish per cubic meter.
    pub fn stocking_density(&self) -> f64 {
        f64::from(self.fish_count) / self.volume_m3()
    }

    pub fn is_overcrowded(&self, max_per_m3: f64) -> bool {
        self.stocking_density() > max_per_m3
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// Baseline and diurnal swing for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricProfile {
    pub base: f64,
    pub variance: f64,
}

impl MetricProfile {
    pub const fn new(base: f64, variance: f64) -> Self {
        Self { base, variance }
    }
}

/// Per-tank simulation baseline for all four metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankProfile {
    pub temperature: MetricProfile,
    pub ph: MetricProfile,
    pub oxygen: MetricProfile,
    pub turbidity: MetricProfile,
}

impl TankProfile {
    /// Profiles shipped for the four reference tanks.
    pub fn builtin(tank_id: u32) -> Option<Self> {
        let profile = match tank_id {
            1 => Self::from_values([(26.0, 2.0), (7.2, 0.35), (86.0, 10.0), (22.0, 6.0)]),
            2 => Self::from_values([(27.0, 2.3), (7.0, 0.30), (88.0, 9.0), (20.0, 5.0)]),
            3 => Self::from_values([(25.5, 1.8), (7.3, 0.40), (83.0, 11.0), (26.0, 7.0)]),
            4 => Self::from_values([(26.5, 2.6), (6.9, 0.45), (85.0, 12.0), (24.0, 6.0)]),
            _ => return None,
        };
        Some(profile)
    }

    /// Deterministic profile for a tank nobody configured.
    pub fn derived(tank_id: u32) -> Self {
        let offset = f64::from(tank_id % 4) * 0.3;
        Self {
            temperature: MetricProfile::new(26.0 + offset, 2.0 + offset / 2.0),
            ph: MetricProfile::new(7.1 + offset / 10.0, 0.35),
            oxygen: MetricProfile::new(85.0 - offset, 10.0 + offset),
            turbidity: MetricProfile::new(22.0 + offset, 6.0),
        }
    }

    /// Built-in profile when one exists, derived otherwise.
    pub fn for_tank(tank_id: u32) -> Self {
        Self::builtin(tank_id).unwrap_or_else(|| Self::derived(tank_id))
    }

    pub fn metric(&self, metric: Metric) -> MetricProfile {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Ph => self.ph,
            Metric::Oxygen => self.oxygen,
            Metric::Turbidity => self.turbidity,
        }
    }

    fn from_values(v: [(f64, f64); 4]) -> Self {
        Self {
            temperature: MetricProfile::new(v[0].0, v[0].1),
            ph: MetricProfile::new(v[1].0, v[1].1),
            oxygen: MetricProfile::new(v[2].0, v[2].1),
            turbidity: MetricProfile::new(v[3].0, v[3].1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_uses_cubic_meters() {
        let tank = Tank::new(1, "Nursery", 5_000.0, 80).unwrap();
        assert!((tank.stocking_density() - 16.0).abs() < 1e-9);
        assert!(!tank.is_overcrowded(20.0));
        assert!(tank.is_overcrowded(15.0));
    }

    #[test]
    fn rejects_blank_name_and_bad_capacity() {
        assert_eq!(Tank::new(3, "  ", 100.0, 1), Err(TankError::BlankName(3)));
        assert!(matches!(
            Tank::new(3, "T3", 0.0, 1),
            Err(TankError::InvalidCapacity { .. })
        ));
    }

    #[test]
    fn derived_profile_is_deterministic_offset() {
        let p = TankProfile::derived(7);
        assert!((p.temperature.base - 26.9).abs() < 1e-9);
        assert!((p.oxygen.variance - 10.9).abs() < 1e-9);
        assert_eq!(p, TankProfile::derived(7));
        assert_eq!(TankProfile::derived(8), TankProfile::derived(4));
    }

    #[test]
    fn builtin_profiles_cover_reference_tanks() {
        assert_eq!(TankProfile::for_tank(1).temperature, MetricProfile::new(26.0, 2.0));
        assert!(TankProfile::builtin(5).is_none());
        assert_eq!(TankProfile::for_tank(5), TankProfile::derived(5));
    }
}
