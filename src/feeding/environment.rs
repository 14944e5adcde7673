//! Environment multiplier: one [0, 1] score for how well current water
//! conditions support feeding.

use serde::Serialize;

use crate::config::{EnvironmentScoreConfig, ScoreBand};
use crate::severity::{Band, ThresholdConfig};
use crate::types::Reading;

/// Water conditions plus stocking density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentInputs {
    pub temperature: f64,
    pub ph: f64,
    pub oxygen: f64,
    pub turbidity: f64,
    pub stocking_density: f64,
}

impl EnvironmentInputs {
    pub fn from_reading(reading: &Reading, stocking_density: f64) -> Self {
        Self {
            temperature: reading.temperature(),
            ph: reading.ph(),
            oxygen: reading.oxygen(),
            turbidity: reading.turbidity(),
            stocking_density,
        }
    }
}

/// Per-metric sub-scores and their weighted combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvironmentScore {
    pub temperature: f64,
    pub ph: f64,
    pub oxygen: f64,
    pub turbidity: f64,
    pub density: f64,
    pub multiplier: f64,
}

pub struct EnvironmentScorer<'a> {
    thresholds: &'a ThresholdConfig,
    config: &'a EnvironmentScoreConfig,
}

impl<'a> EnvironmentScorer<'a> {
    pub fn new(thresholds: &'a ThresholdConfig, config: &'a EnvironmentScoreConfig) -> Self {
        Self { thresholds, config }
    }

    pub fn score(&self, inputs: &EnvironmentInputs) -> EnvironmentScore {
        let c = self.config;
        let temperature = range_score(
            inputs.temperature,
            &self.thresholds.temperature.operational,
            c.temperature_softness,
        );
        let ph = range_score(inputs.ph, &self.thresholds.ph.operational, c.ph_softness);
        let oxygen = self.oxygen_score(inputs.oxygen);
        let turbidity = step_score(inputs.turbidity, &c.turbidity_bands, c.turbidity_fallback);
        let density = step_score(inputs.stocking_density, &c.density_bands, c.density_fallback);

        let w = &c.weights;
        let multiplier = (w.temperature * temperature
            + w.ph * ph
            + w.oxygen * oxygen
            + w.turbidity * turbidity
            + w.density * density)
            .clamp(0.0, 1.0);

        EnvironmentScore {
            temperature,
            ph,
            oxygen,
            turbidity,
            density,
            multiplier,
        }
    }

    pub fn multiplier(&self, inputs: &EnvironmentInputs) -> f64 {
        self.score(inputs).multiplier
    }

    /// Severely depleted, ramping, then adequate and saturating.
    fn oxygen_score(&self, oxygen: f64) -> f64 {
        let floor = self.config.oxygen_floor;
        let min = self.thresholds.oxygen.operational.min.unwrap_or(floor);
        if oxygen <= floor {
            0.10
        } else if oxygen < min {
            0.30 + 0.70 * (oxygen - floor) / (min - floor)
        } else {
            let span = self.config.oxygen_saturation_span.max(f64::EPSILON);
            0.80 + 0.20 * ((oxygen - min) / span).clamp(0.0, 1.0)
        }
    }
}

/// 1 inside the band, exponential falloff with distance outside it.
fn range_score(value: f64, band: &Band, softness: f64) -> f64 {
    let d = band.distance(value);
    if d == 0.0 {
        1.0
    } else {
        (-d / softness).exp()
    }
}

fn step_score(value: f64, bands: &[ScoreBand], fallback: f64) -> f64 {
    bands
        .iter()
        .find(|b| value <= b.up_to)
        .map_or(fallback, |b| b.score)
}
