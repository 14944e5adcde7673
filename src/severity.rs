//! Severity classification for water-quality metrics.
//!
//! Classification is a pure function of a value and its thresholds. Each
//! metric carries two nested bands: leaving the operational band is a
//! WARNING, leaving the wider critical band is CRITICAL.

use serde::{Deserialize, Serialize};

use crate::types::{Metric, Reading};

// ============================================================================
// Severity
// ============================================================================

/// Ordered condition level, `Normal < Warning < Critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Normal = 0,
    Warning = 1,
    Critical = 2,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Normal => write!(f, "NORMAL"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ============================================================================
// Thresholds
// ============================================================================

/// Closed interval, either side optional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Band {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Band {
    pub const fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub const fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub const fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Distance from `value` to the nearest point of the band (0 inside).
    pub fn distance(&self, value: f64) -> f64 {
        match (self.min, self.max) {
            (Some(min), _) if value < min => min - value,
            (_, Some(max)) if value > max => value - max,
            _ => 0.0,
        }
    }
}

/// Operational and critical bands for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThresholds {
    pub operational: Band,
    pub critical: Band,
}

/// Thresholds for all four metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub temperature: MetricThresholds,
    pub ph: MetricThresholds,
    pub oxygen: MetricThresholds,
    pub turbidity: MetricThresholds,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temperature: MetricThresholds {
                operational: Band::between(24.0, 28.0),
                critical: Band::between(18.0, 35.0),
            },
            ph: MetricThresholds {
                operational: Band::between(6.5, 8.5),
                critical: Band::between(6.0, 9.0),
            },
            oxygen: MetricThresholds {
                operational: Band::at_least(70.0),
                critical: Band::at_least(30.0),
            },
            turbidity: MetricThresholds {
                operational: Band::at_most(50.0),
                critical: Band::at_most(100.0),
            },
        }
    }
}

impl ThresholdConfig {
    pub fn for_metric(&self, metric: Metric) -> &MetricThresholds {
        match metric {
            Metric::Temperature => &self.temperature,
            Metric::Ph => &self.ph,
            Metric::Oxygen => &self.oxygen,
            Metric::Turbidity => &self.turbidity,
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Classify one value against its thresholds.
pub fn classify(value: f64, thresholds: &MetricThresholds) -> Severity {
    if !thresholds.critical.contains(value) {
        Severity::Critical
    } else if !thresholds.operational.contains(value) {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Classify one metric of a reading.
pub fn classify_metric(reading: &Reading, metric: Metric, config: &ThresholdConfig) -> Severity {
    classify(reading.value(metric), config.for_metric(metric))
}

/// Worst severity across all four metrics.
pub fn aggregate(reading: &Reading, config: &ThresholdConfig) -> Severity {
    Metric::ALL
        .iter()
        .map(|&m| classify_metric(reading, m, config))
        .max()
        .unwrap_or_default()
}

/// The bound an alert for `metric` should report.
///
/// Oxygen reports its minimum and turbidity its maximum; two-sided metrics
/// report whichever operational bound the value crossed.
pub fn reported_threshold(metric: Metric, value: f64, thresholds: &MetricThresholds) -> f64 {
    let op = thresholds.operational;
    let bound = match metric {
        Metric::Oxygen => op.min.or(op.max),
        Metric::Turbidity => op.max.or(op.min),
        Metric::Temperature | Metric::Ph => match op.max {
            Some(max) if value > max => Some(max),
            _ => op.min.or(op.max),
        },
    };
    bound.unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn defaults() -> ThresholdConfig {
        ThresholdConfig::default()
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Normal < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn temperature_bands() {
        let t = defaults().temperature;
        assert_eq!(classify(26.0, &t), Severity::Normal);
        assert_eq!(classify(24.0, &t), Severity::Normal);
        assert_eq!(classify(29.0, &t), Severity::Warning);
        assert_eq!(classify(20.0, &t), Severity::Warning);
        assert_eq!(classify(36.0, &t), Severity::Critical);
        assert_eq!(classify(17.9, &t), Severity::Critical);
    }

    #[test]
    fn one_sided_metrics() {
        let c = defaults();
        assert_eq!(classify(95.0, &c.oxygen), Severity::Normal);
        assert_eq!(classify(68.0, &c.oxygen), Severity::Warning);
        assert_eq!(classify(25.0, &c.oxygen), Severity::Critical);
        assert_eq!(classify(0.0, &c.turbidity), Severity::Normal);
        assert_eq!(classify(60.0, &c.turbidity), Severity::Warning);
        assert_eq!(classify(150.0, &c.turbidity), Severity::Critical);
    }

    #[test]
    fn aggregate_takes_worst_metric() {
        let c = defaults();
        let r = Reading::new(1, 26.0, 7.2, 68.0, 120.0, Utc::now()).unwrap();
        assert_eq!(aggregate(&r, &c), Severity::Critical);
        let r = Reading::new(1, 26.0, 7.2, 85.0, 20.0, Utc::now()).unwrap();
        assert_eq!(aggregate(&r, &c), Severity::Normal);
    }

    #[test]
    fn reported_threshold_per_metric() {
        let c = defaults();
        assert_eq!(reported_threshold(Metric::Temperature, 30.0, &c.temperature), 28.0);
        assert_eq!(reported_threshold(Metric::Temperature, 20.0, &c.temperature), 24.0);
        assert_eq!(reported_threshold(Metric::Ph, 9.5, &c.ph), 8.5);
        assert_eq!(reported_threshold(Metric::Ph, 6.2, &c.ph), 6.5);
        assert_eq!(reported_threshold(Metric::Oxygen, 10.0, &c.oxygen), 70.0);
        assert_eq!(reported_threshold(Metric::Turbidity, 180.0, &c.turbidity), 50.0);
    }

    #[test]
    fn band_distance() {
        let b = Band::between(6.5, 8.5);
        assert_eq!(b.distance(7.0), 0.0);
        assert!((b.distance(9.0) - 0.5).abs() < 1e-12);
        assert!((b.distance(6.0) - 0.5).abs() < 1e-12);
        assert_eq!(Band::at_least(70.0).distance(100.0), 0.0);
    }
}
