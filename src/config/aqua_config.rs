//! Farm Configuration - every tunable of the monitoring core as TOML values
//!
//! Each section implements `Default` with the reference values, so an empty
//! or missing file reproduces the stock behavior.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::feeding::GaConfig;
use crate::severity::{MetricThresholds, ThresholdConfig};
use crate::types::{Metric, Tank, TankProfile};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a farm deployment.
///
/// Load with `AquaConfig::load()` which searches:
/// 1. `$AQUAWATCH_CONFIG` env var
/// 2. `./aquawatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AquaConfig {
    /// Farm identification and local clock
    #[serde(default)]
    pub farm: FarmInfo,

    /// Operational / critical bands per metric
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Environmental simulator tuning
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Registered tanks and their simulation profiles
    #[serde(default = "default_tanks")]
    pub tanks: Vec<TankConfig>,

    /// Genetic feed optimizer hyperparameters
    #[serde(default)]
    pub optimizer: GaConfig,

    /// Feed plan assembly
    #[serde(default)]
    pub feeding: FeedingConfig,

    /// Environment multiplier scoring
    #[serde(default)]
    pub environment_score: EnvironmentScoreConfig,

    /// Daemon loop cadence
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for AquaConfig {
    fn default() -> Self {
        Self {
            farm: FarmInfo::default(),
            thresholds: ThresholdConfig::default(),
            simulation: SimulationConfig::default(),
            tanks: default_tanks(),
            optimizer: GaConfig::default(),
            feeding: FeedingConfig::default(),
            environment_score: EnvironmentScoreConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl AquaConfig {
    /// Load configuration using the standard search order:
    /// 1. `$AQUAWATCH_CONFIG` environment variable
    /// 2. `./aquawatch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("AQUAWATCH_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), farm = %config.farm.name, "Loaded farm config from AQUAWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from AQUAWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "AQUAWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("aquawatch.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(farm = %config.farm.name, "Loaded farm config from ./aquawatch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./aquawatch.toml, using defaults");
                }
            }
        }

        info!("No aquawatch.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Registered tanks as domain records.
    pub fn tank_records(&self) -> Vec<Tank> {
        self.tanks.iter().map(TankConfig::to_tank).collect()
    }

    /// Simulation profile for every configured tank.
    pub fn profiles(&self) -> HashMap<u32, TankProfile> {
        self.tanks.iter().map(|t| (t.id, t.profile())).collect()
    }

    /// Validate structural constraints. Returns every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        for metric in Metric::ALL {
            Self::check_nesting(
                self.thresholds.for_metric(metric),
                &format!("thresholds.{metric}"),
                &mut errors,
            );
        }
        if self.thresholds.oxygen.operational.min.is_none() {
            errors.push("thresholds.oxygen.operational.min is required".to_string());
        }

        self.validate_simulation(&mut errors);

        let mut seen = HashSet::new();
        for tank in &self.tanks {
            if !seen.insert(tank.id) {
                errors.push(format!("tanks: duplicate tank id {}", tank.id));
            }
            if let Err(e) = tank.to_tank().validate() {
                errors.push(format!("tanks: {e}"));
            }
        }

        errors.extend(
            self.optimizer
                .validation_errors()
                .into_iter()
                .map(|e| format!("optimizer.{e}")),
        );

        self.validate_feeding(&mut errors);
        self.validate_environment_score(&mut errors);

        if self.monitor.reconcile_every_ticks == 0 || self.monitor.feed_plan_every_ticks == 0 {
            errors.push("monitor: tick cadences must be >= 1".to_string());
        }
        if self.monitor.optimizer_threads == 0 {
            errors.push("monitor.optimizer_threads must be >= 1".to_string());
        }
        if self.farm.utc_offset_minutes.abs() > 14 * 60 {
            errors.push(format!(
                "farm.utc_offset_minutes = {} is outside +/-840",
                self.farm.utc_offset_minutes
            ));
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn validate_simulation(&self, errors: &mut Vec<String>) {
        let s = &self.simulation;
        if s.tick_interval_secs == 0 {
            errors.push("simulation.tick_interval_secs must be > 0".to_string());
        } else if s.tick_interval_secs > defaults::MAX_TICK_INTERVAL_SECS {
            errors.push(format!(
                "simulation.tick_interval_secs = {} exceeds one day ({} s)",
                s.tick_interval_secs,
                defaults::MAX_TICK_INTERVAL_SECS
            ));
        }
        for (name, p) in [
            ("spike_probability", s.spike_probability),
            ("water_renewal_probability_per_day", s.water_renewal_probability_per_day),
        ] {
            Self::check_probability(p, &format!("simulation.{name}"), errors);
        }
        if !s.aerator_failure_rate_per_hour.is_finite() || s.aerator_failure_rate_per_hour < 0.0 {
            errors.push(format!(
                "simulation.aerator_failure_rate_per_hour = {} must be >= 0",
                s.aerator_failure_rate_per_hour
            ));
        }
        for (name, r) in [
            ("aerator_failure_minutes", s.aerator_failure_minutes),
            ("water_renewal_minutes", s.water_renewal_minutes),
        ] {
            if r.min > r.max {
                errors.push(format!("simulation.{name}: min ({}) > max ({})", r.min, r.max));
            }
        }
        for (name, r) in [
            ("aerator_failure_strength", s.aerator_failure_strength),
            ("water_renewal_strength", s.water_renewal_strength),
        ] {
            if !(0.0..=1.0).contains(&r.min) || !(0.0..=1.0).contains(&r.max) || r.min > r.max {
                errors.push(format!(
                    "simulation.{name}: expected 0 <= min <= max <= 1 (got {}..{})",
                    r.min, r.max
                ));
            }
        }
        Self::check_probability(s.feeding_strength, "simulation.feeding_strength", errors);
        if let Some(t) = s.feed_times_minutes.iter().find(|&&t| t >= defaults::MINUTES_PER_DAY) {
            errors.push(format!("simulation.feed_times_minutes: {t} is not a minute of the day"));
        }
        let b = &s.bio_load;
        if !(0.0..=b.max).contains(&b.initial) {
            errors.push(format!(
                "simulation.bio_load.initial ({}) must lie in [0, max={}]",
                b.initial, b.max
            ));
        }
        if b.growth_per_hour < 0.0 || b.renewal_drop_per_tick < 0.0 {
            errors.push("simulation.bio_load: rates must be >= 0".to_string());
        }
    }

    fn validate_feeding(&self, errors: &mut Vec<String>) {
        let f = &self.feeding;
        Self::check_probability(f.ga_blend, "feeding.ga_blend", errors);
        if !(f.min_grams_per_fish > 0.0 && f.min_grams_per_fish < f.max_grams_per_fish) {
            errors.push(format!(
                "feeding: expected 0 < min_grams_per_fish ({}) < max_grams_per_fish ({})",
                f.min_grams_per_fish, f.max_grams_per_fish
            ));
        }
        if !(f.baseline_weight_kg.is_finite() && f.baseline_weight_kg > 0.0) {
            errors.push("feeding.baseline_weight_kg must be > 0".to_string());
        }
        for (name, r) in [
            ("warning_reduction", f.warning_reduction),
            ("critical_reduction", f.critical_reduction),
        ] {
            if !(0.0..1.0).contains(&r) {
                errors.push(format!("feeding.{name} = {r} must lie in [0, 1)"));
            }
        }
        if f.feed_rate_table.windows(2).any(|w| w[0].below_kg >= w[1].below_kg) {
            errors.push("feeding.feed_rate_table: below_kg must be strictly increasing".to_string());
        }
        if f.feed_rate_table.iter().any(|b| b.percent <= 0.0) || f.heavy_fish_percent <= 0.0 {
            errors.push("feeding.feed_rate_table: percents must be > 0".to_string());
        }
        if !f.meal_tiers.iter().any(|t| t.min_multiplier <= 0.0) {
            errors.push("feeding.meal_tiers: one tier must have min_multiplier <= 0".to_string());
        }
        for tier in &f.meal_tiers {
            if tier.slots.is_empty() {
                errors.push(format!(
                    "feeding.meal_tiers: tier >= {} has no slots",
                    tier.min_multiplier
                ));
            }
            for slot in &tier.slots {
                if slot.hour > 23 || slot.minute > 59 {
                    errors.push(format!(
                        "feeding.meal_tiers: invalid time {:02}:{:02}",
                        slot.hour, slot.minute
                    ));
                }
            }
        }
        let n = &f.neutral_conditions;
        for (metric, value) in [
            (Metric::Temperature, n.temperature),
            (Metric::Ph, n.ph),
            (Metric::Oxygen, n.oxygen),
            (Metric::Turbidity, n.turbidity),
        ] {
            let (lo, hi) = metric.hard_bounds();
            if !(lo..=hi).contains(&value) {
                errors.push(format!(
                    "feeding.neutral_conditions.{metric} = {value} is outside {lo}-{hi}"
                ));
            }
        }
    }

    fn validate_environment_score(&self, errors: &mut Vec<String>) {
        let e = &self.environment_score;
        let w = &e.weights;
        let parts = [w.temperature, w.ph, w.oxygen, w.turbidity, w.density];
        if parts.iter().any(|v| !v.is_finite() || *v < 0.0) {
            errors.push("environment_score.weights must be finite and >= 0".to_string());
        }
        let sum: f64 = parts.iter().sum();
        if !(0.95..=1.05).contains(&sum) {
            errors.push(format!(
                "environment_score.weights sum to {sum:.3}, expected ~1.0 (0.95-1.05)"
            ));
        }
        if e.temperature_softness <= 0.0 || e.ph_softness <= 0.0 {
            errors.push("environment_score: softness values must be > 0".to_string());
        }
        if let Some(min) = self.thresholds.oxygen.operational.min {
            if min <= e.oxygen_floor {
                errors.push(format!(
                    "environment_score.oxygen_floor ({}) must be below thresholds.oxygen.operational.min ({min})",
                    e.oxygen_floor
                ));
            }
        }
        for (name, bands) in [
            ("turbidity_bands", &e.turbidity_bands),
            ("density_bands", &e.density_bands),
        ] {
            if bands.windows(2).any(|w| w[0].up_to >= w[1].up_to) {
                errors.push(format!("environment_score.{name}: up_to must be strictly increasing"));
            }
        }
    }

    fn check_probability(p: f64, name: &str, errors: &mut Vec<String>) {
        if !(0.0..=1.0).contains(&p) {
            errors.push(format!("{name} = {p} must lie in [0, 1]"));
        }
    }

    /// Operational band must sit inside the critical band.
    fn check_nesting(t: &MetricThresholds, name: &str, errors: &mut Vec<String>) {
        let values = [t.operational.min, t.operational.max, t.critical.min, t.critical.max];
        // NaN/Inf comparisons silently pass, catch them explicitly
        if values.iter().flatten().any(|v| !v.is_finite()) {
            errors.push(format!("{name}: bounds must be finite"));
            return;
        }
        for (label, band) in [("operational", t.operational), ("critical", t.critical)] {
            if band.min.is_none() && band.max.is_none() {
                errors.push(format!("{name}.{label}: at least one bound is required"));
            }
            if let (Some(lo), Some(hi)) = (band.min, band.max) {
                if lo >= hi {
                    errors.push(format!("{name}.{label}: min ({lo:.3}) must be < max ({hi:.3})"));
                }
            }
        }
        if let (Some(op), Some(crit)) = (t.operational.min, t.critical.min) {
            if crit > op {
                errors.push(format!(
                    "{name}: critical.min ({crit:.3}) must be <= operational.min ({op:.3})"
                ));
            }
        }
        if let (Some(op), Some(crit)) = (t.operational.max, t.critical.max) {
            if crit < op {
                errors.push(format!(
                    "{name}: critical.max ({crit:.3}) must be >= operational.max ({op:.3})"
                ));
            }
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Farm Info
// ============================================================================

/// Identification and local clock for the farm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmInfo {
    /// Farm name, appears in logs
    #[serde(default = "default_farm_name")]
    pub name: String,

    /// Local clock offset from UTC in minutes (diurnal cycle and meal times)
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_farm_name() -> String {
    "unnamed-farm".to_string()
}

impl Default for FarmInfo {
    fn default() -> Self {
        Self {
            name: default_farm_name(),
            utc_offset_minutes: 0,
        }
    }
}

impl FarmInfo {
    /// Local offset; out-of-range values are rejected by validation.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Inclusive range of whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinuteRange {
    pub min: u32,
    pub max: u32,
}

/// Inclusive range of event strengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthRange {
    pub min: f64,
    pub max: f64,
}

/// Bio-load accumulator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BioLoadConfig {
    pub initial: f64,
    pub max: f64,
    pub growth_per_hour: f64,
    pub renewal_drop_per_tick: f64,
}

impl Default for BioLoadConfig {
    fn default() -> Self {
        Self {
            initial: defaults::BIO_LOAD_INITIAL,
            max: defaults::BIO_LOAD_MAX,
            growth_per_hour: defaults::BIO_LOAD_GROWTH_PER_HOUR,
            renewal_drop_per_tick: defaults::BIO_LOAD_RENEWAL_DROP_PER_TICK,
        }
    }
}

/// Clock and event rates for the environmental simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated seconds per tick
    pub tick_interval_secs: u64,
    /// Seed for per-tank generators; `None` draws from entropy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Per-tick probability of a one-tick sensor spike
    pub spike_probability: f64,
    pub feed_times_minutes: Vec<u32>,
    pub feed_window_minutes: u32,
    pub feeding_duration_minutes: u32,
    pub feeding_strength: f64,
    pub aerator_failure_rate_per_hour: f64,
    pub aerator_failure_minutes: MinuteRange,
    pub aerator_failure_strength: StrengthRange,
    pub water_renewal_probability_per_day: f64,
    pub water_renewal_minutes: MinuteRange,
    pub water_renewal_strength: StrengthRange,
    pub bio_load: BioLoadConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: defaults::TICK_INTERVAL_SECS,
            seed: None,
            spike_probability: defaults::SPIKE_PROBABILITY,
            feed_times_minutes: defaults::FEED_TIMES_MINUTES.to_vec(),
            feed_window_minutes: defaults::FEED_WINDOW_MINUTES,
            feeding_duration_minutes: defaults::FEEDING_DURATION_MINUTES,
            feeding_strength: 1.0,
            aerator_failure_rate_per_hour: defaults::AERATOR_FAILURE_RATE_PER_HOUR,
            aerator_failure_minutes: MinuteRange { min: 10, max: 40 },
            aerator_failure_strength: StrengthRange { min: 0.6, max: 1.0 },
            water_renewal_probability_per_day: defaults::WATER_RENEWAL_PROBABILITY_PER_DAY,
            water_renewal_minutes: MinuteRange { min: 15, max: 30 },
            water_renewal_strength: StrengthRange { min: 0.5, max: 1.0 },
            bio_load: BioLoadConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Simulated hours covered by one tick.
    pub fn tick_hours(&self) -> f64 {
        self.tick_interval_secs as f64 / 3600.0
    }
}

// ============================================================================
// Tanks
// ============================================================================

/// One `[[tanks]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankConfig {
    pub id: u32,
    pub name: String,
    pub capacity_liters: f64,
    pub fish_count: u32,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Explicit simulation profile; built-in or derived when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<TankProfile>,
}

fn default_true() -> bool {
    true
}

impl TankConfig {
    pub fn to_tank(&self) -> Tank {
        Tank {
            id: self.id,
            name: self.name.clone(),
            capacity_liters: self.capacity_liters,
            fish_count: self.fish_count,
            active: self.active,
        }
    }

    pub fn profile(&self) -> TankProfile {
        self.profile.unwrap_or_else(|| TankProfile::for_tank(self.id))
    }
}

fn default_tanks() -> Vec<TankConfig> {
    [
        (1, 10_000.0, 150),
        (2, 8_000.0, 140),
        (3, 12_000.0, 200),
        (4, 6_000.0, 110),
    ]
    .into_iter()
    .map(|(id, capacity_liters, fish_count)| TankConfig {
        id,
        name: format!("Tank {id}"),
        capacity_liters,
        fish_count,
        active: true,
        profile: None,
    })
    .collect()
}

// ============================================================================
// Feeding
// ============================================================================

/// Reference feed rate for fish lighter than `below_kg`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedRateBand {
    pub below_kg: f64,
    /// Daily ration as percent of body weight
    pub percent: f64,
}

/// A meal time of day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSlot {
    pub hour: u32,
    pub minute: u32,
    pub label: String,
}

impl MealSlot {
    fn new(hour: u32, label: &str) -> Self {
        Self {
            hour,
            minute: 0,
            label: label.to_string(),
        }
    }
}

/// Meal schedule used when the environment multiplier is at least `min_multiplier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealTier {
    pub min_multiplier: f64,
    pub slots: Vec<MealSlot>,
}

/// Water conditions assumed when a tank has never reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeutralConditions {
    pub temperature: f64,
    pub ph: f64,
    pub oxygen: f64,
    pub turbidity: f64,
}

/// Feed plan assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedingConfig {
    /// Run the genetic optimizer; the percent-of-weight baseline otherwise
    pub use_genetic_optimizer: bool,
    /// Share of the GA dosage in the blended recommendation
    pub ga_blend: f64,
    pub min_grams_per_fish: f64,
    pub max_grams_per_fish: f64,
    pub baseline_weight_kg: f64,
    /// Baseline strategy ration (percent of body weight)
    pub baseline_percent_of_weight: f64,
    pub warning_reduction: f64,
    pub critical_reduction: f64,
    pub days_of_cultivation: f64,
    pub max_density_per_m3: f64,
    /// Weight buckets in ascending order
    pub feed_rate_table: Vec<FeedRateBand>,
    /// Rate for fish heavier than the last bucket
    pub heavy_fish_percent: f64,
    /// Tiers in descending `min_multiplier` order
    pub meal_tiers: Vec<MealTier>,
    pub neutral_conditions: NeutralConditions,
}

impl Default for FeedingConfig {
    fn default() -> Self {
        let (min_g, max_g) = defaults::GRAMS_PER_FISH_RANGE;
        Self {
            use_genetic_optimizer: true,
            ga_blend: defaults::GA_BLEND_RATIO,
            min_grams_per_fish: min_g,
            max_grams_per_fish: max_g,
            baseline_weight_kg: defaults::BASELINE_WEIGHT_KG,
            baseline_percent_of_weight: 2.0,
            warning_reduction: 0.10,
            critical_reduction: 0.30,
            days_of_cultivation: defaults::DAYS_OF_CULTIVATION,
            max_density_per_m3: defaults::MAX_DENSITY_PER_M3,
            feed_rate_table: [
                (0.02, 4.5),
                (0.05, 3.0),
                (0.1, 2.2),
                (0.25, 1.6),
                (0.5, 1.2),
                (1.0, 1.0),
            ]
            .into_iter()
            .map(|(below_kg, percent)| FeedRateBand { below_kg, percent })
            .collect(),
            heavy_fish_percent: 0.8,
            meal_tiers: vec![
                MealTier {
                    min_multiplier: 0.85,
                    slots: vec![
                        MealSlot::new(8, "morning"),
                        MealSlot::new(14, "afternoon"),
                        MealSlot::new(20, "evening"),
                    ],
                },
                MealTier {
                    min_multiplier: 0.60,
                    slots: vec![MealSlot::new(9, "morning"), MealSlot::new(18, "evening")],
                },
                MealTier {
                    min_multiplier: 0.0,
                    slots: vec![MealSlot::new(9, "single")],
                },
            ],
            neutral_conditions: NeutralConditions {
                temperature: defaults::NEUTRAL_TEMPERATURE,
                ph: defaults::NEUTRAL_PH,
                oxygen: defaults::NEUTRAL_OXYGEN,
                turbidity: defaults::NEUTRAL_TURBIDITY,
            },
        }
    }
}

// ============================================================================
// Environment Score
// ============================================================================

/// Weights of the per-metric sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentWeights {
    pub temperature: f64,
    pub ph: f64,
    pub oxygen: f64,
    pub turbidity: f64,
    pub density: f64,
}

impl Default for EnvironmentWeights {
    fn default() -> Self {
        Self {
            temperature: 0.28,
            ph: 0.18,
            oxygen: 0.28,
            turbidity: 0.12,
            density: 0.14,
        }
    }
}

/// Step function entry: values up to `up_to` score `score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub up_to: f64,
    pub score: f64,
}

fn bands(v: &[(f64, f64)]) -> Vec<ScoreBand> {
    v.iter()
        .map(|&(up_to, score)| ScoreBand { up_to, score })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentScoreConfig {
    pub weights: EnvironmentWeights,
    /// Falloff scale outside the temperature band (°C)
    pub temperature_softness: f64,
    /// Falloff scale outside the pH band
    pub ph_softness: f64,
    /// Oxygen at or below this is severely depleted
    pub oxygen_floor: f64,
    /// Oxygen span above the minimum over which the score saturates
    pub oxygen_saturation_span: f64,
    pub turbidity_bands: Vec<ScoreBand>,
    pub turbidity_fallback: f64,
    pub density_bands: Vec<ScoreBand>,
    pub density_fallback: f64,
}

impl Default for EnvironmentScoreConfig {
    fn default() -> Self {
        Self {
            weights: EnvironmentWeights::default(),
            temperature_softness: 2.5,
            ph_softness: 0.6,
            oxygen_floor: 30.0,
            oxygen_saturation_span: 30.0,
            turbidity_bands: bands(&[(20.0, 1.0), (50.0, 0.85), (100.0, 0.60)]),
            turbidity_fallback: 0.35,
            density_bands: bands(&[(20.0, 1.0), (25.0, 0.92), (35.0, 0.75), (50.0, 0.55)]),
            density_fallback: 0.40,
        }
    }
}

// ============================================================================
// Monitor
// ============================================================================

/// Cadence of the monitoring daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// sled directory
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_reconcile_every")]
    pub reconcile_every_ticks: u64,

    #[serde(default = "default_feed_plan_every")]
    pub feed_plan_every_ticks: u64,

    #[serde(default = "default_optimizer_threads")]
    pub optimizer_threads: usize,

    #[serde(default = "default_analytics_window")]
    pub analytics_window: usize,
}

fn default_data_dir() -> String {
    "./aquawatch_data".to_string()
}
fn default_reconcile_every() -> u64 {
    defaults::RECONCILE_EVERY_TICKS
}
fn default_feed_plan_every() -> u64 {
    defaults::FEED_PLAN_EVERY_TICKS
}
fn default_optimizer_threads() -> usize {
    defaults::OPTIMIZER_THREADS
}
fn default_analytics_window() -> usize {
    defaults::ANALYTICS_WINDOW
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reconcile_every_ticks: default_reconcile_every(),
            feed_plan_every_ticks: default_feed_plan_every(),
            optimizer_threads: default_optimizer_threads(),
            analytics_window: default_analytics_window(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Band;

    #[test]
    fn defaults_validate() {
        AquaConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_file_gets_reference_tanks() {
        let config = AquaConfig::from_toml_str("").unwrap();
        assert_eq!(config.tanks.len(), 4);
        assert_eq!(config.simulation.tick_interval_secs, 30);
        assert_eq!(config.optimizer.population_size, 28);
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let mut config = AquaConfig::default();
        config.simulation.seed = Some(7);
        config.tanks[0].profile = Some(TankProfile::derived(9));
        let text = config.to_toml().unwrap();
        let back = AquaConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.simulation, config.simulation);
        assert_eq!(back.tanks, config.tanks);
        assert_eq!(back.thresholds, config.thresholds);
        assert_eq!(back.feeding, config.feeding);
    }

    #[test]
    fn inverted_bands_are_rejected() {
        let mut config = AquaConfig::default();
        config.thresholds.temperature.critical = Band::between(25.0, 35.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thresholds.temperature"));
    }

    #[test]
    fn weight_sum_is_checked() {
        let mut config = AquaConfig::default();
        config.environment_score.weights.density = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn duplicate_tank_ids_are_rejected() {
        let mut config = AquaConfig::default();
        config.tanks[1].id = 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate tank id 1"));
    }

    #[test]
    fn offset_follows_minutes() {
        let farm = FarmInfo {
            name: "x".into(),
            utc_offset_minutes: -180,
        };
        assert_eq!(farm.offset().local_minus_utc(), -180 * 60);
    }
}
