//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.
//!
//! Arrays of tables (`[[tanks]]`, `feeding.meal_tiers`, score bands) are
//! checked by serde itself and are not walked here.

use std::collections::HashSet;

use crate::types::Metric;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for AquaConfig.
///
/// Maintained by hand to match the struct hierarchy in aqua_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [farm]
        "farm",
        "farm.name",
        "farm.utc_offset_minutes",
        // [thresholds.*]
        "thresholds",
        "thresholds.temperature",
        "thresholds.temperature.operational",
        "thresholds.temperature.operational.min",
        "thresholds.temperature.operational.max",
        "thresholds.temperature.critical",
        "thresholds.temperature.critical.min",
        "thresholds.temperature.critical.max",
        "thresholds.ph",
        "thresholds.ph.operational",
        "thresholds.ph.operational.min",
        "thresholds.ph.operational.max",
        "thresholds.ph.critical",
        "thresholds.ph.critical.min",
        "thresholds.ph.critical.max",
        "thresholds.oxygen",
        "thresholds.oxygen.operational",
        "thresholds.oxygen.operational.min",
        "thresholds.oxygen.operational.max",
        "thresholds.oxygen.critical",
        "thresholds.oxygen.critical.min",
        "thresholds.oxygen.critical.max",
        "thresholds.turbidity",
        "thresholds.turbidity.operational",
        "thresholds.turbidity.operational.min",
        "thresholds.turbidity.operational.max",
        "thresholds.turbidity.critical",
        "thresholds.turbidity.critical.min",
        "thresholds.turbidity.critical.max",
        // [simulation]
        "simulation",
        "simulation.tick_interval_secs",
        "simulation.seed",
        "simulation.spike_probability",
        "simulation.feed_times_minutes",
        "simulation.feed_window_minutes",
        "simulation.feeding_duration_minutes",
        "simulation.feeding_strength",
        "simulation.aerator_failure_rate_per_hour",
        "simulation.aerator_failure_minutes",
        "simulation.aerator_failure_minutes.min",
        "simulation.aerator_failure_minutes.max",
        "simulation.aerator_failure_strength",
        "simulation.aerator_failure_strength.min",
        "simulation.aerator_failure_strength.max",
        "simulation.water_renewal_probability_per_day",
        "simulation.water_renewal_minutes",
        "simulation.water_renewal_minutes.min",
        "simulation.water_renewal_minutes.max",
        "simulation.water_renewal_strength",
        "simulation.water_renewal_strength.min",
        "simulation.water_renewal_strength.max",
        "simulation.bio_load",
        "simulation.bio_load.initial",
        "simulation.bio_load.max",
        "simulation.bio_load.growth_per_hour",
        "simulation.bio_load.renewal_drop_per_tick",
        // [[tanks]]
        "tanks",
        // [optimizer]
        "optimizer",
        "optimizer.population_size",
        "optimizer.max_generations",
        "optimizer.tournament_size",
        "optimizer.crossover_alpha",
        "optimizer.crossover_alpha.min",
        "optimizer.crossover_alpha.max",
        "optimizer.mutation_sigma",
        "optimizer.elite_fraction",
        "optimizer.stagnation_patience",
        "optimizer.improvement_tolerance",
        "optimizer.seed",
        "optimizer.min_grams",
        "optimizer.max_grams",
        "optimizer.sweet_spot_grams",
        "optimizer.waste_weight",
        // [feeding]
        "feeding",
        "feeding.use_genetic_optimizer",
        "feeding.ga_blend",
        "feeding.min_grams_per_fish",
        "feeding.max_grams_per_fish",
        "feeding.baseline_weight_kg",
        "feeding.baseline_percent_of_weight",
        "feeding.warning_reduction",
        "feeding.critical_reduction",
        "feeding.days_of_cultivation",
        "feeding.max_density_per_m3",
        "feeding.feed_rate_table",
        "feeding.heavy_fish_percent",
        "feeding.meal_tiers",
        "feeding.neutral_conditions",
        "feeding.neutral_conditions.temperature",
        "feeding.neutral_conditions.ph",
        "feeding.neutral_conditions.oxygen",
        "feeding.neutral_conditions.turbidity",
        // [environment_score]
        "environment_score",
        "environment_score.weights",
        "environment_score.weights.temperature",
        "environment_score.weights.ph",
        "environment_score.weights.oxygen",
        "environment_score.weights.turbidity",
        "environment_score.weights.density",
        "environment_score.temperature_softness",
        "environment_score.ph_softness",
        "environment_score.oxygen_floor",
        "environment_score.oxygen_saturation_span",
        "environment_score.turbidity_bands",
        "environment_score.turbidity_fallback",
        "environment_score.density_bands",
        "environment_score.density_fallback",
        // [monitor]
        "monitor",
        "monitor.data_dir",
        "monitor.reconcile_every_ticks",
        "monitor.feed_plan_every_ticks",
        "monitor.optimizer_threads",
        "monitor.analytics_window",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, d)| d <= 3)
        // Tie-break on the key itself so the suggestion does not depend on hash order
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed AquaConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::AquaConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Thresholds outside what a sensor can physically report never trigger
    for metric in Metric::ALL {
        let (lo, hi) = metric.hard_bounds();
        let t = config.thresholds.for_metric(metric);
        for (label, bound) in [
            ("operational.min", t.operational.min),
            ("operational.max", t.operational.max),
            ("critical.min", t.critical.min),
            ("critical.max", t.critical.max),
        ] {
            if let Some(v) = bound {
                if v < lo || v > hi {
                    errors.push(format!(
                        "thresholds.{metric}.{label} = {v} is outside physical range ({lo}-{hi})"
                    ));
                }
            }
        }
    }

    for tank in &config.tanks {
        if let Some(profile) = tank.profile {
            for metric in Metric::ALL {
                let p = profile.metric(metric);
                let (lo, hi) = metric.hard_bounds();
                if !(lo..=hi).contains(&p.base) || p.variance < 0.0 {
                    errors.push(format!(
                        "tanks[{}].profile.{metric}: base {} must lie in {lo}-{hi} and variance {} must be >= 0",
                        tank.id, p.base, p.variance
                    ));
                }
            }
        }

        let density = tank.to_tank().stocking_density();
        if density > config.feeding.max_density_per_m3 {
            warnings.push(ValidationWarning {
                field: format!("tanks[{}]", tank.id),
                message: format!(
                    "tank {} stocking density {:.1}/m³ exceeds {:.1}/m³",
                    tank.id, density, config.feeding.max_density_per_m3
                ),
                suggestion: None,
            });
        }
    }

    // Ticks wider than the +/-5 minute feed window can step over a feeding
    if config.simulation.tick_interval_secs > 600 {
        warnings.push(ValidationWarning {
            field: "simulation.tick_interval_secs".to_string(),
            message: format!(
                "simulation.tick_interval_secs = {} is coarser than the feed window",
                config.simulation.tick_interval_secs
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}
