//! Feed plan assembly: dosage blending, feed-rate lookup and meal schedule.

use chrono::{DateTime, Duration, FixedOffset, Utc};

use super::environment::EnvironmentScore;
use super::ga::{GaConfig, GeneticOptimizer, OptimizerError};
use crate::config::{FeedRateBand, FeedingConfig, MealSlot};
use crate::severity::Severity;
use crate::types::{FeedPlan, FeedStrategy, Meal};

/// Everything the planner needs to know about one tank right now.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs {
    pub tank_id: u32,
    pub fish_count: u32,
    pub weight_kg: f64,
    pub environment: EnvironmentScore,
    /// Aggregate severity of the reading the environment was scored from
    pub severity: Severity,
}

/// Reference daily ration (% of body weight) for a fish of `weight_kg`.
pub fn feed_rate_percent(table: &[FeedRateBand], heavy_fish_percent: f64, weight_kg: f64) -> f64 {
    table
        .iter()
        .find(|band| weight_kg < band.below_kg)
        .map_or(heavy_fish_percent, |band| band.percent)
}

/// First instant strictly after `now` at which the local clock shows `slot`.
pub fn next_occurrence(now: DateTime<FixedOffset>, slot: &MealSlot) -> DateTime<Utc> {
    let today = now
        .date_naive()
        .and_hms_opt(slot.hour, slot.minute, 0)
        .and_then(|naive| naive.and_local_timezone(*now.offset()).single());
    match today {
        Some(t) if t > now => t.with_timezone(&Utc),
        Some(t) => (t + Duration::days(1)).with_timezone(&Utc),
        None => now.with_timezone(&Utc),
    }
}

pub struct FeedPlanner {
    feeding: FeedingConfig,
    optimizer: Option<GeneticOptimizer>,
}

impl FeedPlanner {
    /// Build a planner; the optimizer config is validated even when the GA
    /// is switched off so a bad file fails at startup.
    pub fn new(feeding: FeedingConfig, ga: GaConfig) -> Result<Self, OptimizerError> {
        let optimizer = GeneticOptimizer::new(ga)?;
        let optimizer = feeding.use_genetic_optimizer.then_some(optimizer);
        Ok(Self { feeding, optimizer })
    }

    pub fn feeding(&self) -> &FeedingConfig {
        &self.feeding
    }

    pub fn plan(&self, inputs: &PlanInputs, now: DateTime<FixedOffset>) -> FeedPlan {
        let f = &self.feeding;
        let env = inputs.environment.multiplier;
        let base_pct = feed_rate_percent(&f.feed_rate_table, f.heavy_fish_percent, inputs.weight_kg);
        let adjusted_pct = base_pct * env;
        let weight_g = inputs.weight_kg * 1000.0;

        let (strategy, grams_per_fish, ga, notes) = match &self.optimizer {
            Some(optimizer) => {
                let result = optimizer.optimize(env);
                let table_g = adjusted_pct / 100.0 * weight_g;
                let blended = f.ga_blend * result.best.dosage + (1.0 - f.ga_blend) * table_g;
                let notes = format!(
                    "GA {:.2} g (fitness {:.4}, {} gen{}) blended with table {:.2} g; env {:.2}",
                    result.best.dosage,
                    result.best.fitness,
                    result.generations,
                    if result.converged { ", converged" } else { "" },
                    table_g,
                    env
                );
                (FeedStrategy::Genetic, blended, Some(result), notes)
            }
            None => {
                let raw = (weight_g * f.baseline_percent_of_weight / 100.0).max(f.min_grams_per_fish);
                let (factor, notes) = match inputs.severity {
                    Severity::Normal => (1.0, "normal conditions".to_string()),
                    Severity::Warning => (
                        1.0 - f.warning_reduction,
                        format!("reduced {:.0}% for WARNING", f.warning_reduction * 100.0),
                    ),
                    Severity::Critical => (
                        1.0 - f.critical_reduction,
                        format!("reduced {:.0}% for CRITICAL", f.critical_reduction * 100.0),
                    ),
                };
                (FeedStrategy::Baseline, raw * factor, None, notes)
            }
        };

        let grams_per_fish = grams_per_fish.clamp(f.min_grams_per_fish, f.max_grams_per_fish);
        let total_grams = grams_per_fish * f64::from(inputs.fish_count);
        let meals = self.schedule_meals(env, grams_per_fish, inputs.fish_count, now);

        FeedPlan {
            tank_id: inputs.tank_id,
            strategy,
            grams_per_fish,
            total_grams,
            base_feed_rate_percent: base_pct,
            adjusted_feed_rate_percent: adjusted_pct,
            environment_multiplier: env,
            weight_kg: inputs.weight_kg,
            ga_grams_per_fish: ga.as_ref().map(|r| r.best.dosage),
            ga_fitness: ga.as_ref().map(|r| r.best.fitness),
            ga_generations: ga.as_ref().map(|r| r.generations),
            notes,
            created_at: now.with_timezone(&Utc),
            meals,
        }
    }

    /// Slots of the first tier whose threshold the multiplier reaches.
    pub fn meal_slots(&self, env: f64) -> &[MealSlot] {
        self.feeding
            .meal_tiers
            .iter()
            .find(|tier| env >= tier.min_multiplier)
            .or_else(|| self.feeding.meal_tiers.last())
            .map_or(&[][..], |tier| tier.slots.as_slice())
    }

    fn schedule_meals(
        &self,
        env: f64,
        grams_per_fish: f64,
        fish_count: u32,
        now: DateTime<FixedOffset>,
    ) -> Vec<Meal> {
        let slots = self.meal_slots(env);
        if slots.is_empty() {
            return Vec::new();
        }
        let per_meal = grams_per_fish / slots.len() as f64;
        let mut meals: Vec<Meal> = slots
            .iter()
            .map(|slot| Meal {
                scheduled_at: next_occurrence(now, slot),
                label: slot.label.clone(),
                grams_per_fish: per_meal,
                total_grams: per_meal * f64::from(fish_count),
            })
            .collect();
        meals.sort_by_key(|m| m.scheduled_at);
        meals
    }
}
