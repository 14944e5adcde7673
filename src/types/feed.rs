//! Feed plans and scheduled meals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the per-fish dosage was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStrategy {
    /// Genetic optimizer blended with the feed-rate table.
    Genetic,
    /// Percent-of-body-weight rule reduced by water severity.
    Baseline,
}

impl std::fmt::Display for FeedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedStrategy::Genetic => write!(f, "ga+table"),
            FeedStrategy::Baseline => write!(f, "baseline"),
        }
    }
}

/// One scheduled meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub scheduled_at: DateTime<Utc>,
    pub label: String,
    pub grams_per_fish: f64,
    pub total_grams: f64,
}

/// Daily feed recommendation for a tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPlan {
    pub tank_id: u32,
    pub strategy: FeedStrategy,
    pub grams_per_fish: f64,
    pub total_grams: f64,
    pub base_feed_rate_percent: f64,
    pub adjusted_feed_rate_percent: f64,
    pub environment_multiplier: f64,
    /// Estimated body weight used for the table lookup (kg).
    pub weight_kg: f64,
    pub ga_grams_per_fish: Option<f64>,
    pub ga_fitness: Option<f64>,
    pub ga_generations: Option<usize>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub meals: Vec<Meal>,
}

impl FeedPlan {
    pub fn meal_total(&self) -> f64 {
        self.meals.iter().map(|m| m.total_grams).sum()
    }
}
