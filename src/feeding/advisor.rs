//! Feed advisor: turns a tank's latest conditions into a persisted feed plan.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use tracing::{info, warn};

use super::environment::{EnvironmentInputs, EnvironmentScorer};
use super::ga::OptimizerError;
use super::plan::{FeedPlanner, PlanInputs};
use crate::config::{AquaConfig, EnvironmentScoreConfig};
use crate::severity::{aggregate, ThresholdConfig};
use crate::storage::{FeedPlanRepository, RepositoryError, SensorRepository, TankRepository};
use crate::types::{FeedPlan, Reading, ReadingError, Tank};

/// Inputs of the weight model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthFeatures {
    pub temperature: f64,
    pub ph: f64,
    pub oxygen: f64,
    pub turbidity: f64,
    pub days_of_cultivation: f64,
    pub stocking_density: f64,
}

/// Estimates mean fish weight in kilograms.
///
/// Any `Fn(&GrowthFeatures) -> f64` closure is a predictor.
pub trait WeightPredictor: Send + Sync {
    fn predict(&self, features: &GrowthFeatures) -> f64;
}

impl<F> WeightPredictor for F
where
    F: Fn(&GrowthFeatures) -> f64 + Send + Sync,
{
    fn predict(&self, features: &GrowthFeatures) -> f64 {
        self(features)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("tank {0} not found")]
    TankNotFound(u32),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
    #[error("neutral reading rejected: {0}")]
    InvalidReading(#[from] ReadingError),
}

/// Build the bounded pool used by [`FeedAdvisor::recommend_all`].
pub fn build_pool(threads: usize) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("feed-optimizer-{i}"))
        .build()
}

pub struct FeedAdvisor {
    planner: FeedPlanner,
    thresholds: ThresholdConfig,
    scoring: EnvironmentScoreConfig,
    offset: FixedOffset,
    tanks: Arc<dyn TankRepository>,
    sensors: Arc<dyn SensorRepository>,
    plans: Arc<dyn FeedPlanRepository>,
    predictor: Option<Arc<dyn WeightPredictor>>,
}

impl FeedAdvisor {
    pub fn new(
        config: &AquaConfig,
        tanks: Arc<dyn TankRepository>,
        sensors: Arc<dyn SensorRepository>,
        plans: Arc<dyn FeedPlanRepository>,
    ) -> Result<Self, OptimizerError> {
        Ok(Self {
            planner: FeedPlanner::new(config.feeding.clone(), config.optimizer.clone())?,
            thresholds: config.thresholds.clone(),
            scoring: config.environment_score.clone(),
            offset: config.farm.offset(),
            tanks,
            sensors,
            plans,
            predictor: None,
        })
    }

    pub fn with_predictor(mut self, predictor: impl WeightPredictor + 'static) -> Self {
        self.predictor = Some(Arc::new(predictor));
        self
    }

    /// Plan for one tank from its latest reading (or neutral conditions when
    /// it has none), then persist it.
    ///
    /// `days_of_cultivation` defaults to the configured value.
    pub fn recommend(
        &self,
        tank_id: u32,
        days_of_cultivation: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<FeedPlan, FeedError> {
        let tank = self
            .tanks
            .get(tank_id)?
            .ok_or(FeedError::TankNotFound(tank_id))?;

        let reading = match self.sensors.latest(tank_id)? {
            Some(r) => r,
            None => self.neutral_reading(tank_id, now)?,
        };

        let feeding = self.planner.feeding();
        let density = tank.stocking_density();
        if tank.is_overcrowded(feeding.max_density_per_m3) {
            warn!(
                tank_id,
                density = format_args!("{density:.1}"),
                max = feeding.max_density_per_m3,
                "tank is overcrowded"
            );
        }

        let days = days_of_cultivation.unwrap_or(feeding.days_of_cultivation);
        let weight_kg = self.estimate_weight(&tank, &reading, days, density);

        let environment = EnvironmentScorer::new(&self.thresholds, &self.scoring)
            .score(&EnvironmentInputs::from_reading(&reading, density));
        let inputs = PlanInputs {
            tank_id,
            fish_count: tank.fish_count,
            weight_kg,
            environment,
            severity: aggregate(&reading, &self.thresholds),
        };

        let plan = self.planner.plan(&inputs, now.with_timezone(&self.offset));
        self.plans.save(&plan)?;
        info!(
            tank_id,
            strategy = %plan.strategy,
            grams_per_fish = format_args!("{:.2}", plan.grams_per_fish),
            total_grams = format_args!("{:.1}", plan.total_grams),
            env = format_args!("{:.2}", plan.environment_multiplier),
            "feed plan saved"
        );
        Ok(plan)
    }

    /// Plan several tanks on `pool`; one failing tank does not stop the rest.
    pub fn recommend_all(
        &self,
        tank_ids: &[u32],
        days_of_cultivation: Option<f64>,
        now: DateTime<Utc>,
        pool: &ThreadPool,
    ) -> Vec<(u32, Result<FeedPlan, FeedError>)> {
        pool.install(|| {
            tank_ids
                .par_iter()
                .map(|&id| (id, self.recommend(id, days_of_cultivation, now)))
                .collect()
        })
    }

    fn neutral_reading(&self, tank_id: u32, now: DateTime<Utc>) -> Result<Reading, ReadingError> {
        let n = &self.planner.feeding().neutral_conditions;
        Reading::new(tank_id, n.temperature, n.ph, n.oxygen, n.turbidity, now)
    }

    fn estimate_weight(&self, tank: &Tank, reading: &Reading, days: f64, density: f64) -> f64 {
        let baseline = self.planner.feeding().baseline_weight_kg;
        let Some(predictor) = &self.predictor else {
            return baseline;
        };
        let features = GrowthFeatures {
            temperature: reading.temperature(),
            ph: reading.ph(),
            oxygen: reading.oxygen(),
            turbidity: reading.turbidity(),
            days_of_cultivation: days,
            stocking_density: density,
        };
        let predicted = predictor.predict(&features);
        if predicted.is_finite() && predicted > 0.0 {
            predicted
        } else {
            warn!(tank_id = tank.id, predicted, "unusable weight prediction, using baseline");
            baseline
        }
    }
}
