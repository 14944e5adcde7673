//! Feed optimization.
//!
//! - `ga`: genetic search for the per-fish dosage
//! - `environment`: water conditions collapsed into one [0, 1] multiplier
//! - `plan`: dosage blending, feed-rate table and meal schedule
//! - `advisor`: repository-backed use case, one tank or many

pub mod advisor;
pub mod environment;
pub mod ga;
pub mod plan;

pub use advisor::{build_pool, FeedAdvisor, FeedError, GrowthFeatures, WeightPredictor};
pub use environment::{EnvironmentInputs, EnvironmentScore, EnvironmentScorer};
pub use ga::{
    AlphaRange, Candidate, GaConfig, GeneticOptimizer, OptimizationResult, OptimizerError,
};
pub use plan::{feed_rate_percent, next_occurrence, FeedPlanner, PlanInputs};
