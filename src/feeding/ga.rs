//! Genetic search over daily dosage (grams per fish per day).
//!
//! The objective rewards feed with diminishing returns (`log1p`) scaled by
//! the environment multiplier, and penalises dosing past a sweet spot
//! quadratically. A run is fully determined by its seed.
//!
//! Per generation:
//! 1. score every candidate once and track the best ever seen
//! 2. stop when `stagnation_patience` generations bring no improvement
//! 3. carry the top `elite_fraction` over unchanged
//! 4. fill the rest with tournament-selected, blend-crossed, mutated children

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Optimizer failures. All of them are raised before the first generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizerError {
    #[error("invalid optimizer configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),
    #[error("mutation distribution: {0}")]
    Distribution(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Blend-crossover weight range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaRange {
    pub min: f64,
    pub max: f64,
}

/// Genetic optimizer hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    pub population_size: usize,
    pub max_generations: usize,
    pub tournament_size: usize,
    pub crossover_alpha: AlphaRange,
    pub mutation_sigma: f64,
    pub elite_fraction: f64,
    pub stagnation_patience: usize,
    /// Minimum fitness gain that resets the stagnation counter
    pub improvement_tolerance: f64,
    pub seed: u64,
    pub min_grams: f64,
    pub max_grams: f64,
    pub sweet_spot_grams: f64,
    pub waste_weight: f64,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 28,
            max_generations: 60,
            tournament_size: 2,
            crossover_alpha: AlphaRange {
                min: 0.15,
                max: 0.85,
            },
            mutation_sigma: 0.25,
            elite_fraction: 0.12,
            stagnation_patience: 12,
            improvement_tolerance: 1e-4,
            seed: 42,
            min_grams: 0.5,
            max_grams: 5.0,
            sweet_spot_grams: 2.8,
            waste_weight: 3.0,
        }
    }
}

impl GaConfig {
    /// Number of candidates copied unchanged into each new generation.
    pub fn elite_count(&self) -> usize {
        ((self.elite_fraction * self.population_size as f64).round() as usize).max(1)
    }

    /// Every structural problem with this configuration, keyed by field.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let floats = [
            ("mutation_sigma", self.mutation_sigma),
            ("elite_fraction", self.elite_fraction),
            ("improvement_tolerance", self.improvement_tolerance),
            ("min_grams", self.min_grams),
            ("max_grams", self.max_grams),
            ("sweet_spot_grams", self.sweet_spot_grams),
            ("waste_weight", self.waste_weight),
            ("crossover_alpha.min", self.crossover_alpha.min),
            ("crossover_alpha.max", self.crossover_alpha.max),
        ];
        for (name, v) in floats {
            if !v.is_finite() {
                errors.push(format!("{name}: must be finite (got {v})"));
            }
        }
        if !errors.is_empty() {
            return errors;
        }

        if self.population_size < 2 {
            errors.push(format!(
                "population_size: must be >= 2 (got {})",
                self.population_size
            ));
        }
        if self.max_generations == 0 {
            errors.push("max_generations: must be >= 1".to_string());
        }
        if self.stagnation_patience == 0 {
            errors.push("stagnation_patience: must be >= 1".to_string());
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            errors.push(format!(
                "tournament_size: must lie in 1..={} (got {})",
                self.population_size, self.tournament_size
            ));
        }
        let a = self.crossover_alpha;
        if a.min < 0.0 || a.max > 1.0 || a.min > a.max {
            errors.push(format!(
                "crossover_alpha: expected 0 <= min <= max <= 1 (got {}..{})",
                a.min, a.max
            ));
        }
        if self.mutation_sigma < 0.0 {
            errors.push(format!("mutation_sigma: must be >= 0 (got {})", self.mutation_sigma));
        }
        if !(0.0..=1.0).contains(&self.elite_fraction) {
            errors.push(format!(
                "elite_fraction: must lie in [0, 1] (got {})",
                self.elite_fraction
            ));
        } else if self.elite_count() > self.population_size {
            errors.push(format!(
                "elite_fraction: {} elites exceed population_size {}",
                self.elite_count(),
                self.population_size
            ));
        }
        if self.improvement_tolerance < 0.0 {
            errors.push("improvement_tolerance: must be >= 0".to_string());
        }
        if self.min_grams < 0.0 || self.min_grams >= self.max_grams {
            errors.push(format!(
                "min_grams/max_grams: expected 0 <= min_grams < max_grams (got {} / {})",
                self.min_grams, self.max_grams
            ));
        } else if !(self.min_grams..=self.max_grams).contains(&self.sweet_spot_grams) {
            errors.push(format!(
                "sweet_spot_grams: {} lies outside [{}, {}]",
                self.sweet_spot_grams, self.min_grams, self.max_grams
            ));
        }
        if self.waste_weight < 0.0 {
            errors.push("waste_weight: must be >= 0".to_string());
        }
        errors
    }

    pub fn validate(&self) -> Result<(), OptimizerError> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(OptimizerError::InvalidConfig(errors))
        }
    }
}

// ============================================================================
// Optimizer
// ============================================================================

/// A scored dosage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub dosage: f64,
    pub fitness: f64,
}

/// Outcome of one optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    /// Best candidate across all generations
    pub best: Candidate,
    /// Generations evaluated
    pub generations: usize,
    /// Stopped by stagnation rather than the generation cap
    pub converged: bool,
    /// Best-so-far fitness after each generation
    pub history: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct GeneticOptimizer {
    config: GaConfig,
    mutation: Normal<f64>,
}

impl GeneticOptimizer {
    /// Validate `config` and build an optimizer.
    pub fn new(config: GaConfig) -> Result<Self, OptimizerError> {
        config.validate()?;
        let mutation = Normal::new(0.0, config.mutation_sigma)
            .map_err(|e| OptimizerError::Distribution(e.to_string()))?;
        Ok(Self { config, mutation })
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Objective for dosage `g` under environment multiplier `env`.
    pub fn fitness(&self, g: f64, env: f64) -> f64 {
        let c = &self.config;
        let penalty = if g > c.sweet_spot_grams {
            let x = (g - c.sweet_spot_grams) / (c.max_grams - c.sweet_spot_grams + 1e-6);
            c.waste_weight * x * x
        } else {
            0.0
        };
        g.ln_1p() * env - penalty
    }

    /// Run with a generator seeded from the configured seed.
    pub fn optimize(&self, env: f64) -> OptimizationResult {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.run(env, &mut rng)
    }

    /// Run with an injected generator.
    pub fn run<R: Rng + ?Sized>(&self, env: f64, rng: &mut R) -> OptimizationResult {
        let c = &self.config;
        let mut population: Vec<f64> = (0..c.population_size)
            .map(|_| rng.gen_range(c.min_grams..=c.max_grams))
            .collect();

        let mut best: Option<Candidate> = None;
        let mut history = Vec::with_capacity(c.max_generations);
        let mut stagnant = 0usize;
        let mut converged = false;

        for generation in 0..c.max_generations {
            let scored = self.score(&population, env);
            let Some(&leader) = scored.first() else {
                break;
            };

            let improved = best.map_or(true, |b| leader.fitness > b.fitness + c.improvement_tolerance);
            if best.map_or(true, |b| leader.fitness > b.fitness) {
                best = Some(leader);
            }
            stagnant = if improved { 0 } else { stagnant + 1 };
            history.push(best.map_or(leader.fitness, |b| b.fitness));

            if stagnant >= c.stagnation_patience {
                converged = true;
                debug!(generation, best = ?best, "GA stagnated");
                break;
            }
            if generation + 1 < c.max_generations {
                population = self.breed(&scored, rng);
            }
        }

        let generations = history.len();
        let best = best.unwrap_or(Candidate {
            dosage: c.sweet_spot_grams,
            fitness: self.fitness(c.sweet_spot_grams, env),
        });
        OptimizationResult {
            best,
            generations,
            converged,
            history,
        }
    }

    /// Score a population, fittest first.
    fn score(&self, population: &[f64], env: f64) -> Vec<Candidate> {
        let mut scored: Vec<Candidate> = population
            .iter()
            .map(|&dosage| Candidate {
                dosage,
                fitness: self.fitness(dosage, env),
            })
            .collect();
        scored.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        scored
    }

    fn breed<R: Rng + ?Sized>(&self, scored: &[Candidate], rng: &mut R) -> Vec<f64> {
        let c = &self.config;
        let mut next: Vec<f64> = scored
            .iter()
            .take(c.elite_count())
            .map(|cand| cand.dosage)
            .collect();

        while next.len() < c.population_size {
            let p1 = self.tournament(scored, rng);
            let p2 = self.tournament(scored, rng);
            let alpha = rng.gen_range(c.crossover_alpha.min..=c.crossover_alpha.max);
            let child = alpha * p1 + (1.0 - alpha) * p2 + self.mutation.sample(rng);
            next.push(child.clamp(c.min_grams, c.max_grams));
        }
        next
    }

    /// Fittest of `tournament_size` distinct draws.
    fn tournament<R: Rng + ?Sized>(&self, scored: &[Candidate], rng: &mut R) -> f64 {
        index::sample(rng, scored.len(), self.config.tournament_size)
            .iter()
            .map(|i| scored[i])
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
            .map_or(self.config.sweet_spot_grams, |cand| cand.dosage)
    }
}
