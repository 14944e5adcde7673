//! Farm Configuration Module
//!
//! Provides farm configuration loaded from TOML files, replacing hardcoded
//! thresholds, event rates and optimizer settings with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `AQUAWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `aquawatch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The configuration is loaded once at startup and passed down by reference:
//!
//! ```ignore
//! let config = AquaConfig::load();
//! let engine = SimulationEngine::from_config(&config, seed);
//! ```

mod aqua_config;
pub mod defaults;
pub mod validation;

pub use aqua_config::*;
