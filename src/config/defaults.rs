//! System-wide default constants.
//!
//! Physical limits and tuning values shared by the configuration layer, the
//! simulator and the feed planner. Grouped by subsystem for easy discovery.

// ============================================================================
// Hard Physical Bounds
// ============================================================================

/// Water temperature range accepted for any reading (°C).
pub const TEMPERATURE_BOUNDS: (f64, f64) = (0.0, 50.0);

/// pH range accepted for any reading.
pub const PH_BOUNDS: (f64, f64) = (0.0, 14.0);

/// Dissolved oxygen saturation range accepted for any reading (%).
pub const OXYGEN_BOUNDS: (f64, f64) = (0.0, 100.0);

/// Turbidity range accepted for any reading (NTU).
pub const TURBIDITY_BOUNDS: (f64, f64) = (0.0, 200.0);

// ============================================================================
// Clock
// ============================================================================

/// Minutes in a simulated day.
pub const MINUTES_PER_DAY: u32 = 1_440;

/// Default simulation tick (seconds).
pub const TICK_INTERVAL_SECS: u64 = 30;

/// Longest accepted simulation tick (one day).
pub const MAX_TICK_INTERVAL_SECS: u64 = 86_400;

// ============================================================================
// Simulation Events
// ============================================================================

/// Feed times as minutes after midnight (08:00, 12:00, 18:00).
pub const FEED_TIMES_MINUTES: [u32; 3] = [480, 720, 1_080];

/// Half-width of the window around a feed time in which feeding starts.
pub const FEED_WINDOW_MINUTES: u32 = 5;

/// Duration of a feeding disturbance (minutes).
pub const FEEDING_DURATION_MINUTES: u32 = 45;

/// Expected aerator failures per hour of operation.
pub const AERATOR_FAILURE_RATE_PER_HOUR: f64 = 0.08;

/// Probability of a water renewal on any given day.
pub const WATER_RENEWAL_PROBABILITY_PER_DAY: f64 = 0.20;

/// Probability of a one-tick sensor spike.
pub const SPIKE_PROBABILITY: f64 = 0.005;

// ============================================================================
// Bio-load
// ============================================================================

/// Bio-load of a freshly initialised tank.
pub const BIO_LOAD_INITIAL: f64 = 0.10;

/// Bio-load ceiling.
pub const BIO_LOAD_MAX: f64 = 2.0;

/// Bio-load gained per hour without renewal.
pub const BIO_LOAD_GROWTH_PER_HOUR: f64 = 0.004;

/// Bio-load removed per tick while water is being renewed.
pub const BIO_LOAD_RENEWAL_DROP_PER_TICK: f64 = 0.015;

// ============================================================================
// Feeding
// ============================================================================

/// Assumed fish weight when no growth predictor is available (kg).
pub const BASELINE_WEIGHT_KG: f64 = 0.10;

/// Share of the GA dosage in the blended recommendation.
pub const GA_BLEND_RATIO: f64 = 0.6;

/// Practical per-fish daily dosage range (g).
pub const GRAMS_PER_FISH_RANGE: (f64, f64) = (0.1, 10.0);

/// Days of cultivation assumed when the caller does not provide one.
pub const DAYS_OF_CULTIVATION: f64 = 120.0;

/// Stocking density above which a tank is considered overcrowded (fish/m³).
pub const MAX_DENSITY_PER_M3: f64 = 20.0;

/// Neutral water conditions used when a tank has no reading yet.
pub const NEUTRAL_TEMPERATURE: f64 = 26.0;
pub const NEUTRAL_PH: f64 = 7.2;
pub const NEUTRAL_OXYGEN: f64 = 80.0;
pub const NEUTRAL_TURBIDITY: f64 = 20.0;

// ============================================================================
// Monitoring Loop
// ============================================================================

/// Ticks between reconciliation sweeps.
pub const RECONCILE_EVERY_TICKS: u64 = 20;

/// Ticks between feed-plan rounds (120 × 30 s = 1 hour of simulated time).
pub const FEED_PLAN_EVERY_TICKS: u64 = 120;

/// Worker threads reserved for concurrent feed optimisations.
pub const OPTIMIZER_THREADS: usize = 2;

/// Readings considered by the analytics summary.
pub const ANALYTICS_WINDOW: usize = 50;
