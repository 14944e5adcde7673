//! Tick loop driving simulation -> alerting, with periodic reconciliation
//! and feed planning.
//!
//! Every tick advances a simulated clock by the configured tick interval,
//! independent of how fast ticks fire in wall-clock time. CPU work and
//! repository calls are synchronous and run on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use rayon::ThreadPool;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerting::AlertMonitor;
use crate::analytics;
use crate::config::{AquaConfig, MonitorConfig};
use crate::feeding::FeedAdvisor;
use crate::simulation::SimulationEngine;
use crate::storage::{AlertRepository, RepositoryError, SensorRepository};

/// Loop cadence and bounds.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Wall-clock time between ticks
    pub interval: Duration,
    /// Simulated time advanced per tick
    pub sim_step: chrono::Duration,
    /// Simulated instant of tick 0
    pub start: DateTime<FixedOffset>,
    /// Stop after this many ticks; run until cancelled when `None`
    pub max_ticks: Option<u64>,
    pub monitor: MonitorConfig,
}

impl LoopSettings {
    pub fn from_config(
        config: &AquaConfig,
        interval: Duration,
        start: DateTime<FixedOffset>,
        max_ticks: Option<u64>,
    ) -> Self {
        // Out-of-range intervals fall back to one day; validation rejects them
        let sim_step = i64::try_from(config.simulation.tick_interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::days(1));
        Self {
            interval,
            sim_step,
            start,
            max_ticks,
            monitor: config.monitor.clone(),
        }
    }

    fn is_due(every: u64, tick: u64) -> bool {
        every > 0 && tick % every == 0
    }

    /// Simulated instant of `tick`, `None` once the clock would overflow.
    pub fn instant(&self, tick: u64) -> Option<DateTime<FixedOffset>> {
        let ticks = i32::try_from(tick).ok()?;
        let offset = self.sim_step.checked_mul(ticks)?;
        self.start.checked_add_signed(offset)
    }
}

/// First simulated instant that follows every reading already stored for
/// `tank_ids`: `now`, or one `step` after the newest stored reading when that
/// lies ahead of `now`. Starting there keeps a restarted loop's readings in
/// timestamp order behind the ones a previous run wrote.
pub fn resume_after(
    sensors: &dyn SensorRepository,
    tank_ids: &[u32],
    now: DateTime<Utc>,
    step: chrono::Duration,
) -> Result<DateTime<Utc>, RepositoryError> {
    let mut start = now;
    for &tank_id in tank_ids {
        if let Some(last) = sensors.latest(tank_id)? {
            let next = last
                .timestamp()
                .checked_add_signed(step)
                .unwrap_or_else(|| last.timestamp());
            start = start.max(next);
        }
    }
    Ok(start)
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub ticks: u64,
    pub readings: u64,
    pub alerts_raised: u64,
    pub alerts_resolved: u64,
    pub reconciled: u64,
    pub feed_plans: u64,
    pub errors: u64,
}

impl std::fmt::Display for LoopStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Monitor: {} ticks, {} readings, {} alerts raised ({} resolved, {} reconciled), {} feed plans, {} errors",
            self.ticks,
            self.readings,
            self.alerts_raised,
            self.alerts_resolved,
            self.reconciled,
            self.feed_plans,
            self.errors
        )
    }
}

/// Shared services the loop drives.
#[derive(Clone)]
pub struct LoopServices {
    pub engine: Arc<SimulationEngine>,
    pub monitor: Arc<AlertMonitor>,
    pub advisor: Arc<FeedAdvisor>,
    pub sensors: Arc<dyn SensorRepository>,
    pub alerts: Arc<dyn AlertRepository>,
    pub pool: Arc<ThreadPool>,
}

pub struct MonitoringLoop {
    services: LoopServices,
    tank_ids: Arc<Vec<u32>>,
    settings: LoopSettings,
    cancel_token: CancellationToken,
}

impl MonitoringLoop {
    pub fn new(
        services: LoopServices,
        tank_ids: Vec<u32>,
        settings: LoopSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            services,
            tank_ids: Arc::new(tank_ids),
            settings,
            cancel_token,
        }
    }

    /// Run until `max_ticks` or cancellation. Returns final counters.
    pub async fn run(self) -> LoopStats {
        let mut stats = LoopStats::default();
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            tanks = self.tank_ids.len(),
            interval_ms = self.settings.interval.as_millis() as u64,
            start = %self.settings.start,
            "monitoring loop started"
        );

        loop {
            if self.settings.max_ticks.is_some_and(|max| stats.ticks >= max) {
                info!(ticks = stats.ticks, "tick limit reached");
                break;
            }

            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("shutdown signal received");
                    break;
                }
                _ = interval.tick() => {}
            }

            let tick = stats.ticks;
            let Some(at) = self.settings.instant(tick) else {
                warn!(tick, "simulated clock out of range, stopping");
                break;
            };
            self.run_tick(at, &mut stats).await;

            let m = &self.settings.monitor;
            if LoopSettings::is_due(m.reconcile_every_ticks, tick + 1) {
                self.reconcile(at, &mut stats).await;
            }
            if LoopSettings::is_due(m.feed_plan_every_ticks, tick + 1) {
                self.plan_feeds(at, &mut stats).await;
            }
            stats.ticks += 1;
        }

        self.log_summaries().await;
        info!("{stats}");
        stats
    }

    async fn run_tick(&self, at: DateTime<FixedOffset>, stats: &mut LoopStats) {
        let engine = Arc::clone(&self.services.engine);
        let monitor = Arc::clone(&self.services.monitor);
        let ids = Arc::clone(&self.tank_ids);

        let result = tokio::task::spawn_blocking(move || {
            let mut tick = LoopStats::default();
            for reading in engine.step_many(&ids, at) {
                tick.readings += 1;
                match monitor.process(&reading) {
                    Ok(outcome) => {
                        tick.alerts_raised += outcome.raised.len() as u64;
                        tick.alerts_resolved += outcome.resolved as u64;
                    }
                    Err(e) => {
                        warn!(tank_id = reading.tank_id(), error = %e, "reading not processed");
                        tick.errors += 1;
                    }
                }
            }
            tick
        })
        .await;

        match result {
            Ok(tick) => {
                debug!(at = %at, readings = tick.readings, raised = tick.alerts_raised, "tick done");
                stats.readings += tick.readings;
                stats.alerts_raised += tick.alerts_raised;
                stats.alerts_resolved += tick.alerts_resolved;
                stats.errors += tick.errors;
            }
            Err(e) => {
                error!(error = %e, "simulation tick task failed");
                stats.errors += 1;
            }
        }
    }

    async fn reconcile(&self, at: DateTime<FixedOffset>, stats: &mut LoopStats) {
        let monitor = Arc::clone(&self.services.monitor);
        let ids = Arc::clone(&self.tank_ids);
        let at = at.with_timezone(&Utc);

        match tokio::task::spawn_blocking(move || monitor.reconcile(&ids, at)).await {
            Ok(Ok(n)) => stats.reconciled += n as u64,
            Ok(Err(e)) => {
                warn!(error = %e, "reconciliation failed");
                stats.errors += 1;
            }
            Err(e) => {
                error!(error = %e, "reconciliation task failed");
                stats.errors += 1;
            }
        }
    }

    async fn plan_feeds(&self, at: DateTime<FixedOffset>, stats: &mut LoopStats) {
        let advisor = Arc::clone(&self.services.advisor);
        let pool = Arc::clone(&self.services.pool);
        let ids = Arc::clone(&self.tank_ids);
        let now = at.with_timezone(&Utc);

        let result = tokio::task::spawn_blocking(move || advisor.recommend_all(&ids, None, now, &pool)).await;
        match result {
            Ok(results) => {
                for (tank_id, plan) in results {
                    match plan {
                        Ok(_) => stats.feed_plans += 1,
                        Err(e) => {
                            warn!(tank_id, error = %e, "feed plan failed");
                            stats.errors += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "feed planning task failed");
                stats.errors += 1;
            }
        }
    }

    async fn log_summaries(&self) {
        let sensors = Arc::clone(&self.services.sensors);
        let alerts = Arc::clone(&self.services.alerts);
        let ids = Arc::clone(&self.tank_ids);
        let window = self.settings.monitor.analytics_window;

        let result = tokio::task::spawn_blocking(move || {
            for &tank_id in ids.iter() {
                match analytics::summarize(sensors.as_ref(), alerts.as_ref(), tank_id, window) {
                    Ok(s) => info!(
                        tank_id,
                        readings = s.count,
                        avg_temperature = ?s.avg_temperature,
                        avg_ph = ?s.avg_ph,
                        avg_oxygen = ?s.avg_oxygen,
                        avg_turbidity = ?s.avg_turbidity,
                        open_alerts = s.open_alerts,
                        "tank summary"
                    ),
                    Err(e) => warn!(tank_id, error = %e, "summary failed"),
                }
            }
        })
        .await;
        if let Err(e) = result {
            error!(error = %e, "summary task failed");
        }
    }
}
