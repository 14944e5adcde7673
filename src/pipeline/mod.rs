//! Monitoring daemon pipeline.
//!
//! ```text
//! tick ─► SimulationEngine::step_many ─► AlertMonitor::process ─► alerts
//!   │                                          (every tick, per tank)
//!   ├─► AlertMonitor::reconcile                (every N ticks)
//!   └─► FeedAdvisor::recommend_all             (every M ticks)
//! ```

pub mod monitor_loop;

pub use monitor_loop::{resume_after, LoopServices, LoopSettings, LoopStats, MonitoringLoop};
