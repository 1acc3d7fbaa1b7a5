//! Fixed-interval tick scheduler for menulink.
//!
//! Every protocol state machine in menulink advances only when it is
//! ticked: heartbeats, timeouts, and bootstrap pacing are all counted in
//! ticks. This crate supplies the clock, a 20 ms cadence by default, with
//! budget monitoring so a slow menu tree shows up in the logs.
//!
//! # Integration
//!
//! The scheduler sits inside the server's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         _ = scheduler.wait_for_tick() => {
//!             registry.tick_all(&mut *menu.lock().await);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the driver wakes up later than the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickPolicy {
    /// Forget the missed ticks and schedule the next one from now.
    #[default]
    Skip,
    /// Fire missed ticks back to back, at most `max_catchup` of them.
    ///
    /// Heartbeat and timeout counters stay close to wall-clock time this
    /// way.
    CatchUp { max_catchup: u32 },
    /// Keep the original cadence; late ticks are simply late.
    Drop,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickConfig {
    /// Time between ticks. Default: 20 ms.
    pub interval: Duration,
    pub policy: TickPolicy,
    /// Fraction of the interval (0.0 to 1.0) at which slow ticks are
    /// logged. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Default: 1.0.
    pub budget_critical_threshold: f64,
    pub metrics_enabled: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
        }
    }
}

impl TickConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(20);

    /// Shortest interval accepted.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Returns a copy with out-of-range values clamped.
    ///
    /// - `interval` is at least [`Self::MIN_INTERVAL`].
    /// - Thresholds lie in `0.0..=1.0`, warn not above critical.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(interval = ?self.interval, "tick interval too short, clamping");
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        self.budget_warn_threshold = self.budget_warn_threshold.min(self.budget_critical_threshold);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// `true` if the tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Ticks that were not fired because of the overrun.
    pub ticks_skipped: u64,
}

/// Running totals, updated when `metrics_enabled` is set.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Moving average of the work time reported by
    /// [`TickScheduler::record_tick_end`].
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last work time as a fraction of the interval.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fires ticks at a fixed interval.
#[derive(Debug)]
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: TokioInstant,
    work_started: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(interval = ?config.interval, policy = ?config.policy, "tick scheduler created");
        Self {
            next_tick: TokioInstant::now() + config.interval,
            config,
            tick_count: 0,
            work_started: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Waits for the next tick. Cancel-safe, so it can be a `select!`
    /// branch.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        let interval = self.config.interval;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.work_started = Some(Instant::now());

        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > interval / 10;
        let behind = if overrun {
            (late_by.as_nanos() / interval.as_nanos()) as u64
        } else {
            0
        };
        let mut ticks_skipped = 0;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                ticks_skipped = behind;
                if behind > 0 {
                    warn!(tick = self.tick_count, skipped = behind, "tick overrun, skipping ahead");
                }
                now + interval
            }
            TickPolicy::CatchUp { max_catchup } => {
                let cap = u64::from(max_catchup);
                if behind > cap {
                    ticks_skipped = behind - cap;
                    warn!(tick = self.tick_count, behind, cap, "tick overrun beyond catch-up cap");
                    now + interval
                } else {
                    due + interval
                }
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(tick = self.tick_count, late = ?late_by, "tick fired late");
                }
                due + interval
            }
        };

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;
        trace!(tick = self.tick_count, overrun, "tick");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of the work done for the current tick and checks it
    /// against the interval.
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let elapsed = started.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.interval.as_secs_f64();
        self.metrics.budget_utilization = utilization;

        if utilization >= self.config.budget_critical_threshold {
            warn!(tick = self.tick_count, elapsed = ?elapsed, "tick exceeded its budget");
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(tick = self.tick_count, elapsed = ?elapsed, "tick close to its budget");
        }

        if self.config.metrics_enabled {
            self.metrics.max_tick_time = self.metrics.max_tick_time.max(elapsed);
            let avg = self.metrics.avg_tick_time.as_secs_f64();
            self.metrics.avg_tick_time = Duration::from_secs_f64(avg * 0.9 + elapsed.as_secs_f64() * 0.1);
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
