//! Time-based progress estimation.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Progress in percent for `elapsed` against `estimated_ms`, capped at `cap`.
#[must_use]
pub fn estimate_progress(elapsed: Duration, estimated_ms: u64, cap: f32) -> f32 {
    if estimated_ms == 0 {
        return cap;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = elapsed.as_millis() as f64 / estimated_ms as f64;
    #[allow(clippy::cast_possible_truncation)]
    let percent = (ratio * 100.0) as f32;
    percent.clamp(0.0, cap)
}

/// Periodic estimator for one in-flight job.
#[derive(Clone, Copy, Debug)]
pub struct ProgressEstimator {
    period: Duration,
    estimated_ms: u64,
    cap: f32,
}

impl ProgressEstimator {
    /// Estimator ticking every `period`.
    #[must_use]
    pub const fn new(period: Duration, estimated_ms: u64, cap: f32) -> Self {
        Self {
            period,
            estimated_ms,
            cap,
        }
    }

    /// Spawn the ticker. `on_tick` receives each estimate and returns
    /// `false` once the job is gone, which stops the task. The first tick
    /// fires one period after `started`.
    pub fn spawn<F>(self, started: Instant, mut on_tick: F) -> JoinHandle<()>
    where
        F: FnMut(f32) -> bool + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(started + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let value = estimate_progress(started.elapsed(), self.estimated_ms, self.cap);
                if !on_tick(value) {
                    break;
                }
            }
        })
    }
}
