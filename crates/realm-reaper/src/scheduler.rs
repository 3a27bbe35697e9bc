//! Fixed-interval sweep timer.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// When idle sweeps run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperConfig {
    /// Time between two sweeps. Default: 5 minutes.
    pub sweep_interval: Duration,
    /// Random delay (0..jitter) added to the *first* sweep only, so several
    /// processes started together don't sweep in lockstep. Default: none.
    pub initial_jitter: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl ReaperConfig {
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

    /// Shortest interval a scheduler will run at.
    pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

    pub fn with_interval(sweep_interval: Duration) -> Self {
        Self {
            sweep_interval,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`SweepScheduler::new`]. A zero (or
    /// sub-second) interval would turn the sweep into a busy loop, so it
    /// is raised to [`Self::MIN_SWEEP_INTERVAL`].
    pub fn validated(mut self) -> Self {
        if self.sweep_interval < Self::MIN_SWEEP_INTERVAL {
            warn!(
                interval_ms = self.sweep_interval.as_millis() as u64,
                min_ms = Self::MIN_SWEEP_INTERVAL.as_millis() as u64,
                "sweep_interval below minimum, clamping"
            );
            self.sweep_interval = Self::MIN_SWEEP_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Sweep info
// ---------------------------------------------------------------------------

/// Returned by [`SweepScheduler::wait_for_sweep`] each time a sweep is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepInfo {
    /// Monotonically increasing sweep number (starts at 1).
    pub sweep: u64,
    /// How far past its deadline this sweep woke up.
    pub late_by: Duration,
    /// Whole intervals that passed without a sweep (the loop was busy).
    /// Missed sweeps are never replayed: one sweep covers them all.
    pub missed: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fires once per `sweep_interval`.
pub struct SweepScheduler {
    interval: Duration,
    sweep_count: u64,
    total_missed: u64,
    next_sweep: TokioInstant,
}

impl SweepScheduler {
    pub fn new(config: ReaperConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter > Duration::ZERO {
            let max_ms = config.initial_jitter.as_millis().max(1) as u64;
            Duration::from_millis(rand::rng().random_range(0..max_ms))
        } else {
            Duration::ZERO
        };

        debug!(
            interval_secs = config.sweep_interval.as_secs(),
            jitter_ms = jitter.as_millis() as u64,
            "sweep scheduler created"
        );

        Self {
            interval: config.sweep_interval,
            sweep_count: 0,
            total_missed: 0,
            next_sweep: TokioInstant::now() + config.sweep_interval + jitter,
        }
    }

    /// Waits until the next sweep is due.
    ///
    /// Cancel-safe: dropping the future (as `select!` does when another
    /// branch wins) leaves the deadline untouched.
    pub async fn wait_for_sweep(&mut self) -> SweepInfo {
        time::sleep_until(self.next_sweep).await;

        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(self.next_sweep);
        let missed = (late_by.as_nanos() / self.interval.as_nanos()) as u64;
        if missed > 0 {
            warn!(
                sweep = self.sweep_count + 1,
                missed,
                late_ms = late_by.as_millis() as u64,
                "sweep overdue, skipping ahead"
            );
        }

        // Always schedule from now, not from the missed deadline.
        self.next_sweep = now + self.interval;
        self.sweep_count += 1;
        self.total_missed += missed;

        trace!(sweep = self.sweep_count, "sweep due");

        SweepInfo {
            sweep: self.sweep_count,
            late_by,
            missed,
        }
    }

    /// Sweeps fired so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    /// Intervals skipped because the owner was busy.
    pub fn total_missed(&self) -> u64 {
        self.total_missed
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
