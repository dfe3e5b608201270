//! Live fee estimates
//!
//! The UI re-evaluates the running charge once per second while a rental is
//! active. The estimate is a read-only recomputation of the same quote the
//! settlement path uses; it mutates nothing and needs no locking.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::debug;
use voltway_common::types::fee::{FeeQuote, FeeSchedule};

use crate::fee::calculator::FeeCalculator;

/// Injectable clock returning Unix milliseconds.
///
/// Production passes the system wall clock; tests pass a closure over shared
/// state for deterministic time control without mocks.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// The system wall clock
pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Recomputes the running charge for an active rental against "now"
#[derive(Clone)]
pub struct LiveEstimator {
    calculator: FeeCalculator,
    clock: Clock,
}

impl LiveEstimator {
    /// Create an estimator on the system clock
    pub fn new(schedule: FeeSchedule) -> Self {
        Self::with_clock(schedule, system_clock())
    }

    /// Create an estimator on an injected clock
    pub fn with_clock(schedule: FeeSchedule, clock: Clock) -> Self {
        Self {
            calculator: FeeCalculator::new(schedule),
            clock,
        }
    }

    /// Quote the charge accrued by a rental started at `start_ms`, as of now
    pub fn estimate(&self, start_ms: i64) -> FeeQuote {
        self.calculator.quote(start_ms, (self.clock)())
    }
}

/// Periodic estimate feed for a rental display view.
///
/// Emits one [`FeeQuote`] per interval over a bounded channel. The task
/// exits when the receiver is dropped, which is how a torn-down view stops
/// its timer.
pub struct EstimateTicker;

impl EstimateTicker {
    /// Spawn the ticker for a rental started at `start_ms`
    pub fn spawn(
        estimator: LiveEstimator,
        start_ms: i64,
        interval_ms: u64,
    ) -> mpsc::Receiver<FeeQuote> {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                let quote = estimator.estimate(start_ms);
                if tx.send(quote).await.is_err() {
                    debug!(start_ms, "estimate receiver dropped, ticker exiting");
                    break;
                }
            }
        });

        rx
    }
}
