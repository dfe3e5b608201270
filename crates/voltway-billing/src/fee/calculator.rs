//! Time-based fee calculation
//!
//! Pure arithmetic over timestamps it is given; "now" is always injected by
//! the caller. The live estimate and the settlement charge go through the
//! same `quote` path, so the ceiling-to-hour rule cannot silently differ
//! between the two.

use rust_decimal::Decimal;
use voltway_common::types::fee::{FeeQuote, FeeSchedule, HOURS_PER_DAY, MS_PER_HOUR};

use crate::fee::display::format_currency;

/// Computes elapsed-time charges under a fee schedule
#[derive(Debug, Clone, Default)]
pub struct FeeCalculator {
    schedule: FeeSchedule,
}

impl FeeCalculator {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Quote the charge for a rental running from `start_ms` to `end_ms`
    /// (Unix milliseconds).
    ///
    /// - Elapsed time rounds up to the next whole hour: a 1-minute rental
    ///   bills as 1 hour, a 61-minute rental as 2.
    /// - The total is bounded by `ceil(hours / 24)` daily caps.
    /// - `end_ms < start_ms` clamps the duration to zero and charges the
    ///   first-hour minimum; the quote flags the anomaly but never goes
    ///   negative.
    pub fn quote(&self, start_ms: i64, end_ms: i64) -> FeeQuote {
        let clock_anomaly = end_ms < start_ms;
        let elapsed_ms = (end_ms - start_ms).max(0);
        let duration_hours = div_ceil(elapsed_ms, MS_PER_HOUR);

        let raw = if duration_hours <= 1 {
            self.schedule.initial_cost
        } else {
            self.schedule.initial_cost
                + self.schedule.hourly_rate * Decimal::from(duration_hours - 1)
        };

        let day_windows = div_ceil(duration_hours, HOURS_PER_DAY).max(1);
        let cap_total = Decimal::from(day_windows) * self.schedule.daily_cap;

        let capped = raw > cap_total;
        let total_amount = if capped { cap_total } else { raw };

        let breakdown = self.breakdown(duration_hours, raw, total_amount, day_windows, capped);

        FeeQuote {
            duration_hours,
            total_amount,
            breakdown,
            capped,
            clock_anomaly,
        }
    }

    /// Itemize the quote: first-hour cost, extra hours, cap if applied
    fn breakdown(
        &self,
        duration_hours: i64,
        raw: Decimal,
        total: Decimal,
        day_windows: i64,
        capped: bool,
    ) -> String {
        let mut line = if duration_hours <= 1 {
            format!(
                "First hour {} = {}",
                format_currency(self.schedule.initial_cost),
                format_currency(raw)
            )
        } else {
            format!(
                "First hour {} + {} x {} = {}",
                format_currency(self.schedule.initial_cost),
                duration_hours - 1,
                format_currency(self.schedule.hourly_rate),
                format_currency(raw)
            )
        };

        if capped {
            line.push_str(&format!(
                ", capped at {} ({} x {} daily cap)",
                format_currency(total),
                day_windows,
                format_currency(self.schedule.daily_cap)
            ));
        }

        line
    }
}

/// Ceiling division for non-negative numerators
#[inline]
fn div_ceil(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1) / divisor
}
