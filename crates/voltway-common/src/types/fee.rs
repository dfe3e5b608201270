//! Fee schedule and quote types
//!
//! The advertised tariff: a first-hour charge, a per-started-hour rate for
//! every additional hour, and a cap on what any 24-hour window may cost.
//! Elapsed time always rounds up to the next whole hour.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Milliseconds in one billable hour
pub const MS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Billable hours in one cap window
pub const HOURS_PER_DAY: i64 = 24;

/// Tariff parameters for time-based rental billing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Amount charged for the first hour (also the minimum charge)
    pub initial_cost: Decimal,

    /// Amount charged per additional started hour
    pub hourly_rate: Decimal,

    /// Maximum chargeable per 24-hour window
    pub daily_cap: Decimal,
}

impl Default for FeeSchedule {
    /// The advertised tariff: EUR 2.00 first hour, EUR 1.00 per extra hour,
    /// EUR 10.00 per day
    fn default() -> Self {
        Self {
            initial_cost: dec!(2.00),
            hourly_rate: dec!(1.00),
            daily_cap: dec!(10.00),
        }
    }
}

/// Result of a fee calculation, for both live estimates and settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Elapsed duration in whole billed hours (rounded up)
    pub duration_hours: i64,

    /// Total charge for the duration, never negative
    pub total_amount: Decimal,

    /// Human-readable itemization of the charge
    pub breakdown: String,

    /// Whether the daily cap bounded the total
    pub capped: bool,

    /// Whether the end time preceded the start time and duration was
    /// clamped to zero
    pub clock_anomaly: bool,
}
