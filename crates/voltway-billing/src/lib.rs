//! # Voltway Billing
//!
//! Fee calculation, pre-authorization and settlement reconciliation for
//! powerbank rentals.
//!
//! ## Billing policy
//!
//! ```text
//! Hours  = ceil(elapsed / 1h)           (a started hour bills in full)
//! Raw    = InitialCost + HourlyRate × (Hours − 1)
//! Total  = min(Raw, ceil(Hours / 24) × DailyCap)
//! ```
//!
//! The same rule serves the once-per-second live estimate and the
//! authoritative settlement charge; only the injected end time differs.
//! Settlement is additionally clamped to the pre-authorization ceiling
//! placed when the rental started, and is idempotent under retry.

pub mod fee;
pub mod payment;
pub mod settlement;
pub mod store;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use voltway_common::FeeSchedule;

pub use fee::calculator::FeeCalculator;
pub use fee::display::format_currency;
pub use fee::estimator::{system_clock, Clock, EstimateTicker, LiveEstimator};
pub use payment::{HoldHandle, PaymentGateway, Receipt};
pub use settlement::reconciler::SettlementReconciler;
pub use settlement::Settlement;
pub use store::{RentalStore, SettlementFields};

/// Billing engine configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Tariff applied to every rental
    pub schedule: FeeSchedule,
    /// Fixed pre-authorization hold placed at rental start; duration is
    /// unknown at that point, so this is policy, not a fee estimate
    pub pre_auth_ceiling: Decimal,
    /// Deadline for hold and capture calls against the payment gateway
    pub payment_timeout_ms: u64,
    /// Refresh period of the live estimate surface
    pub estimate_interval_ms: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            schedule: FeeSchedule::default(),
            pre_auth_ceiling: dec!(50.00),
            payment_timeout_ms: 15_000,
            estimate_interval_ms: 1_000,
        }
    }
}
