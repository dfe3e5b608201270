//! # Voltway Common
//!
//! Shared types and errors for the Voltway rental billing engine.
//!
//! ## Billing Formula
//!
//! ```text
//! Total = min(InitialCost + HourlyRate × (Hours − 1), DayWindows × DailyCap)
//! Hours = ceil(elapsed / 1h)
//! ```
//!
//! Where:
//! - InitialCost: charge for the first hour of a rental
//! - HourlyRate: charge for each additional started hour
//! - DailyCap: maximum chargeable per 24-hour window

pub mod error;
pub mod types;

pub use error::{BillingError, PaymentError, Result, VoltwayError};
pub use types::fee::{FeeQuote, FeeSchedule};
pub use types::rental::{RentalRecord, RentalStatus};
