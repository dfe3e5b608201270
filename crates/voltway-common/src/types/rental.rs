//! Rental record - one powerbank rental lifecycle
//!
//! A rental moves through a forward-only state machine:
//!
//! ```text
//! Active -> Settling -> Settled
//!                    -> Failed
//! ```
//!
//! `Settled` and `Failed` are terminal. The store owns the authoritative
//! `status` and `end_time`; billing code only derives monetary values from
//! the timestamps it is given.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BillingError;

/// Rental lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    /// Powerbank is out, hold is placed, meter is running
    Active,
    /// A settlement claimed the record and a capture is in flight
    Settling,
    /// Capture succeeded, final amount recorded
    Settled,
    /// Capture declined or errored; needs manual reconciliation
    Failed,
}

impl RentalStatus {
    /// Terminal states absorb; no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, RentalStatus::Settled | RentalStatus::Failed)
    }

    /// Whether a forward transition to `next` is legal.
    ///
    /// Transitions are monotonic: `Active -> Settling -> {Settled, Failed}`.
    /// Nothing may skip `Settling`.
    pub fn can_transition_to(&self, next: RentalStatus) -> bool {
        matches!(
            (self, next),
            (RentalStatus::Active, RentalStatus::Settling)
                | (RentalStatus::Settling, RentalStatus::Settled)
                | (RentalStatus::Settling, RentalStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Active => "active",
            RentalStatus::Settling => "settling",
            RentalStatus::Settled => "settled",
            RentalStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentalStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RentalStatus::Active),
            "settling" => Ok(RentalStatus::Settling),
            "settled" => Ok(RentalStatus::Settled),
            "failed" => Ok(RentalStatus::Failed),
            other => Err(BillingError::MalformedRecord(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

/// One rental lifecycle, as persisted by the rental store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalRecord {
    /// Opaque unique identifier, assigned at creation
    pub id: Uuid,

    /// Physical asset identifier
    pub power_bank_id: String,

    /// Station the rental started from
    pub start_station_id: String,

    /// Rental start (Unix milliseconds, store clock)
    pub start_time: i64,

    /// Station the powerbank was returned to; set atomically with settlement
    pub end_station_id: Option<String>,

    /// Return time (Unix milliseconds); set atomically with settlement
    pub end_time: Option<i64>,

    /// Upper bound on what may ever be captured for this rental
    pub pre_auth_ceiling: Decimal,

    /// Payment hold handle, captured against at settlement
    pub hold_id: String,

    /// Lifecycle status, forward transitions only
    pub status: RentalStatus,

    /// Final captured amount; set only when `status` is `Settled`
    pub final_amount: Option<Decimal>,

    /// Version for optimistic concurrency control
    pub version: u64,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Timestamp of last modification
    pub updated_at: i64,
}

impl RentalRecord {
    /// Create a new active rental record
    pub fn new(
        power_bank_id: impl Into<String>,
        start_station_id: impl Into<String>,
        pre_auth_ceiling: Decimal,
        hold_id: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            power_bank_id: power_bank_id.into(),
            start_station_id: start_station_id.into(),
            start_time: now_ms,
            end_station_id: None,
            end_time: None,
            pre_auth_ceiling,
            hold_id: hold_id.into(),
            status: RentalStatus::Active,
            final_amount: None,
            version: 0,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Whether the rental is still accruing charges
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == RentalStatus::Active
    }

    /// Bump version and modification timestamp
    pub fn touch(&mut self, now_ms: i64) {
        self.version += 1;
        self.updated_at = now_ms;
    }
}

impl fmt::Display for RentalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RentalRecord({}, bank={}, status={})",
            self.id, self.power_bank_id, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_record_is_active() {
        let record = RentalRecord::new("pb-1", "st-1", dec!(50), "hold_1", 1_000);
        assert_eq!(record.status, RentalStatus::Active);
        assert_eq!(record.start_time, 1_000);
        assert!(record.end_time.is_none());
        assert!(record.final_amount.is_none());
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_legal_transitions() {
        assert!(RentalStatus::Active.can_transition_to(RentalStatus::Settling));
        assert!(RentalStatus::Settling.can_transition_to(RentalStatus::Settled));
        assert!(RentalStatus::Settling.can_transition_to(RentalStatus::Failed));
    }

    #[test]
    fn test_illegal_transitions() {
        // Nothing may skip Settling
        assert!(!RentalStatus::Active.can_transition_to(RentalStatus::Settled));
        assert!(!RentalStatus::Active.can_transition_to(RentalStatus::Failed));
        // Terminal states absorb
        assert!(!RentalStatus::Settled.can_transition_to(RentalStatus::Active));
        assert!(!RentalStatus::Settled.can_transition_to(RentalStatus::Settling));
        assert!(!RentalStatus::Failed.can_transition_to(RentalStatus::Settling));
        // No backward moves
        assert!(!RentalStatus::Settling.can_transition_to(RentalStatus::Active));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RentalStatus::Active,
            RentalStatus::Settling,
            RentalStatus::Settled,
            RentalStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<RentalStatus>().unwrap(), status);
        }
        assert!("returned".parse::<RentalStatus>().is_err());
    }

    #[test]
    fn test_touch_bumps_version() {
        let mut record = RentalRecord::new("pb-1", "st-1", dec!(50), "hold_1", 1_000);
        record.touch(2_000);
        assert_eq!(record.version, 1);
        assert_eq!(record.updated_at, 2_000);
    }
}
