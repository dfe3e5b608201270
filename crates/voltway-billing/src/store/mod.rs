//! Rental store boundary
//!
//! The store owns persistence and the authoritative status transitions.
//! The settlement path depends on `conditional_update_status` being a true
//! compare-and-swap: the move from `Active` to `Settling` succeeds for
//! exactly one caller, which is what makes concurrent returns safe.

pub mod memory;
pub mod row;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use voltway_common::{RentalRecord, RentalStatus, Result};

/// Fields written atomically with a status transition
#[derive(Debug, Clone, Default)]
pub struct SettlementFields {
    pub end_station_id: Option<String>,
    pub end_time: Option<i64>,
    pub final_amount: Option<Decimal>,
}

impl SettlementFields {
    /// Fields recorded when a settlement completes
    pub fn settled(end_station_id: impl Into<String>, end_time: i64, final_amount: Decimal) -> Self {
        Self {
            end_station_id: Some(end_station_id.into()),
            end_time: Some(end_time),
            final_amount: Some(final_amount),
        }
    }
}

/// Persistence for rental records
#[async_trait]
pub trait RentalStore: Send + Sync {
    /// Create an active rental. The store assigns the id and the
    /// authoritative start time from its own clock.
    async fn create_rental(
        &self,
        power_bank_id: &str,
        start_station_id: &str,
        pre_auth_ceiling: Decimal,
        hold_id: &str,
    ) -> Result<RentalRecord>;

    /// Load a rental by id
    async fn get_rental(&self, id: Uuid) -> Result<Option<RentalRecord>>;

    /// Conditionally transition `status` from `expected` to `new`, writing
    /// `fields` in the same update. Returns `false` when the stored status
    /// did not match `expected`, signaling a lost race.
    async fn conditional_update_status(
        &self,
        id: Uuid,
        expected: RentalStatus,
        new: RentalStatus,
        fields: SettlementFields,
    ) -> Result<bool>;
}
