//! In-memory rental store
//!
//! Reference implementation over a concurrent map. Rows are kept as raw
//! JSON values, the shape the hosted row store would hand back, and are
//! validated through [`RentalRow`] on every read. The per-key entry lock of
//! the map makes `conditional_update_status` an atomic compare-and-swap.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use voltway_common::error::BillingError;
use voltway_common::{RentalRecord, RentalStatus, Result, VoltwayError};

use super::row::RentalRow;
use super::{RentalStore, SettlementFields};

use crate::fee::estimator::{system_clock, Clock};

/// In-memory store keyed by rental id
pub struct MemoryRentalStore {
    rows: DashMap<Uuid, serde_json::Value>,
    clock: Clock,
}

impl MemoryRentalStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Store on an injected clock; the store's clock is the authoritative
    /// source of `start_time`
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            rows: DashMap::new(),
            clock,
        }
    }

    /// Number of stored rentals
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a raw row directly, bypassing validation. Test hook for
    /// exercising the malformed-row path.
    pub fn insert_raw(&self, id: Uuid, row: serde_json::Value) {
        self.rows.insert(id, row);
    }

    fn decode(value: &serde_json::Value) -> Result<RentalRecord> {
        let row: RentalRow = serde_json::from_value(value.clone())?;
        let record = RentalRecord::try_from(row).map_err(VoltwayError::Billing)?;
        Ok(record)
    }

    fn encode(record: &RentalRecord) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(RentalRow::from(record))?)
    }
}

impl Default for MemoryRentalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RentalStore for MemoryRentalStore {
    async fn create_rental(
        &self,
        power_bank_id: &str,
        start_station_id: &str,
        pre_auth_ceiling: Decimal,
        hold_id: &str,
    ) -> Result<RentalRecord> {
        let now = (self.clock)();
        let record = RentalRecord::new(
            power_bank_id,
            start_station_id,
            pre_auth_ceiling,
            hold_id,
            now,
        );
        self.rows.insert(record.id, Self::encode(&record)?);
        debug!(rental_id = %record.id, %power_bank_id, "created rental");
        Ok(record)
    }

    async fn get_rental(&self, id: Uuid) -> Result<Option<RentalRecord>> {
        match self.rows.get(&id) {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    async fn conditional_update_status(
        &self,
        id: Uuid,
        expected: RentalStatus,
        new: RentalStatus,
        fields: SettlementFields,
    ) -> Result<bool> {
        // The entry is held exclusively for the whole check-and-write, so
        // two racing callers serialize here and exactly one sees `expected`.
        let mut entry = self
            .rows
            .get_mut(&id)
            .ok_or(BillingError::RentalNotFound(id))?;

        let mut record = Self::decode(&entry)?;
        if record.status != expected {
            return Ok(false);
        }
        if !record.status.can_transition_to(new) {
            return Err(BillingError::InvalidTransition {
                from: record.status,
                to: new,
            }
            .into());
        }

        record.status = new;
        if let Some(end_station_id) = fields.end_station_id {
            record.end_station_id = Some(end_station_id);
        }
        if let Some(end_time) = fields.end_time {
            record.end_time = Some(end_time);
        }
        if let Some(final_amount) = fields.final_amount {
            record.final_amount = Some(final_amount);
        }
        record.touch((self.clock)());

        *entry = Self::encode(&record)?;
        debug!(rental_id = %id, from = %expected, to = %new, "status transition");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryRentalStore::new();
        let record = store
            .create_rental("pb-1", "st-1", dec!(50), "hold_1")
            .await
            .unwrap();

        let loaded = store.get_rental(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.status, RentalStatus::Active);
        assert_eq!(loaded.hold_id, "hold_1");
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryRentalStore::new();
        assert!(store.get_rental(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conditional_update_applies_fields() {
        let store = MemoryRentalStore::new();
        let record = store
            .create_rental("pb-1", "st-1", dec!(50), "hold_1")
            .await
            .unwrap();

        let claimed = store
            .conditional_update_status(
                record.id,
                RentalStatus::Active,
                RentalStatus::Settling,
                SettlementFields::default(),
            )
            .await
            .unwrap();
        assert!(claimed);

        let done = store
            .conditional_update_status(
                record.id,
                RentalStatus::Settling,
                RentalStatus::Settled,
                SettlementFields::settled("st-2", record.start_time + 1_000, dec!(2)),
            )
            .await
            .unwrap();
        assert!(done);

        let loaded = store.get_rental(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RentalStatus::Settled);
        assert_eq!(loaded.end_station_id.as_deref(), Some("st-2"));
        assert_eq!(loaded.final_amount, Some(dec!(2)));
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_conditional_update_lost_race() {
        let store = MemoryRentalStore::new();
        let record = store
            .create_rental("pb-1", "st-1", dec!(50), "hold_1")
            .await
            .unwrap();

        // First caller claims the record
        assert!(store
            .conditional_update_status(
                record.id,
                RentalStatus::Active,
                RentalStatus::Settling,
                SettlementFields::default(),
            )
            .await
            .unwrap());

        // Second caller expecting Active loses
        assert!(!store
            .conditional_update_status(
                record.id,
                RentalStatus::Active,
                RentalStatus::Settling,
                SettlementFields::default(),
            )
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let store = MemoryRentalStore::new();
        let record = store
            .create_rental("pb-1", "st-1", dec!(50), "hold_1")
            .await
            .unwrap();

        // Active -> Settled skips Settling
        let result = store
            .conditional_update_status(
                record.id,
                RentalStatus::Active,
                RentalStatus::Settled,
                SettlementFields::default(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_malformed_row_rejected_on_read() {
        let store = MemoryRentalStore::new();
        let id = Uuid::new_v4();
        store.insert_raw(id, json!({ "id": id, "status": "active" }));

        let result = store.get_rental(id).await;
        assert!(result.is_err());
    }
}
