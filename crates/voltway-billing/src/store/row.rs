//! Raw row mapping
//!
//! The backing store hands back loosely shaped rows; every field arrives
//! optional. Rows are validated into a [`RentalRecord`] at the boundary, and
//! malformed rows are rejected instead of letting absent fields propagate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use voltway_common::error::BillingError;
use voltway_common::{RentalRecord, RentalStatus};

/// A rental row as stored, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RentalRow {
    pub id: Option<Uuid>,
    pub power_bank_id: Option<String>,
    pub start_station_id: Option<String>,
    pub start_time: Option<i64>,
    pub end_station_id: Option<String>,
    pub end_time: Option<i64>,
    pub pre_auth_ceiling: Option<Decimal>,
    pub hold_id: Option<String>,
    pub status: Option<String>,
    pub final_amount: Option<Decimal>,
    pub version: Option<u64>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, BillingError> {
    value.ok_or_else(|| BillingError::MalformedRecord(format!("missing field '{}'", field)))
}

impl TryFrom<RentalRow> for RentalRecord {
    type Error = BillingError;

    fn try_from(row: RentalRow) -> Result<Self, Self::Error> {
        let status: RentalStatus = required(row.status, "status")?.parse()?;

        let record = RentalRecord {
            id: required(row.id, "id")?,
            power_bank_id: required(row.power_bank_id, "power_bank_id")?,
            start_station_id: required(row.start_station_id, "start_station_id")?,
            start_time: required(row.start_time, "start_time")?,
            end_station_id: row.end_station_id,
            end_time: row.end_time,
            pre_auth_ceiling: required(row.pre_auth_ceiling, "pre_auth_ceiling")?,
            hold_id: required(row.hold_id, "hold_id")?,
            status,
            final_amount: row.final_amount,
            version: row.version.unwrap_or(0),
            created_at: required(row.created_at, "created_at")?,
            updated_at: required(row.updated_at, "updated_at")?,
        };

        // A settled row without a final amount is corrupt, not merely stale
        if record.status == RentalStatus::Settled && record.final_amount.is_none() {
            return Err(BillingError::MalformedRecord(
                "settled row without final_amount".into(),
            ));
        }

        Ok(record)
    }
}

impl From<&RentalRecord> for RentalRow {
    fn from(record: &RentalRecord) -> Self {
        Self {
            id: Some(record.id),
            power_bank_id: Some(record.power_bank_id.clone()),
            start_station_id: Some(record.start_station_id.clone()),
            start_time: Some(record.start_time),
            end_station_id: record.end_station_id.clone(),
            end_time: record.end_time,
            pre_auth_ceiling: Some(record.pre_auth_ceiling),
            hold_id: Some(record.hold_id.clone()),
            status: Some(record.status.as_str().to_string()),
            final_amount: record.final_amount,
            version: Some(record.version),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
        }
    }
}
