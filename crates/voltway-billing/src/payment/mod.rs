//! Payment capture service boundary
//!
//! The gateway is an opaque remote service: it places a pre-authorization
//! hold for a ceiling amount, later captures a specific final amount from
//! that hold, or releases it. Billing never captures more than the hold.

pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use voltway_common::error::PaymentError;

/// Handle to a placed pre-authorization hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldHandle {
    /// Gateway-assigned hold identifier
    pub id: String,
}

impl HoldHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Proof of a successful capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// Gateway-assigned receipt identifier
    pub receipt_id: Uuid,
    /// Amount actually captured
    pub amount: Decimal,
    /// Capture timestamp (Unix milliseconds)
    pub captured_at: i64,
}

/// Opaque payment capture service
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Place a pre-authorization hold for `amount`
    async fn place_hold(&self, amount: Decimal) -> Result<HoldHandle, PaymentError>;

    /// Capture `amount` from an existing hold; the uncaptured remainder is
    /// released by the gateway
    async fn capture(&self, hold: &HoldHandle, amount: Decimal) -> Result<Receipt, PaymentError>;

    /// Release a hold without capturing anything
    async fn release_hold(&self, hold: &HoldHandle) -> Result<(), PaymentError>;
}
