//! Pre-authorization and settlement reconciliation

pub mod reconciler;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a settlement call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    /// Rental that was settled
    pub rental_id: Uuid,

    /// Amount captured from the hold, never above the pre-auth ceiling
    pub final_amount: Decimal,

    /// True when the rental was already settled and this call was a no-op
    /// read of the recorded amount
    pub already_settled: bool,

    /// True when the raw fee exceeded the ceiling and was clamped down
    pub ceiling_clamped: bool,

    /// Billed duration in whole hours, when known
    pub duration_hours: Option<i64>,

    /// Itemized charge, when computed by this call
    pub breakdown: Option<String>,
}
