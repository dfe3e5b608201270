//! Error types for the Voltway billing engine
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;
use uuid::Uuid;

use crate::types::rental::RentalStatus;

/// Result type alias using VoltwayError
pub type Result<T> = std::result::Result<T, VoltwayError>;

/// Unified error type for Voltway operations
#[derive(Debug, Error)]
pub enum VoltwayError {
    // Billing errors
    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    // Payment gateway errors
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Rental lifecycle and settlement errors
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Payment hold failed: {reason}")]
    PaymentHoldFailed { reason: String },

    #[error("Hold {hold_id} was placed but the rental record could not be created; hold requires manual release")]
    PartialFailure { hold_id: String },

    #[error("Settlement failed for rental {rental_id}: {reason}")]
    SettlementFailed { rental_id: Uuid, reason: String },

    #[error("Settlement already in progress for rental {rental_id}")]
    ConcurrentSettlementInProgress { rental_id: Uuid },

    #[error("Capture outcome unknown for rental {rental_id}; poll the rental record instead of retrying")]
    CaptureOutcomeUnknown { rental_id: Uuid },

    #[error("Rental not found: {0}")]
    RentalNotFound(Uuid),

    #[error("Malformed rental row: {0}")]
    MalformedRecord(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: RentalStatus,
        to: RentalStatus,
    },
}

/// Payment gateway errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Hold declined: {0}")]
    Declined(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Unknown hold: {0}")]
    UnknownHold(String),

    #[error("Gateway timed out")]
    Timeout,

    #[error("Gateway error: {0}")]
    Gateway(String),
}

// Implement From for common external error types
impl From<serde_json::Error> for VoltwayError {
    fn from(err: serde_json::Error) -> Self {
        VoltwayError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for VoltwayError {
    fn from(err: std::io::Error) -> Self {
        VoltwayError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for VoltwayError {
    fn from(err: anyhow::Error) -> Self {
        VoltwayError::Internal(err.to_string())
    }
}
