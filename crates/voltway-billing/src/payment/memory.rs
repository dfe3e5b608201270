//! In-memory payment gateway
//!
//! Reference implementation used in tests and local development. Holds live
//! in a concurrent map; decline and capture-failure switches let tests
//! script gateway behavior deterministically.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

use voltway_common::error::PaymentError;

use super::{HoldHandle, PaymentGateway, Receipt};

#[derive(Debug, Clone)]
struct HoldState {
    amount: Decimal,
    captured: Option<Decimal>,
    released: bool,
}

/// In-memory gateway with scriptable failure modes
#[derive(Default)]
pub struct InMemoryPaymentGateway {
    holds: DashMap<String, HoldState>,
    decline_holds: AtomicBool,
    fail_captures: AtomicBool,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `place_hold` calls decline
    pub fn decline_holds(&self, decline: bool) {
        self.decline_holds.store(decline, Ordering::SeqCst);
    }

    /// Make subsequent `capture` calls fail
    pub fn fail_captures(&self, fail: bool) {
        self.fail_captures.store(fail, Ordering::SeqCst);
    }

    /// Amount captured from a hold, if any
    pub fn captured_amount(&self, hold_id: &str) -> Option<Decimal> {
        self.holds.get(hold_id).and_then(|state| state.captured)
    }

    /// Whether a hold was released without capture
    pub fn is_released(&self, hold_id: &str) -> bool {
        self.holds
            .get(hold_id)
            .map(|state| state.released)
            .unwrap_or(false)
    }

    /// Total number of captures across all holds
    pub fn capture_count(&self) -> usize {
        self.holds
            .iter()
            .filter(|entry| entry.captured.is_some())
            .count()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn place_hold(&self, amount: Decimal) -> Result<HoldHandle, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::Declined("non-positive hold amount".into()));
        }
        if self.decline_holds.load(Ordering::SeqCst) {
            return Err(PaymentError::Declined("card declined".into()));
        }

        let id = format!("hold_{}", Uuid::new_v4().simple());
        self.holds.insert(
            id.clone(),
            HoldState {
                amount,
                captured: None,
                released: false,
            },
        );
        debug!(hold_id = %id, %amount, "placed hold");
        Ok(HoldHandle::new(id))
    }

    async fn capture(&self, hold: &HoldHandle, amount: Decimal) -> Result<Receipt, PaymentError> {
        if self.fail_captures.load(Ordering::SeqCst) {
            return Err(PaymentError::CaptureFailed("capture declined".into()));
        }

        let mut state = self
            .holds
            .get_mut(&hold.id)
            .ok_or_else(|| PaymentError::UnknownHold(hold.id.clone()))?;

        if state.released {
            return Err(PaymentError::CaptureFailed("hold already released".into()));
        }
        if state.captured.is_some() {
            return Err(PaymentError::CaptureFailed("hold already captured".into()));
        }
        if amount > state.amount {
            return Err(PaymentError::CaptureFailed(format!(
                "capture {} exceeds hold {}",
                amount, state.amount
            )));
        }

        state.captured = Some(amount);
        debug!(hold_id = %hold.id, %amount, "captured from hold");
        Ok(Receipt {
            receipt_id: Uuid::new_v4(),
            amount,
            captured_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    async fn release_hold(&self, hold: &HoldHandle) -> Result<(), PaymentError> {
        let mut state = self
            .holds
            .get_mut(&hold.id)
            .ok_or_else(|| PaymentError::UnknownHold(hold.id.clone()))?;

        if state.captured.is_some() {
            return Err(PaymentError::Gateway(
                "cannot release a captured hold".into(),
            ));
        }
        state.released = true;
        debug!(hold_id = %hold.id, "released hold");
        Ok(())
    }
}
