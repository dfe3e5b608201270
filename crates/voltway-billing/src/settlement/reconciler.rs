//! Settlement reconciler
//!
//! Bounds financial exposure at rental start with a pre-authorization hold
//! and reconciles the authoritative charge at return. Settlement is
//! idempotent: a retried return reads the recorded amount instead of
//! recomputing or re-capturing, and the `Active -> Settling` claim is a
//! compare-and-swap against the store, so two racing returns can never both
//! capture.

use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use voltway_common::error::BillingError;
use voltway_common::{RentalRecord, RentalStatus, Result};

use crate::fee::calculator::FeeCalculator;
use crate::fee::estimator::{system_clock, Clock};
use crate::payment::{HoldHandle, PaymentGateway};
use crate::store::{RentalStore, SettlementFields};
use crate::BillingConfig;

use super::Settlement;

/// Reconciles rental starts and returns against the store and the payment
/// gateway. Both collaborators are injected; there are no process-wide
/// singletons to reach for.
pub struct SettlementReconciler<S, P> {
    store: Arc<S>,
    payments: Arc<P>,
    calculator: FeeCalculator,
    config: BillingConfig,
    clock: Clock,
}

impl<S, P> SettlementReconciler<S, P>
where
    S: RentalStore,
    P: PaymentGateway,
{
    pub fn new(store: Arc<S>, payments: Arc<P>, config: BillingConfig) -> Self {
        Self::with_clock(store, payments, config, system_clock())
    }

    pub fn with_clock(
        store: Arc<S>,
        payments: Arc<P>,
        config: BillingConfig,
        clock: Clock,
    ) -> Self {
        let calculator = FeeCalculator::new(config.schedule.clone());
        Self {
            store,
            payments,
            calculator,
            config,
            clock,
        }
    }

    fn payment_deadline(&self) -> Duration {
        Duration::from_millis(self.config.payment_timeout_ms)
    }

    /// Start a rental: place the pre-authorization hold, then create the
    /// active record.
    ///
    /// A declined, errored or timed-out hold means no rental starts. A
    /// record-creation failure after a successful hold is surfaced as
    /// `PartialFailure` carrying the hold id; the hold is released
    /// best-effort and logged for manual reconciliation either way.
    #[instrument(skip(self))]
    pub async fn start_rental(
        &self,
        power_bank_id: &str,
        start_station_id: &str,
    ) -> Result<RentalRecord> {
        let ceiling = self.config.pre_auth_ceiling;

        let hold = match timeout(self.payment_deadline(), self.payments.place_hold(ceiling)).await
        {
            Err(_) => {
                warn!(%power_bank_id, "hold placement timed out, rental not started");
                return Err(BillingError::PaymentHoldFailed {
                    reason: "payment gateway timed out".into(),
                }
                .into());
            }
            Ok(Err(e)) => {
                warn!(%power_bank_id, error = %e, "hold declined, rental not started");
                return Err(BillingError::PaymentHoldFailed {
                    reason: e.to_string(),
                }
                .into());
            }
            Ok(Ok(hold)) => hold,
        };

        match self
            .store
            .create_rental(power_bank_id, start_station_id, ceiling, &hold.id)
            .await
        {
            Ok(record) => {
                info!(
                    rental_id = %record.id,
                    %power_bank_id,
                    %ceiling,
                    hold_id = %hold.id,
                    "rental started"
                );
                Ok(record)
            }
            Err(e) => {
                error!(
                    hold_id = %hold.id,
                    error = %e,
                    "record creation failed after hold was placed"
                );
                if let Err(release_err) = self.payments.release_hold(&hold).await {
                    error!(
                        hold_id = %hold.id,
                        error = %release_err,
                        "hold release failed, manual release required"
                    );
                }
                Err(BillingError::PartialFailure { hold_id: hold.id }.into())
            }
        }
    }

    /// Settle a rental at return time.
    ///
    /// Safe to call more than once: an already-settled rental returns the
    /// recorded amount with `already_settled` set. `end_time` defaults to
    /// the injected clock's "now".
    #[instrument(skip(self))]
    pub async fn settle(
        &self,
        rental_id: Uuid,
        end_station_id: &str,
        end_time: Option<i64>,
    ) -> Result<Settlement> {
        let end_ms = end_time.unwrap_or_else(|| (self.clock)());

        let record = self
            .store
            .get_rental(rental_id)
            .await?
            .ok_or(BillingError::RentalNotFound(rental_id))?;

        match record.status {
            RentalStatus::Settled => return Ok(Self::already_settled(&record)?),
            RentalStatus::Failed => {
                return Err(BillingError::SettlementFailed {
                    rental_id,
                    reason: "previous capture failed, manual reconciliation required".into(),
                }
                .into())
            }
            RentalStatus::Settling => {
                return Err(BillingError::ConcurrentSettlementInProgress { rental_id }.into())
            }
            RentalStatus::Active => {}
        }

        // Claim the record. Exactly one racing caller wins this CAS.
        let claimed = self
            .store
            .conditional_update_status(
                rental_id,
                RentalStatus::Active,
                RentalStatus::Settling,
                SettlementFields::default(),
            )
            .await?;

        if !claimed {
            let latest = self
                .store
                .get_rental(rental_id)
                .await?
                .ok_or(BillingError::RentalNotFound(rental_id))?;
            return match latest.status {
                RentalStatus::Settled => Ok(Self::already_settled(&latest)?),
                RentalStatus::Failed => Err(BillingError::SettlementFailed {
                    rental_id,
                    reason: "previous capture failed, manual reconciliation required".into(),
                }
                .into()),
                _ => Err(BillingError::ConcurrentSettlementInProgress { rental_id }.into()),
            };
        }

        let quote = self.calculator.quote(record.start_time, end_ms);
        if quote.clock_anomaly {
            warn!(
                %rental_id,
                start_time = record.start_time,
                end_time = end_ms,
                "return time precedes start time, duration clamped to zero"
            );
        }

        let ceiling_clamped = quote.total_amount > record.pre_auth_ceiling;
        let final_amount = if ceiling_clamped {
            warn!(
                %rental_id,
                computed = %quote.total_amount,
                ceiling = %record.pre_auth_ceiling,
                "computed charge exceeds pre-auth ceiling, settlement policy-capped"
            );
            record.pre_auth_ceiling
        } else {
            quote.total_amount
        };

        let hold = HoldHandle::new(record.hold_id.clone());
        match timeout(
            self.payment_deadline(),
            self.payments.capture(&hold, final_amount),
        )
        .await
        {
            Err(_) => {
                // Outcome unknown: the capture may or may not have landed.
                // The record stays Settling; callers poll it instead of
                // retrying the capture blindly.
                warn!(%rental_id, hold_id = %hold.id, "capture timed out, outcome unknown");
                Err(BillingError::CaptureOutcomeUnknown { rental_id }.into())
            }
            Ok(Err(e)) => {
                warn!(%rental_id, error = %e, "capture failed, rental marked failed");
                self.store
                    .conditional_update_status(
                        rental_id,
                        RentalStatus::Settling,
                        RentalStatus::Failed,
                        SettlementFields {
                            end_station_id: Some(end_station_id.to_string()),
                            end_time: Some(end_ms),
                            final_amount: None,
                        },
                    )
                    .await?;
                Err(BillingError::SettlementFailed {
                    rental_id,
                    reason: e.to_string(),
                }
                .into())
            }
            Ok(Ok(receipt)) => {
                let finished = self
                    .store
                    .conditional_update_status(
                        rental_id,
                        RentalStatus::Settling,
                        RentalStatus::Settled,
                        SettlementFields::settled(end_station_id, end_ms, final_amount),
                    )
                    .await?;
                if !finished {
                    // Nothing else may touch a record we hold in Settling
                    error!(%rental_id, "settling record changed under the active settlement");
                    return Err(voltway_common::VoltwayError::Internal(format!(
                        "rental {} left settling state during capture",
                        rental_id
                    )));
                }

                info!(
                    %rental_id,
                    amount = %final_amount,
                    receipt_id = %receipt.receipt_id,
                    hours = quote.duration_hours,
                    capped = ceiling_clamped,
                    "rental settled"
                );

                Ok(Settlement {
                    rental_id,
                    final_amount,
                    already_settled: false,
                    ceiling_clamped,
                    duration_hours: Some(quote.duration_hours),
                    breakdown: Some(quote.breakdown),
                })
            }
        }
    }

    fn already_settled(record: &RentalRecord) -> Result<Settlement> {
        let final_amount = record.final_amount.ok_or_else(|| {
            BillingError::MalformedRecord("settled record without final_amount".into())
        })?;
        Ok(Settlement {
            rental_id: record.id,
            final_amount,
            already_settled: true,
            ceiling_clamped: false,
            duration_hours: None,
            breakdown: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicI64, Ordering};
    use voltway_common::types::fee::MS_PER_HOUR;
    use voltway_common::VoltwayError;

    use crate::payment::memory::InMemoryPaymentGateway;
    use crate::store::memory::MemoryRentalStore;

    struct Fixture {
        store: Arc<MemoryRentalStore>,
        gateway: Arc<InMemoryPaymentGateway>,
        reconciler: SettlementReconciler<MemoryRentalStore, InMemoryPaymentGateway>,
        now: Arc<AtomicI64>,
    }

    fn fixture_with_config(config: BillingConfig) -> Fixture {
        let now = Arc::new(AtomicI64::new(0));
        let clock: Clock = {
            let now = now.clone();
            Arc::new(move || now.load(Ordering::SeqCst))
        };
        let store = Arc::new(MemoryRentalStore::with_clock(clock.clone()));
        let gateway = Arc::new(InMemoryPaymentGateway::new());
        let reconciler =
            SettlementReconciler::with_clock(store.clone(), gateway.clone(), config, clock);
        Fixture {
            store,
            gateway,
            reconciler,
            now,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_config(BillingConfig::default())
    }

    #[tokio::test]
    async fn test_start_rental_places_hold_and_creates_record() {
        let fx = fixture();
        let record = fx.reconciler.start_rental("pb-1", "st-1").await.unwrap();

        assert_eq!(record.status, RentalStatus::Active);
        assert_eq!(record.pre_auth_ceiling, dec!(50.00));
        assert!(!record.hold_id.is_empty());
        assert_eq!(fx.store.len(), 1);
    }

    #[tokio::test]
    async fn test_declined_hold_creates_no_record() {
        let fx = fixture();
        fx.gateway.decline_holds(true);

        let result = fx.reconciler.start_rental("pb-1", "st-1").await;
        assert!(matches!(
            result,
            Err(VoltwayError::Billing(BillingError::PaymentHoldFailed { .. }))
        ));
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_settle_after_five_hours() {
        let fx = fixture();
        let record = fx.reconciler.start_rental("pb-1", "st-1").await.unwrap();

        fx.now.store(5 * MS_PER_HOUR, Ordering::SeqCst);
        let settlement = fx.reconciler.settle(record.id, "st-2", None).await.unwrap();

        assert_eq!(settlement.final_amount, dec!(6));
        assert!(!settlement.already_settled);
        assert_eq!(settlement.duration_hours, Some(5));

        let loaded = fx.store.get_rental(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RentalStatus::Settled);
        assert_eq!(loaded.end_time, Some(5 * MS_PER_HOUR));
        assert_eq!(loaded.end_station_id.as_deref(), Some("st-2"));
        assert_eq!(loaded.final_amount, Some(dec!(6)));
        assert_eq!(fx.gateway.captured_amount(&record.hold_id), Some(dec!(6)));
    }

    #[tokio::test]
    async fn test_settle_is_idempotent_under_differing_end_times() {
        let fx = fixture();
        let record = fx.reconciler.start_rental("pb-1", "st-1").await.unwrap();

        let first = fx
            .reconciler
            .settle(record.id, "st-2", Some(5 * MS_PER_HOUR))
            .await
            .unwrap();

        // Retry hours later with a different end time: no recompute, no
        // second capture
        let second = fx
            .reconciler
            .settle(record.id, "st-3", Some(40 * MS_PER_HOUR))
            .await
            .unwrap();

        assert!(second.already_settled);
        assert_eq!(second.final_amount, first.final_amount);
        assert_eq!(fx.gateway.capture_count(), 1);

        let loaded = fx.store.get_rental(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.end_station_id.as_deref(), Some("st-2"));
    }

    #[tokio::test]
    async fn test_settlement_clamped_to_ceiling() {
        let mut config = BillingConfig::default();
        config.pre_auth_ceiling = dec!(5);
        let fx = fixture_with_config(config);

        let record = fx.reconciler.start_rental("pb-1", "st-1").await.unwrap();
        let settlement = fx
            .reconciler
            .settle(record.id, "st-2", Some(30 * MS_PER_HOUR))
            .await
            .unwrap();

        // Raw charge would be 20, ceiling is 5
        assert_eq!(settlement.final_amount, dec!(5));
        assert!(settlement.ceiling_clamped);
        assert_eq!(fx.gateway.captured_amount(&record.hold_id), Some(dec!(5)));
    }

    #[tokio::test]
    async fn test_clock_anomaly_settles_at_minimum() {
        let fx = fixture();
        fx.now.store(10 * MS_PER_HOUR, Ordering::SeqCst);
        let record = fx.reconciler.start_rental("pb-1", "st-1").await.unwrap();

        // Return reported before the recorded start
        let settlement = fx
            .reconciler
            .settle(record.id, "st-2", Some(0))
            .await
            .unwrap();

        assert_eq!(settlement.duration_hours, Some(0));
        assert_eq!(settlement.final_amount, dec!(2.00));
        assert!(settlement.final_amount >= Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_capture_failure_marks_rental_failed() {
        let fx = fixture();
        let record = fx.reconciler.start_rental("pb-1", "st-1").await.unwrap();
        fx.gateway.fail_captures(true);

        let result = fx
            .reconciler
            .settle(record.id, "st-2", Some(MS_PER_HOUR))
            .await;
        assert!(matches!(
            result,
            Err(VoltwayError::Billing(BillingError::SettlementFailed { .. }))
        ));

        // The record remains inspectable for manual reconciliation
        let loaded = fx.store.get_rental(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RentalStatus::Failed);
        assert!(loaded.final_amount.is_none());

        // Terminal: a later retry does not resurrect the rental
        let retry = fx
            .reconciler
            .settle(record.id, "st-2", Some(2 * MS_PER_HOUR))
            .await;
        assert!(matches!(
            retry,
            Err(VoltwayError::Billing(BillingError::SettlementFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_settle_unknown_rental() {
        let fx = fixture();
        let result = fx.reconciler.settle(Uuid::new_v4(), "st-2", None).await;
        assert!(matches!(
            result,
            Err(VoltwayError::Billing(BillingError::RentalNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_settling_record_rejects_second_caller() {
        let fx = fixture();
        let record = fx.reconciler.start_rental("pb-1", "st-1").await.unwrap();

        // Another caller holds the record in Settling
        fx.store
            .conditional_update_status(
                record.id,
                RentalStatus::Active,
                RentalStatus::Settling,
                SettlementFields::default(),
            )
            .await
            .unwrap();

        let result = fx.reconciler.settle(record.id, "st-2", None).await;
        assert!(matches!(
            result,
            Err(VoltwayError::Billing(
                BillingError::ConcurrentSettlementInProgress { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_releases_hold() {
        struct FailingStore;

        #[async_trait]
        impl RentalStore for FailingStore {
            async fn create_rental(
                &self,
                _power_bank_id: &str,
                _start_station_id: &str,
                _pre_auth_ceiling: Decimal,
                _hold_id: &str,
            ) -> voltway_common::Result<RentalRecord> {
                Err(VoltwayError::Storage("row store unavailable".into()))
            }

            async fn get_rental(
                &self,
                _id: Uuid,
            ) -> voltway_common::Result<Option<RentalRecord>> {
                Ok(None)
            }

            async fn conditional_update_status(
                &self,
                _id: Uuid,
                _expected: RentalStatus,
                _new: RentalStatus,
                _fields: SettlementFields,
            ) -> voltway_common::Result<bool> {
                Ok(false)
            }
        }

        let gateway = Arc::new(InMemoryPaymentGateway::new());
        let reconciler = SettlementReconciler::new(
            Arc::new(FailingStore),
            gateway.clone(),
            BillingConfig::default(),
        );

        let result = reconciler.start_rental("pb-1", "st-1").await;
        let hold_id = match result {
            Err(VoltwayError::Billing(BillingError::PartialFailure { hold_id })) => hold_id,
            other => panic!("expected PartialFailure, got {:?}", other.map(|r| r.id)),
        };

        // The orphaned hold was released, not silently dropped
        assert!(gateway.is_released(&hold_id));
    }
}
