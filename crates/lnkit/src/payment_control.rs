//! Payment control
//!
//! Every mutation of a payment record goes through one of the operations
//! below. Each is a single atomic transition applied by the store, so two
//! calls for the same payment hash never interleave and a rejected call leaves
//! the record as it was.

use std::sync::Arc;

use lnkit_common::database::PaymentDatabase;
use lnkit_common::{
    ensure_lnkit, FailureReason, HtlcAttempt, HtlcAttemptInfo, HtlcFailInfo, HtlcOutcome,
    HtlcSettleInfo, MpPayment, PaymentCreationInfo, PaymentHash, PaymentStatus,
};
use tracing::instrument;

use crate::Error;

/// Exactly-once lifecycle controller for outgoing payments
#[derive(Debug, Clone)]
pub struct PaymentControl {
    localstore: Arc<dyn PaymentDatabase + Send + Sync>,
}

impl PaymentControl {
    /// Create a controller over `localstore`
    pub fn new(localstore: Arc<dyn PaymentDatabase + Send + Sync>) -> Self {
        Self { localstore }
    }

    /// Start a payment.
    ///
    /// Fails with [`Error::PaymentInFlight`] while an earlier payment for the
    /// hash is unresolved and with [`Error::AlreadyPaid`] once it has
    /// succeeded. A failed payment is replaced by a fresh record, dropping its
    /// attempts.
    #[instrument(skip_all, fields(payment_hash = %info.payment_hash))]
    pub async fn init_payment(&self, info: PaymentCreationInfo) -> Result<(), Error> {
        let payment_hash = info.payment_hash;

        self.localstore
            .update_payment(
                &payment_hash,
                Box::new(move |current| {
                    match current.as_ref().map(MpPayment::status) {
                        Some(PaymentStatus::InFlight) => return Err(Error::PaymentInFlight),
                        Some(PaymentStatus::Succeeded) => return Err(Error::AlreadyPaid),
                        Some(PaymentStatus::Failed) => {
                            tracing::debug!("Retrying failed payment {}", info.payment_hash);
                        }
                        Some(PaymentStatus::Unknown) | None => (),
                    }

                    Ok(MpPayment::new(info))
                }),
            )
            .await?;

        tracing::info!("Initiated payment {}", payment_hash);

        Ok(())
    }

    /// Record a new attempt before its HTLC is sent
    #[instrument(skip_all, fields(payment_hash = %payment_hash, attempt_id = attempt.attempt_id))]
    pub async fn register_attempt(
        &self,
        payment_hash: &PaymentHash,
        attempt: HtlcAttemptInfo,
    ) -> Result<MpPayment, Error> {
        let attempt_id = attempt.attempt_id;

        let payment = self
            .localstore
            .update_payment(
                payment_hash,
                Box::new(move |current| {
                    let mut payment = current.ok_or(Error::PaymentNotInitiated)?;

                    match payment.status() {
                        PaymentStatus::Succeeded => return Err(Error::PaymentAlreadySucceeded),
                        PaymentStatus::Failed => return Err(Error::PaymentAlreadyFailed),
                        PaymentStatus::InFlight | PaymentStatus::Unknown => (),
                    }

                    ensure_lnkit!(
                        payment.get_htlc(attempt.attempt_id).is_none(),
                        Error::DuplicateAttempt(attempt.attempt_id)
                    );

                    payment.htlcs.push(HtlcAttempt {
                        info: attempt,
                        outcome: HtlcOutcome::Pending,
                    });

                    Ok(payment)
                }),
            )
            .await?;

        tracing::debug!("Registered attempt {} for {}", attempt_id, payment_hash);

        Ok(payment)
    }

    /// Record that an attempt failed.
    ///
    /// The payment stays in flight even if every attempt so far has failed;
    /// only [`PaymentControl::fail`] gives it up. Late failures for a payment
    /// that already resolved are still recorded.
    #[instrument(skip(self, fail_info))]
    pub async fn fail_attempt(
        &self,
        payment_hash: &PaymentHash,
        attempt_id: u64,
        fail_info: HtlcFailInfo,
    ) -> Result<MpPayment, Error> {
        let payment = self
            .localstore
            .update_payment(
                payment_hash,
                Box::new(move |current| {
                    let mut payment = current.ok_or(Error::PaymentNotInitiated)?;
                    resolve_attempt(&mut payment, attempt_id, HtlcOutcome::Failed(fail_info))?;
                    Ok(payment)
                }),
            )
            .await?;

        tracing::debug!(
            "Attempt {} for {} failed: {:?}",
            attempt_id,
            payment_hash,
            fail_info.reason
        );

        Ok(payment)
    }

    /// Give up on a payment.
    ///
    /// A succeeded payment cannot be failed. Failing an already failed
    /// payment overwrites its reason.
    #[instrument(skip(self))]
    pub async fn fail(
        &self,
        payment_hash: &PaymentHash,
        reason: FailureReason,
    ) -> Result<MpPayment, Error> {
        let payment = self
            .localstore
            .update_payment(
                payment_hash,
                Box::new(move |current| {
                    let mut payment = current.ok_or(Error::PaymentNotInitiated)?;

                    ensure_lnkit!(
                        payment.status() != PaymentStatus::Succeeded,
                        Error::PaymentAlreadySucceeded
                    );

                    payment.failure_reason = Some(reason);

                    Ok(payment)
                }),
            )
            .await?;

        tracing::info!("Payment {} failed: {}", payment_hash, reason);

        Ok(payment)
    }

    /// Record that an attempt settled, making the payment succeeded.
    ///
    /// Sibling attempts still in flight are left as they are. Settling a
    /// further attempt of a succeeded payment records its own settle without
    /// changing which attempt is the canonical settlement.
    #[instrument(skip(self, settle_info))]
    pub async fn settle_attempt(
        &self,
        payment_hash: &PaymentHash,
        attempt_id: u64,
        settle_info: HtlcSettleInfo,
    ) -> Result<MpPayment, Error> {
        let payment_hash_owned = *payment_hash;

        let payment = self
            .localstore
            .update_payment(
                payment_hash,
                Box::new(move |current| {
                    let mut payment = current.ok_or(Error::PaymentNotInitiated)?;

                    ensure_lnkit!(
                        settle_info.preimage.matches(&payment_hash_owned),
                        Error::InvalidPreimage
                    );

                    resolve_attempt(&mut payment, attempt_id, HtlcOutcome::Settled(settle_info))?;
                    payment.record_settle(attempt_id);

                    if let Some(reason) = payment.failure_reason.take() {
                        tracing::warn!(
                            "Attempt {} settled after payment failed with {}",
                            attempt_id,
                            reason
                        );
                    }

                    Ok(payment)
                }),
            )
            .await?;

        tracing::info!("Attempt {} for {} settled", attempt_id, payment_hash);

        Ok(payment)
    }

    /// Get the payment for `payment_hash`
    #[instrument(skip(self))]
    pub async fn fetch_payment(&self, payment_hash: &PaymentHash) -> Result<MpPayment, Error> {
        self.localstore
            .get_payment(payment_hash)
            .await?
            .ok_or(Error::PaymentNotInitiated)
    }

    /// Status of the payment for `payment_hash`, [`PaymentStatus::Unknown`]
    /// if none was initiated
    #[instrument(skip(self))]
    pub async fn payment_status(&self, payment_hash: &PaymentHash) -> Result<PaymentStatus, Error> {
        Ok(self
            .localstore
            .get_payment(payment_hash)
            .await?
            .map(|payment| payment.status())
            .unwrap_or(PaymentStatus::Unknown))
    }

    /// Get every payment, ordered by payment hash
    #[instrument(skip_all)]
    pub async fn fetch_payments(&self) -> Result<Vec<MpPayment>, Error> {
        Ok(self.localstore.get_payments().await?)
    }

    /// Get every payment still in flight.
    ///
    /// Used after a restart to pick up attempts whose outcome was never
    /// recorded.
    #[instrument(skip_all)]
    pub async fn fetch_in_flight_payments(&self) -> Result<Vec<MpPayment>, Error> {
        Ok(self
            .localstore
            .get_payments()
            .await?
            .into_iter()
            .filter(|payment| payment.status() == PaymentStatus::InFlight)
            .collect())
    }

    /// Delete every succeeded or failed payment, returning how many were
    /// removed. In-flight payments are never touched.
    #[instrument(skip_all)]
    pub async fn delete_payments(&self) -> Result<usize, Error> {
        let removed = self
            .localstore
            .remove_payments(Box::new(|payment: &MpPayment| {
                payment.status() != PaymentStatus::InFlight
            }))
            .await?;

        tracing::info!("Deleted {} resolved payments", removed);

        Ok(removed)
    }
}

fn resolve_attempt(
    payment: &mut MpPayment,
    attempt_id: u64,
    outcome: HtlcOutcome,
) -> Result<(), Error> {
    let htlc = payment
        .get_htlc_mut(attempt_id)
        .ok_or(Error::AttemptNotFound(attempt_id))?;

    ensure_lnkit!(!htlc.is_resolved(), Error::AttemptAlreadyResolved(attempt_id));

    htlc.outcome = outcome;

    Ok(())
}
