//! Payment Saga - Type State Pattern Implementation
//!
//! Drives one outgoing payment through [`PaymentControl`]. Every attempt is
//! registered in the store before its HTLC is handed to the
//! [`AttemptExecutor`], so a crash can never leave an HTLC on the network that
//! the store does not know about.
//!
//! # Type State Flow
//!
//! ```text
//! PaymentSaga<Initial>
//!   ├─> init() -> PaymentSaga<InFlight>
//!   └─> resume() -> PaymentSaga<InFlight>
//!         ├─> launch_attempt() / fail_attempt() -> PaymentSaga<InFlight>
//!         ├─> settle() -> PaymentSaga<Succeeded>
//!         └─> abandon() -> PaymentSaga<Failed>
//! ```

use std::sync::Arc;

use bitcoin::secp256k1::SecretKey;
use lnkit_common::util::unix_time;
use lnkit_common::{
    FailureReason, HtlcAttemptInfo, HtlcFailInfo, HtlcSettleInfo, MpPayment, NetAddress,
    PaymentCreationInfo, PaymentHash, PaymentStatus, Preimage, Route,
};
use tracing::instrument;

use self::compensation::FailRegisteredAttempt;
use self::state::{Failed, InFlight, Initial, Succeeded};
use crate::executor::AttemptExecutor;
use crate::saga::{
    add_compensation, clear_compensations, execute_compensations, new_compensations, Compensations,
};
use crate::{Error, PaymentControl};

pub mod compensation;
pub mod state;

/// Saga for a single outgoing payment.
///
/// Operations are only available in the state they apply to.
pub struct PaymentSaga<S> {
    /// Lifecycle controller
    control: PaymentControl,
    /// Transport for attempts
    executor: Arc<dyn AttemptExecutor>,
    /// Compensating actions in LIFO order (most recent first)
    compensations: Compensations,
    /// State-specific data
    state_data: S,
}

impl PaymentSaga<Initial> {
    /// Create a payment saga in the Initial state
    pub fn new(control: PaymentControl, executor: Arc<dyn AttemptExecutor>) -> Self {
        Self {
            control,
            executor,
            compensations: new_compensations(),
            state_data: Initial,
        }
    }

    /// Initiate the payment.
    ///
    /// Fails if a payment for the same hash is in flight or already
    /// succeeded.
    #[instrument(skip_all)]
    pub async fn init(self, info: PaymentCreationInfo) -> Result<PaymentSaga<InFlight>, Error> {
        let payment_hash = info.payment_hash;

        self.control.init_payment(info).await?;

        Ok(self.into_state(InFlight {
            payment_hash,
            next_attempt_id: 0,
        }))
    }

    /// Pick up a payment that is still in flight, typically after a restart.
    ///
    /// New attempts get ids above every stored attempt.
    #[instrument(skip(self))]
    pub async fn resume(self, payment_hash: &PaymentHash) -> Result<PaymentSaga<InFlight>, Error> {
        let payment = self.control.fetch_payment(payment_hash).await?;

        match payment.status() {
            PaymentStatus::Succeeded => return Err(Error::PaymentAlreadySucceeded),
            PaymentStatus::Failed => return Err(Error::PaymentAlreadyFailed),
            PaymentStatus::InFlight | PaymentStatus::Unknown => (),
        }

        let next_attempt_id = payment.last_attempt_id().map_or(0, |id| id + 1);

        tracing::info!(
            "Resuming payment {} with {} attempts in flight",
            payment_hash,
            payment.in_flight_attempts().count()
        );

        Ok(self.into_state(InFlight {
            payment_hash: *payment_hash,
            next_attempt_id,
        }))
    }
}

impl PaymentSaga<InFlight> {
    /// Payment hash
    pub fn payment_hash(&self) -> &PaymentHash {
        &self.state_data.payment_hash
    }

    /// Current stored payment
    pub async fn payment(&self) -> Result<MpPayment, Error> {
        self.control.fetch_payment(&self.state_data.payment_hash).await
    }

    /// Register an attempt along `route` and dispatch its HTLC to `peer`,
    /// returning the attempt id.
    ///
    /// # Compensation
    ///
    /// If dispatch fails the registered attempt is failed with
    /// [`HtlcFailReason::InternalError`](lnkit_common::HtlcFailReason::InternalError)
    /// and the dispatch error is returned. The payment stays in flight.
    #[instrument(skip_all)]
    pub async fn launch_attempt(
        &mut self,
        route: Route,
        session_key: SecretKey,
        peer: &NetAddress,
    ) -> Result<u64, Error> {
        let payment_hash = self.state_data.payment_hash;
        let attempt_id = self.state_data.next_attempt_id;

        let attempt = HtlcAttemptInfo {
            attempt_id,
            session_key,
            route,
            attempt_time: unix_time(),
        };

        self.control
            .register_attempt(&payment_hash, attempt.clone())
            .await?;
        self.state_data.next_attempt_id += 1;

        add_compensation(
            &self.compensations,
            Box::new(FailRegisteredAttempt {
                control: self.control.clone(),
                payment_hash,
                attempt_id,
            }),
        )
        .await;

        if let Err(err) = self.executor.dispatch(peer, &payment_hash, &attempt).await {
            tracing::warn!(
                "Dispatch of attempt {} to {} failed: {}",
                attempt_id,
                peer,
                err
            );
            execute_compensations(&self.compensations).await;
            return Err(err);
        }

        clear_compensations(&self.compensations).await;

        tracing::info!(
            "Launched attempt {} for {} via {}",
            attempt_id,
            payment_hash,
            peer
        );

        Ok(attempt_id)
    }

    /// Record that an attempt failed. The payment stays in flight.
    #[instrument(skip(self, fail_info))]
    pub async fn fail_attempt(
        &self,
        attempt_id: u64,
        fail_info: HtlcFailInfo,
    ) -> Result<MpPayment, Error> {
        self.control
            .fail_attempt(&self.state_data.payment_hash, attempt_id, fail_info)
            .await
    }

    /// Record that an attempt settled with `preimage`
    #[instrument(skip(self, preimage))]
    pub async fn settle(
        self,
        attempt_id: u64,
        preimage: Preimage,
    ) -> Result<PaymentSaga<Succeeded>, Error> {
        let payment = self
            .control
            .settle_attempt(
                &self.state_data.payment_hash,
                attempt_id,
                HtlcSettleInfo::new(preimage),
            )
            .await?;

        Ok(self.into_state(Succeeded { payment }))
    }

    /// Give up on the payment.
    ///
    /// Attempts still in flight keep their pending outcome and may settle
    /// later.
    #[instrument(skip(self))]
    pub async fn abandon(self, reason: FailureReason) -> Result<PaymentSaga<Failed>, Error> {
        let payment = self
            .control
            .fail(&self.state_data.payment_hash, reason)
            .await?;

        let pending = payment.in_flight_attempts().count();
        if pending > 0 {
            tracing::warn!(
                "Payment {} abandoned with {} attempts in flight",
                payment.payment_hash(),
                pending
            );
        }

        Ok(self.into_state(Failed { payment }))
    }
}

impl PaymentSaga<Succeeded> {
    /// Payment as stored when it settled
    pub fn payment(&self) -> &MpPayment {
        &self.state_data.payment
    }

    /// Preimage of the canonical settlement
    pub fn preimage(&self) -> Option<Preimage> {
        self.state_data
            .payment
            .settled_attempt()
            .and_then(|htlc| htlc.settle())
            .map(|settle| settle.preimage)
    }
}

impl PaymentSaga<Failed> {
    /// Payment as stored when it was failed
    pub fn payment(&self) -> &MpPayment {
        &self.state_data.payment
    }

    /// Why the payment was given up
    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.state_data.payment.failure_reason
    }
}

impl<S> PaymentSaga<S> {
    fn into_state<T>(self, state_data: T) -> PaymentSaga<T> {
        PaymentSaga {
            control: self.control,
            executor: self.executor,
            compensations: self.compensations,
            state_data,
        }
    }
}
