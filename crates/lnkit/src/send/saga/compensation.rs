//! Compensation actions for the payment saga.

use async_trait::async_trait;
use lnkit_common::{HtlcFailInfo, HtlcFailReason, PaymentHash};
use tracing::instrument;

use crate::saga::CompensatingAction;
use crate::{Error, PaymentControl};

/// Fail an attempt that was registered but never left this node.
///
/// The attempt is marked failed with [`HtlcFailReason::InternalError`]; an
/// attempt that is already resolved is left as is.
pub struct FailRegisteredAttempt {
    /// Controller the attempt was registered through
    pub control: PaymentControl,
    /// Payment hash
    pub payment_hash: PaymentHash,
    /// Attempt to fail
    pub attempt_id: u64,
}

#[async_trait]
impl CompensatingAction for FailRegisteredAttempt {
    #[instrument(skip_all)]
    async fn execute(&self) -> Result<(), Error> {
        tracing::info!(
            "Compensation: failing undispatched attempt {} for {}",
            self.attempt_id,
            self.payment_hash
        );

        match self
            .control
            .fail_attempt(
                &self.payment_hash,
                self.attempt_id,
                HtlcFailInfo::new(HtlcFailReason::InternalError),
            )
            .await
        {
            Ok(_) => Ok(()),
            // Already resolved by an earlier run
            Err(Error::AttemptAlreadyResolved(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn name(&self) -> &'static str {
        "FailRegisteredAttempt"
    }
}
