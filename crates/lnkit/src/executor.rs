//! Attempt executor
//!
//! The transport side of a send: builds the onion for a registered attempt and
//! hands the HTLC to the first hop. Outcomes arrive later, out of band, and are
//! reported through [`PaymentControl::settle_attempt`] and
//! [`PaymentControl::fail_attempt`].
//!
//! [`PaymentControl::settle_attempt`]: crate::PaymentControl::settle_attempt
//! [`PaymentControl::fail_attempt`]: crate::PaymentControl::fail_attempt

use async_trait::async_trait;
use lnkit_common::{HtlcAttemptInfo, NetAddress, PaymentHash};

use crate::Error;

/// Sends HTLC attempts onto the network
#[async_trait]
pub trait AttemptExecutor: Send + Sync {
    /// Dispatch the HTLC for `attempt` to `peer`.
    ///
    /// Returning `Ok` means the HTLC left this node; an error means it never
    /// did and the attempt can be failed locally.
    async fn dispatch(
        &self,
        peer: &NetAddress,
        payment_hash: &PaymentHash,
        attempt: &HtlcAttemptInfo,
    ) -> Result<(), Error>;
}
