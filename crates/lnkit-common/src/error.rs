//! Errors

use thiserror::Error;

use crate::database;

/// LNKit Error
///
/// Lifecycle errors are expected outcomes the send pipeline branches on; none
/// of them means the store is corrupt.
#[derive(Debug, Error)]
pub enum Error {
    /// No record exists for the payment hash
    #[error("Payment not initiated")]
    PaymentNotInitiated,
    /// A payment for this hash is still being attempted
    #[error("Payment is in flight")]
    PaymentInFlight,
    /// A payment for this hash already succeeded
    #[error("Payment is already paid")]
    AlreadyPaid,
    /// Operation not allowed once the payment has succeeded
    #[error("Payment has already succeeded")]
    PaymentAlreadySucceeded,
    /// Operation not allowed once the payment has failed
    #[error("Payment has already failed")]
    PaymentAlreadyFailed,
    /// No attempt with this id exists for the payment
    #[error("HTLC attempt `{0}` not found")]
    AttemptNotFound(u64),
    /// The attempt already carries a settle or fail outcome
    #[error("HTLC attempt `{0}` already resolved")]
    AttemptAlreadyResolved(u64),
    /// An attempt with this id is already registered
    #[error("HTLC attempt `{0}` already registered")]
    DuplicateAttempt(u64),
    /// Preimage does not hash to the payment hash
    #[error("Preimage does not match payment hash")]
    InvalidPreimage,
    /// Invalid onion payload
    #[error(transparent)]
    Payload(#[from] lnwire::hop::Error),
    /// Route cannot be turned into onion payloads
    #[error("Invalid route: {0}")]
    InvalidRoute(String),
    /// Channel id cannot be packed
    #[error(transparent)]
    ShortChannelId(#[from] lnwire::short_channel_id::Error),
    /// TLV encoding error
    #[error(transparent)]
    Tlv(#[from] lnwire::tlv::Error),
    /// Attempt executor could not hand off an HTLC
    #[error("Attempt executor error: {0}")]
    Executor(String),
    /// Storage error
    #[error(transparent)]
    Database(#[from] database::Error),
    /// Custom error
    #[error("`{0}`")]
    Custom(String),
}

/// Return early with `$err` unless `$cond` holds
#[macro_export]
macro_rules! ensure_lnkit {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
