//! Payment storage
//!
//! Backends persist one [`MpPayment`] per payment hash and provide an atomic
//! read-modify-write over a single record. All lifecycle rules live in the
//! transition closures handed to [`PaymentDatabase::update_payment`]; a
//! backend only guarantees that the closure sees the committed record and
//! that its result is committed durably, or not at all.

use std::fmt::Debug;

use async_trait::async_trait;
use lnwire::PaymentHash;
use thiserror::Error;

use crate::payment::MpPayment;

/// State transition applied to the stored record, if any.
///
/// Returning an error aborts the transaction and leaves the record untouched.
pub type PaymentTransition =
    Box<dyn FnOnce(Option<MpPayment>) -> Result<MpPayment, crate::Error> + Send>;

/// Predicate selecting payments for removal
pub type PaymentFilter = Box<dyn Fn(&MpPayment) -> bool + Send>;

/// Payment Database trait
#[async_trait]
pub trait PaymentDatabase: Debug {
    /// Get the payment for `payment_hash`
    async fn get_payment(&self, payment_hash: &PaymentHash) -> Result<Option<MpPayment>, Error>;

    /// Get every stored payment, ordered by payment hash
    async fn get_payments(&self) -> Result<Vec<MpPayment>, Error>;

    /// Atomically apply `transition` to the record for `payment_hash` and
    /// store the result.
    ///
    /// Concurrent updates of the same payment hash are serialized: each
    /// transition observes every update committed before it.
    async fn update_payment(
        &self,
        payment_hash: &PaymentHash,
        transition: PaymentTransition,
    ) -> Result<MpPayment, crate::Error>;

    /// Remove every payment matching `filter` in one transaction, returning
    /// how many were removed
    async fn remove_payments(&self, filter: PaymentFilter) -> Result<usize, Error>;
}

/// Storage error
///
/// Backends box their own error type into [`Error::Database`]; callers treat
/// it as opaque.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend error
    #[error(transparent)]
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// Record (de)serialization error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Record stored under a key that does not match its payment hash
    #[error("Stored record for `{0}` has a mismatched payment hash")]
    MismatchedKey(PaymentHash),
}
