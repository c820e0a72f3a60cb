//! State types for the payment saga.
//!
//! Each state holds only what the saga needs at that stage; the operations
//! valid in a state are defined on `PaymentSaga<State>`.

use lnkit_common::{MpPayment, PaymentHash};

/// Nothing stored yet. Only `init()` and `resume()` are available.
pub struct Initial;

/// The payment is initiated and attempts may be launched.
pub struct InFlight {
    /// Payment hash
    pub payment_hash: PaymentHash,
    /// Id the next launched attempt receives
    pub next_attempt_id: u64,
}

/// An attempt settled. Terminal.
pub struct Succeeded {
    /// Payment as stored when it settled
    pub payment: MpPayment,
}

/// The payment was given up.
pub struct Failed {
    /// Payment as stored when it was failed
    pub payment: MpPayment,
}
