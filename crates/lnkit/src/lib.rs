//! LNKit
//!
//! Exactly-once control of outgoing Lightning payments. [`PaymentControl`]
//! owns every stored payment record and moves it through its lifecycle with
//! atomic transitions; [`PaymentSaga`] drives a send on top of it, handing
//! registered attempts to an [`AttemptExecutor`].

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod executor;
pub mod payment_control;
pub mod saga;
pub mod send;

pub use lnkit_common::{
    self as common, database, ensure_lnkit, lnwire, Error, FailureReason, Hop, HtlcAttempt,
    HtlcAttemptInfo, HtlcFailInfo, HtlcFailReason, HtlcOutcome, HtlcSettleInfo, MilliSatoshi,
    MpPayment, NetAddress, PaymentCreationInfo, PaymentHash, PaymentStatus, Preimage, Route,
    ShortChannelId,
};

pub use self::executor::AttemptExecutor;
pub use self::payment_control::PaymentControl;
pub use self::send::saga::PaymentSaga;
