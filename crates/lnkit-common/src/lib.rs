//! LNKit common types and traits
//!
//! Payment records, the storage seam they are persisted through, and the error
//! type shared by the controller and every storage backend.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod database;
pub mod error;
pub mod payment;
pub mod route;
pub mod util;

pub use lnwire;
pub use lnwire::{MilliSatoshi, NetAddress, PaymentHash, Preimage, ShortChannelId};

pub use self::error::Error;
pub use self::payment::{
    FailureReason, HtlcAttempt, HtlcAttemptInfo, HtlcFailInfo, HtlcFailReason, HtlcOutcome,
    HtlcSettleInfo, MpPayment, PaymentCreationInfo, PaymentStatus,
};
pub use self::route::{Hop, Route};
