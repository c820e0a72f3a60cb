//! LNKit Redb
//!
//! Payment storage on the embedded transactional key-value store redb.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod error;
mod payments;

pub use self::error::Error;
pub use self::payments::PaymentRedbDatabase;
