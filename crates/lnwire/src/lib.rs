//! Lightning wire types
//!
//! Value types shared by every LNKit crate: amounts, payment hashes and
//! preimages, short channel ids, peer addresses, the TLV stream codec and the
//! per-hop onion payload rules.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod amount;
pub mod hash;
pub mod hop;
pub mod net_address;
pub mod short_channel_id;
pub mod tlv;

pub use self::amount::MilliSatoshi;
pub use self::hash::{PaymentHash, Preimage};
pub use self::net_address::{NetAddress, ServiceFlags};
pub use self::short_channel_id::ShortChannelId;
