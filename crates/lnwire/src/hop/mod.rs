//! Per-hop forwarding instructions
//!
//! Every node on a route receives an onion payload telling it how much to
//! forward, with which timelock, and over which channel. This module holds the
//! decoded form of that instruction and the rules that decide whether it is
//! well formed for an intermediate or a final hop.

use serde::{Deserialize, Serialize};

use crate::{MilliSatoshi, ShortChannelId};

pub mod payload;
pub mod record;

pub use self::payload::{
    validate_parsed_payload_types, Error, InvalidPayload, Payload, PayloadViolation,
};
pub use self::record::Mpp;

/// Chain an HTLC is forwarded on
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin
    #[default]
    Bitcoin,
    /// Litecoin
    Litecoin,
}

/// Basic parameters required to forward an HTLC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingInfo {
    /// Chain the outgoing HTLC is sent on
    pub network: Network,
    /// Outgoing channel, or [`ShortChannelId::EXIT`] at the final hop
    pub next_hop: ShortChannelId,
    /// Amount the outgoing HTLC must carry
    pub amount_to_forward: MilliSatoshi,
    /// Absolute timelock of the outgoing HTLC
    pub outgoing_ctlv: u32,
}

impl ForwardingInfo {
    /// Whether this instruction terminates the route
    pub fn is_exit(&self) -> bool {
        self.next_hop.is_exit()
    }
}

/// Fixed-format hop data carried by legacy (pre-TLV) onions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopData {
    /// Realm byte, zero for Bitcoin
    pub realm: u8,
    /// Big-endian short channel id of the outgoing channel
    pub next_address: [u8; 8],
    /// Amount to forward in millisatoshi
    pub forward_amount: u64,
    /// Outgoing timelock
    pub outgoing_cltv: u32,
}
