//! Routes
//!
//! A route is produced by the path finder and is opaque to payment control,
//! which only stores it with the attempt that used it.

use bitcoin::secp256k1::PublicKey;
use lnwire::hop::record::{AMT_ONION_TYPE, LOCK_TIME_ONION_TYPE, NEXT_HOP_ONION_TYPE};
use lnwire::hop::Mpp;
use lnwire::tlv::Writer;
use lnwire::{MilliSatoshi, ShortChannelId};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One hop of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    /// Node this hop reaches
    pub pub_key: PublicKey,
    /// Channel used to reach the node
    pub channel_id: ShortChannelId,
    /// Timelock the node must use on its outgoing HTLC
    pub outgoing_time_lock: u32,
    /// Amount the node must forward, or receive at the final hop
    pub amt_to_forward: MilliSatoshi,
    /// Multi-part payment record, final hop only
    pub mpp: Option<Mpp>,
}

impl Hop {
    /// TLV onion payload for this hop, given the channel the node forwards
    /// over ([`ShortChannelId::EXIT`] if it is the payee)
    pub fn tlv_payload(&self, next_chan_id: ShortChannelId) -> Result<Vec<u8>, Error> {
        let mut writer = Writer::new();
        writer.put_truncated(AMT_ONION_TYPE, self.amt_to_forward.into())?;
        writer.put_truncated(LOCK_TIME_ONION_TYPE, self.outgoing_time_lock as u64)?;

        if !next_chan_id.is_exit() {
            writer.put_u64(NEXT_HOP_ONION_TYPE, next_chan_id.to_u64()?)?;
        }

        if let Some(mpp) = &self.mpp {
            mpp.write(&mut writer)?;
        }

        Ok(writer.finish())
    }
}

/// Path through the network for one HTLC attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Timelock of the first HTLC
    pub total_time_lock: u32,
    /// Amount sent, fees included
    pub total_amount: MilliSatoshi,
    /// Sending node
    pub source_pub_key: PublicKey,
    /// Hops in path order, payee last
    pub hops: Vec<Hop>,
}

impl Route {
    /// Amount delivered to the payee
    pub fn receiver_amount(&self) -> MilliSatoshi {
        self.hops
            .last()
            .map(|hop| hop.amt_to_forward)
            .unwrap_or_default()
    }

    /// Fees paid to intermediate nodes
    pub fn total_fees(&self) -> MilliSatoshi {
        self.total_amount
            .checked_sub(self.receiver_amount())
            .unwrap_or_default()
    }

    /// Onion payload for every hop in path order
    pub fn hop_payloads(&self) -> Result<Vec<Vec<u8>>, Error> {
        self.hops
            .iter()
            .enumerate()
            .map(|(i, hop)| match self.hops.get(i + 1) {
                Some(next) if next.channel_id.is_exit() => {
                    Err(Error::InvalidRoute(format!("hop {} has no channel id", i + 1)))
                }
                Some(next) => hop.tlv_payload(next.channel_id),
                None => hop.tlv_payload(ShortChannelId::EXIT),
            })
            .collect()
    }
}
