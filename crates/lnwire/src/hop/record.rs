//! Onion payload record types

use serde::{Deserialize, Serialize};

use crate::tlv::{self, Type, Writer};
use crate::MilliSatoshi;

/// Amount to forward (`tu64`)
pub const AMT_ONION_TYPE: Type = 2;
/// Outgoing timelock (`tu32`)
pub const LOCK_TIME_ONION_TYPE: Type = 4;
/// Outgoing short channel id (`u64`)
pub const NEXT_HOP_ONION_TYPE: Type = 6;
/// Multi-part payment details
pub const MPP_ONION_TYPE: Type = 8;

/// Record types understood by the payload decoder
pub const KNOWN_TYPES: [Type; 4] = [
    AMT_ONION_TYPE,
    LOCK_TIME_ONION_TYPE,
    NEXT_HOP_ONION_TYPE,
    MPP_ONION_TYPE,
];

const PAYMENT_ADDR_SIZE: usize = 32;

/// Multi-part payment record, only valid at the final hop.
///
/// Ties the shards of one payment together and tells the payee how much to
/// wait for in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mpp {
    /// Payment address from the invoice
    #[serde(with = "hex::serde")]
    pub payment_addr: [u8; PAYMENT_ADDR_SIZE],
    /// Total amount of the payment across all shards
    pub total_msat: MilliSatoshi,
}

impl Mpp {
    /// Create new [`Mpp`]
    pub fn new(payment_addr: [u8; PAYMENT_ADDR_SIZE], total_msat: MilliSatoshi) -> Self {
        Self {
            payment_addr,
            total_msat,
        }
    }

    /// Decode the record value: the payment address followed by a `tu64` total
    pub fn decode(value: &[u8]) -> Result<Self, tlv::Error> {
        if value.len() < PAYMENT_ADDR_SIZE || value.len() > PAYMENT_ADDR_SIZE + 8 {
            return Err(tlv::Error::InvalidLength {
                ty: MPP_ONION_TYPE,
                length: value.len(),
            });
        }

        let (addr, total) = value.split_at(PAYMENT_ADDR_SIZE);
        let mut payment_addr = [0u8; PAYMENT_ADDR_SIZE];
        payment_addr.copy_from_slice(addr);

        Ok(Self {
            payment_addr,
            total_msat: tlv::read_tu64(MPP_ONION_TYPE, total)?.into(),
        })
    }

    /// Append as an [`MPP_ONION_TYPE`] record
    pub fn write(&self, writer: &mut Writer) -> Result<(), tlv::Error> {
        let total = u64::from(self.total_msat).to_be_bytes();
        let skip = total.iter().take_while(|b| **b == 0).count();

        let mut value = Vec::with_capacity(PAYMENT_ADDR_SIZE + 8);
        value.extend_from_slice(&self.payment_addr);
        value.extend_from_slice(&total[skip..]);

        writer.put(MPP_ONION_TYPE, &value)?;
        Ok(())
    }
}
