//! Short channel ids

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest block height or transaction index that fits the packed encoding
pub const MAX_FIELD: u32 = 0x00ff_ffff;

/// Short channel id error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Block height or transaction index wider than 3 bytes
    #[error("Short channel id `{0}` out of range")]
    OutOfRange(ShortChannelId),
}

/// Compact on-chain location of a channel's funding output.
///
/// Packed into a `u64` as `block_height (3 bytes) | tx_index (3 bytes) |
/// tx_position (2 bytes)`. The all-zero id is reserved as the exit sentinel.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ShortChannelId {
    /// Height of the block containing the funding transaction
    pub block_height: u32,
    /// Index of the funding transaction within the block
    pub tx_index: u32,
    /// Output index of the funding output
    pub tx_position: u16,
}

impl ShortChannelId {
    /// Next hop value meaning "no further forwarding": this hop is the payee
    pub const EXIT: ShortChannelId = ShortChannelId {
        block_height: 0,
        tx_index: 0,
        tx_position: 0,
    };

    /// Unpack from the integer wire encoding
    pub const fn from_u64(value: u64) -> Self {
        Self {
            block_height: (value >> 40) as u32,
            tx_index: ((value >> 16) & 0x00ff_ffff) as u32,
            tx_position: value as u16,
        }
    }

    /// Pack into the integer wire encoding
    pub fn to_u64(self) -> Result<u64, Error> {
        if self.block_height > MAX_FIELD || self.tx_index > MAX_FIELD {
            return Err(Error::OutOfRange(self));
        }

        Ok(((self.block_height as u64) << 40)
            | ((self.tx_index as u64) << 16)
            | self.tx_position as u64)
    }

    /// Whether this is the exit sentinel
    pub fn is_exit(&self) -> bool {
        *self == Self::EXIT
    }
}

impl From<u64> for ShortChannelId {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl TryFrom<ShortChannelId> for u64 {
    type Error = Error;

    fn try_from(value: ShortChannelId) -> Result<Self, Self::Error> {
        value.to_u64()
    }
}

impl fmt::Display for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.block_height, self.tx_index, self.tx_position
        )
    }
}
