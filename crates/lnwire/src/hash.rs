//! Payment hashes and preimages

use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::{sha256, Hash};
use serde::{Deserialize, Serialize};

/// Size of a payment hash or preimage in bytes
pub const HASH_SIZE: usize = 32;

/// Hash of a [`Preimage`]; the external identifier of a payment
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaymentHash(#[serde(with = "hex::serde")] [u8; HASH_SIZE]);

impl PaymentHash {
    /// Create from raw bytes
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }
}

/// Secret whose SHA-256 is the [`PaymentHash`]; revealing it settles an HTLC
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Preimage(#[serde(with = "hex::serde")] [u8; HASH_SIZE]);

impl Preimage {
    /// Create from raw bytes
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Payment hash this preimage unlocks
    pub fn hash(&self) -> PaymentHash {
        PaymentHash(sha256::Hash::hash(&self.0).to_byte_array())
    }

    /// Whether this preimage unlocks `hash`
    pub fn matches(&self, hash: &PaymentHash) -> bool {
        self.hash() == *hash
    }
}

impl From<Preimage> for PaymentHash {
    fn from(preimage: Preimage) -> Self {
        preimage.hash()
    }
}

macro_rules! impl_hex_traits {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; HASH_SIZE];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl From<[u8; HASH_SIZE]> for $name {
            fn from(bytes: [u8; HASH_SIZE]) -> Self {
                Self(bytes)
            }
        }
    };
}

impl_hex_traits!(PaymentHash);
impl_hex_traits!(Preimage);
