//! Peer addressing

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use bitcoin::secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// Services supported by a Lightning peer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceFlags(u64);

impl ServiceFlags {
    /// No services advertised
    pub const NONE: ServiceFlags = ServiceFlags(0);

    /// Create from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Whether every bit of `other` is set
    pub const fn contains(&self, other: ServiceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set every bit of `other`
    pub fn insert(&mut self, other: ServiceFlags) {
        self.0 |= other.0;
    }
}

/// Identity and network reachability of a peer.
///
/// Two addresses are equal when they name the same identity key, regardless of
/// the endpoint or advertised services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NetAddress {
    /// Long-term static key identifying the node and authenticating the
    /// transport handshake
    pub identity_key: PublicKey,
    /// Services the node supports at this address
    pub services: ServiceFlags,
    /// TCP endpoint the node is reachable at
    pub address: SocketAddr,
}

impl NetAddress {
    /// Create new [`NetAddress`]
    pub fn new(identity_key: PublicKey, services: ServiceFlags, address: SocketAddr) -> Self {
        Self {
            identity_key,
            services,
            address,
        }
    }
}

impl PartialEq for NetAddress {
    fn eq(&self, other: &Self) -> bool {
        self.identity_key == other.identity_key
    }
}

impl Eq for NetAddress {}

impl Hash for NetAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity_key.hash(state);
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identity_key, self.address)
    }
}
