//! Shared setup for the integration tests

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use lnkit::common::util::unix_time;
use lnkit::lnwire::hop::{Mpp, Payload};
use lnkit::lnwire::ServiceFlags;
use lnkit::{
    AttemptExecutor, Error, Hop, HtlcAttemptInfo, MilliSatoshi, NetAddress, PaymentControl,
    PaymentCreationInfo, PaymentHash, Preimage, Route, ShortChannelId,
};
use lnkit_redb::PaymentRedbDatabase;
use rand::RngCore;
use tracing_subscriber::EnvFilter;

/// Install a tracing subscriber once per test binary
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("debug,redb=warn"));

    // Only the first test to call this installs the subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Payment control over a fresh in-memory store
pub fn create_test_control() -> Result<PaymentControl> {
    Ok(PaymentControl::new(Arc::new(
        PaymentRedbDatabase::in_memory()?,
    )))
}

/// Unique path for a file backed store
pub fn temp_db_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "lnkit-it-{}-{}-{}.redb",
        name,
        std::process::id(),
        rand::thread_rng().next_u64()
    ))
}

/// Random preimage and creation info for its hash
pub fn gen_info(value: u64) -> (Preimage, PaymentCreationInfo) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let preimage = Preimage::new(bytes);

    let info = PaymentCreationInfo {
        payment_hash: preimage.hash(),
        value: MilliSatoshi::from(value),
        creation_time: unix_time(),
        payment_request: format!("lnbc{value}").into_bytes(),
    };

    (preimage, info)
}

/// Random public key
pub fn test_key() -> PublicKey {
    let secp = Secp256k1::new();
    PublicKey::from_secret_key(&secp, &SecretKey::new(&mut rand::thread_rng()))
}

/// Random session key
pub fn session_key() -> SecretKey {
    SecretKey::new(&mut rand::thread_rng())
}

/// Peer on localhost
pub fn test_peer() -> NetAddress {
    NetAddress::new(
        test_key(),
        ServiceFlags::NONE,
        SocketAddr::from(([127, 0, 0, 1], 9735)),
    )
}

/// Three hop route delivering `amount`, paying 1 mSAT to each intermediate
/// hop
pub fn test_route(amount: u64, mpp: Option<Mpp>) -> Route {
    let forwards = [amount + 1, amount, amount];

    let hops = forwards
        .iter()
        .zip(0u32..)
        .map(|(forward, i)| Hop {
            pub_key: test_key(),
            channel_id: ShortChannelId {
                block_height: 700_000 + i,
                tx_index: 1,
                tx_position: 0,
            },
            outgoing_time_lock: 600 - 40 * i,
            amt_to_forward: MilliSatoshi::from(*forward),
            mpp: if i == 2 { mpp } else { None },
        })
        .collect();

    Route {
        total_time_lock: 640,
        total_amount: MilliSatoshi::from(amount + 2),
        source_pub_key: test_key(),
        hops,
    }
}

/// Executor that checks every hop payload of a route before accepting it
#[derive(Debug, Default)]
pub struct ValidatingExecutor {
    offline: AtomicBool,
    dispatched: Mutex<Vec<(PaymentHash, u64)>>,
}

impl ValidatingExecutor {
    /// Refuse dispatches while `offline`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Attempts handed to the network so far
    pub fn dispatched(&self) -> Vec<(PaymentHash, u64)> {
        self.dispatched
            .lock()
            .map(|dispatched| dispatched.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AttemptExecutor for ValidatingExecutor {
    async fn dispatch(
        &self,
        _peer: &NetAddress,
        payment_hash: &PaymentHash,
        attempt: &HtlcAttemptInfo,
    ) -> Result<(), Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Executor("peer offline".to_string()));
        }

        for payload in attempt.route.hop_payloads()? {
            Payload::from_tlv_bytes(&payload)?;
        }

        self.dispatched
            .lock()
            .map_err(|_| Error::Custom("poisoned".to_string()))?
            .push((*payment_hash, attempt.attempt_id));

        Ok(())
    }
}

/// Fail the test with the unexpected `result`
pub fn unexpected<T: std::fmt::Debug>(result: T) -> anyhow::Error {
    anyhow!("unexpected result: {result:?}")
}
