//! Payment records
//!
//! An [`MpPayment`] is the unit of storage and of atomic transition: the
//! creation info written when the payment was initiated, every HTLC attempt
//! made for it, and the top-level failure reason if the payment was given up.

use std::fmt;

use bitcoin::secp256k1::SecretKey;
use lnwire::{MilliSatoshi, PaymentHash, Preimage};
use serde::{Deserialize, Serialize};

use crate::route::Route;

/// Lifecycle status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No record exists
    Unknown,
    /// Initiated and not yet resolved
    InFlight,
    /// An attempt settled; terminal
    Succeeded,
    /// Given up on; may be retried with a fresh initiation
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unknown => write!(f, "unknown"),
            PaymentStatus::InFlight => write!(f, "in_flight"),
            PaymentStatus::Succeeded => write!(f, "succeeded"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a payment as a whole was given up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The payment did not complete before its deadline
    Timeout,
    /// No route to the destination could be found
    NoRoute,
    /// A non-recoverable error was encountered
    Error,
    /// The payee rejected the payment details
    IncorrectPaymentDetails,
    /// Not enough local balance to send
    InsufficientBalance,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::NoRoute => write!(f, "no_route"),
            FailureReason::Error => write!(f, "error"),
            FailureReason::IncorrectPaymentDetails => write!(f, "incorrect_payment_details"),
            FailureReason::InsufficientBalance => write!(f, "insufficient_balance"),
        }
    }
}

/// Why a single HTLC attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtlcFailReason {
    /// Cause not known
    Unknown,
    /// The failure message could not be decrypted
    Unreadable,
    /// The attempt failed locally before reaching the network
    InternalError,
    /// A failure message was returned by a node on the route
    Message,
}

/// Data written once when a payment is initiated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCreationInfo {
    /// Payment hash
    pub payment_hash: PaymentHash,
    /// Amount the payee should receive
    pub value: MilliSatoshi,
    /// Unix time the payment was initiated
    pub creation_time: u64,
    /// Encoded invoice, opaque to payment control
    #[serde(with = "hex::serde")]
    pub payment_request: Vec<u8>,
}

/// One HTLC sent along one route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcAttemptInfo {
    /// Unique within the payment; never reused
    pub attempt_id: u64,
    /// Ephemeral key the onion was built with
    pub session_key: SecretKey,
    /// Route the HTLC was sent along
    pub route: Route,
    /// Unix time the attempt was registered
    pub attempt_time: u64,
}

/// Failure details of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcFailInfo {
    /// Failure reason
    pub reason: HtlcFailReason,
    /// Unix time the failure was recorded
    pub fail_time: u64,
    /// Position on the route of the node that reported the failure
    pub failure_source_index: Option<u32>,
}

impl HtlcFailInfo {
    /// Failure recorded now with no known source
    pub fn new(reason: HtlcFailReason) -> Self {
        Self {
            reason,
            fail_time: crate::util::unix_time(),
            failure_source_index: None,
        }
    }
}

/// Settle details of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcSettleInfo {
    /// Preimage revealed by the payee
    pub preimage: Preimage,
    /// Unix time the settle was recorded
    pub settle_time: u64,
}

impl HtlcSettleInfo {
    /// Settle recorded now
    pub fn new(preimage: Preimage) -> Self {
        Self {
            preimage,
            settle_time: crate::util::unix_time(),
        }
    }
}

/// Resolution of an attempt. Set at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtlcOutcome {
    /// No outcome recorded yet
    Pending,
    /// The HTLC failed
    Failed(HtlcFailInfo),
    /// The HTLC was fulfilled downstream
    Settled(HtlcSettleInfo),
}

/// An attempt and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcAttempt {
    /// Attempt info
    pub info: HtlcAttemptInfo,
    /// Outcome
    pub outcome: HtlcOutcome,
}

impl HtlcAttempt {
    /// Attempt id
    pub fn attempt_id(&self) -> u64 {
        self.info.attempt_id
    }

    /// Failure, if the attempt failed
    pub fn failure(&self) -> Option<&HtlcFailInfo> {
        match &self.outcome {
            HtlcOutcome::Failed(info) => Some(info),
            _ => None,
        }
    }

    /// Settle, if the attempt settled
    pub fn settle(&self) -> Option<&HtlcSettleInfo> {
        match &self.outcome {
            HtlcOutcome::Settled(info) => Some(info),
            _ => None,
        }
    }

    /// Whether an outcome is recorded
    pub fn is_resolved(&self) -> bool {
        !matches!(self.outcome, HtlcOutcome::Pending)
    }
}

/// A payment with all of its attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpPayment {
    /// Creation info
    pub info: PaymentCreationInfo,
    /// Attempts in registration order
    pub htlcs: Vec<HtlcAttempt>,
    /// Set when the payment was failed as a whole
    pub failure_reason: Option<FailureReason>,
    /// Attempt whose settle committed first. Never changes once set.
    #[serde(default)]
    pub settled_attempt_id: Option<u64>,
}

impl MpPayment {
    /// Fresh in-flight payment with no attempts
    pub fn new(info: PaymentCreationInfo) -> Self {
        Self {
            info,
            htlcs: Vec::new(),
            failure_reason: None,
            settled_attempt_id: None,
        }
    }

    /// Payment hash
    pub fn payment_hash(&self) -> &PaymentHash {
        &self.info.payment_hash
    }

    /// Status derived from the record.
    ///
    /// A settled attempt makes the payment succeeded; otherwise a failure
    /// reason makes it failed; otherwise it is in flight.
    pub fn status(&self) -> PaymentStatus {
        if self.settled_attempt().is_some() {
            PaymentStatus::Succeeded
        } else if self.failure_reason.is_some() {
            PaymentStatus::Failed
        } else {
            PaymentStatus::InFlight
        }
    }

    /// First attempt to settle, the canonical settlement of the payment
    pub fn settled_attempt(&self) -> Option<&HtlcAttempt> {
        self.settled_attempt_id
            .and_then(|attempt_id| self.get_htlc(attempt_id))
            .filter(|htlc| htlc.settle().is_some())
    }

    /// Mark `attempt_id` as settled by a committed settle.
    ///
    /// Only the first call has an effect.
    pub fn record_settle(&mut self, attempt_id: u64) {
        self.settled_attempt_id.get_or_insert(attempt_id);
    }

    /// Attempts with no recorded outcome
    pub fn in_flight_attempts(&self) -> impl Iterator<Item = &HtlcAttempt> {
        self.htlcs.iter().filter(|htlc| !htlc.is_resolved())
    }

    /// Attempt with `attempt_id`
    pub fn get_htlc(&self, attempt_id: u64) -> Option<&HtlcAttempt> {
        self.htlcs
            .iter()
            .find(|htlc| htlc.attempt_id() == attempt_id)
    }

    /// Mutable attempt with `attempt_id`
    pub fn get_htlc_mut(&mut self, attempt_id: u64) -> Option<&mut HtlcAttempt> {
        self.htlcs
            .iter_mut()
            .find(|htlc| htlc.attempt_id() == attempt_id)
    }

    /// Highest attempt id registered so far
    pub fn last_attempt_id(&self) -> Option<u64> {
        self.htlcs.iter().map(HtlcAttempt::attempt_id).max()
    }

    /// Amount locked in or delivered by attempts that have not failed,
    /// fees included
    pub fn sent_amount(&self) -> MilliSatoshi {
        self.htlcs
            .iter()
            .filter(|htlc| htlc.failure().is_none())
            .map(|htlc| htlc.info.route.total_amount)
            .sum()
    }
}
