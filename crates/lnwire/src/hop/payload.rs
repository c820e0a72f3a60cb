//! Onion payload validation

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::{
    Mpp, AMT_ONION_TYPE, KNOWN_TYPES, LOCK_TIME_ONION_TYPE, MPP_ONION_TYPE, NEXT_HOP_ONION_TYPE,
};
use super::{ForwardingInfo, HopData, Network};
use crate::tlv::{self, Stream, Type, TypeSet};
use crate::ShortChannelId;

/// Way in which a payload breaks the record rules for its hop type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadViolation {
    /// A record that must be present was absent
    Omitted,
    /// A record that must be absent was present
    Included,
    /// An unknown even record was present
    Required,
}

impl fmt::Display for PayloadViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadViolation::Omitted => write!(f, "omitted"),
            PayloadViolation::Included => write!(f, "included"),
            PayloadViolation::Required => write!(f, "required"),
        }
    }
}

/// A payload included or omitted the wrong records for its hop type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvalidPayload {
    /// Record type that caused the violation
    pub ty: Type,
    /// What was wrong with it
    pub violation: PayloadViolation,
    /// Whether the payload was for the final hop of the route
    pub final_hop: bool,
}

impl fmt::Display for InvalidPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hop_type = if self.final_hop {
            "final"
        } else {
            "intermediate"
        };

        write!(
            f,
            "onion payload for {} hop {} record with type {}",
            hop_type, self.violation, self.ty
        )
    }
}

impl std::error::Error for InvalidPayload {}

/// Payload decoding error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Structurally invalid payload
    #[error(transparent)]
    InvalidPayload(#[from] InvalidPayload),
    /// Malformed TLV stream
    #[error(transparent)]
    Tlv(#[from] tlv::Error),
}

/// Check that the records parsed from a hop payload are the right ones for the
/// hop's position.
///
/// `next_hop` is the outgoing channel parsed from the payload;
/// [`ShortChannelId::EXIT`] marks the final hop. Rules are checked in a fixed
/// order and the first one broken is reported:
///
/// 1. every hop carries an amount to forward
/// 2. every hop carries an outgoing timelock
/// 3. the final hop carries no next hop
/// 4. intermediate hops carry no multi-part payment record
pub fn validate_parsed_payload_types(
    parsed_types: &TypeSet,
    next_hop: ShortChannelId,
) -> Result<(), InvalidPayload> {
    let is_final_hop = next_hop.is_exit();

    let has_amt = parsed_types.contains(&AMT_ONION_TYPE);
    let has_lock_time = parsed_types.contains(&LOCK_TIME_ONION_TYPE);
    let has_next_hop = parsed_types.contains(&NEXT_HOP_ONION_TYPE);
    let has_mpp = parsed_types.contains(&MPP_ONION_TYPE);

    let (ty, violation) = match () {
        _ if !has_amt => (AMT_ONION_TYPE, PayloadViolation::Omitted),
        _ if !has_lock_time => (LOCK_TIME_ONION_TYPE, PayloadViolation::Omitted),
        // An intermediate hop necessarily parsed a next hop, otherwise it
        // would read as the exit, so only the final hop needs checking.
        _ if is_final_hop && has_next_hop => (NEXT_HOP_ONION_TYPE, PayloadViolation::Included),
        _ if !is_final_hop && has_mpp => (MPP_ONION_TYPE, PayloadViolation::Included),
        _ => return Ok(()),
    };

    Err(InvalidPayload {
        ty,
        violation,
        final_hop: is_final_hop,
    })
}

/// Everything delivered to a hop in its onion payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Forwarding instruction
    pub fwd_info: ForwardingInfo,
    /// Multi-part payment record, final hop only
    pub mpp: Option<Mpp>,
}

impl Payload {
    /// Build from legacy fixed-format hop data
    pub fn from_legacy(hop_data: &HopData) -> Self {
        let next_hop = ShortChannelId::from_u64(u64::from_be_bytes(hop_data.next_address));

        Self {
            fwd_info: ForwardingInfo {
                network: Network::Bitcoin,
                next_hop,
                amount_to_forward: hop_data.forward_amount.into(),
                outgoing_ctlv: hop_data.outgoing_cltv,
            },
            mpp: None,
        }
    }

    /// Decode and validate a TLV onion payload.
    ///
    /// When the stream contains an unknown even record, the records decoded
    /// before it are validated first and any violation found there is
    /// reported instead of the [`PayloadViolation::Required`] one.
    pub fn from_tlv_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (stream, result) = Stream::decode_partial(bytes, &KNOWN_TYPES);

        let next_hop = match stream.get(NEXT_HOP_ONION_TYPE) {
            Some(value) => ShortChannelId::from_u64(tlv::read_u64(NEXT_HOP_ONION_TYPE, value)?),
            None => ShortChannelId::EXIT,
        };

        match result {
            Ok(()) => (),
            Err(tlv::Error::UnknownRequiredType(ty)) => {
                validate_parsed_payload_types(&stream.parsed_types(), next_hop)?;

                return Err(InvalidPayload {
                    ty,
                    violation: PayloadViolation::Required,
                    final_hop: next_hop.is_exit(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        validate_parsed_payload_types(&stream.parsed_types(), next_hop)?;

        let amount_to_forward = match stream.get(AMT_ONION_TYPE) {
            Some(value) => tlv::read_tu64(AMT_ONION_TYPE, value)?,
            None => 0,
        };
        let outgoing_ctlv = match stream.get(LOCK_TIME_ONION_TYPE) {
            Some(value) => tlv::read_tu32(LOCK_TIME_ONION_TYPE, value)?,
            None => 0,
        };
        let mpp = stream.get(MPP_ONION_TYPE).map(Mpp::decode).transpose()?;

        Ok(Self {
            fwd_info: ForwardingInfo {
                network: Network::Bitcoin,
                next_hop,
                amount_to_forward: amount_to_forward.into(),
                outgoing_ctlv,
            },
            mpp,
        })
    }

    /// Forwarding instruction
    pub fn forwarding_info(&self) -> ForwardingInfo {
        self.fwd_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::Writer;
    use crate::MilliSatoshi;

    const INTERMEDIATE: ShortChannelId = ShortChannelId {
        block_height: 1,
        tx_index: 2,
        tx_position: 3,
    };

    fn types(list: &[Type]) -> TypeSet {
        list.iter().copied().collect()
    }

    fn violation(ty: Type, violation: PayloadViolation, final_hop: bool) -> InvalidPayload {
        InvalidPayload {
            ty,
            violation,
            final_hop,
        }
    }

    #[test]
    fn test_final_hop_with_next_hop_included() {
        let parsed = types(&[AMT_ONION_TYPE, LOCK_TIME_ONION_TYPE, NEXT_HOP_ONION_TYPE]);
        assert_eq!(
            validate_parsed_payload_types(&parsed, ShortChannelId::EXIT),
            Err(violation(NEXT_HOP_ONION_TYPE, PayloadViolation::Included, true))
        );
    }

    #[test]
    fn test_intermediate_hop_with_mpp_included() {
        let parsed = types(&[
            AMT_ONION_TYPE,
            LOCK_TIME_ONION_TYPE,
            NEXT_HOP_ONION_TYPE,
            MPP_ONION_TYPE,
        ]);
        assert_eq!(
            validate_parsed_payload_types(&parsed, INTERMEDIATE),
            Err(violation(MPP_ONION_TYPE, PayloadViolation::Included, false))
        );

        // Missing amount is checked first
        let parsed = types(&[LOCK_TIME_ONION_TYPE, NEXT_HOP_ONION_TYPE, MPP_ONION_TYPE]);
        assert_eq!(
            validate_parsed_payload_types(&parsed, INTERMEDIATE),
            Err(violation(AMT_ONION_TYPE, PayloadViolation::Omitted, false))
        );
    }

    #[test]
    fn test_validation_order_is_fixed() {
        // Walk every combination of present records at both hop positions
        // and compare against the first broken rule.
        for mask in 0u8..16 {
            let has = |bit: u8| mask & (1 << bit) != 0;
            let mut parsed = TypeSet::new();
            for (bit, ty) in KNOWN_TYPES.iter().enumerate() {
                if has(bit as u8) {
                    parsed.insert(*ty);
                }
            }

            for final_hop in [true, false] {
                let next_hop = if final_hop {
                    ShortChannelId::EXIT
                } else {
                    INTERMEDIATE
                };

                let expected = if !has(0) {
                    Err(violation(AMT_ONION_TYPE, PayloadViolation::Omitted, final_hop))
                } else if !has(1) {
                    Err(violation(
                        LOCK_TIME_ONION_TYPE,
                        PayloadViolation::Omitted,
                        final_hop,
                    ))
                } else if final_hop && has(2) {
                    Err(violation(NEXT_HOP_ONION_TYPE, PayloadViolation::Included, true))
                } else if !final_hop && has(3) {
                    Err(violation(MPP_ONION_TYPE, PayloadViolation::Included, false))
                } else {
                    Ok(())
                };

                assert_eq!(
                    validate_parsed_payload_types(&parsed, next_hop),
                    expected,
                    "mask {mask:04b} final {final_hop}"
                );
                // Same inputs, same answer
                assert_eq!(validate_parsed_payload_types(&parsed, next_hop), expected);
            }
        }
    }

    #[test]
    fn test_error_display() {
        let err = violation(NEXT_HOP_ONION_TYPE, PayloadViolation::Included, true);
        assert_eq!(
            err.to_string(),
            "onion payload for final hop included record with type 6"
        );

        let err = violation(AMT_ONION_TYPE, PayloadViolation::Omitted, false);
        assert_eq!(
            err.to_string(),
            "onion payload for intermediate hop omitted record with type 2"
        );
    }

    #[test]
    fn test_decode_intermediate_payload() {
        let mut writer = Writer::new();
        writer.put_truncated(AMT_ONION_TYPE, 100_000).unwrap();
        writer.put_truncated(LOCK_TIME_ONION_TYPE, 700_040).unwrap();
        writer
            .put_u64(NEXT_HOP_ONION_TYPE, INTERMEDIATE.to_u64().unwrap())
            .unwrap();
        let bytes = writer.finish();

        let payload = Payload::from_tlv_bytes(&bytes).unwrap();
        assert_eq!(
            payload.forwarding_info(),
            ForwardingInfo {
                network: Network::Bitcoin,
                next_hop: INTERMEDIATE,
                amount_to_forward: MilliSatoshi::from(100_000),
                outgoing_ctlv: 700_040,
            }
        );
        assert!(payload.mpp.is_none());
    }

    #[test]
    fn test_decode_final_payload_with_mpp() {
        let mpp = Mpp::new([1u8; 32], MilliSatoshi::from(500_000));
        let mut writer = Writer::new();
        writer.put_truncated(AMT_ONION_TYPE, 250_000).unwrap();
        writer.put_truncated(LOCK_TIME_ONION_TYPE, 144).unwrap();
        mpp.write(&mut writer).unwrap();
        let bytes = writer.finish();

        let payload = Payload::from_tlv_bytes(&bytes).unwrap();
        assert!(payload.fwd_info.is_exit());
        assert_eq!(payload.mpp, Some(mpp));
    }

    #[test]
    fn test_decode_required_type() {
        let mut writer = Writer::new();
        writer.put_truncated(AMT_ONION_TYPE, 1000).unwrap();
        writer.put_truncated(LOCK_TIME_ONION_TYPE, 10).unwrap();
        writer.put(100, &[0x01]).unwrap();
        let bytes = writer.finish();

        assert_eq!(
            Payload::from_tlv_bytes(&bytes),
            Err(Error::InvalidPayload(violation(
                100,
                PayloadViolation::Required,
                true
            )))
        );
    }

    #[test]
    fn test_structural_violation_beats_required() {
        // Lock time is missing before the unknown even record
        let mut writer = Writer::new();
        writer.put_truncated(AMT_ONION_TYPE, 1000).unwrap();
        writer.put(100, &[0x01]).unwrap();
        let bytes = writer.finish();

        assert_eq!(
            Payload::from_tlv_bytes(&bytes),
            Err(Error::InvalidPayload(violation(
                LOCK_TIME_ONION_TYPE,
                PayloadViolation::Omitted,
                true
            )))
        );
    }

    #[test]
    fn test_decode_malformed_stream() {
        assert_eq!(
            Payload::from_tlv_bytes(&[0x02, 0x08, 0x01]),
            Err(Error::Tlv(tlv::Error::UnexpectedEof))
        );
    }

    #[test]
    fn test_legacy_payload() {
        let hop_data = HopData {
            realm: 0,
            next_address: INTERMEDIATE.to_u64().unwrap().to_be_bytes(),
            forward_amount: 42_000,
            outgoing_cltv: 500,
        };

        let payload = Payload::from_legacy(&hop_data);
        assert_eq!(payload.fwd_info.next_hop, INTERMEDIATE);
        assert_eq!(payload.fwd_info.amount_to_forward, MilliSatoshi::from(42_000));
        assert_eq!(payload.fwd_info.outgoing_ctlv, 500);
        assert!(payload.mpp.is_none());
    }
}
