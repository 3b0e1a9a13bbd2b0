//! Message Processing Models: the per-version bridge between the wire
//! format and a security model, invoked by the dispatcher's outbound
//! `prepare_outgoing_message` / inbound `prepare_data_elements` calls
//! (RFC 3412 §7.1/§7.2).

pub mod v1;
pub mod v2c;
pub mod v3;

use crate::message::VERSION_V3;
use crate::pdu::AnyPdu;
use crate::{Error, Result};

/// The decoded, security-unwrapped view of an inbound message that the
/// dispatcher needs regardless of which model produced it.
pub struct DecodedMessage {
    pub pdu: AnyPdu,
    pub security_name: Vec<u8>,
    pub context_engine_id: Vec<u8>,
    pub context_name: Vec<u8>,
    /// Present only for v3 messages; used to correlate Report-PDUs and to
    /// discover the authoritative engine's boot/time state.
    pub v3_engine_state: Option<V3EngineState>,
}

#[derive(Debug, Clone, Copy)]
pub struct V3EngineState {
    pub msg_id: i32,
    pub security_model: i32,
    pub authoritative_engine_boots: i32,
    pub authoritative_engine_time: i32,
}

/// Picks the version-specific decoder. `local_engine_id` is needed only
/// by MPv3 to recognize messages addressed to us and to drive engine-ID
/// discovery; v1/v2c ignore it.
pub fn decode_message(bytes: &[u8], usm: &v3::UsmContext) -> Result<DecodedMessage> {
    let version = peek_version(bytes)?;
    match version {
        crate::message::VERSION_V1 => v1::decode(bytes),
        crate::message::VERSION_V2C => v2c::decode(bytes),
        VERSION_V3 => v3::decode(bytes, usm),
        other => Err(Error::UnknownVersion(other)),
    }
}

fn peek_version(bytes: &[u8]) -> Result<i64> {
    let mut reader = crate::ber::Reader::new(bytes);
    let mut seq = reader.enter(crate::ber::TAG_SEQUENCE)?;
    seq.read_integer()
}

/// Returns how many leading bytes of `bytes` make up one complete SNMP
/// message, for framing on a byte stream (RFC 3430 §2: one ASN.1 SEQUENCE
/// per TCP segment, no length prefix).
pub fn message_len(bytes: &[u8]) -> Result<usize> {
    crate::ber::peek_total_length(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peeks_version_without_consuming_caller_copy() {
        let msg = crate::message::CommunityMessage::new(
            crate::message::VERSION_V2C,
            b"public".to_vec(),
            AnyPdu::Standard(crate::pdu::Pdu::new(crate::pdu::PduType::GetRequest, 1, vec![])),
        );
        let bytes = msg.encode();
        assert_eq!(peek_version(&bytes).unwrap(), crate::message::VERSION_V2C);
    }
}
