//! MPv1 (RFC 3584 §3, originally RFC 1157): community-based, no security
//! parameters beyond the community string itself.

use crate::message::{CommunityMessage, VERSION_V1};
use crate::pdu::AnyPdu;
use crate::Result;

use super::DecodedMessage;

pub fn decode(bytes: &[u8]) -> Result<DecodedMessage> {
    let msg = CommunityMessage::decode(bytes)?;
    Ok(DecodedMessage {
        pdu: msg.pdu,
        security_name: msg.community,
        context_engine_id: Vec::new(),
        context_name: Vec::new(),
        v3_engine_state: None,
    })
}

pub fn encode(community: &[u8], pdu: AnyPdu) -> Vec<u8> {
    CommunityMessage::new(VERSION_V1, community.to_vec(), pdu).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::Oid;
    use crate::pdu::{Pdu, PduType, VarBind, Value};

    #[test]
    fn round_trips_through_decode() {
        let pdu = AnyPdu::Standard(Pdu::new(
            PduType::GetRequest,
            1,
            vec![VarBind::new(Oid::from([1, 3, 6, 1, 2, 1, 1, 1, 0]), Value::Null)],
        ));
        let bytes = encode(b"public", pdu.clone());
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.security_name, b"public");
        assert_eq!(decoded.pdu, pdu);
    }
}
