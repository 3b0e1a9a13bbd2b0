//! MPv2c (RFC 3584 §3): identical envelope to MPv1, different version
//! number, kept as its own module because the dispatcher's security-model
//! lookup key includes the message processing model.

use crate::message::{CommunityMessage, VERSION_V2C};
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
    CommunityMessage::new(VERSION_V2C, community.to_vec(), pdu).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::Oid;
    use crate::pdu::{Pdu, PduType, VarBind, Value};

    #[test]
    fn round_trips_through_decode() {
        let pdu = AnyPdu::Standard(Pdu::new(
            PduType::GetBulkRequest,
            9,
            vec![VarBind::new(Oid::from([1, 3, 6, 1, 2, 1, 2, 2]), Value::Null)],
        ));
        let bytes = encode(b"public", pdu.clone());
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.pdu, pdu);
    }
}
