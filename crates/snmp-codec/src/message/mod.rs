//! The outer SNMP message envelope: version header, community string or
//! USM security parameters, and the carried PDU.

use crate::ber::{self, Reader, Writer};
use crate::pdu::AnyPdu;
use crate::{Error, Result};

pub const VERSION_V1: i64 = 0;
pub const VERSION_V2C: i64 = 1;
pub const VERSION_V3: i64 = 3;

/// `snmpv1`/`snmpv2c` message: `SEQUENCE { version, community, data }`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMessage {
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu: AnyPdu,
}

impl CommunityMessage {
    pub fn new(version: i64, community: Vec<u8>, pdu: AnyPdu) -> Self {
        Self {
            version,
            community,
            pdu,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let mut msg = reader.enter(ber::TAG_SEQUENCE)?;
        let version = msg.read_integer()?;
        let community = msg.read_octet_string()?;
        let pdu = AnyPdu::decode(&mut msg)?;
        Ok(CommunityMessage {
            version,
            community,
            pdu,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_sequence(ber::TAG_SEQUENCE, |w| {
            w.write_integer(self.version);
            w.write_octet_string(&self.community);
            self.pdu.encode(w);
        });
        writer.into_bytes()
    }
}

/// `msgGlobalData` (RFC 3412 §6.1).
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: u8,
    pub msg_security_model: i32,
}

pub const FLAG_AUTH: u8 = 0x01;
pub const FLAG_PRIV: u8 = 0x02;
pub const FLAG_REPORTABLE: u8 = 0x04;

pub const SECURITY_MODEL_USM: i32 = 3;
pub const SECURITY_MODEL_TSM: i32 = 4;

impl HeaderData {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let mut inner = reader.enter(ber::TAG_SEQUENCE)?;
        let msg_id = inner.read_integer()? as i32;
        let msg_max_size = inner.read_integer()? as i32;
        let flags = inner.read_octet_string()?;
        let msg_flags = *flags.first().ok_or(Error::InvalidLength)?;
        let msg_security_model = inner.read_integer()? as i32;
        Ok(HeaderData {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_sequence(ber::TAG_SEQUENCE, |w| {
            w.write_integer(self.msg_id as i64);
            w.write_integer(self.msg_max_size as i64);
            w.write_octet_string(&[self.msg_flags]);
            w.write_integer(self.msg_security_model as i64);
        });
    }
}

/// `scopedPDU` (RFC 3412 §6.1), carried either in the clear or, when
/// `msgFlags` has the privacy bit set, as the plaintext recovered from
/// `encryptedPDU`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPdu {
    pub context_engine_id: Vec<u8>,
    pub context_name: Vec<u8>,
    pub pdu: AnyPdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: Vec<u8>, context_name: Vec<u8>, pdu: AnyPdu) -> Self {
        Self {
            context_engine_id,
            context_name,
            pdu,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let mut inner = reader.enter(ber::TAG_SEQUENCE)?;
        let context_engine_id = inner.read_octet_string()?;
        let context_name = inner.read_octet_string()?;
        let pdu = AnyPdu::decode(&mut inner)?;
        Ok(ScopedPdu {
            context_engine_id,
            context_name,
            pdu,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_sequence(ber::TAG_SEQUENCE, |w| {
            w.write_octet_string(&self.context_engine_id);
            w.write_octet_string(&self.context_name);
            self.pdu.encode(w);
        });
        writer.into_bytes()
    }
}

/// `msgSecurityParameters` for the User Security Model (RFC 3414 §2.4),
/// kept as raw bytes plus structured accessors so the MPv3/USM split can
/// re-encode the authentication placeholder in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsmSecurityParameters {
    pub authoritative_engine_id: Vec<u8>,
    pub authoritative_engine_boots: i32,
    pub authoritative_engine_time: i32,
    pub user_name: Vec<u8>,
    pub auth_parameters: Vec<u8>,
    pub priv_parameters: Vec<u8>,
}

impl UsmSecurityParameters {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let mut inner = reader.enter(ber::TAG_SEQUENCE)?;
        Ok(UsmSecurityParameters {
            authoritative_engine_id: inner.read_octet_string()?,
            authoritative_engine_boots: inner.read_integer()? as i32,
            authoritative_engine_time: inner.read_integer()? as i32,
            user_name: inner.read_octet_string()?,
            auth_parameters: inner.read_octet_string()?,
            priv_parameters: inner.read_octet_string()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_sequence(ber::TAG_SEQUENCE, |w| {
            w.write_octet_string(&self.authoritative_engine_id);
            w.write_integer(self.authoritative_engine_boots as i64);
            w.write_integer(self.authoritative_engine_time as i64);
            w.write_octet_string(&self.user_name);
            w.write_octet_string(&self.auth_parameters);
            w.write_octet_string(&self.priv_parameters);
        });
        writer.into_bytes()
    }
}

/// A fully decoded `snmpv3` message (RFC 3412 §6.1) before security
/// processing: `msgSecurityParameters` and `scopedPDU`/`encryptedPDU`
/// remain as opaque octet strings for the security model to unwrap.
#[derive(Debug, Clone, PartialEq)]
pub struct V3Message {
    pub header: HeaderData,
    pub security_parameters: Vec<u8>,
    pub scoped_pdu_data: Vec<u8>,
    pub is_encrypted: bool,
}

impl V3Message {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let mut msg = reader.enter(ber::TAG_SEQUENCE)?;
        let version = msg.read_integer()?;
        if version != VERSION_V3 {
            return Err(Error::UnknownVersion(version));
        }
        let header = HeaderData::decode(&mut msg)?;
        let security_parameters = msg.read_octet_string()?;
        let is_encrypted = header.msg_flags & FLAG_PRIV != 0;
        let scoped_pdu_data = if is_encrypted {
            msg.read_octet_string()?
        } else {
            let (_, raw) = msg.read_any_tlv()?;
            let mut full = Vec::with_capacity(raw.len() + 4);
            full.push(ber::TAG_SEQUENCE);
            encode_rewrapped_length(&mut full, raw.len());
            full.extend_from_slice(raw);
            full
        };
        Ok(V3Message {
            header,
            security_parameters,
            scoped_pdu_data,
            is_encrypted,
        })
    }

    pub fn encode_with(
        header: &HeaderData,
        security_parameters: &[u8],
        scoped_pdu_plaintext_or_ciphertext: &[u8],
        encrypted: bool,
    ) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_sequence(ber::TAG_SEQUENCE, |w| {
            w.write_integer(VERSION_V3);
            header.encode(w);
            w.write_octet_string(security_parameters);
            if encrypted {
                w.write_octet_string(scoped_pdu_plaintext_or_ciphertext);
            } else {
                w.bytes_mut()
                    .extend_from_slice(scoped_pdu_plaintext_or_ciphertext);
            }
        });
        writer.into_bytes()
    }
}

fn encode_rewrapped_length(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
        return;
    }
    let be = len.to_be_bytes();
    let first_nonzero = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
    let octets = &be[first_nonzero..];
    buf.push(0x80 | octets.len() as u8);
    buf.extend_from_slice(octets);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::Oid;
    use crate::pdu::{Pdu, PduType, VarBind, Value};

    fn sample_pdu() -> AnyPdu {
        AnyPdu::Standard(Pdu::new(
            PduType::GetRequest,
            1,
            vec![VarBind::new(Oid::from([1, 3, 6, 1, 2, 1, 1, 1, 0]), Value::Null)],
        ))
    }

    #[test]
    fn round_trips_community_message() {
        let msg = CommunityMessage::new(VERSION_V2C, b"public".to_vec(), sample_pdu());
        let bytes = msg.encode();
        assert_eq!(CommunityMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn round_trips_scoped_pdu() {
        let scoped = ScopedPdu::new(b"engine-1".to_vec(), b"".to_vec(), sample_pdu());
        let bytes = scoped.encode();
        assert_eq!(ScopedPdu::decode(&bytes).unwrap(), scoped);
    }

    #[test]
    fn round_trips_usm_security_parameters() {
        let params = UsmSecurityParameters {
            authoritative_engine_id: b"engine-1".to_vec(),
            authoritative_engine_boots: 7,
            authoritative_engine_time: 1234,
            user_name: b"admin".to_vec(),
            auth_parameters: vec![0; 12],
            priv_parameters: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let bytes = params.encode();
        assert_eq!(UsmSecurityParameters::decode(&bytes).unwrap(), params);
    }

    #[test]
    fn round_trips_v3_plaintext_message() {
        let header = HeaderData {
            msg_id: 99,
            msg_max_size: 65507,
            msg_flags: FLAG_REPORTABLE,
            msg_security_model: SECURITY_MODEL_USM,
        };
        let scoped = ScopedPdu::new(b"engine-1".to_vec(), b"".to_vec(), sample_pdu());
        let scoped_bytes = scoped.encode();
        let params = UsmSecurityParameters::default().encode();
        let bytes = V3Message::encode_with(&header, &params, &scoped_bytes, false);
        let decoded = V3Message::decode(&bytes).unwrap();
        assert_eq!(decoded.header, header);
        assert!(!decoded.is_encrypted);
        assert_eq!(ScopedPdu::decode(&decoded.scoped_pdu_data).unwrap(), scoped);
    }

    #[test]
    fn round_trips_v3_encrypted_message() {
        let header = HeaderData {
            msg_id: 5,
            msg_max_size: 1500,
            msg_flags: FLAG_AUTH | FLAG_PRIV,
            msg_security_model: SECURITY_MODEL_USM,
        };
        let ciphertext = vec![0xAA; 32];
        let params = UsmSecurityParameters::default().encode();
        let bytes = V3Message::encode_with(&header, &params, &ciphertext, true);
        let decoded = V3Message::decode(&bytes).unwrap();
        assert!(decoded.is_encrypted);
        assert_eq!(decoded.scoped_pdu_data, ciphertext);
    }
}
