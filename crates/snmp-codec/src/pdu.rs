//! SNMP PDU grammar, shared by all three message processing models.

use crate::ber::{self, Reader, Writer};
use crate::oid::Oid;
use crate::{Error, Result};

/// PDU type tags, reused verbatim as the BER context tag for the PDU
/// sequence (e.g. `0xA0` for GetRequest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    Trap,
    GetBulkRequest,
    InformRequest,
    SnmpV2Trap,
    Report,
}

impl PduType {
    pub fn tag(self) -> u8 {
        match self {
            PduType::GetRequest => 0xA0,
            PduType::GetNextRequest => 0xA1,
            PduType::Response => 0xA2,
            PduType::SetRequest => 0xA3,
            PduType::Trap => 0xA4,
            PduType::GetBulkRequest => 0xA5,
            PduType::InformRequest => 0xA6,
            PduType::SnmpV2Trap => 0xA7,
            PduType::Report => 0xA8,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0xA0 => PduType::GetRequest,
            0xA1 => PduType::GetNextRequest,
            0xA2 => PduType::Response,
            0xA3 => PduType::SetRequest,
            0xA4 => PduType::Trap,
            0xA5 => PduType::GetBulkRequest,
            0xA6 => PduType::InformRequest,
            0xA7 => PduType::SnmpV2Trap,
            0xA8 => PduType::Report,
            other => return Err(Error::UnknownPduType(other)),
        })
    }

    pub fn is_confirmed(self) -> bool {
        matches!(
            self,
            PduType::GetRequest
                | PduType::GetNextRequest
                | PduType::SetRequest
                | PduType::GetBulkRequest
                | PduType::InformRequest
        )
    }
}

/// RFC 3416 error-status codes; only the ones the dispatcher inspects by
/// name are broken out, the rest round-trip as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    Other(i64),
}

impl ErrorStatus {
    pub fn code(self) -> i64 {
        match self {
            ErrorStatus::NoError => 0,
            ErrorStatus::TooBig => 1,
            ErrorStatus::NoSuchName => 2,
            ErrorStatus::BadValue => 3,
            ErrorStatus::ReadOnly => 4,
            ErrorStatus::GenErr => 5,
            ErrorStatus::NoAccess => 6,
            ErrorStatus::WrongType => 7,
            ErrorStatus::WrongLength => 8,
            ErrorStatus::WrongEncoding => 9,
            ErrorStatus::WrongValue => 10,
            ErrorStatus::NoCreation => 11,
            ErrorStatus::InconsistentValue => 12,
            ErrorStatus::ResourceUnavailable => 13,
            ErrorStatus::CommitFailed => 14,
            ErrorStatus::UndoFailed => 15,
            ErrorStatus::AuthorizationError => 16,
            ErrorStatus::NotWritable => 17,
            ErrorStatus::InconsistentName => 18,
            ErrorStatus::Other(code) => code,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::TooBig,
            2 => ErrorStatus::NoSuchName,
            3 => ErrorStatus::BadValue,
            4 => ErrorStatus::ReadOnly,
            5 => ErrorStatus::GenErr,
            6 => ErrorStatus::NoAccess,
            7 => ErrorStatus::WrongType,
            8 => ErrorStatus::WrongLength,
            9 => ErrorStatus::WrongEncoding,
            10 => ErrorStatus::WrongValue,
            11 => ErrorStatus::NoCreation,
            12 => ErrorStatus::InconsistentValue,
            13 => ErrorStatus::ResourceUnavailable,
            14 => ErrorStatus::CommitFailed,
            15 => ErrorStatus::UndoFailed,
            16 => ErrorStatus::AuthorizationError,
            17 => ErrorStatus::NotWritable,
            18 => ErrorStatus::InconsistentName,
            other => ErrorStatus::Other(other),
        }
    }

    pub fn is_success(self) -> bool {
        self.code() == 0
    }
}

/// An SNMP variable value. `NoSuchObject`/`NoSuchInstance`/`EndOfMibView`
/// are the v2c/v3 exception values that can appear in a varbind's value
/// position instead of a real type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    Oid(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let tag = reader.peek_tag()?;
        Ok(match tag {
            ber::TAG_INTEGER => Value::Integer(reader.read_integer()?),
            ber::TAG_OCTET_STRING => Value::OctetString(reader.read_octet_string()?),
            ber::TAG_NULL => {
                reader.read_null()?;
                Value::Null
            }
            ber::TAG_OID => Value::Oid(reader.read_oid()?),
            ber::TAG_IP_ADDRESS => {
                let bytes = reader.read_tlv(ber::TAG_IP_ADDRESS)?;
                Value::IpAddress(bytes.try_into()?)
            }
            ber::TAG_COUNTER32 => Value::Counter32(reader.read_u32(ber::TAG_COUNTER32)?),
            ber::TAG_GAUGE32 => Value::Gauge32(reader.read_u32(ber::TAG_GAUGE32)?),
            ber::TAG_TIME_TICKS => Value::TimeTicks(reader.read_u32(ber::TAG_TIME_TICKS)?),
            ber::TAG_OPAQUE => Value::Opaque(reader.read_tlv(ber::TAG_OPAQUE)?.to_vec()),
            ber::TAG_COUNTER64 => Value::Counter64(reader.read_u64(ber::TAG_COUNTER64)?),
            ber::TAG_NO_SUCH_OBJECT => {
                reader.read_tlv(ber::TAG_NO_SUCH_OBJECT)?;
                Value::NoSuchObject
            }
            ber::TAG_NO_SUCH_INSTANCE => {
                reader.read_tlv(ber::TAG_NO_SUCH_INSTANCE)?;
                Value::NoSuchInstance
            }
            ber::TAG_END_OF_MIB_VIEW => {
                reader.read_tlv(ber::TAG_END_OF_MIB_VIEW)?;
                Value::EndOfMibView
            }
            other => {
                return Err(Error::InvalidTag {
                    expected: ber::TAG_NULL,
                    found: other,
                })
            }
        })
    }

    fn encode(&self, writer: &mut Writer) {
        match self {
            Value::Integer(v) => writer.write_integer(*v),
            Value::OctetString(v) => writer.write_octet_string(v),
            Value::Null => writer.write_null(),
            Value::Oid(v) => writer.write_oid(v),
            Value::IpAddress(v) => writer.write_tlv(ber::TAG_IP_ADDRESS, v),
            Value::Counter32(v) => writer.write_unsigned(ber::TAG_COUNTER32, *v as u64),
            Value::Gauge32(v) => writer.write_unsigned(ber::TAG_GAUGE32, *v as u64),
            Value::TimeTicks(v) => writer.write_unsigned(ber::TAG_TIME_TICKS, *v as u64),
            Value::Opaque(v) => writer.write_tlv(ber::TAG_OPAQUE, v),
            Value::Counter64(v) => writer.write_unsigned(ber::TAG_COUNTER64, *v),
            Value::NoSuchObject => writer.write_tlv(ber::TAG_NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => writer.write_tlv(ber::TAG_NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => writer.write_tlv(ber::TAG_END_OF_MIB_VIEW, &[]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let mut inner = reader.enter(ber::TAG_SEQUENCE)?;
        let oid = inner.read_oid()?;
        let value = Value::decode(&mut inner)?;
        Ok(VarBind { oid, value })
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_sequence(ber::TAG_SEQUENCE, |w| {
            w.write_oid(&self.oid);
            self.value.encode(w);
        });
    }
}

fn decode_varbind_list(reader: &mut Reader<'_>) -> Result<Vec<VarBind>> {
    let mut inner = reader.enter(ber::TAG_SEQUENCE)?;
    let mut out = Vec::new();
    while !inner.is_empty() {
        out.push(VarBind::decode(&mut inner)?);
    }
    Ok(out)
}

fn encode_varbind_list(writer: &mut Writer, binds: &[VarBind]) {
    writer.write_sequence(ber::TAG_SEQUENCE, |w| {
        for bind in binds {
            bind.encode(w);
        }
    });
}

/// The "standard" PDU body shared by every PDU type except GetBulkRequest,
/// which overloads error-status/error-index as non-repeaters/max-repetitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub ty: PduType,
    pub request_id: i32,
    pub error_status: ErrorStatus,
    pub error_index: i32,
    pub var_binds: Vec<VarBind>,
}

impl Pdu {
    pub fn new(ty: PduType, request_id: i32, var_binds: Vec<VarBind>) -> Self {
        Self {
            ty,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            var_binds,
        }
    }

    pub fn get_bulk(request_id: i32, non_repeaters: i32, max_repetitions: i32, var_binds: Vec<VarBind>) -> Self {
        Self {
            ty: PduType::GetBulkRequest,
            request_id,
            error_status: ErrorStatus::from_code(non_repeaters as i64),
            error_index: max_repetitions,
            var_binds,
        }
    }

    pub fn non_repeaters(&self) -> i32 {
        self.error_status.code() as i32
    }

    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let (tag, content) = reader.read_any_tlv()?;
        let ty = PduType::from_tag(tag)?;
        let mut inner = Reader::new(content);
        let request_id = inner.read_integer()? as i32;
        let error_status = ErrorStatus::from_code(inner.read_integer()?);
        let error_index = inner.read_integer()? as i32;
        let var_binds = decode_varbind_list(&mut inner)?;
        Ok(Pdu {
            ty,
            request_id,
            error_status,
            error_index,
            var_binds,
        })
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_sequence(self.ty.tag(), |w| {
            w.write_integer(self.request_id as i64);
            w.write_integer(self.error_status.code());
            w.write_integer(self.error_index as i64);
            encode_varbind_list(w, &self.var_binds);
        });
    }
}

/// The SNMPv1 Trap-PDU, which diverges from the standard PDU grammar
/// (RFC 1157 §4.1.6) and is kept as a distinct variant rather than forced
/// into the shared `Pdu` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct V1TrapPdu {
    pub enterprise: Oid,
    pub agent_addr: [u8; 4],
    pub generic_trap: i32,
    pub specific_trap: i32,
    pub time_stamp: u32,
    pub var_binds: Vec<VarBind>,
}

impl V1TrapPdu {
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let mut inner = reader.enter(PduType::Trap.tag())?;
        let enterprise = inner.read_oid()?;
        let agent_addr = inner.read_tlv(ber::TAG_IP_ADDRESS)?.try_into()?;
        let generic_trap = inner.read_integer()? as i32;
        let specific_trap = inner.read_integer()? as i32;
        let time_stamp = inner.read_u32(ber::TAG_TIME_TICKS)?;
        let var_binds = decode_varbind_list(&mut inner)?;
        Ok(V1TrapPdu {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            var_binds,
        })
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_sequence(PduType::Trap.tag(), |w| {
            w.write_oid(&self.enterprise);
            w.write_tlv(ber::TAG_IP_ADDRESS, &self.agent_addr);
            w.write_integer(self.generic_trap as i64);
            w.write_integer(self.specific_trap as i64);
            w.write_unsigned(ber::TAG_TIME_TICKS, self.time_stamp as u64);
            encode_varbind_list(w, &self.var_binds);
        });
    }
}

/// Either PDU shape that can appear at the top level of a decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyPdu {
    Standard(Pdu),
    V1Trap(V1TrapPdu),
}

impl AnyPdu {
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        if reader.peek_tag()? == PduType::Trap.tag() {
            return Ok(AnyPdu::V1Trap(V1TrapPdu::decode(reader)?));
        }
        Ok(AnyPdu::Standard(Pdu::decode(reader)?))
    }

    pub fn encode(&self, writer: &mut Writer) {
        match self {
            AnyPdu::Standard(pdu) => pdu.encode(writer),
            AnyPdu::V1Trap(trap) => trap.encode(writer),
        }
    }

    pub fn request_id(&self) -> Option<i32> {
        match self {
            AnyPdu::Standard(pdu) => Some(pdu.request_id),
            AnyPdu::V1Trap(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_varbinds() -> Vec<VarBind> {
        vec![VarBind::new(
            Oid::from([1, 3, 6, 1, 2, 1, 1, 1, 0]),
            Value::OctetString(b"test".to_vec()),
        )]
    }

    #[test]
    fn round_trips_get_request() {
        let pdu = Pdu::new(PduType::GetRequest, 42, sample_varbinds());
        let mut w = Writer::new();
        pdu.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = Pdu::decode(&mut r).unwrap();
        assert_eq!(decoded, pdu);
    }

    #[test]
    fn round_trips_get_bulk_overloaded_fields() {
        let pdu = Pdu::get_bulk(7, 1, 10, sample_varbinds());
        let mut w = Writer::new();
        pdu.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = Pdu::decode(&mut r).unwrap();
        assert_eq!(decoded.non_repeaters(), 1);
        assert_eq!(decoded.max_repetitions(), 10);
    }

    #[test]
    fn round_trips_v1_trap() {
        let trap = V1TrapPdu {
            enterprise: Oid::from([1, 3, 6, 1, 4, 1, 8072]),
            agent_addr: [10, 0, 0, 1],
            generic_trap: 6,
            specific_trap: 1,
            time_stamp: 12345,
            var_binds: sample_varbinds(),
        };
        let mut w = Writer::new();
        trap.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(V1TrapPdu::decode(&mut r).unwrap(), trap);
    }

    #[test]
    fn decodes_exception_values() {
        let mut w = Writer::new();
        w.write_tlv(ber::TAG_NO_SUCH_INSTANCE, &[]);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(Value::decode(&mut r).unwrap(), Value::NoSuchInstance);
    }
}
