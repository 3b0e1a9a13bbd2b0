//! MPv3 (RFC 3412 §6, RFC 3414 USM): the only model that carries its own
//! security parameters and can authenticate/encrypt the payload.

use std::collections::HashMap;

use crate::message::{
    HeaderData, ScopedPdu, UsmSecurityParameters, V3Message, FLAG_AUTH, FLAG_PRIV,
    FLAG_REPORTABLE, SECURITY_MODEL_USM,
};
use crate::pdu::AnyPdu;
use crate::security::usm::{self, LocalizedKey};
use crate::security::{AuthProtocol, PrivProtocol};
use crate::{Error, Result};

use super::{DecodedMessage, V3EngineState};

#[derive(Clone)]
pub struct UsmUser {
    pub user_name: Vec<u8>,
    pub auth_protocol: AuthProtocol,
    pub auth_password: Vec<u8>,
    pub priv_protocol: PrivProtocol,
    pub priv_password: Vec<u8>,
}

impl UsmUser {
    pub fn no_auth_no_priv(user_name: impl Into<Vec<u8>>) -> Self {
        Self {
            user_name: user_name.into(),
            auth_protocol: AuthProtocol::None,
            auth_password: Vec::new(),
            priv_protocol: PrivProtocol::None,
            priv_password: Vec::new(),
        }
    }

    pub fn security_level(&self) -> u8 {
        let mut flags = 0;
        if self.auth_protocol != AuthProtocol::None {
            flags |= FLAG_AUTH;
        }
        if self.priv_protocol != PrivProtocol::None {
            flags |= FLAG_PRIV;
        }
        flags
    }
}

/// Table of locally configured users plus the local engine's own ID,
/// shared between encode and decode so a single context round-trips
/// messages addressed to itself (used by tests and loopback targets).
#[derive(Default)]
pub struct UsmContext {
    pub local_engine_id: Vec<u8>,
    users: HashMap<Vec<u8>, UsmUser>,
}

impl UsmContext {
    pub fn new(local_engine_id: Vec<u8>) -> Self {
        Self {
            local_engine_id,
            users: HashMap::new(),
        }
    }

    pub fn add_user(&mut self, user: UsmUser) {
        self.users.insert(user.user_name.clone(), user);
    }

    pub fn user(&self, name: &[u8]) -> Option<&UsmUser> {
        self.users.get(name)
    }
}

pub struct OutgoingV3 {
    pub msg_id: i32,
    pub user_name: Vec<u8>,
    pub authoritative_engine_id: Vec<u8>,
    pub authoritative_engine_boots: i32,
    pub authoritative_engine_time: i32,
    pub context_engine_id: Vec<u8>,
    pub context_name: Vec<u8>,
    pub reportable: bool,
    pub msg_max_size: i32,
}

pub fn encode(outgoing: &OutgoingV3, user: &UsmUser, pdu: AnyPdu) -> Result<Vec<u8>> {
    let scoped = ScopedPdu::new(
        outgoing.context_engine_id.clone(),
        outgoing.context_name.clone(),
        pdu,
    );
    let plaintext = scoped.encode();

    let mut flags = user.security_level();
    if outgoing.reportable {
        flags |= FLAG_REPORTABLE;
    }
    let header = HeaderData {
        msg_id: outgoing.msg_id,
        msg_max_size: outgoing.msg_max_size,
        msg_flags: flags,
        msg_security_model: SECURITY_MODEL_USM,
    };

    let (scoped_pdu_data, priv_parameters, encrypted) = if user.priv_protocol != PrivProtocol::None {
        let key = usm::localize_priv_key(
            user.priv_protocol,
            user.auth_protocol,
            &user.priv_password,
            &outgoing.authoritative_engine_id,
        )?;
        let salt = derive_salt(outgoing.msg_id);
        let (ciphertext, params) = usm::encrypt_aes128_cfb(
            &key,
            outgoing.authoritative_engine_boots as u32,
            outgoing.authoritative_engine_time as u32,
            salt,
            &plaintext,
        )?;
        (ciphertext, params.to_vec(), true)
    } else {
        (plaintext, Vec::new(), false)
    };

    let mut params = UsmSecurityParameters {
        authoritative_engine_id: outgoing.authoritative_engine_id.clone(),
        authoritative_engine_boots: outgoing.authoritative_engine_boots,
        authoritative_engine_time: outgoing.authoritative_engine_time,
        user_name: outgoing.user_name.clone(),
        auth_parameters: if user.auth_protocol != AuthProtocol::None {
            vec![0u8; 12]
        } else {
            Vec::new()
        },
        priv_parameters,
    };

    let unsigned = V3Message::encode_with(&header, &params.encode(), &scoped_pdu_data, encrypted);

    if user.auth_protocol == AuthProtocol::None {
        return Ok(unsigned);
    }

    let key = usm::localize_auth_key(
        user.auth_protocol,
        &user.auth_password,
        &outgoing.authoritative_engine_id,
    )?;
    let mac = usm::sign(user.auth_protocol, &key, &unsigned)?;
    params.auth_parameters = mac.to_vec();
    Ok(V3Message::encode_with(
        &header,
        &params.encode(),
        &scoped_pdu_data,
        encrypted,
    ))
}

fn derive_salt(msg_id: i32) -> u64 {
    use rand::RngCore;
    let mut seed = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut seed);
    u64::from_be_bytes(seed) ^ (msg_id as u64)
}

pub fn decode(bytes: &[u8], ctx: &UsmContext) -> Result<DecodedMessage> {
    let message = V3Message::decode(bytes)?;
    let params = UsmSecurityParameters::decode(&message.security_parameters)?;

    let user = ctx
        .user(&params.user_name)
        .ok_or(Error::AuthenticationFailed)?;

    if message.header.msg_flags & FLAG_AUTH != 0 {
        if user.auth_protocol == AuthProtocol::None {
            return Err(Error::AuthenticationFailed);
        }
        let key = usm::localize_auth_key(
            user.auth_protocol,
            &user.auth_password,
            &params.authoritative_engine_id,
        )?;
        let mut zeroed = params.clone();
        zeroed.auth_parameters = vec![0u8; params.auth_parameters.len()];
        let reconstructed = V3Message::encode_with(
            &message.header,
            &zeroed.encode(),
            &message.scoped_pdu_data,
            message.is_encrypted,
        );
        usm::verify(
            user.auth_protocol,
            &key,
            &reconstructed,
            &params.auth_parameters,
        )?;
    }

    let scoped_bytes = if message.is_encrypted {
        if user.priv_protocol == PrivProtocol::None {
            return Err(Error::AuthenticationFailed);
        }
        let key = usm::localize_priv_key(
            user.priv_protocol,
            user.auth_protocol,
            &user.priv_password,
            &params.authoritative_engine_id,
        )?;
        usm::decrypt_aes128_cfb(
            &key,
            params.authoritative_engine_boots as u32,
            params.authoritative_engine_time as u32,
            &params.priv_parameters,
            &message.scoped_pdu_data,
        )?
    } else {
        message.scoped_pdu_data.clone()
    };

    let scoped = ScopedPdu::decode(&scoped_bytes)?;

    Ok(DecodedMessage {
        pdu: scoped.pdu,
        security_name: params.user_name.clone(),
        context_engine_id: scoped.context_engine_id,
        context_name: scoped.context_name,
        v3_engine_state: Some(V3EngineState {
            msg_id: message.header.msg_id,
            security_model: message.header.msg_security_model,
            authoritative_engine_boots: params.authoritative_engine_boots,
            authoritative_engine_time: params.authoritative_engine_time,
        }),
    })
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
    fn round_trips_no_auth_no_priv() {
        let mut ctx = UsmContext::new(b"engine-1".to_vec());
        ctx.add_user(UsmUser::no_auth_no_priv(b"initial".to_vec()));

        let outgoing = OutgoingV3 {
            msg_id: 1,
            user_name: b"initial".to_vec(),
            authoritative_engine_id: b"engine-1".to_vec(),
            authoritative_engine_boots: 0,
            authoritative_engine_time: 0,
            context_engine_id: b"engine-1".to_vec(),
            context_name: Vec::new(),
            reportable: true,
            msg_max_size: 65507,
        };
        let user = ctx.user(b"initial").unwrap().clone();
        let bytes = encode(&outgoing, &user, sample_pdu()).unwrap();
        let decoded = decode(&bytes, &ctx).unwrap();
        assert_eq!(decoded.pdu, sample_pdu());
        assert_eq!(decoded.security_name, b"initial");
    }

    #[test]
    fn round_trips_auth_only() {
        let mut ctx = UsmContext::new(b"engine-1".to_vec());
        let user = UsmUser {
            user_name: b"admin".to_vec(),
            auth_protocol: AuthProtocol::HmacSha1,
            auth_password: b"maplesyrup".to_vec(),
            priv_protocol: PrivProtocol::None,
            priv_password: Vec::new(),
        };
        ctx.add_user(user.clone());

        let outgoing = OutgoingV3 {
            msg_id: 7,
            user_name: b"admin".to_vec(),
            authoritative_engine_id: b"engine-1".to_vec(),
            authoritative_engine_boots: 3,
            authoritative_engine_time: 100,
            context_engine_id: b"engine-1".to_vec(),
            context_name: Vec::new(),
            reportable: true,
            msg_max_size: 1500,
        };
        let bytes = encode(&outgoing, &user, sample_pdu()).unwrap();
        let decoded = decode(&bytes, &ctx).unwrap();
        assert_eq!(decoded.pdu, sample_pdu());
        let state = decoded.v3_engine_state.unwrap();
        assert_eq!(state.authoritative_engine_boots, 3);
    }

    #[test]
    fn round_trips_auth_and_priv() {
        let mut ctx = UsmContext::new(b"engine-1".to_vec());
        let user = UsmUser {
            user_name: b"admin".to_vec(),
            auth_protocol: AuthProtocol::HmacMd5,
            auth_password: b"maplesyrup".to_vec(),
            priv_protocol: PrivProtocol::Aes128,
            priv_password: b"maplesyrup".to_vec(),
        };
        ctx.add_user(user.clone());

        let outgoing = OutgoingV3 {
            msg_id: 42,
            user_name: b"admin".to_vec(),
            authoritative_engine_id: b"engine-1".to_vec(),
            authoritative_engine_boots: 1,
            authoritative_engine_time: 50,
            context_engine_id: b"engine-1".to_vec(),
            context_name: Vec::new(),
            reportable: false,
            msg_max_size: 1500,
        };
        let bytes = encode(&outgoing, &user, sample_pdu()).unwrap();
        let decoded = decode(&bytes, &ctx).unwrap();
        assert_eq!(decoded.pdu, sample_pdu());
    }

    #[test]
    fn rejects_unknown_user() {
        let ctx = UsmContext::new(b"engine-1".to_vec());
        let user = UsmUser::no_auth_no_priv(b"ghost".to_vec());
        let outgoing = OutgoingV3 {
            msg_id: 1,
            user_name: b"ghost".to_vec(),
            authoritative_engine_id: b"engine-1".to_vec(),
            authoritative_engine_boots: 0,
            authoritative_engine_time: 0,
            context_engine_id: b"engine-1".to_vec(),
            context_name: Vec::new(),
            reportable: true,
            msg_max_size: 1500,
        };
        let bytes = encode(&outgoing, &user, sample_pdu()).unwrap();
        assert!(matches!(decode(&bytes, &ctx), Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn rejects_tampered_auth() {
        let mut ctx = UsmContext::new(b"engine-1".to_vec());
        let user = UsmUser {
            user_name: b"admin".to_vec(),
            auth_protocol: AuthProtocol::HmacSha1,
            auth_password: b"maplesyrup".to_vec(),
            priv_protocol: PrivProtocol::None,
            priv_password: Vec::new(),
        };
        ctx.add_user(user.clone());
        let outgoing = OutgoingV3 {
            msg_id: 1,
            user_name: b"admin".to_vec(),
            authoritative_engine_id: b"engine-1".to_vec(),
            authoritative_engine_boots: 0,
            authoritative_engine_time: 0,
            context_engine_id: b"engine-1".to_vec(),
            context_name: Vec::new(),
            reportable: true,
            msg_max_size: 1500,
        };
        let mut bytes = encode(&outgoing, &user, sample_pdu()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(decode(&bytes, &ctx).is_err());
    }
}
