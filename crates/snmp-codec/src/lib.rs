//! ## Wire codec and message processing models for SNMPv1/v2c/v3
//!
//! This crate owns the part of an SNMP engine that is independent of any
//! particular transport: the ASN.1/BER encoding of PDUs and whole messages,
//! the per-version "message processing model" that binds a wire format to a
//! security model, and the User Security Model (RFC 3414) key localization
//! and authentication/privacy primitives.
//!
//! [RFC3412]: https://www.rfc-editor.org/rfc/rfc3412
//! [RFC3414]: https://www.rfc-editor.org/rfc/rfc3414
//! [RFC5343]: https://www.rfc-editor.org/rfc/rfc5343

pub mod ber;
pub mod message;
pub mod mp;
pub mod oid;
pub mod pdu;
pub mod report;
pub mod security;

use std::{array::TryFromSliceError, str::Utf8Error};

#[derive(Debug)]
pub enum Error {
    Truncated,
    InvalidTag { expected: u8, found: u8 },
    InvalidLength,
    InvalidInteger,
    UnknownVersion(i64),
    UnknownPduType(u8),
    UnsupportedSecurityModel(i32),
    UnsupportedAlgorithm,
    AuthenticationFailed,
    MessageTooLarge,
    Utf8Error(Utf8Error),
    TryFromSliceError(TryFromSliceError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
