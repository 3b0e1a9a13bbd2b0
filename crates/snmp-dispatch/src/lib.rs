//! ## Message dispatcher, transport registry, and pending-request engine
//!
//! This crate is the connective tissue between the wire codec
//! ([`codec`]) and a concrete set of transports: it picks a message
//! processing model by SNMP version, picks a transport by destination
//! address class, and runs the retry/timeout state machine for confirmed
//! requests.

pub mod address;
pub mod dispatcher;
pub mod handle;
pub mod pending;
pub mod registry;
pub mod session;
pub mod target;
pub mod transport;

#[derive(Debug)]
pub enum Error {
    Codec(codec::Error),
    NoTransport,
    NoSuchUser,
    UnknownHandle,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<codec::Error> for Error {
    fn from(value: codec::Error) -> Self {
        Self::Codec(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
