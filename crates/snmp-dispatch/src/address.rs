//! Transport address classification (§3 "Transport Address",
//! "Transport Mapping").

use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressClass {
    Udp,
    Tcp,
    Tls,
    Dtls,
}

impl AddressClass {
    /// Walks from the most specific class to the most generic one a
    /// registry lookup should fall back through: a TLS-only caller can
    /// still be served by a plain TCP mapping registered for the same
    /// peer, and likewise DTLS falls back to UDP.
    pub fn fallback_chain(self) -> &'static [AddressClass] {
        match self {
            AddressClass::Tls => &[AddressClass::Tls, AddressClass::Tcp],
            AddressClass::Dtls => &[AddressClass::Dtls, AddressClass::Udp],
            AddressClass::Tcp => &[AddressClass::Tcp],
            AddressClass::Udp => &[AddressClass::Udp],
        }
    }

    pub fn is_connection_oriented(self) -> bool {
        matches!(self, AddressClass::Tcp | AddressClass::Tls)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportAddress {
    pub class: AddressClass,
    pub peer: SocketAddr,
}

impl TransportAddress {
    pub fn new(class: AddressClass, peer: SocketAddr) -> Self {
        Self { class, peer }
    }
}
