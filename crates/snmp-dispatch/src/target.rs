//! Target/UserTarget/DirectUserTarget (§3): everything the dispatcher
//! needs to address, secure, and retry a request, independent of the PDU
//! content itself.

use std::net::SocketAddr;
use std::time::Duration;

use crate::address::AddressClass;

#[derive(Debug, Clone)]
pub enum SecurityParams {
    Community(Vec<u8>),
    Usm {
        user_name: Vec<u8>,
        authoritative_engine_id: Vec<u8>,
        authoritative_engine_boots: i32,
        authoritative_engine_time: i32,
        context_engine_id: Vec<u8>,
        context_name: Vec<u8>,
    },
}

/// A fully resolved destination for a request: address, SNMP version,
/// security parameters, and the retry policy.
#[derive(Debug, Clone)]
pub struct Target {
    pub class: AddressClass,
    pub peer: SocketAddr,
    pub version: i64,
    pub security: SecurityParams,
    pub timeout: Duration,
    pub retries: u32,
}

impl Target {
    pub fn community_v2c(class: AddressClass, peer: SocketAddr, community: impl Into<Vec<u8>>) -> Self {
        Self {
            class,
            peer,
            version: codec::message::VERSION_V2C,
            security: SecurityParams::Community(community.into()),
            timeout: Duration::from_millis(1500),
            retries: 3,
        }
    }

    pub fn community_v1(class: AddressClass, peer: SocketAddr, community: impl Into<Vec<u8>>) -> Self {
        Self {
            class,
            peer,
            version: codec::message::VERSION_V1,
            security: SecurityParams::Community(community.into()),
            timeout: Duration::from_millis(1500),
            retries: 3,
        }
    }

    /// A v3/USM target whose authoritative engine ID is not yet known;
    /// the dispatcher discovers it (and the current engine boots/time) via
    /// an unauthenticated discovery exchange before the real request is
    /// signed and sent (RFC 3414 §4).
    pub fn usm_v3(class: AddressClass, peer: SocketAddr, user_name: impl Into<Vec<u8>>) -> Self {
        Self {
            class,
            peer,
            version: codec::message::VERSION_V3,
            security: SecurityParams::Usm {
                user_name: user_name.into(),
                authoritative_engine_id: Vec::new(),
                authoritative_engine_boots: 0,
                authoritative_engine_time: 0,
                context_engine_id: Vec::new(),
                context_name: Vec::new(),
            },
            timeout: Duration::from_millis(1500),
            retries: 3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let target = Target::community_v2c(
            AddressClass::Udp,
            "127.0.0.1:161".parse().unwrap(),
            "public",
        )
        .with_retries(5)
        .with_timeout(Duration::from_secs(2));
        assert_eq!(target.retries, 5);
        assert_eq!(target.timeout, Duration::from_secs(2));
    }

    #[test]
    fn usm_v3_target_starts_with_unknown_engine() {
        let target = Target::usm_v3(AddressClass::Udp, "127.0.0.1:161".parse().unwrap(), b"admin".to_vec());
        assert_eq!(target.version, codec::message::VERSION_V3);
        match target.security {
            SecurityParams::Usm { authoritative_engine_id, user_name, .. } => {
                assert!(authoritative_engine_id.is_empty());
                assert_eq!(user_name, b"admin");
            }
            _ => panic!("expected USM security params"),
        }
    }
}
