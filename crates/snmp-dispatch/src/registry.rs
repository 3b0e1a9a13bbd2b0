//! Address & Transport Registry: maps an address class and direction to
//! the transports willing to serve it, walking the class fallback chain
//! on lookup (§4.1).

use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::address::{AddressClass, Direction};
use crate::transport::Transport;

#[derive(Default)]
pub struct TransportRegistry {
    entries: RwLock<AHashMap<(AddressClass, Direction), Vec<Arc<dyn Transport>>>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, direction: Direction, transport: Arc<dyn Transport>) {
        let key = (transport.class(), direction);
        self.entries.write().entry(key).or_default().push(transport);
    }

    pub fn unregister(&self, direction: Direction, class: AddressClass, local: std::net::SocketAddr) {
        if let Some(list) = self.entries.write().get_mut(&(class, direction)) {
            list.retain(|t| t.local_addr() != local);
        }
    }

    /// Finds a transport for `class`, walking the class's fallback chain
    /// (e.g. TLS falls back to a plain TCP mapping bound to the same
    /// peer) before giving up.
    pub fn lookup(&self, direction: Direction, class: AddressClass) -> Option<Arc<dyn Transport>> {
        let entries = self.entries.read();
        for candidate in class.fallback_chain() {
            if let Some(list) = entries.get(&(*candidate, direction)) {
                if let Some(t) = list.first() {
                    return Some(t.clone());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::RecordingTransport;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn finds_exact_class_match() {
        let registry = TransportRegistry::new();
        let udp = Arc::new(RecordingTransport::new(AddressClass::Udp, addr(1)));
        registry.register(Direction::Outbound, udp.clone());
        let found = registry.lookup(Direction::Outbound, AddressClass::Udp).unwrap();
        assert_eq!(found.local_addr(), addr(1));
    }

    #[test]
    fn falls_back_from_tls_to_tcp() {
        let registry = TransportRegistry::new();
        let tcp = Arc::new(RecordingTransport::new(AddressClass::Tcp, addr(2)));
        registry.register(Direction::Outbound, tcp);
        let found = registry.lookup(Direction::Outbound, AddressClass::Tls).unwrap();
        assert_eq!(found.class(), AddressClass::Tcp);
    }

    #[test]
    fn returns_none_when_unregistered() {
        let registry = TransportRegistry::new();
        assert!(registry.lookup(Direction::Outbound, AddressClass::Udp).is_none());
    }

    #[test]
    fn unregister_removes_by_local_addr() {
        let registry = TransportRegistry::new();
        let udp = Arc::new(RecordingTransport::new(AddressClass::Udp, addr(3)));
        registry.register(Direction::Outbound, udp);
        registry.unregister(Direction::Outbound, AddressClass::Udp, addr(3));
        assert!(registry.lookup(Direction::Outbound, AddressClass::Udp).is_none());
    }
}
