//! Per-peer pending-message queue for connection-oriented transports
//! (§4: "per-peer socket entries, pending-message queues"). A
//! `Transport::send` call looks up the peer's queue and hands it the
//! encoded message; the connection's own task drains it onto the socket.

use std::net::SocketAddr;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

type Outbox = UnboundedSender<Vec<u8>>;

#[derive(Clone, Default)]
pub struct Exchanger(Arc<RwLock<AHashMap<SocketAddr, Outbox>>>);

impl Exchanger {
    /// Registers `peer`'s outbox, returning the receiving half for the
    /// connection task to drain in its select loop.
    pub fn register(&self, peer: SocketAddr) -> UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = unbounded_channel();
        self.0.write().insert(peer, tx);
        rx
    }

    /// Queues `bytes` for `peer`. Silently dropped if no connection is
    /// open for that peer — matching the teacher's Exchanger, which never
    /// reports back whether a route exists.
    pub fn send(&self, peer: SocketAddr, bytes: Vec<u8>) -> bool {
        match self.0.read().get(&peer) {
            Some(tx) => tx.send(bytes).is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, peer: &SocketAddr) {
        self.0.write().remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_to_registered_peer_only() {
        let exchanger = Exchanger::default();
        let peer: SocketAddr = "127.0.0.1:10163".parse().unwrap();
        let mut rx = exchanger.register(peer);

        assert!(exchanger.send(peer, vec![1, 2, 3]));
        assert_eq!(rx.try_recv().unwrap(), vec![1, 2, 3]);

        let other: SocketAddr = "127.0.0.1:10164".parse().unwrap();
        assert!(!exchanger.send(other, vec![4]));

        exchanger.remove(&peer);
        assert!(!exchanger.send(peer, vec![5]));
    }
}
