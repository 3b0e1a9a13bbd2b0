//! The `Transport` seam a transport mapping (UDP/TCP/TLS/DTLS) implements
//! so the dispatcher can hand it outbound bytes without knowing the
//! concrete socket type, mirroring the teacher's `Exchanger` channel-based
//! fan-out rather than an async trait object.

use std::net::SocketAddr;

use crate::address::AddressClass;
use crate::Error;

/// Implemented by each transport mapping. `send` is expected to be
/// non-blocking: a mapping typically pushes onto an internal
/// `tokio::sync::mpsc` channel drained by its own accept/write task,
/// the way `server::Exchanger` does in the teacher.
pub trait Transport: Send + Sync {
    fn class(&self) -> AddressClass;

    fn send(&self, peer: SocketAddr, bytes: Vec<u8>) -> Result<(), Error>;

    /// Local bind address, used for logging and for matching outbound
    /// replies back to the interface a request arrived on.
    fn local_addr(&self) -> SocketAddr;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    pub struct RecordingTransport {
        pub class: AddressClass,
        pub local: SocketAddr,
        pub sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
        pub fail: bool,
    }

    impl RecordingTransport {
        pub fn new(class: AddressClass, local: SocketAddr) -> Self {
            Self {
                class,
                local,
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl Transport for RecordingTransport {
        fn class(&self) -> AddressClass {
            self.class
        }

        fn send(&self, peer: SocketAddr, bytes: Vec<u8>) -> Result<(), Error> {
            if self.fail {
                return Err(Error::NoTransport);
            }
            self.sent.lock().push((peer, bytes));
            Ok(())
        }

        fn local_addr(&self) -> SocketAddr {
            self.local
        }
    }
}
