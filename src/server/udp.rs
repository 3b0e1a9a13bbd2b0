//! UDP transport mapping (§2 "Transport Mapping"). One receive task reads
//! datagrams and hands them to the dispatcher; sends are queued onto an
//! unbounded channel drained by a dedicated send task, matching the
//! teacher's pattern of decoupling the accept/receive path from writes.

use std::net::SocketAddr;
use std::sync::Arc;

use dispatch::address::{AddressClass, Direction};
use dispatch::dispatcher::Dispatcher;
use dispatch::transport::Transport;
use dispatch::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

use crate::statistics::Statistics;

pub struct UdpTransport {
    local: SocketAddr,
    tx: UnboundedSender<(SocketAddr, Vec<u8>)>,
}

impl Transport for UdpTransport {
    fn class(&self) -> AddressClass {
        AddressClass::Udp
    }

    fn send(&self, peer: SocketAddr, bytes: Vec<u8>) -> Result<(), Error> {
        self.tx.send((peer, bytes)).map_err(|_| Error::NoTransport)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

/// Binds a UDP socket at `listen`, registers the resulting transport with
/// `dispatcher` for both directions, and spawns its receive/send loops.
pub async fn bind(
    listen: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    statistics: Arc<Statistics>,
) -> anyhow::Result<Arc<UdpTransport>> {
    let socket = Arc::new(UdpSocket::bind(listen).await?);
    let local = socket.local_addr()?;
    let (tx, mut rx) = unbounded_channel::<(SocketAddr, Vec<u8>)>();

    let transport = Arc::new(UdpTransport { local, tx });
    dispatcher.register_transport(Direction::Outbound, transport.clone());
    dispatcher.register_transport(Direction::Inbound, transport.clone());

    {
        let socket = socket.clone();
        tokio::spawn(async move {
            while let Some((peer, bytes)) = rx.recv().await {
                if let Err(err) = socket.send_to(&bytes, peer).await {
                    log::warn!("udp send failed: peer={peer}, err={err}");
                }
            }
        });
    }

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65535];
        loop {
            let (size, from) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(err) => {
                    log::error!("udp receive failed: listen={local}, err={err}");
                    break;
                }
            };

            let result = dispatcher.process_message(&buf[..size], from);
            statistics.record_inbound(&result);
            if let Err(err) = result {
                log::debug!("udp message rejected: from={from}, err={err}");
            }
        }
    });

    log::info!("snmp engine listening: listen={local}, transport=UDP");
    Ok(transport)
}
