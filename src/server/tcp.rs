//! TCP transport mapping: a non-blocking accept loop, per-connection
//! state, and the exchanger-backed pending-message queue (§2 "Connection-
//! Oriented Transport Server").

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dispatch::address::{AddressClass, Direction};
use dispatch::dispatcher::Dispatcher;
use dispatch::transport::Transport;
use dispatch::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::server::buffer::ExchangeBuffer;
use crate::server::exchanger::Exchanger;
use crate::server::MAX_MESSAGE_SIZE;
use crate::statistics::Statistics;

pub struct TcpTransport {
    local: SocketAddr,
    exchanger: Exchanger,
}

impl Transport for TcpTransport {
    fn class(&self) -> AddressClass {
        AddressClass::Tcp
    }

    fn send(&self, peer: SocketAddr, bytes: Vec<u8>) -> Result<(), Error> {
        if self.exchanger.send(peer, bytes) {
            Ok(())
        } else {
            Err(Error::NoTransport)
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

pub async fn bind(
    listen: SocketAddr,
    idle_timeout: Duration,
    dispatcher: Arc<Dispatcher>,
    statistics: Arc<Statistics>,
) -> anyhow::Result<Arc<TcpTransport>> {
    let listener = TcpListener::bind(listen).await?;
    let local = listener.local_addr()?;

    let transport = Arc::new(TcpTransport {
        local,
        exchanger: Exchanger::default(),
    });
    dispatcher.register_transport(Direction::Outbound, transport.clone());
    dispatcher.register_transport(Direction::Inbound, transport.clone());

    {
        let transport = transport.clone();
        tokio::spawn(async move {
            while let Ok((socket, peer)) = listener.accept().await {
                let _ = socket.set_nodelay(true);
                log::info!("tcp accept: peer={peer}, interface={local}");
                tokio::spawn(run_connection(
                    socket,
                    peer,
                    idle_timeout,
                    transport.clone(),
                    dispatcher.clone(),
                    statistics.clone(),
                ));
            }

            log::error!("tcp server closed: interface={local}");
        });
    }

    log::info!("snmp engine listening: listen={local}, transport=TCP");
    Ok(transport)
}

async fn run_connection(
    mut socket: TcpStream,
    peer: SocketAddr,
    idle_timeout: Duration,
    transport: Arc<TcpTransport>,
    dispatcher: Arc<Dispatcher>,
    statistics: Arc<Statistics>,
) {
    let mut outbox = transport.exchanger.register(peer);
    let mut buffer = ExchangeBuffer::default();

    'connection: loop {
        tokio::select! {
            read = tokio::time::timeout(idle_timeout, socket.read_buf(buffer.inner_mut())) => {
                let size = match read {
                    Ok(Ok(size)) => size,
                    _ => break 'connection,
                };
                if size == 0 {
                    break 'connection;
                }

                if buffer.len() > MAX_MESSAGE_SIZE * 3 {
                    log::warn!("tcp peer exceeded buffer budget: peer={peer}");
                    break 'connection;
                }

                loop {
                    if buffer.len() < 2 {
                        break;
                    }

                    let needed = match codec::mp::message_len(buffer.as_slice()) {
                        Ok(size) => size,
                        Err(_) => break,
                    };
                    if needed > MAX_MESSAGE_SIZE {
                        log::warn!("tcp message too large: peer={peer}, size={needed}");
                        break 'connection;
                    }
                    if needed > buffer.len() {
                        break;
                    }

                    let message = buffer.split(needed);
                    let result = dispatcher.process_message(&message, peer);
                    statistics.record_inbound(&result);
                    if let Err(err) = result {
                        log::debug!("tcp message rejected: peer={peer}, err={err}");
                    }
                }
            }
            Some(bytes) = outbox.recv() => {
                if socket.write_all(&bytes).await.is_err() {
                    break 'connection;
                }
            }
        }
    }

    transport.exchanger.remove(&peer);
    log::info!("tcp disconnect: peer={peer}, interface={}", transport.local);
}
