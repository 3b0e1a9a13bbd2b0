//! TLS transport mapping: the TCP accept loop wrapped in a rustls
//! handshake, standing in for the connection-oriented server's TLS/DTLS
//! handshake state (§2, §4).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dispatch::address::{AddressClass, Direction};
use dispatch::dispatcher::Dispatcher;
use dispatch::transport::Transport;
use dispatch::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::config::Ssl;
use crate::server::buffer::ExchangeBuffer;
use crate::server::exchanger::Exchanger;
use crate::server::MAX_MESSAGE_SIZE;
use crate::statistics::Statistics;

pub struct TlsTransport {
    local: SocketAddr,
    exchanger: Exchanger,
}

impl Transport for TlsTransport {
    fn class(&self) -> AddressClass {
        AddressClass::Tls
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

fn build_acceptor(ssl: &Ssl) -> anyhow::Result<TlsAcceptor> {
    let certs = CertificateDer::pem_file_iter(&ssl.certificate_chain)?.collect::<Result<Vec<_>, _>>()?;
    let key = PrivateKeyDer::from_pem_file(&ssl.private_key)?;
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

pub async fn bind(
    listen: SocketAddr,
    idle_timeout: Duration,
    ssl: Ssl,
    dispatcher: Arc<Dispatcher>,
    statistics: Arc<Statistics>,
) -> anyhow::Result<Arc<TlsTransport>> {
    let listener = TcpListener::bind(listen).await?;
    let local = listener.local_addr()?;
    let acceptor = build_acceptor(&ssl)?;

    let transport = Arc::new(TlsTransport {
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
                let acceptor = acceptor.clone();
                let transport = transport.clone();
                let dispatcher = dispatcher.clone();
                let statistics = statistics.clone();

                tokio::spawn(async move {
                    let socket = match acceptor.accept(socket).await {
                        Ok(socket) => socket,
                        Err(err) => {
                            log::warn!("tls handshake failed: peer={peer}, err={err}");
                            return;
                        }
                    };

                    log::info!("tls accept: peer={peer}, interface={local}");
                    run_connection(socket, peer, idle_timeout, transport, dispatcher, statistics).await;
                });
            }

            log::error!("tls server closed: interface={local}");
        });
    }

    log::info!("snmp engine listening: listen={local}, transport=TLS");
    Ok(transport)
}

async fn run_connection<S>(
    mut socket: S,
    peer: SocketAddr,
    idle_timeout: Duration,
    transport: Arc<TlsTransport>,
    dispatcher: Arc<Dispatcher>,
    statistics: Arc<Statistics>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
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
                    log::warn!("tls peer exceeded buffer budget: peer={peer}");
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
                        log::warn!("tls message too large: peer={peer}, size={needed}");
                        break 'connection;
                    }
                    if needed > buffer.len() {
                        break;
                    }

                    let message = buffer.split(needed);
                    let result = dispatcher.process_message(&message, peer);
                    statistics.record_inbound(&result);
                    if let Err(err) = result {
                        log::debug!("tls message rejected: peer={peer}, err={err}");
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
    log::info!("tls disconnect: peer={peer}, interface={}", transport.local);
}
