//! Connection-Oriented Transport Server (§2/§4): binds every interface
//! named in configuration and registers the resulting transports with
//! the dispatcher.

pub mod buffer;
pub mod exchanger;
pub mod tcp;
pub mod tls;
pub mod udp;

use std::sync::Arc;
use std::time::Duration;

use dispatch::dispatcher::Dispatcher;

use crate::config::{Config, Interface};
use crate::statistics::Statistics;

/// Matches the default `msgMaxSize` (RFC 3417) and the largest UDP
/// datagram an engine will accept.
pub const MAX_MESSAGE_SIZE: usize = 65507;

pub async fn start(config: &Config, dispatcher: &Arc<Dispatcher>, statistics: &Arc<Statistics>) -> anyhow::Result<()> {
    for interface in &config.server.interfaces {
        match interface {
            Interface::Udp { listen } => {
                udp::bind(*listen, dispatcher.clone(), statistics.clone()).await?;
            }
            Interface::Tcp { listen, idle_timeout_secs } => {
                tcp::bind(
                    *listen,
                    Duration::from_secs(*idle_timeout_secs),
                    dispatcher.clone(),
                    statistics.clone(),
                )
                .await?;
            }
            Interface::Tls { listen, idle_timeout_secs, ssl } => {
                tls::bind(
                    *listen,
                    Duration::from_secs(*idle_timeout_secs),
                    ssl.clone(),
                    dispatcher.clone(),
                    statistics.clone(),
                )
                .await?;
            }
        }
    }

    Ok(())
}
