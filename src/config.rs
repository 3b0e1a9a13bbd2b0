//! Configuration (§4.6): a JSON5 file loaded via `--config`, with every
//! field defaulted the way the teacher's `Interface`/`Server`/`Log`/`Auth`
//! default.

use std::collections::HashMap;
use std::fs::read_to_string;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

/// TLS private key / certificate chain pair, mirroring the teacher's `Ssl`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Ssl {
    pub private_key: String,
    pub certificate_chain: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "transport", rename_all = "kebab-case")]
pub enum Interface {
    Udp {
        listen: SocketAddr,
    },
    Tcp {
        listen: SocketAddr,
        #[serde(default = "Interface::idle_timeout_secs")]
        idle_timeout_secs: u64,
    },
    Tls {
        listen: SocketAddr,
        #[serde(default = "Interface::idle_timeout_secs")]
        idle_timeout_secs: u64,
        ssl: Ssl,
    },
}

impl Interface {
    fn idle_timeout_secs() -> u64 {
        60
    }
}

/// Where the local engine's identity comes from. A `Fixed` engine ID
/// skips persistence entirely (useful for tests); `File` persists and
/// increments `engineBoots` across restarts (RFC 3414 §2.2.2).
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum EngineIdSource {
    Fixed { engine_id_hex: String },
    File { path: PathBuf, default_engine_id_hex: String },
}

impl Default for EngineIdSource {
    fn default() -> Self {
        Self::File {
            path: PathBuf::from("./engine.state"),
            default_engine_id_hex: "8000deba02".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Engine {
    #[serde(default)]
    pub id: EngineIdSource,
    #[serde(default = "Engine::context_name")]
    pub default_context_name: String,
}

impl Engine {
    fn context_name() -> String {
        String::new()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            id: EngineIdSource::default(),
            default_context_name: Self::context_name(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

/// A named target preset for the example binary — community string or
/// USM user plus destination, so `examples/snmpget.rs`-style smoke tests
/// don't need to hand-build a `Target` every run.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TargetPreset {
    pub address: SocketAddr,
    #[serde(default = "TargetPreset::transport")]
    pub transport: String,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub usm_user: Option<String>,
}

impl TargetPreset {
    fn transport() -> String {
        "udp".to_string()
    }
}

/// A USM user registered with the dispatcher at startup, keyed by name in
/// `Config::usm_users`. Protocol names match the `AuthProtocol`/
/// `PrivProtocol` variant names, lower-cased (`"hmac-md5"`, `"hmac-sha1"`,
/// `"aes128"`, `"none"`).
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct UsmUserConfig {
    #[serde(default = "UsmUserConfig::none")]
    pub auth_protocol: String,
    #[serde(default)]
    pub auth_password: String,
    #[serde(default = "UsmUserConfig::none")]
    pub priv_protocol: String,
    #[serde(default)]
    pub priv_password: String,
}

impl UsmUserConfig {
    fn none() -> String {
        "none".to_string()
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Statistics {
    #[serde(default)]
    pub prometheus_listen: Option<SocketAddr>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Server {
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

impl Default for Server {
    fn default() -> Self {
        Self { interfaces: Vec::new() }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub targets: HashMap<String, TargetPreset>,
    #[serde(default)]
    pub usm_users: HashMap<String, UsmUserConfig>,
    #[serde(default)]
    pub statistics: Statistics,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS")
)]
struct Cli {
    /// Path to a JSON5 configuration file.
    #[arg(long, short)]
    config: String,
}

impl Config {
    /// Loads configuration from the `--config` path given on the command
    /// line. Every field not present in the file falls back to its
    /// `#[serde(default)]`.
    pub fn load() -> Result<Self> {
        Ok(serde_json5::from_str::<Self>(&read_to_string(
            &Cli::parse().config,
        )?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config: Config = serde_json5::from_str("{}").unwrap();
        assert!(config.server.interfaces.is_empty());
        assert!(matches!(config.log.level, LogLevel::Info));
    }

    #[test]
    fn parses_interfaces_and_targets() {
        let text = r#"{
            server: { interfaces: [{ transport: "udp", listen: "127.0.0.1:1161" }] },
            targets: { demo: { address: "127.0.0.1:1161", community: "public" } },
        }"#;
        let config: Config = serde_json5::from_str(text).unwrap();
        assert_eq!(config.server.interfaces.len(), 1);
        assert_eq!(config.targets["demo"].community.as_deref(), Some("public"));
    }

    #[test]
    fn parses_usm_users() {
        let text = r#"{
            usm_users: {
                admin: { "auth-protocol": "hmac-sha1", "auth-password": "maplesyrup", "priv-protocol": "aes128", "priv-password": "maplesyrup" },
            },
        }"#;
        let config: Config = serde_json5::from_str(text).unwrap();
        let admin = &config.usm_users["admin"];
        assert_eq!(admin.auth_protocol, "hmac-sha1");
        assert_eq!(admin.priv_protocol, "aes128");
    }
}
