pub mod config;
pub mod observer;
pub mod server;
pub mod statistics;

use std::sync::Arc;
use std::time::Duration;

use codec::security::{AuthProtocol, PrivProtocol};
use dispatch::dispatcher::Dispatcher;
use dispatch::session::{RequestOutcome, Session};
use dispatch::target::Target;
use sdk::UsmUserBuilder;

use self::config::{Config, EngineIdSource, UsmUserConfig};
use self::statistics::Statistics;

/// In order to let integration tests drive the engine directly without
/// going through `main`, startup is exposed as a function rather than
/// folded into `main`.
pub async fn startup(config: Arc<Config>) -> anyhow::Result<()> {
    let (local_engine_id, engine_boots) = load_engine_id(&config)?;
    log::info!(
        "local engine: id={}, boots={engine_boots}",
        hex(&local_engine_id)
    );

    let dispatcher = Dispatcher::new(local_engine_id);
    let statistics = Arc::new(Statistics::default());

    for (name, user) in &config.usm_users {
        dispatcher.add_usm_user(build_usm_user(name, user)?);
    }

    server::start(&config, &dispatcher, &statistics).await?;

    if !config.targets.is_empty() {
        tokio::spawn(smoke_test(config.clone(), dispatcher.clone()));
    }

    std::future::pending::<()>().await;
    Ok(())
}

fn load_engine_id(config: &Config) -> anyhow::Result<(Vec<u8>, u32)> {
    match &config.engine.id {
        EngineIdSource::Fixed { engine_id_hex } => Ok((decode_hex(engine_id_hex)?, 0)),
        EngineIdSource::File { path, default_engine_id_hex } => {
            let provider = sdk::FileEngineIdProvider::load_or_create(path, &decode_hex(default_engine_id_hex)?)?;
            Ok((
                sdk::EngineIdProvider::local_engine_id(&provider),
                sdk::EngineIdProvider::engine_boots(&provider),
            ))
        }
    }
}

fn decode_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        anyhow::bail!("engine ID hex string has odd length: {s}");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(anyhow::Error::from))
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn build_usm_user(name: &str, user: &UsmUserConfig) -> anyhow::Result<codec::mp::v3::UsmUser> {
    let auth_protocol = parse_auth_protocol(&user.auth_protocol)?;
    let priv_protocol = parse_priv_protocol(&user.priv_protocol)?;
    Ok(UsmUserBuilder::new(name.as_bytes().to_vec())
        .auth(auth_protocol, user.auth_password.as_bytes().to_vec())
        .priv_(priv_protocol, user.priv_password.as_bytes().to_vec())
        .build())
}

fn parse_auth_protocol(name: &str) -> anyhow::Result<AuthProtocol> {
    match name {
        "none" => Ok(AuthProtocol::None),
        "hmac-md5" => Ok(AuthProtocol::HmacMd5),
        "hmac-sha1" => Ok(AuthProtocol::HmacSha1),
        "hmac-sha224" => Ok(AuthProtocol::HmacSha224),
        "hmac-sha256" => Ok(AuthProtocol::HmacSha256),
        "hmac-sha384" => Ok(AuthProtocol::HmacSha384),
        "hmac-sha512" => Ok(AuthProtocol::HmacSha512),
        other => anyhow::bail!("unknown auth protocol: {other}"),
    }
}

fn parse_priv_protocol(name: &str) -> anyhow::Result<PrivProtocol> {
    match name {
        "none" => Ok(PrivProtocol::None),
        "des" => Ok(PrivProtocol::Des),
        "aes128" => Ok(PrivProtocol::Aes128),
        "aes192" => Ok(PrivProtocol::Aes192),
        "aes256" => Ok(PrivProtocol::Aes256),
        other => anyhow::bail!("unknown priv protocol: {other}"),
    }
}

/// Exercises every configured target preset with a `sysDescr` GET,
/// strictly for manual smoke-testing (this is not a general agent/CLI
/// surface).
async fn smoke_test(config: Arc<Config>, dispatcher: Arc<Dispatcher>) {
    let session = Session::new(dispatcher);
    for (name, preset) in &config.targets {
        let class = match preset.transport.as_str() {
            "tcp" => dispatch::address::AddressClass::Tcp,
            "tls" => dispatch::address::AddressClass::Tls,
            _ => dispatch::address::AddressClass::Udp,
        };

        let target = match (&preset.community, &preset.usm_user) {
            (Some(community), _) => Target::community_v2c(class, preset.address, community.as_str()),
            (None, Some(user_name)) => Target::usm_v3(class, preset.address, user_name.as_bytes().to_vec()),
            (None, None) => {
                log::warn!("target '{name}' has neither a community string nor a USM user configured; skipping smoke test");
                continue;
            }
        }
        .with_timeout(Duration::from_secs(2))
        .with_retries(1);

        let sys_descr = codec::oid::Oid::from([1, 3, 6, 1, 2, 1, 1, 1, 0]);
        match session.get(target, vec![sys_descr]).await {
            Ok(RequestOutcome::Response(pdu)) => {
                log::info!("smoke test '{name}' succeeded: {} varbinds", pdu.var_binds.len())
            }
            Ok(RequestOutcome::Report(_)) => log::warn!("smoke test '{name}' received a report"),
            Ok(RequestOutcome::TimedOut) => log::warn!("smoke test '{name}' timed out"),
            Err(err) => log::warn!("smoke test '{name}' failed: {err}"),
        }
    }
}
