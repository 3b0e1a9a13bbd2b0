#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use snmp_engine::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log.level.as_level())?;

    if config.server.interfaces.is_empty() {
        log::warn!("no interfaces are bound, the engine has nothing to listen on");
        return Ok(());
    }

    snmp_engine::startup(config).await
}
