use std::sync::Arc;

use anyhow::Context;
use relaycast::config::Config;
use relaycast::logger;
use relaycast::providers::OpenAiProvider;
use relaycast::proxy::ClientFactory;
use relaycast::resilience::{CircuitBreaker, CircuitBreakerConfig};
use relaycast::server::{self, AppState};
use relaycast::services::seed_cli_config;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("relaycast failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load().context("加载配置失败")?;
    logger::init_logging(&config.logging, &config.log_dir())?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        base_url = %config.upstream.base_url,
        default_model = %config.models.default_model,
        allowed_models = config.models.allowed_models.len(),
        debug = config.debug,
        "relaycast {} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = seed_cli_config(&config.cli_config_path()) {
        tracing::warn!("[ONBOARDING] {:#}", e);
    }

    let client = ClientFactory::new()
        .with_proxy(config.upstream.proxy.clone())
        .create_client()?;
    let upstream = Arc::new(
        OpenAiProvider::new(
            client,
            config.upstream.api_key.clone(),
            config.upstream.base_url.clone(),
        )
        .with_debug(config.debug),
    );
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));

    let state = AppState::new(Arc::new(config), upstream, breaker);
    server::serve(state).await
}
