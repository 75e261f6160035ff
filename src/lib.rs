pub mod api;
pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::api::AppState;
use crate::core::RateSource;
use crate::core::config::AppConfig;
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Serve,
    Refresh,
    Latest,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    debug!("Loaded config: server={:?} source={}", config.server, config.source.url);
    run_with_config(command, &config).await
}

/// Runs `command` against an already loaded configuration.
pub async fn run_with_config(command: AppCommand, config: &AppConfig) -> Result<()> {
    match command {
        AppCommand::Serve => {
            let listener = api::bind(&config.server.bind, config.server.port).await?;
            serve(config, listener, api::shutdown_signal()).await
        }
        AppCommand::Refresh => refresh_once(config).await,
        AppCommand::Latest => print_latest(config).await,
    }
}

/// Builds the source and store from `config` and serves the API on `listener`.
pub async fn serve<F>(
    config: &AppConfig,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!("BCV rate service starting...");
    if config.uses_default_secret() {
        warn!("SECRET_KEY is not set; using the built-in placeholder");
    }

    let state = build_state(config).await?;
    api::serve(listener, state, shutdown).await
}

async fn build_state(config: &AppConfig) -> Result<AppState> {
    let store = store::open_store(config)?;
    store
        .ensure_schema()
        .await
        .context("Failed to prepare the rate_readings table")?;

    let source: Arc<dyn RateSource> = Arc::new(providers::BcvProvider::new(&config.source)?);
    Ok(AppState::new(source, store))
}

async fn refresh_once(config: &AppConfig) -> Result<()> {
    let state = build_state(config).await?;

    let rate = state
        .source
        .fetch_rate()
        .await
        .ok_or_else(|| anyhow!("Could not obtain the rate from {}", config.source.url))?;
    state.store.insert(rate).await.context("Failed to store rate")?;

    let response = api::handlers::RefreshResponse { rate, ok: true };
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn print_latest(config: &AppConfig) -> Result<()> {
    let store = store::open_store(config)?;
    store.ensure_schema().await?;

    match store.latest().await.context("Failed to read latest rate")? {
        Some(reading) => println!("{}", serde_json::to_string(&reading)?),
        None => anyhow::bail!("No rate available"),
    }
    Ok(())
}
