use acmeden::config::{Config, SharedConfig};
use acmeden::db::Store;
use acmeden::error::Error::Dns;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config_arg = std::env::args().nth(1).map(PathBuf::from);
    let (config, config_path) = Config::load(config_arg.as_deref())?;
    let config: SharedConfig = Arc::new(config);
    tracing_init(&config);
    tracing::debug!(path = %config_path.display(), "loaded config");

    let store = Arc::new(Store::init(config.database.engine, &config.database.connection).await?);

    tracing::info!(addr = %config.general.listen, protocol = ?config.general.protocol, "DNS listening");
    let dns_server = acmeden::dns::server::new(config.clone(), store.clone()).await?;
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    tracing::info!(addr = %config.api_bind_addr(), "API listening");
    let api_server = acmeden::api::server::new(config.clone(), store.clone());
    let api_handle = tokio::spawn(api_server);

    // TODO(XXX): proper graceful shutdown.
    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Ok(dns_res) = dns_handle => {
            if let Err(err) = dns_res {
                return Err(Dns(err).into())
            }
        }
        Ok(api_res) = api_handle => {
            if let Err(err) = api_res {
                return Err(err.into())
            }
        }
    }
    store.close().await;
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init(config: &SharedConfig) {
    let level = if config.general.debug {
        "debug"
    } else {
        &config.logconfig.level
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("acmeden={level}").into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logconfig.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
