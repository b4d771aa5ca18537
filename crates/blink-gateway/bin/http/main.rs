mod cli;

use crate::cli::{CacheBackendArg, LogFormatArg, StorageBackendArg, CLI};
use anyhow::Context;
use blink_cache::{MokaUrlCache, RedisUrlCache};
use blink_core::{LinkStore, MetricsStore, UrlCache};
use blink_directory::{DirectoryConfig, LinkDirectory};
use blink_gateway::{App, AppState};
use blink_metrics::{AggregatorConfig, MetricsAggregator};
use blink_storage::{InMemoryStore, MySqlStore};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;

    init_tracing(config.log_format);

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        "starting gateway server"
    );

    match config.storage {
        StorageBackendArg::InMemory => with_cache(&config, InMemoryStore::new()).await,
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlStore::connect(mysql_dsn)
                .await
                .context("failed to connect to MySQL")?;
            store.migrate().await.context("failed to create tables")?;
            with_cache(&config, store).await
        }
    }
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

async fn with_cache<S>(config: &CLI, store: S) -> anyhow::Result<()>
where
    S: LinkStore + MetricsStore + Clone,
{
    match config.cache {
        CacheBackendArg::Moka => {
            run_server(config, store, MokaUrlCache::with_capacity(config.moka_capacity)).await
        }
        CacheBackendArg::Redis => {
            let redis_url = config
                .redis_url
                .as_deref()
                .context("redis url is required when cache backend is redis")?;
            let cache = RedisUrlCache::connect(redis_url)
                .await
                .context("failed to connect to Redis")?;
            run_server(config, store, cache).await
        }
    }
}

async fn run_server<S, C>(config: &CLI, store: S, cache: C) -> anyhow::Result<()>
where
    S: LinkStore + MetricsStore + Clone,
    C: UrlCache,
{
    let directory_config = DirectoryConfig::builder()
        .max_identifier_retries(config.max_identifier_retries)
        .cache_ttl(Duration::from_secs(config.cache_ttl_secs))
        .build();
    let aggregator_config = AggregatorConfig::builder()
        .flush_interval(Duration::from_millis(config.metrics_flush_interval_ms))
        .queue_capacity(config.metrics_queue_capacity)
        .record_timeout(Duration::from_millis(config.record_timeout_ms))
        .build();

    let directory = LinkDirectory::new(store.clone(), cache, directory_config)?;
    let aggregator = MetricsAggregator::start(aggregator_config, store)?;

    let state = AppState::new(
        Arc::new(directory),
        Arc::new(aggregator.clone()),
        config.public_base_url.clone(),
    );
    let app = App::router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    aggregator.shutdown().await;
    info!("gateway stopped");

    served.context("gateway server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
