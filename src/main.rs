use std::sync::Arc;

use anyhow::Context;

use price_aggregator::api::{create_router, AppState};
use price_aggregator::cache::{MemoryCache, PriceCache};
use price_aggregator::config::loader::AppConfig;
use price_aggregator::fetcher::PriceFetcher;
use price_aggregator::observability;
use price_aggregator::refresher::Refresher;
use price_aggregator::storage::{MemoryStore, PriceStore};
use price_aggregator::universe::AssetUniverse;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::tracing::init_tracing();
    observability::metrics::register_metrics();

    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "default".to_string());
    let config = AppConfig::load(&env).context("loading configuration")?;

    let universe = Arc::new(
        AssetUniverse::from_csv_file(&config.symbols_file)
            .with_context(|| format!("loading symbols from {}", config.symbols_file))?,
    );
    let fetcher = Arc::new(
        PriceFetcher::new(&config.sources, &config.fetch).context("building price fetcher")?,
    );
    let cache: Arc<dyn PriceCache> = Arc::new(MemoryCache::new());
    let storage: Arc<dyn PriceStore> = Arc::new(MemoryStore::new());

    let refresher = Arc::new(Refresher::new(
        fetcher,
        cache.clone(),
        storage.clone(),
        universe.clone(),
    ));

    if let Err(e) = refresher.warm_cache().await {
        tracing::warn!("Cache warm-up failed: {}", e);
    }
    refresher.start();

    let state = Arc::new(AppState {
        cache,
        storage,
        refresher: refresher.clone(),
        universe,
    });
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.server.listen_addr))?;
    tracing::info!("Starting server on {}", config.server.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    refresher.stop();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
