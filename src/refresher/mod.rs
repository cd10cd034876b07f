use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::PriceCache;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::observability::metrics;
use crate::storage::PriceStore;
use crate::types::price::PriceRecord;
use crate::types::tier::{assign_tiers, Tier};
use crate::universe::AssetUniverse;

struct SchedulerState {
    running: bool,
    stop_tx: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

/// Owns the per-asset refresh lifecycle: one periodic loop per asset in the
/// universe, interval determined by the asset's tier, plus a synchronous
/// `force_refresh` for on-demand escalation. Tier assignments are computed
/// once at construction and never change afterwards.
pub struct Refresher {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn PriceCache>,
    storage: Arc<dyn PriceStore>,
    universe: Arc<AssetUniverse>,
    tiers: HashMap<String, Tier>,
    scheduler: Mutex<SchedulerState>,
}

impl Refresher {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn PriceCache>,
        storage: Arc<dyn PriceStore>,
        universe: Arc<AssetUniverse>,
    ) -> Self {
        let tiers = assign_tiers(universe.ordered());
        Refresher {
            fetcher,
            cache,
            storage,
            universe,
            tiers,
            scheduler: Mutex::new(SchedulerState {
                running: false,
                stop_tx: None,
                handles: Vec::new(),
            }),
        }
    }

    /// Spawn one refresh loop per asset. Calling `start` while already
    /// running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut scheduler = self.lock_scheduler();
        if scheduler.running {
            return;
        }

        tracing::info!("Starting auto-refresh for {} assets", self.universe.len());
        let (stop_tx, stop_rx) = watch::channel(false);

        for asset in self.universe.ordered() {
            let tier = self.tiers.get(asset).copied().unwrap_or(Tier::Cold);
            let handle = tokio::spawn(Self::refresh_loop(
                self.clone(),
                asset.clone(),
                tier,
                stop_rx.clone(),
            ));
            scheduler.handles.push(handle);
        }

        scheduler.stop_tx = Some(stop_tx);
        scheduler.running = true;
    }

    /// Signal every loop to exit. In-flight fetches finish or hit their own
    /// timeout; no task is interrupted mid-refresh. Calling `stop` while
    /// stopped is a no-op.
    pub fn stop(&self) {
        let mut scheduler = self.lock_scheduler();
        if !scheduler.running {
            return;
        }

        tracing::info!("Stopping auto-refresh");
        if let Some(stop_tx) = scheduler.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        scheduler.handles.clear();
        scheduler.running = false;
    }

    /// Immediate single-shot refresh outside the normal timer cadence. Safe
    /// to race with the asset's own periodic loop; both apply their result
    /// as a whole overwrite.
    pub async fn force_refresh(&self, asset: &str) -> Result<()> {
        let asset = asset.to_lowercase();
        if !self.universe.contains(&asset) {
            return Err(Error::AssetNotSupported(asset));
        }
        let tier = self.tiers.get(&asset).copied().unwrap_or(Tier::Cold);
        self.refresh_asset(&asset, tier, "force").await
    }

    pub fn get_tier(&self, asset: &str) -> Option<Tier> {
        self.tiers.get(asset).copied()
    }

    /// Pre-populate the cache with the latest stored record for every asset
    /// that has history. Returns the number of entries warmed.
    pub async fn warm_cache(&self) -> Result<usize> {
        let latest = self.storage.batch_get(self.universe.ordered()).await?;
        let mut warmed = 0;
        for (asset, record) in &latest {
            let tier = self.tiers.get(asset).copied().unwrap_or(Tier::Cold);
            match self.cache.set(asset, &record.to_point(), tier).await {
                Ok(()) => warmed += 1,
                Err(e) => tracing::warn!("Failed to warm cache for {}: {}", asset, e),
            }
        }
        tracing::info!("Warmed cache with {} entries", warmed);
        Ok(warmed)
    }

    async fn refresh_loop(
        self: Arc<Self>,
        asset: String,
        tier: Tier,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(tier.refresh_interval());
        // The first tick fires immediately, giving every asset an initial
        // refresh at startup.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_asset(&asset, tier, "auto").await {
                        tracing::warn!("Failed to refresh price for {}: {}", asset, e);
                    }
                }
                _ = stop_rx.changed() => {
                    return;
                }
            }
        }
    }

    /// The tick body shared by the periodic loops and `force_refresh`:
    /// fetch, then attempt cache and storage updates independently. Either
    /// write failing is logged and non-fatal.
    async fn refresh_asset(&self, asset: &str, tier: Tier, trigger: &str) -> Result<()> {
        let point = match self.fetcher.fetch_price(asset).await {
            Ok(point) => point,
            Err(e) => {
                metrics::REFRESH_ERRORS
                    .with_label_values(&[tier.as_str()])
                    .inc();
                return Err(e);
            }
        };

        if let Err(e) = self.cache.set(asset, &point, tier).await {
            tracing::warn!("Failed to update cache for {}: {}", asset, e);
        }

        let record = PriceRecord::from_point(&point);
        if let Err(e) = self.storage.save(&record).await {
            tracing::warn!("Failed to update storage for {}: {}", asset, e);
        }

        metrics::REFRESH_TOTAL
            .with_label_values(&[tier.as_str(), trigger])
            .inc();
        tracing::debug!("Refreshed price for {}: {:.2}", asset, point.price);
        Ok(())
    }

    fn lock_scheduler(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.scheduler.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::cache::MemoryCache;
    use crate::storage::MemoryStore;
    use crate::types::current_timestamp;
    use crate::types::price::PricePoint;

    struct FixedFetcher {
        price: f64,
        calls: AtomicU32,
    }

    impl FixedFetcher {
        fn new(price: f64) -> Self {
            FixedFetcher {
                price,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for FixedFetcher {
        async fn fetch_price(&self, asset: &str) -> Result<PricePoint> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PricePoint {
                asset: asset.to_string(),
                price: self.price,
                observed_at: current_timestamp(),
            })
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch_price(&self, asset: &str) -> Result<PricePoint> {
            Err(Error::NoValidData {
                asset: asset.to_string(),
                failures: "all sources down".to_string(),
            })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl PriceStore for FailingStore {
        async fn save(&self, _record: &PriceRecord) -> Result<()> {
            Err(Error::Storage("write rejected".to_string()))
        }

        async fn get(&self, _asset: &str) -> Result<Option<PriceRecord>> {
            Ok(None)
        }

        async fn batch_get(&self, _assets: &[String]) -> Result<HashMap<String, PriceRecord>> {
            Ok(HashMap::new())
        }
    }

    fn refresher_with(
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn PriceStore>,
        symbols: &[&str],
    ) -> (Arc<Refresher>, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let universe = Arc::new(AssetUniverse::from_symbols(symbols.iter().copied()));
        let refresher = Arc::new(Refresher::new(
            fetcher,
            cache.clone(),
            storage,
            universe,
        ));
        (refresher, cache)
    }

    #[tokio::test]
    async fn force_refresh_rejects_unknown_asset() {
        let store = Arc::new(MemoryStore::new());
        let (refresher, _cache) =
            refresher_with(Arc::new(FixedFetcher::new(100.0)), store, &["btcusdt"]);

        let err = refresher.force_refresh("dogeusdt").await.unwrap_err();
        assert!(matches!(err, Error::AssetNotSupported(_)));
    }

    #[tokio::test]
    async fn force_refresh_updates_cache_and_storage() {
        let store = Arc::new(MemoryStore::new());
        let (refresher, cache) = refresher_with(
            Arc::new(FixedFetcher::new(123.0)),
            store.clone(),
            &["btcusdt"],
        );

        refresher.force_refresh("BTCUSDT").await.unwrap();

        let cached = cache.get("btcusdt").await.unwrap().unwrap();
        assert_eq!(cached.price, 123.0);
        let stored = store.get("btcusdt").await.unwrap().unwrap();
        assert_eq!(stored.price, 123.0);
    }

    #[tokio::test]
    async fn cache_still_updated_when_storage_fails() {
        let (refresher, cache) = refresher_with(
            Arc::new(FixedFetcher::new(55.0)),
            Arc::new(FailingStore),
            &["btcusdt"],
        );

        refresher.force_refresh("btcusdt").await.unwrap();

        let cached = cache.get("btcusdt").await.unwrap().unwrap();
        assert_eq!(cached.price, 55.0);
    }

    #[tokio::test]
    async fn fetch_failure_propagates_and_leaves_cache_untouched() {
        let store = Arc::new(MemoryStore::new());
        let (refresher, cache) =
            refresher_with(Arc::new(FailingFetcher), store, &["btcusdt"]);

        let err = refresher.force_refresh("btcusdt").await.unwrap_err();
        assert!(matches!(err, Error::NoValidData { .. }));
        assert!(cache.get("btcusdt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn warm_cache_populates_from_storage() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(&PriceRecord {
                asset: "btcusdt".to_string(),
                price: 42.0,
                observed_at: 100,
                updated_at: 100,
            })
            .await
            .unwrap();

        let (refresher, cache) = refresher_with(
            Arc::new(FixedFetcher::new(0.0)),
            store,
            &["btcusdt", "ethusdt"],
        );

        let warmed = refresher.warm_cache().await.unwrap();
        assert_eq!(warmed, 1);
        let cached = cache.get("btcusdt").await.unwrap().unwrap();
        assert_eq!(cached.price, 42.0);
        assert!(cache.get("ethusdt").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn loops_tick_until_stopped_and_stop_is_idempotent() {
        let fetcher = Arc::new(FixedFetcher::new(1.0));
        let store = Arc::new(MemoryStore::new());
        let (refresher, _cache) = refresher_with(fetcher.clone(), store, &["btcusdt"]);

        refresher.start();
        refresher.start(); // second start is a no-op

        // Let the initial tick and at least one interval tick run.
        tokio::time::sleep(std::time::Duration::from_secs(11)).await;
        let before_stop = fetcher.calls.load(Ordering::SeqCst);
        assert!(before_stop >= 2, "expected ticks, saw {}", before_stop);

        refresher.stop();
        refresher.stop(); // second stop is a no-op

        // Give the loops a chance to observe the signal, then verify the
        // tick count no longer grows.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let after_stop = fetcher.calls.load(Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), after_stop);
    }
}
