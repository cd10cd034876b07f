use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::types::price::PricePoint;
use crate::types::tier::Tier;

/// Low-latency store for the most recent price point per asset. Every write
/// is a full overwrite with a tier-derived TTL; last writer wins.
#[async_trait]
pub trait PriceCache: Send + Sync {
    async fn set(&self, asset: &str, point: &PricePoint, tier: Tier) -> Result<()>;

    /// `Ok(None)` on miss or expiry; an error only for corrupt payloads.
    async fn get(&self, asset: &str) -> Result<Option<PricePoint>>;
}

struct CacheEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache backend. Entries are stored serialized, mirroring a
/// remote key-value cache; expiry is checked on read.
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache {
            entries: DashMap::new(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceCache for MemoryCache {
    async fn set(&self, asset: &str, point: &PricePoint, tier: Tier) -> Result<()> {
        let payload =
            serde_json::to_vec(point).map_err(|e| Error::Serialization(e.to_string()))?;
        self.entries.insert(
            asset.to_string(),
            CacheEntry {
                payload,
                expires_at: Instant::now() + tier.cache_ttl(),
            },
        );
        Ok(())
    }

    async fn get(&self, asset: &str) -> Result<Option<PricePoint>> {
        let now = Instant::now();
        match self.entries.get(asset) {
            None => return Ok(None),
            Some(entry) if now < entry.expires_at => {
                let point = serde_json::from_slice(&entry.payload)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                return Ok(Some(point));
            }
            Some(_) => {}
        }
        // Expired; the read behaves as a miss and the entry is dropped.
        self.entries.remove(asset);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn point(price: f64) -> PricePoint {
        PricePoint {
            asset: "btcusdt".to_string(),
            price,
            observed_at: 1_700_000_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hot_entry_expires_after_its_ttl_and_not_before() {
        let cache = MemoryCache::new();
        cache.set("btcusdt", &point(100.0), Tier::Hot).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get("btcusdt").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("btcusdt").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cold_entry_outlives_a_full_hot_cycle() {
        let cache = MemoryCache::new();
        cache.set("rareasset", &point(3.5), Tier::Cold).await.unwrap();

        // A full hot-tier TTL plus slack.
        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(cache.get("rareasset").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn set_overwrites_previous_entry() {
        let cache = MemoryCache::new();
        cache.set("btcusdt", &point(100.0), Tier::Hot).await.unwrap();
        cache.set("btcusdt", &point(200.0), Tier::Hot).await.unwrap();

        let cached = cache.get("btcusdt").await.unwrap().unwrap();
        assert_eq!(cached.price, 200.0);
    }

    #[tokio::test]
    async fn concurrent_overwrites_never_tear() {
        let cache = Arc::new(MemoryCache::new());
        let first = PricePoint {
            asset: "btcusdt".to_string(),
            price: 100.0,
            observed_at: 1_700_000_000,
        };
        let second = PricePoint {
            asset: "btcusdt".to_string(),
            price: 200.0,
            observed_at: 1_700_000_005,
        };

        for _ in 0..50 {
            let c1 = cache.clone();
            let c2 = cache.clone();
            let p1 = first.clone();
            let p2 = second.clone();
            let a = tokio::spawn(async move { c1.set("btcusdt", &p1, Tier::Hot).await });
            let b = tokio::spawn(async move { c2.set("btcusdt", &p2, Tier::Hot).await });
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();

            let winner = cache.get("btcusdt").await.unwrap().unwrap();
            assert!(
                winner == first || winner == second,
                "cached value must be one complete point, got {:?}",
                winner
            );
        }
    }

    #[tokio::test]
    async fn missing_key_is_not_an_error() {
        let cache = MemoryCache::new();
        assert!(cache.get("nothere").await.unwrap().is_none());
    }
}
