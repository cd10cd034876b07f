use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::types::price::PriceRecord;

/// Durable, append-only log of price observations. Records are never
/// mutated; "latest" is the record with the greatest `observed_at`, with
/// ties going to the last appended. All operations are best-effort from the
/// caller's point of view: a failure here never aborts a refresh or a read.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn save(&self, record: &PriceRecord) -> Result<()>;

    /// Latest record for `asset`, or `Ok(None)` when nothing was stored.
    async fn get(&self, asset: &str) -> Result<Option<PriceRecord>>;

    /// Latest records for a set of assets; assets with no history are
    /// omitted from the result rather than errored.
    async fn batch_get(&self, assets: &[String]) -> Result<HashMap<String, PriceRecord>>;
}

/// In-process store backend keeping the full observation history per asset.
pub struct MemoryStore {
    records: DashMap<String, Vec<PriceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            records: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn save(&self, record: &PriceRecord) -> Result<()> {
        self.records
            .entry(record.asset.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn get(&self, asset: &str) -> Result<Option<PriceRecord>> {
        // max_by_key keeps the last of equal keys, so duplicate timestamps
        // resolve to the most recently appended record.
        Ok(self.records.get(asset).and_then(|history| {
            history
                .iter()
                .max_by_key(|record| record.observed_at)
                .cloned()
        }))
    }

    async fn batch_get(&self, assets: &[String]) -> Result<HashMap<String, PriceRecord>> {
        let mut latest = HashMap::new();
        for asset in assets {
            if let Some(record) = self.get(asset).await? {
                latest.insert(asset.clone(), record);
            }
        }
        Ok(latest)
    }
}
