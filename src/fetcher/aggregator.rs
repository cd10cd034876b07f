use async_trait::async_trait;
use futures::future::join_all;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::fetcher::source::SourceClient;
use crate::fetcher::SourceConfig;
use crate::types::price::PricePoint;

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_price(&self, asset: &str) -> Result<PricePoint>;
}

/// Fans one asset's fetch out to every configured source concurrently and
/// merges the valid answers into a single volume-weighted price point.
/// Sources fail independently; the fetch as a whole only fails when none
/// of them produced a usable quote.
pub struct PriceFetcher {
    sources: Vec<SourceClient>,
}

impl PriceFetcher {
    pub fn new(configs: &[SourceConfig], fetch: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(fetch.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("building http client: {}", e)))?;

        let sources = configs
            .iter()
            .map(|config| SourceClient::new(config, client.clone(), fetch))
            .collect();

        Ok(PriceFetcher { sources })
    }
}

#[async_trait]
impl Fetcher for PriceFetcher {
    async fn fetch_price(&self, asset: &str) -> Result<PricePoint> {
        let asset = asset.to_lowercase();

        let fetches = self.sources.iter().map(|source| source.fetch_quote(&asset));
        let results = join_all(fetches).await;

        let mut quotes = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(quote) => quotes.push(quote),
                Err(err) => failures.push(err.to_string()),
            }
        }

        if quotes.is_empty() {
            return Err(Error::NoValidData {
                asset,
                failures: failures.join("; "),
            });
        }

        let mut total_weighted = 0.0;
        let mut total_volume = 0.0;
        let mut latest_timestamp = i64::MIN;
        for quote in &quotes {
            total_weighted += quote.price * quote.volume;
            total_volume += quote.volume;
            latest_timestamp = latest_timestamp.max(quote.timestamp);
        }

        // Quotes with non-positive volume never get this far, but the
        // division is guarded anyway.
        if total_volume == 0.0 {
            return Err(Error::ZeroVolume(asset));
        }

        Ok(PricePoint {
            asset,
            price: total_weighted / total_volume,
            observed_at: latest_timestamp,
        })
    }
}
