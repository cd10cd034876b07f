pub mod aggregator;
pub mod circuit_breaker;
pub mod source;

use serde::{Deserialize, Serialize};

pub use aggregator::{Fetcher, PriceFetcher};

/// One configured upstream price source.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SourceConfig {
    pub name: String,
    pub endpoint: String,
}

/// The wire shape every upstream source answers with:
/// `GET <endpoint>/<asset>` -> 200 + this JSON body.
#[derive(Clone, Debug, Deserialize)]
pub struct SourceQuote {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp: i64,
}
