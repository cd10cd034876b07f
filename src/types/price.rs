use serde::{Deserialize, Serialize};

use crate::types::current_timestamp;

/// One aggregated price observation for an asset at a point in time.
/// Produced exclusively by the fetcher; immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub asset: String,
    pub price: f64,
    pub observed_at: i64,
}

impl PricePoint {
    /// Age of this observation in whole seconds relative to `now`.
    pub fn age_secs(&self, now: i64) -> i64 {
        (now - self.observed_at).max(0)
    }
}

/// The durable form of a price observation. Records are append-only;
/// `updated_at` is the wall-clock time the record was written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub asset: String,
    pub price: f64,
    pub observed_at: i64,
    pub updated_at: i64,
}

impl PriceRecord {
    pub fn from_point(point: &PricePoint) -> Self {
        PriceRecord {
            asset: point.asset.clone(),
            price: point.price,
            observed_at: point.observed_at,
            updated_at: current_timestamp(),
        }
    }

    pub fn to_point(&self) -> PricePoint {
        PricePoint {
            asset: self.asset.clone(),
            price: self.price,
            observed_at: self.observed_at,
        }
    }
}

/// Human-relative description of an observation age, e.g. "42 seconds ago".
pub fn time_ago(age_secs: i64) -> String {
    match age_secs {
        s if s < 5 => "just now".to_string(),
        s if s < 60 => format!("{} seconds ago", s),
        s if s < 120 => "1 minute ago".to_string(),
        s if s < 3600 => format!("{} minutes ago", s / 60),
        s if s < 7200 => "1 hour ago".to_string(),
        s if s < 86400 => format!("{} hours ago", s / 3600),
        s if s < 172800 => "1 day ago".to_string(),
        s => format!("{} days ago", s / 86400),
    }
}
