use std::time::{Duration, Instant};

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::fetcher::circuit_breaker::CircuitBreaker;
use crate::fetcher::{SourceConfig, SourceQuote};
use crate::observability::metrics;

/// One upstream price source: issues a single HTTP fetch per asset, guarded
/// by this source's own circuit breaker.
pub struct SourceClient {
    name: String,
    endpoint: String,
    client: reqwest::Client,
    breaker: CircuitBreaker,
}

impl SourceClient {
    pub fn new(config: &SourceConfig, client: reqwest::Client, fetch: &FetchConfig) -> Self {
        let breaker = CircuitBreaker::new(
            config.name.clone(),
            fetch.failure_threshold,
            Duration::from_secs(fetch.reset_timeout_secs),
            fetch.half_open_max_retries,
        );
        SourceClient {
            name: config.name.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
            breaker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch one quote for `asset`. Any failure mode (network, open breaker,
    /// bad status, decode failure, non-positive price/volume) comes back as
    /// an error; the caller decides whether the fetch as a whole survives.
    pub async fn fetch_quote(&self, asset: &str) -> Result<SourceQuote> {
        let url = format!("{}/{}", self.endpoint, asset);

        metrics::SOURCE_REQUESTS.with_label_values(&[&self.name]).inc();
        metrics::CIRCUIT_BREAKER_STATE
            .with_label_values(&[&self.name])
            .set(self.breaker.state().as_gauge());

        let start = Instant::now();
        let result = self
            .breaker
            .execute(|| async move {
                let response = self.client.get(&url).send().await.map_err(|e| {
                    Error::SourceRequest {
                        source_name: self.name.clone(),
                        message: e.to_string(),
                    }
                })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(Error::UnexpectedStatus {
                        source_name: self.name.clone(),
                        status: status.as_u16(),
                    });
                }

                let quote: SourceQuote =
                    response.json().await.map_err(|e| Error::InvalidQuote {
                        source_name: self.name.clone(),
                        reason: format!("decode failed: {}", e),
                    })?;

                validate_quote(&self.name, &quote)?;
                Ok(quote)
            })
            .await;

        metrics::SOURCE_REQUEST_DURATION
            .with_label_values(&[&self.name])
            .observe(start.elapsed().as_secs_f64());

        if let Err(err) = &result {
            metrics::SOURCE_ERRORS
                .with_label_values(&[&self.name, error_type(err)])
                .inc();
        }

        result
    }
}

fn validate_quote(source: &str, quote: &SourceQuote) -> Result<()> {
    if quote.price <= 0.0 || !quote.price.is_finite() {
        return Err(Error::InvalidQuote {
            source_name: source.to_string(),
            reason: format!("non-positive price {}", quote.price),
        });
    }
    if quote.volume <= 0.0 || !quote.volume.is_finite() {
        return Err(Error::InvalidQuote {
            source_name: source.to_string(),
            reason: format!("non-positive volume {}", quote.volume),
        });
    }
    Ok(())
}

fn error_type(err: &Error) -> &'static str {
    match err {
        Error::CircuitOpen(_) => "circuit_open",
        Error::UnexpectedStatus { .. } => "bad_status",
        Error::InvalidQuote { .. } => "invalid_quote",
        _ => "request_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(price: f64, volume: f64) -> SourceQuote {
        SourceQuote {
            symbol: "btcusdt".to_string(),
            price,
            volume,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn rejects_non_positive_quotes() {
        assert!(validate_quote("x", &quote(100.0, 10.0)).is_ok());
        assert!(validate_quote("x", &quote(0.0, 10.0)).is_err());
        assert!(validate_quote("x", &quote(-1.0, 10.0)).is_err());
        assert!(validate_quote("x", &quote(100.0, 0.0)).is_err());
        assert!(validate_quote("x", &quote(f64::NAN, 10.0)).is_err());
    }
}
