pub mod loader;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Fetch-side knobs: the shared HTTP client timeout and the per-source
/// circuit breaker parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct FetchConfig {
    pub request_timeout_secs: u64,
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
    pub half_open_max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            request_timeout_secs: 5,
            failure_threshold: 5,
            reset_timeout_secs: 30,
            half_open_max_retries: 2,
        }
    }
}
