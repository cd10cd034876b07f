use config::{Config, Environment, File};
use serde::Deserialize;

use crate::config::{FetchConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::fetcher::SourceConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default = "default_symbols_file")]
    pub symbols_file: String,
    pub sources: Vec<SourceConfig>,
}

fn default_symbols_file() -> String {
    "symbols.csv".to_string()
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("PRICE_AGGREGATOR").separator("__"))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))
    }
}
