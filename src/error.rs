use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Fetch errors
    #[error("asset not supported: {0}")]
    AssetNotSupported(String),

    #[error("no valid data received from any source for {asset}: {failures}")]
    NoValidData { asset: String, failures: String },

    #[error("total volume is zero for {0}, cannot calculate weighted average")]
    ZeroVolume(String),

    #[error("circuit breaker is open for source {0}")]
    CircuitOpen(String),

    #[error("request to source {source_name} failed: {message}")]
    SourceRequest { source_name: String, message: String },

    #[error("unexpected status code {status} from source {source_name}")]
    UnexpectedStatus { source_name: String, status: u16 },

    #[error("invalid quote from source {source_name}: {reason}")]
    InvalidQuote { source_name: String, reason: String },

    // Cache / storage errors
    #[error("cache error: {0}")]
    Cache(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // System errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
