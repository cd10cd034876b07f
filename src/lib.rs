pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod observability;
pub mod refresher;
pub mod storage;
pub mod types;
pub mod universe;
