use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::cache::PriceCache;
use crate::observability::metrics;
use crate::refresher::Refresher;
use crate::storage::PriceStore;
use crate::types::current_timestamp;
use crate::types::price::{time_ago, PricePoint};
use crate::types::tier::Tier;
use crate::universe::{is_well_formed_symbol, AssetUniverse};

/// Maximum acceptable age of cached or stored data before a read escalates
/// to a forced refresh.
const MAX_DATA_AGE_SECS: i64 = 300;

pub struct AppState {
    pub cache: Arc<dyn PriceCache>,
    pub storage: Arc<dyn PriceStore>,
    pub refresher: Arc<Refresher>,
    pub universe: Arc<AssetUniverse>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(service_info))
        .route("/metrics", get(metrics_text))
        .route("/prices/:asset", get(get_price))
        .route("/refresh/:asset", post(refresh_price))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "Price Aggregator API",
        "version": env!("CARGO_PKG_VERSION"),
        "features": [
            "Volume-weighted multi-source aggregation",
            "Tiered automatic refresh",
            "On-demand refresh escalation",
        ],
    }))
}

async fn metrics_text() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metrics::REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}

/// GET /prices/{asset}
async fn get_price(
    State(state): State<Arc<AppState>>,
    Path(asset): Path<String>,
) -> (StatusCode, Json<Value>) {
    let start = Instant::now();
    let (status, body) = read_price(&state, &asset).await;
    record_api_request("get_price", status, start);
    (status, Json(body))
}

/// POST /refresh/{asset}
async fn refresh_price(
    State(state): State<Arc<AppState>>,
    Path(asset): Path<String>,
) -> (StatusCode, Json<Value>) {
    let start = Instant::now();
    let (status, body) = do_refresh(&state, &asset).await;
    record_api_request("refresh_price", status, start);
    (status, Json(body))
}

/// The read path: cache first, store fallback with cache backfill, then a
/// conditional forced refresh when data is absent or stale beyond
/// tolerance. Stale data beats no data throughout.
async fn read_price(state: &AppState, raw_symbol: &str) -> (StatusCode, Value) {
    let symbol = match validate_symbol(state, raw_symbol) {
        Ok(symbol) => symbol,
        Err(response) => return response,
    };
    let tier = state.refresher.get_tier(&symbol).unwrap_or(Tier::Cold);
    metrics::ASSET_ACCESS
        .with_label_values(&[&symbol, tier.as_str()])
        .inc();

    let now = current_timestamp();
    let mut price_data: Option<PricePoint> = None;
    let mut needs_refresh = false;

    let cached = match state.cache.get(&symbol).await {
        Ok(cached) => cached,
        Err(e) => {
            // Treated as a miss; the store fallback below still runs.
            tracing::warn!("Cache read failed for {}: {}", symbol, e);
            None
        }
    };

    match cached {
        Some(point) => {
            metrics::CACHE_HITS.inc();
            // Hot and medium assets are on short auto-refresh cycles, so a
            // cache hit is trusted as-is; only cold hits get an age check.
            if tier == Tier::Cold && point.age_secs(now) > MAX_DATA_AGE_SECS {
                needs_refresh = true;
            }
            price_data = Some(point);
        }
        None => {
            metrics::CACHE_MISSES.inc();
            match state.storage.get(&symbol).await {
                Ok(Some(record)) => {
                    let point = record.to_point();
                    if let Err(e) = state.cache.set(&symbol, &point, tier).await {
                        tracing::warn!("Cache backfill failed for {}: {}", symbol, e);
                    }
                    // The scheduler clearly has not populated the cache
                    // recently, so every tier gets the staleness check here.
                    if point.age_secs(now) > MAX_DATA_AGE_SECS {
                        needs_refresh = true;
                    }
                    price_data = Some(point);
                }
                Ok(None) => needs_refresh = true,
                Err(e) => {
                    tracing::warn!("Storage read failed for {}: {}", symbol, e);
                    needs_refresh = true;
                }
            }
        }
    }

    if needs_refresh {
        match state.refresher.force_refresh(&symbol).await {
            Ok(()) => match state.cache.get(&symbol).await {
                Ok(Some(point)) => price_data = Some(point),
                Ok(None) | Err(_) => {
                    // Fall back to whatever was already held.
                }
            },
            Err(e) => {
                tracing::warn!("Forced refresh failed for {}: {}", symbol, e);
            }
        }
    }

    match price_data {
        Some(point) => (StatusCode::OK, price_response(&point, tier)),
        None => (
            StatusCode::NOT_FOUND,
            json!({"msg": "Price not available"}),
        ),
    }
}

async fn do_refresh(state: &AppState, raw_symbol: &str) -> (StatusCode, Value) {
    let symbol = match validate_symbol(state, raw_symbol) {
        Ok(symbol) => symbol,
        Err(response) => return response,
    };

    match state.refresher.force_refresh(&symbol).await {
        Ok(()) => (
            StatusCode::OK,
            json!({"message": format!("Price for {} refreshed", symbol)}),
        ),
        Err(e) => {
            tracing::warn!("Refresh request failed for {}: {}", symbol, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"msg": e.to_string()}),
            )
        }
    }
}

/// Reject malformed symbols with 400 and unknown symbols with 404 before
/// any network or storage I/O happens.
fn validate_symbol(
    state: &AppState,
    raw_symbol: &str,
) -> std::result::Result<String, (StatusCode, Value)> {
    if !is_well_formed_symbol(raw_symbol) {
        return Err((
            StatusCode::BAD_REQUEST,
            json!({"msg": "Invalid asset symbol"}),
        ));
    }
    let symbol = raw_symbol.to_lowercase();
    if !state.universe.contains(&symbol) {
        return Err((
            StatusCode::NOT_FOUND,
            json!({"msg": "Asset not supported"}),
        ));
    }
    Ok(symbol)
}

fn price_response(point: &PricePoint, tier: Tier) -> Value {
    let age = point.age_secs(current_timestamp());
    let last_updated = chrono::DateTime::from_timestamp(point.observed_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    json!({
        "asset": point.asset,
        "price": point.price,
        "last_updated": last_updated,
        "time_ago": time_ago(age),
        "refresh_tier": tier.as_str(),
    })
}

fn record_api_request(endpoint: &str, status: StatusCode, start: Instant) {
    metrics::API_REQUESTS
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
    metrics::API_REQUEST_DURATION
        .with_label_values(&[endpoint])
        .observe(start.elapsed().as_secs_f64());
}
