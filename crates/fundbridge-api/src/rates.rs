use std::sync::Arc;
use std::time::Duration;

use axum::{Json, extract::State};
use serde_json::Value;
use tracing::{info, warn};

use fundbridge_core::currency::MntRate;
use fundbridge_core::rate::{LiveRate, RateProvider};
use fundbridge_types::api::RateResponse;

use crate::error::{ServiceError, check_status};
use crate::state::AppState;

const SERVICE: &str = "Rate feed";

pub async fn current(State(state): State<AppState>) -> Json<RateResponse> {
    Json(RateResponse {
        mnt_per_eth: state.rate.current_rate().get(),
        source: state.rate.source().to_string(),
    })
}

/// Accepts CoinGecko's `{"ethereum":{"mnt":…}}` or a flat `{"rate":…}`.
pub fn extract_rate(body: &Value) -> Option<f64> {
    body.pointer("/ethereum/mnt")
        .or_else(|| body.get("rate"))
        .and_then(Value::as_f64)
}

pub async fn fetch_rate(http: &reqwest::Client, url: &str) -> Result<MntRate, ServiceError> {
    let resp = http.get(url).send().await.map_err(ServiceError::transport(SERVICE))?;
    let body: Value = check_status(SERVICE, resp)
        .await?
        .json()
        .await
        .map_err(ServiceError::transport(SERVICE))?;

    let raw = extract_rate(&body).ok_or_else(|| ServiceError::malformed(SERVICE, "no ETH/MNT rate in response"))?;
    MntRate::new(raw).map_err(|e| ServiceError::malformed(SERVICE, e.to_string()))
}

/// Refreshes the live rate forever. A failed poll keeps the previous value.
pub async fn run_rate_poller(live: Arc<LiveRate>, http: reqwest::Client, url: String, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match fetch_rate(&http, &url).await {
            Ok(rate) => {
                live.update(rate);
                info!("ETH/MNT rate updated to {}", rate.get());
            }
            Err(e) => warn!("Rate poll failed, keeping previous rate: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_coingecko_shape() {
        assert_eq!(extract_rate(&json!({"ethereum": {"mnt": 11_850_000.5}})), Some(11_850_000.5));
    }

    #[test]
    fn reads_flat_shape() {
        assert_eq!(extract_rate(&json!({"rate": 6000000})), Some(6_000_000.0));
    }

    #[test]
    fn rejects_other_shapes() {
        assert_eq!(extract_rate(&json!({"ethereum": {"usd": 3000}})), None);
        assert_eq!(extract_rate(&json!({"rate": "6000000"})), None);
    }
}
