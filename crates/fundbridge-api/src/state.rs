use std::sync::Arc;

use fundbridge_chain::{Contracts, RpcClient};
use fundbridge_core::rate::RateProvider;
use fundbridge_db::Database;
use tracing::error;

use crate::error::ApiError;
use crate::google::GoogleClient;
use crate::mailer::Mailer;
use crate::pinata::PinataClient;
use crate::qpay::QpayClient;
use crate::stripe::StripeClient;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub rpc: Arc<RpcClient>,
    pub contracts: Contracts,
    pub rate: Arc<dyn RateProvider>,
    /// Shared client for gateway reads; the service clients carry their own clone.
    pub http: reqwest::Client,
    pub ipfs_gateway: String,
    pub otp_ttl_secs: i64,
    pub mailer: Arc<dyn Mailer>,
    pub stripe: Option<StripeClient>,
    pub pinata: Option<PinataClient>,
    pub qpay: Option<QpayClient>,
    pub google: Option<GoogleClient>,
}

impl AppStateInner {
    pub fn stripe(&self) -> Result<&StripeClient, ApiError> {
        self.stripe.as_ref().ok_or(ApiError::NotConfigured("Stripe"))
    }

    pub fn pinata(&self) -> Result<&PinataClient, ApiError> {
        self.pinata.as_ref().ok_or(ApiError::NotConfigured("Pinata"))
    }

    pub fn qpay(&self) -> Result<&QpayClient, ApiError> {
        self.qpay.as_ref().ok_or(ApiError::NotConfigured("QPay"))
    }

    pub fn google(&self) -> Result<&GoogleClient, ApiError> {
        self.google.as_ref().ok_or(ApiError::NotConfigured("Google sign-in"))
    }
}

/// Runs a database call off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("database task failed"))
        })?
        .map_err(ApiError::Internal)
}
