//! HTTP surface of FundBridge: accounts, KYC, payments, IPFS pinning,
//! notifications, and read/transaction-building routes over the contracts.

pub mod audit_log;
pub mod auth;
pub mod campaigns;
pub mod error;
pub mod google;
pub mod ipfs;
pub mod kyc;
pub mod mailer;
pub mod marketplace;
pub mod middleware;
pub mod notifications;
pub mod payment;
pub mod pinata;
pub mod qpay;
pub mod rates;
pub mod state;
pub mod stripe;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tracing::debug;

use fundbridge_core::rate::RateProvider;

use crate::middleware::require_auth;
use crate::state::AppState;

/// All `/api` routes. CORS and tracing layers are added by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/google", get(auth::google_start))
        .route("/api/auth/google/callback", get(auth::google_callback))
        .route("/api/payment/webhook", post(payment::stripe_webhook))
        .route("/api/payment/qpay/callback", get(payment::qpay_callback))
        .route("/api/payment/config", get(payment::config))
        .route("/api/pinata/{cid}", get(ipfs::get_metadata))
        .route("/api/audit-log", get(audit_log::list))
        .route("/api/audit-log/count", get(audit_log::count))
        .route("/api/audit-log/{id}", get(audit_log::get))
        .route("/api/campaigns", get(campaigns::list))
        .route("/api/campaigns/{id}", get(campaigns::get))
        .route("/api/campaigns/{id}/donations", get(campaigns::donations))
        .route("/api/marketplace/items", get(marketplace::list_items))
        .route("/api/marketplace/items/{id}", get(marketplace::get_item))
        .route("/api/rate", get(rates::current))
        .route("/api/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/wallet", put(auth::link_wallet))
        .route("/api/kyc/send-otp", post(kyc::send_otp))
        .route("/api/kyc/verify-otp", post(kyc::verify_otp))
        .route("/api/kyc/identity-session", post(kyc::identity_session))
        .route("/api/kyc/mark-verified", post(kyc::mark_verified))
        .route("/api/kyc/status", get(kyc::status))
        .route("/api/payment/intent", post(payment::create_intent))
        .route("/api/payment/qpay", post(payment::create_qpay_invoice))
        .route("/api/payment/card", post(payment::create_card))
        .route("/api/payment/fiat", post(payment::create_fiat))
        .route("/api/payment/history", get(payment::history))
        .route("/api/pinata", post(ipfs::pin_metadata))
        .route(
            "/api/pinata/file",
            post(ipfs::pin_file).layer(DefaultBodyLimit::max(ipfs::MAX_FILE_BYTES)),
        )
        .route("/api/audit-log", post(audit_log::add))
        .route("/api/notifications", get(notifications::list).post(notifications::create))
        .route("/api/notifications/unread-count", get(notifications::unread_count))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .route("/api/campaigns/tx", post(campaigns::build_tx))
        .route("/api/marketplace/tx", post(marketplace::build_tx))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let chain = match state.rpc.block_number().await {
        Ok(block) => json!({ "reachable": true, "block_number": block }),
        Err(e) => {
            debug!("Health check could not reach {}: {}", state.rpc.url(), e);
            json!({ "reachable": false })
        }
    };

    Json(json!({
        "status": "ok",
        "chain": chain,
        "rate_source": state.rate.source(),
    }))
}
