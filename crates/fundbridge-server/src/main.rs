mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use fundbridge_api::google::GoogleClient;
use fundbridge_api::mailer::{LogMailer, Mailer, SmtpMailer};
use fundbridge_api::pinata::PinataClient;
use fundbridge_api::qpay::QpayClient;
use fundbridge_api::rates::run_rate_poller;
use fundbridge_api::state::{AppState, AppStateInner};
use fundbridge_api::stripe::StripeClient;
use fundbridge_chain::{Contracts, RpcClient};
use fundbridge_core::rate::{FixedRate, LiveRate, RateProvider};
use fundbridge_core::token::format_address;
use fundbridge_db::Database;

use crate::config::Config;

/// How often expired verification codes are purged.
const OTP_PURGE_INTERVAL_SECS: u64 = 600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fundbridge=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;

    // Chain
    let http = reqwest::Client::builder().timeout(config.request_timeout).build()?;
    let rpc = Arc::new(RpcClient::new(config.rpc_url.clone(), config.request_timeout)?);
    let signer = config.signer.map(Arc::new);
    match &signer {
        Some(s) => info!("Audit log writes signed by {}", format_address(&s.address())),
        None => info!("PRIVATE_KEY not set; audit log writes are disabled"),
    }
    let contracts = Contracts::new(rpc.clone(), &config.contracts, signer)?;
    match rpc.chain_id().await {
        Ok(id) => info!("Connected to chain {} at {}", id, rpc.url()),
        Err(e) => warn!("Chain at {} unreachable at startup: {}", rpc.url(), e),
    }

    // Exchange rate
    let rate: Arc<dyn RateProvider> = match &config.rate_url {
        Some(url) => {
            let live = Arc::new(LiveRate::new(config.mnt_per_eth));
            tokio::spawn(run_rate_poller(live.clone(), http.clone(), url.clone(), config.rate_poll));
            info!("Polling ETH/MNT rate from {} every {:?}", url, config.rate_poll);
            live
        }
        None => Arc::new(FixedRate(config.mnt_per_eth)),
    };

    // Third-party services
    let stripe = config
        .stripe
        .map(|s| StripeClient::new(http.clone(), s.secret_key, s.publishable_key, s.webhook_secret));
    let pinata = config
        .pinata
        .map(|p| PinataClient::new(http.clone(), p.api_key, p.secret_api_key));
    let qpay = config.qpay.map(|q| QpayClient::new(http.clone(), q));
    let google = config.google.map(|g| GoogleClient::new(http.clone(), g));
    info!(
        stripe = stripe.is_some(),
        pinata = pinata.is_some(),
        qpay = qpay.is_some(),
        google = google.is_some(),
        "Optional services"
    );

    // Mail
    let mailer: Arc<dyn Mailer> = match config.smtp {
        Some(smtp) => {
            info!("Sending mail through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            warn!("EMAIL_USER/EMAIL_PASS not set; verification codes are only logged, never delivered");
            Arc::new(LogMailer::new(config.email_from))
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        rpc,
        contracts,
        rate,
        http,
        ipfs_gateway: config.ipfs_gateway,
        otp_ttl_secs: config.otp_ttl_secs,
        mailer,
        stripe,
        pinata,
        qpay,
        google,
    });

    tokio::spawn(cleanup::run_otp_purge_loop(state.clone(), OTP_PURGE_INTERVAL_SECS));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = fundbridge_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("FundBridge server listening on {} (public URL {})", addr, config.public_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
