use std::time::Duration;

use tracing::{info, warn};

use fundbridge_api::state::AppState;

/// Background task that deletes expired one-time codes.
///
/// Expired codes are already rejected on verify; this keeps the table from
/// growing with codes nobody ever submitted.
pub async fn run_otp_purge_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db_state = state.clone();
        let now = chrono::Utc::now().timestamp();
        match tokio::task::spawn_blocking(move || db_state.db.purge_expired_otps(now)).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Cleanup: purged {} expired verification codes", count);
                }
            }
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task panicked: {}", e),
        }
    }
}
