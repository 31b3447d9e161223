use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::info;

use crate::currency::MntRate;

/// The single source of the ETH -> MNT rate, injected into whatever renders amounts.
pub trait RateProvider: Send + Sync {
    fn current_rate(&self) -> MntRate;

    /// Where the current value came from, for display.
    fn source(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub MntRate);

impl RateProvider for FixedRate {
    fn current_rate(&self) -> MntRate {
        self.0
    }

    fn source(&self) -> &'static str {
        "fixed"
    }
}

/// Rate updated by a background poller. Serves the fallback until the
/// first successful update, and keeps the last good value after that.
#[derive(Debug)]
pub struct LiveRate {
    bits: AtomicU64,
    updated: AtomicBool,
}

impl LiveRate {
    pub fn new(fallback: MntRate) -> Self {
        Self {
            bits: AtomicU64::new(fallback.get().to_bits()),
            updated: AtomicBool::new(false),
        }
    }

    pub fn update(&self, rate: MntRate) {
        self.bits.store(rate.get().to_bits(), Ordering::Relaxed);
        if !self.updated.swap(true, Ordering::Relaxed) {
            info!(rate = rate.get(), "Switched to live exchange rate");
        }
    }
}

impl RateProvider for LiveRate {
    fn current_rate(&self) -> MntRate {
        let value = f64::from_bits(self.bits.load(Ordering::Relaxed));
        // Only validated rates are ever stored.
        MntRate::new(value).unwrap_or_default()
    }

    fn source(&self) -> &'static str {
        if self.updated.load(Ordering::Relaxed) { "live" } else { "fixed" }
    }
}
