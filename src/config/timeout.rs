//! Time window and scheduler configuration.
//!
//! The payment window is per-offer (sellers publish their own limit);
//! everything else here is platform policy, overridable via env.

use std::time::Duration;

/// Timeout configuration (deadlines and polling intervals)
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// How often the deadline monitor polls for due deadlines (default: 30s)
    pub poll_interval_secs: u64,
    /// Seller confirmation window after the buyer marks payment sent,
    /// before auto-escalation to dispute (default: 6h)
    pub confirmation_window_secs: i64,
    /// How long before payment-window expiry to warn the buyer (default: 10min)
    pub warning_threshold_secs: i64,
    /// How long after an order turns terminal its chat stays writable
    /// for dispute evidence (default: 30 days)
    pub chat_retention_secs: i64,
    /// Buyer share applied when an arbiter resolves SPLIT without an
    /// explicit ratio, in basis points (default: 5000 = 50/50)
    pub default_split_buyer_bps: i32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            confirmation_window_secs: 6 * 3600,
            warning_threshold_secs: 600,
            chat_retention_secs: 30 * 86400,
            default_split_buyer_bps: 5000,
        }
    }
}

impl TimeoutConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval_secs: env_parse("DEADLINE_POLL_INTERVAL_SECS", defaults.poll_interval_secs),
            confirmation_window_secs: env_parse(
                "CONFIRMATION_WINDOW_SECS",
                defaults.confirmation_window_secs,
            ),
            warning_threshold_secs: env_parse(
                "PAYMENT_WARNING_THRESHOLD_SECS",
                defaults.warning_threshold_secs,
            ),
            chat_retention_secs: env_parse("CHAT_RETENTION_SECS", defaults.chat_retention_secs),
            default_split_buyer_bps: env_parse(
                "DEFAULT_SPLIT_BUYER_BPS",
                defaults.default_split_buyer_bps,
            ),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
