use std::time::Duration;

use log::*;
use plg_common::Secret;

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RATE_LIMIT: u32 = 100;
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub base_url: String,
    /// The merchant secret key. It authenticates API calls and signs webhook deliveries.
    pub secret_key: Secret<String>,
    pub timeout: Duration,
    /// Maximum number of successful calls per endpoint inside `rate_window`.
    pub rate_limit: u32,
    pub rate_window: Duration,
    /// How many times a failed read (verify) is retried before giving up.
    pub verify_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            verify_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl PaystackConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("PLG_PAYSTACK_BASE_URL").unwrap_or_else(|_| {
            info!("PLG_PAYSTACK_BASE_URL not set, using {DEFAULT_BASE_URL}");
            DEFAULT_BASE_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("PLG_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("PLG_PAYSTACK_SECRET_KEY not set. The payment gateway will be unavailable.");
            String::default()
        }));
        let timeout = env_number("PLG_PAYSTACK_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let rate_limit = env_number("PLG_PAYSTACK_RATE_LIMIT", u64::from(DEFAULT_RATE_LIMIT));
        let rate_limit = u32::try_from(rate_limit).unwrap_or(DEFAULT_RATE_LIMIT);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
            timeout: Duration::from_secs(timeout),
            rate_limit,
            ..Default::default()
        }
    }

    pub fn with_secret_key(mut self, key: &str) -> Self {
        self.secret_key = Secret::new(key.to_string());
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

fn env_number(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(s) => s.parse::<u64>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
