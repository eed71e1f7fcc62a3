use std::time::Duration;

use gemini_engine::DEFAULT_BASE_URL;
use tracing::warn;

const DEFAULT_RATE_LIMIT_DELAY_SECS: u64 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Runtime settings, read once at start and handed to the fetcher and notifier.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub webhook_url: Option<String>,
    pub gemini_base_url: String,
    pub rate_limit_delay: Duration,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "<redacted>"))
            .field("gemini_base_url", &self.gemini_base_url)
            .field("rate_limit_delay", &self.rate_limit_delay)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            webhook_url: None,
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_delay: Duration::from_secs(DEFAULT_RATE_LIMIT_DELAY_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            webhook_url: get("FEISHU_WEBHOOK_URL"),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            rate_limit_delay: Duration::from_secs(parse_secs(
                "RATE_LIMIT_DELAY_SECS",
                get("RATE_LIMIT_DELAY_SECS"),
                DEFAULT_RATE_LIMIT_DELAY_SECS,
            )),
            http_timeout: Duration::from_secs(parse_secs(
                "HTTP_TIMEOUT_SECS",
                get("HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
        }
    }
}

fn parse_secs(key: &str, raw: Option<String>, default: u64) -> u64 {
    match raw {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(key, value = %value, default, "Invalid number of seconds, using default");
            default
        }),
    }
}
