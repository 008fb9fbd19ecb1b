use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_token: String,
    pub calendar_view: String,
    pub resync_delay: Duration,
    pub resync_debounce: Duration,
    pub tombstone_ttl: Duration,
    pub cache_ttl: Duration,
    pub retry_max: usize,
    pub retry_base_delay: Duration,
    pub lock_timeout: Duration,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4000/api".to_string()),
            api_token: env::var("API_TOKEN").unwrap_or_default(),
            calendar_view: env::var("CALENDAR_VIEW").unwrap_or_else(|_| "week".to_string()),
            resync_delay: Duration::from_millis(parse_or("RESYNC_DELAY_MS", 2000)),
            resync_debounce: Duration::from_millis(parse_or("RESYNC_DEBOUNCE_MS", 450)),
            tombstone_ttl: Duration::from_secs(parse_or("TOMBSTONE_TTL_SECS", 300)),
            cache_ttl: Duration::from_secs(parse_or("CACHE_TTL_SECS", 120)),
            retry_max: parse_or("RETRY_MAX", 2),
            retry_base_delay: Duration::from_millis(parse_or("RETRY_BASE_DELAY_MS", 500)),
            lock_timeout: Duration::from_millis(parse_or("LOCK_TIMEOUT_MS", 30_000)),
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 15)),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
