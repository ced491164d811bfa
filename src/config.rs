//! Runtime configuration, read from the environment (after `.env` is loaded by `dotenvy`).

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    pub lock_timeout: Duration,
    pub marketplace: MarketplaceConfig,
    pub sync: SyncConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub seller_id: String,
    pub api_key: String,
    pub api_secret: String,
    pub page_size: u32,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Scheduler period; `None` leaves syncing to the HTTP triggers.
    pub interval: Option<Duration>,
    pub lookback_days: i64,
    pub delete_missing: bool,
    pub delete_chunk_size: usize,
    pub product_chunk_size: usize,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared secret expected from the marketplace. Without it every delivery is refused.
    pub secret: Option<String>,
    pub header: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { interval: None, lookback_days: 14, delete_missing: true, delete_chunk_size: 500, product_chunk_size: 200 }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self { Self { secret: None, header: "x-api-key".to_string() } }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let marketplace = MarketplaceConfig {
            base_url: or("MARKETPLACE_BASE_URL", "https://apigw.trendyol.com"),
            seller_id: required("MARKETPLACE_SELLER_ID")?,
            api_key: required("MARKETPLACE_API_KEY")?,
            api_secret: required("MARKETPLACE_API_SECRET")?,
            page_size: number("MARKETPLACE_PAGE_SIZE", or("MARKETPLACE_PAGE_SIZE", "200"))?,
            max_concurrency: number("MARKETPLACE_MAX_CONCURRENCY", or("MARKETPLACE_MAX_CONCURRENCY", "4"))?,
            max_retries: number("MARKETPLACE_MAX_RETRIES", or("MARKETPLACE_MAX_RETRIES", "3"))?,
            retry_backoff: Duration::from_millis(number("MARKETPLACE_RETRY_BACKOFF_MS", or("MARKETPLACE_RETRY_BACKOFF_MS", "500"))?),
            timeout: Duration::from_secs(number("MARKETPLACE_TIMEOUT_SECS", or("MARKETPLACE_TIMEOUT_SECS", "30"))?),
        };

        let interval = match get("SYNC_INTERVAL_SECS") {
            Some(v) => match number::<u64>("SYNC_INTERVAL_SECS", v)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => None,
        };
        let sync = SyncConfig {
            interval,
            lookback_days: number("SYNC_LOOKBACK_DAYS", or("SYNC_LOOKBACK_DAYS", "14"))?,
            delete_missing: flag("SYNC_DELETE_MISSING", or("SYNC_DELETE_MISSING", "true"))?,
            delete_chunk_size: number("SYNC_DELETE_CHUNK_SIZE", or("SYNC_DELETE_CHUNK_SIZE", "500"))?,
            product_chunk_size: number("SYNC_PRODUCT_CHUNK_SIZE", or("SYNC_PRODUCT_CHUNK_SIZE", "200"))?,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port: number("PORT", or("PORT", "8083"))?,
            nats_url: get("NATS_URL"),
            lock_timeout: Duration::from_secs(number("LOCK_TIMEOUT_SECS", or("LOCK_TIMEOUT_SECS", "30"))?),
            marketplace,
            sync,
            webhook: WebhookConfig {
                secret: get("WEBHOOK_SECRET"),
                header: or("WEBHOOK_HEADER", "x-api-key").to_lowercase(),
            },
        })
    }
}

fn number<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid { var, value })
}

fn flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("DATABASE_URL", "postgres://localhost/backoffice"),
        ("MARKETPLACE_SELLER_ID", "12345"),
        ("MARKETPLACE_API_KEY", "key"),
        ("MARKETPLACE_API_SECRET", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.marketplace.page_size, 200);
        assert_eq!(config.marketplace.retry_backoff, Duration::from_millis(500));
        assert!(config.sync.interval.is_none());
        assert!(config.sync.delete_missing);
        assert_eq!(config.webhook.header, "x-api-key");
        assert!(config.webhook.secret.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([("SYNC_INTERVAL_SECS", "600"), ("SYNC_DELETE_MISSING", "no"), ("WEBHOOK_HEADER", "X-Secret")]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.sync.interval, Some(Duration::from_secs(600)));
        assert!(!config.sync.delete_missing);
        assert_eq!(config.webhook.header, "x-secret");
    }

    #[test]
    fn test_errors() {
        assert_eq!(Config::from_lookup(lookup(&REQUIRED[1..])).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        assert_eq!(
            Config::from_lookup(lookup(&pairs)).unwrap_err(),
            ConfigError::Invalid { var: "PORT", value: "eighty".into() }
        );
    }
}
