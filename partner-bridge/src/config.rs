//! Configuration module for environment variable parsing.
//!
//! Every setting has a default so the service starts with an empty
//! environment and talks to a counterpart on localhost.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::ledger::DEFAULT_MAX_EVENTS;

/// Events requested at registration when `SUBSCRIBED_EVENTS` is unset.
pub const DEFAULT_SUBSCRIBED_EVENTS: &[&str] = &[
    "payment.created",
    "payment.succeeded",
    "payment.failed",
    "payment.refunded",
];

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub host: String,

    /// Port the HTTP server listens on
    pub port: u16,

    /// Route receiving inbound webhooks
    pub webhook_path: String,

    /// Base URL the counterpart uses to reach this service
    pub public_base_url: String,

    /// Counterpart reservation service (registration, inbound webhooks)
    pub counterpart_url: String,

    /// Counterpart payment service (health probe only)
    pub counterpart_payment_url: String,

    /// Bound on a single outbound delivery, in milliseconds
    pub send_timeout_ms: u64,

    /// Bound on a single counterpart health probe, in milliseconds
    pub health_timeout_ms: u64,

    /// Ledger cap per sequence
    pub max_events: usize,

    /// Events requested at registration
    pub subscribed_events: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port: u16 = parse_number("PORT", 8088);

        Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port,

            webhook_path: parse_path("WEBHOOK_PATH", "/api/webhook"),

            public_base_url: parse_url("PUBLIC_BASE_URL", &format!("http://localhost:{port}")),

            counterpart_url: parse_url("COUNTERPART_URL", "http://localhost:3000"),

            counterpart_payment_url: parse_url("COUNTERPART_PAYMENT_URL", "http://localhost:8000"),

            send_timeout_ms: parse_timeout_ms("SEND_TIMEOUT_MS", 10_000),

            health_timeout_ms: parse_timeout_ms("HEALTH_TIMEOUT_MS", 5_000),

            max_events: parse_number("MAX_EVENTS", DEFAULT_MAX_EVENTS),

            subscribed_events: parse_csv("SUBSCRIBED_EVENTS")
                .filter(|events| !events.is_empty())
                .unwrap_or_else(|| {
                    DEFAULT_SUBSCRIBED_EVENTS
                        .iter()
                        .map(|e| e.to_string())
                        .collect()
                }),
        }
    }

    /// URL the counterpart should deliver webhooks to.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}{}",
            self.public_base_url.trim_end_matches('/'),
            self.webhook_path
        )
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// Read an absolute http(s) URL, falling back to `default` when invalid.
fn parse_url(name: &str, default: &str) -> String {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default.to_string(),
    };

    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            raw.trim().trim_end_matches('/').to_string()
        }
        _ => {
            warn!(env_var = name, value = %raw, "Invalid URL, using default");
            default.to_string()
        }
    }
}

/// Read a number, falling back to `default` when unset or unparseable.
fn parse_number<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            warn!(env_var = name, value = %raw, error = %e, "Invalid number, using default");
            default
        }
    }
}

/// Read a timeout in milliseconds. Zero would expire every call at once.
fn parse_timeout_ms(name: &str, default: u64) -> u64 {
    match parse_number(name, default) {
        0 => {
            warn!(env_var = name, "Timeout must be positive, using default");
            default
        }
        ms => ms,
    }
}

/// Read a route path, forcing a leading slash.
fn parse_path(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => {
            let v = v.trim();
            if v.starts_with('/') {
                v.to_string()
            } else {
                format!("/{v}")
            }
        }
        _ => default.to_string(),
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_valid() {
        env::set_var("TEST_PB_URL_VALID", "https://counterpart.example.com/");
        let result = parse_url("TEST_PB_URL_VALID", "http://default");
        assert_eq!(result, "https://counterpart.example.com");
        env::remove_var("TEST_PB_URL_VALID");
    }

    #[test]
    fn test_parse_url_invalid_uses_default() {
        env::set_var("TEST_PB_URL_INVALID", "not a url");
        assert_eq!(
            parse_url("TEST_PB_URL_INVALID", "http://default"),
            "http://default"
        );
        env::set_var("TEST_PB_URL_INVALID", "ftp://files.example.com");
        assert_eq!(
            parse_url("TEST_PB_URL_INVALID", "http://default"),
            "http://default"
        );
        env::remove_var("TEST_PB_URL_INVALID");
    }

    #[test]
    fn test_parse_number() {
        env::set_var("TEST_PB_NUMBER", " 9090 ");
        assert_eq!(parse_number::<u16>("TEST_PB_NUMBER", 8088), 9090);
        env::set_var("TEST_PB_NUMBER", "eighty");
        assert_eq!(parse_number::<u16>("TEST_PB_NUMBER", 8088), 8088);
        env::set_var("TEST_PB_NUMBER", "70000");
        assert_eq!(parse_number::<u16>("TEST_PB_NUMBER", 8088), 8088);
        env::remove_var("TEST_PB_NUMBER");
        assert_eq!(parse_number::<usize>("TEST_PB_NUMBER", 100), 100);
    }

    #[test]
    fn test_parse_timeout_rejects_zero() {
        env::set_var("TEST_PB_TIMEOUT", "0");
        assert_eq!(parse_timeout_ms("TEST_PB_TIMEOUT", 10_000), 10_000);
        env::set_var("TEST_PB_TIMEOUT", "250");
        assert_eq!(parse_timeout_ms("TEST_PB_TIMEOUT", 10_000), 250);
        env::set_var("TEST_PB_TIMEOUT", "-5");
        assert_eq!(parse_timeout_ms("TEST_PB_TIMEOUT", 10_000), 10_000);
        env::remove_var("TEST_PB_TIMEOUT");
    }

    #[test]
    fn test_parse_path_adds_slash() {
        env::set_var("TEST_PB_PATH", "hooks/in");
        assert_eq!(parse_path("TEST_PB_PATH", "/api/webhook"), "/hooks/in");
        env::remove_var("TEST_PB_PATH");
        assert_eq!(parse_path("TEST_PB_PATH", "/api/webhook"), "/api/webhook");
    }

    #[test]
    fn test_parse_csv() {
        env::set_var("TEST_PB_CSV", "payment.created, payment.failed,,");
        let result = parse_csv("TEST_PB_CSV");
        assert_eq!(
            result,
            Some(vec![
                "payment.created".to_string(),
                "payment.failed".to_string()
            ])
        );
        env::remove_var("TEST_PB_CSV");
    }

    #[test]
    fn test_webhook_url() {
        let config = Config {
            host: "0.0.0.0".to_string(),
            port: 8088,
            webhook_path: "/api/webhook".to_string(),
            public_base_url: "http://localhost:8088/".to_string(),
            counterpart_url: "http://localhost:3000".to_string(),
            counterpart_payment_url: "http://localhost:8000".to_string(),
            send_timeout_ms: 10_000,
            health_timeout_ms: 5_000,
            max_events: 100,
            subscribed_events: vec![],
        };
        assert_eq!(config.webhook_url(), "http://localhost:8088/api/webhook");
        assert_eq!(config.send_timeout(), Duration::from_secs(10));
    }
}
