//! Runtime configuration loaded from environment variables.
//!
//! | Variable                  | Default                      |
//! |---------------------------|------------------------------|
//! | `DECK_LOG_DIR`            | `<tmp>/agent-gateway`        |
//! | `DECK_LOG_PREFIX`         | `gateway`                    |
//! | `DECK_POLL_MS`            | `500`                        |
//! | `DECK_GATEWAY_URL`        | `ws://127.0.0.1:18789`       |
//! | `DECK_GATEWAY_TOKEN`      | unset                        |
//! | `DECK_CALL_TIMEOUT_MS`    | `10000`                      |
//! | `DECK_RECONNECT_MS`       | `3000`                       |
//! | `DECK_CONNECT_TIMEOUT_MS` | `10000`                      |
//! | `DECK_AGENTS`             | `main,samwise,frodo,gandalf` |
//! | `DECK_PORT`               | `3010`                       |
//!
//! Security settings (`DECK_API_KEY`, `DECK_CORS_ORIGINS`) live in
//! [`crate::api::middleware::SecurityConfig`].

use std::path::PathBuf;
use std::time::Duration;

use mission_deck_core::Roster;
use thiserror::Error;
use url::Url;

pub const DEFAULT_PORT: u16 = 3010;
const DEFAULT_GATEWAY_URL: &str = "ws://127.0.0.1:18789";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid gateway url {url:?}: {source}")]
    GatewayUrl { url: String, source: url::ParseError },

    #[error("gateway url must use ws:// or wss://, got {0}")]
    GatewayScheme(String),
}

/// Where the log lives and how often to look at it.
#[derive(Debug, Clone)]
pub struct TailConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub poll_interval: Duration,
}

/// Control channel settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: Url,
    /// Sent as a bearer token on the WebSocket upgrade.
    pub token: Option<String>,
    pub call_timeout: Duration,
    pub reconnect_delay: Duration,
    /// Upper bound on one connect attempt, TCP and upgrade included.
    pub connect_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            call_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tail: TailConfig,
    pub gateway: GatewayConfig,
    pub roster: Roster,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dir = std::env::var("DECK_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("agent-gateway"));
        let prefix = std::env::var("DECK_LOG_PREFIX").unwrap_or_else(|_| "gateway".to_string());

        let gateway_url =
            std::env::var("DECK_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let mut gateway = GatewayConfig::new(parse_gateway_url(&gateway_url)?);
        gateway.token = std::env::var("DECK_GATEWAY_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        gateway.call_timeout = env_millis("DECK_CALL_TIMEOUT_MS").unwrap_or(gateway.call_timeout);
        gateway.reconnect_delay =
            env_millis("DECK_RECONNECT_MS").unwrap_or(gateway.reconnect_delay);
        gateway.connect_timeout =
            env_millis("DECK_CONNECT_TIMEOUT_MS").unwrap_or(gateway.connect_timeout);

        let roster = std::env::var("DECK_AGENTS")
            .map(|list| Roster::parse(&list))
            .unwrap_or_default();

        let port = std::env::var("DECK_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            tail: TailConfig {
                dir,
                prefix,
                poll_interval: env_millis("DECK_POLL_MS").unwrap_or(Duration::from_millis(500)),
            },
            gateway,
            roster,
            port,
        })
    }
}

/// Parse and check a control channel URL.
pub fn parse_gateway_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::GatewayUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::GatewayScheme(other.to_string())),
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_websocket_urls() {
        assert!(parse_gateway_url("ws://127.0.0.1:18789").is_ok());
        assert!(parse_gateway_url("wss://gateway.example.com/ws").is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(matches!(
            parse_gateway_url("http://127.0.0.1:18789"),
            Err(ConfigError::GatewayScheme(s)) if s == "http"
        ));
        assert!(matches!(
            parse_gateway_url("not a url"),
            Err(ConfigError::GatewayUrl { .. })
        ));
    }

    #[test]
    fn gateway_defaults() {
        let config = GatewayConfig::new(parse_gateway_url(DEFAULT_GATEWAY_URL).unwrap());
        assert_eq!(config.call_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.token.is_none());
    }
}
