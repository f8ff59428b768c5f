//! Configuration types, built from environment variables.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Default gateway (bridge) URL.
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8082";

/// Default job-router REST API version.
const DEFAULT_API_VERSION: &str = "2024-01-18-preview";

/// Client-side configuration for a worker session.
#[derive(Debug, Clone)]
pub struct DeskConfig {
    /// Base URL of the routing bridge.
    pub gateway_url: String,
    /// Delay between offer queries.
    pub poll_interval: Duration,
    /// Maximum offer queries per polling session (`None` = unbounded).
    pub max_poll_attempts: Option<u32>,
    /// Wait after a successful accept before signalling completion.
    pub settle_delay: Duration,
    /// Per-request timeout for gateway calls.
    pub request_timeout: Duration,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            poll_interval: Duration::from_millis(3000),
            max_poll_attempts: Some(1200), // 1 hour at 3s
            settle_delay: Duration::from_millis(2000),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl DeskConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let gateway_url =
            std::env::var("DESK_GATEWAY_URL").unwrap_or_else(|_| defaults.gateway_url.clone());

        let poll_interval = env_parse::<u64>("DESK_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let max_poll_attempts = match env_parse::<u32>("DESK_MAX_POLL_ATTEMPTS")? {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.max_poll_attempts,
        };

        let settle_delay = env_parse::<u64>("DESK_SETTLE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.settle_delay);

        let request_timeout = env_parse::<u64>("DESK_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "DESK_POLL_INTERVAL_MS".into(),
                message: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            gateway_url,
            poll_interval,
            max_poll_attempts,
            settle_delay,
            request_timeout,
        })
    }
}

/// Fixed profile applied to every worker the bridge registers.
#[derive(Debug, Clone)]
pub struct WorkerProfile {
    pub capacity: u32,
    pub queue_id: String,
    pub channel_id: String,
    pub capacity_cost_per_job: u32,
    /// Extra labels merged next to the display name label.
    pub labels: Map<String, Value>,
}

impl Default for WorkerProfile {
    fn default() -> Self {
        Self {
            capacity: 1,
            queue_id: "queue-chat-human-agent".to_string(),
            channel_id: "chat".to_string(),
            capacity_cost_per_job: 1,
            labels: Map::new(),
        }
    }
}

/// Server-side configuration for the routing bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub port: u16,
    /// Job-router REST endpoint, e.g. `https://<resource>.communication.azure.com`.
    pub router_endpoint: String,
    pub access_token: Option<SecretString>,
    pub api_version: String,
    pub request_timeout: Duration,
    pub worker_profile: WorkerProfile,
}

impl BridgeConfig {
    /// Config pointing at `router_endpoint` with every other value defaulted.
    pub fn new(router_endpoint: impl Into<String>) -> Self {
        Self {
            port: 8082,
            router_endpoint: router_endpoint.into(),
            access_token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
            worker_profile: WorkerProfile::default(),
        }
    }

    /// Build config from environment variables.
    /// Fails if `ROUTER_ENDPOINT` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let router_endpoint = std::env::var("ROUTER_ENDPOINT")
            .map_err(|_| ConfigError::MissingEnvVar("ROUTER_ENDPOINT".into()))?;

        let mut config = Self::new(router_endpoint);

        if let Some(port) = env_parse::<u16>("BRIDGE_PORT")? {
            config.port = port;
        }
        config.access_token = std::env::var("ROUTER_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        if let Ok(version) = std::env::var("ROUTER_API_VERSION") {
            config.api_version = version;
        }
        if let Ok(queue_id) = std::env::var("BRIDGE_QUEUE_ID") {
            config.worker_profile.queue_id = queue_id;
        }
        if let Ok(raw) = std::env::var("BRIDGE_WORKER_LABELS") {
            config.worker_profile.labels = parse_labels(&raw)?;
        }

        Ok(config)
    }
}

/// Parse `key=value` pairs separated by commas. Numeric values become JSON numbers.
pub fn parse_labels(raw: &str) -> Result<Map<String, Value>, ConfigError> {
    let mut labels = Map::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "BRIDGE_WORKER_LABELS".into(),
                message: format!("expected key=value, got '{pair}'"),
            })?;
        let value = value.trim();
        let value = match value.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(value),
        };
        labels.insert(key.trim().to_string(), value);
    }
    Ok(labels)
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
