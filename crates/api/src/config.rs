//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{KafkaSettings, TlsError, TlsIdentity};
use consumer::{CommitPolicy, ConsumerConfig};
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set to a value that could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    /// The mutual-TLS identity could not be loaded.
    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Where product records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    InMemory,
    Postgres { url: String },
}

impl StorageMode {
    /// Label reported by the health endpoint.
    pub fn label(&self) -> &'static str {
        match self {
            StorageMode::InMemory => "in-memory",
            StorageMode::Postgres { .. } => "postgres",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Kafka topics and client settings.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub enabled: bool,
    pub brokers: String,
    pub group_id: String,
    pub order_topic: String,
    pub compensation_topic: String,
    pub stock_deducted_topic: Option<String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            brokers: "localhost:9092".to_string(),
            group_id: "inventory-service".to_string(),
            order_topic: "order-events".to_string(),
            compensation_topic: "stock-compensation".to_string(),
            stock_deducted_topic: None,
        }
    }
}

/// PEM locations for mutual TLS on the broker connection.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub ca_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

/// Service configuration with sensible defaults.
///
/// See [`Config::from_env`] for the variables that are read.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub storage: StorageMode,
    pub database_max_connections: u32,
    pub kafka: KafkaConfig,
    pub consumer: ConsumerConfig,
    pub tls: TlsConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// - `HOST`, `PORT`: bind address (default `0.0.0.0:8080`)
    /// - `LOG_LEVEL`, `LOG_FORMAT`: filter and `pretty`/`json` output
    /// - `LOCAL_MODE`, `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`: storage selection
    /// - `KAFKA_*`: stream consumption and publishing
    /// - `CONSUMER_*`: poll timeout and commit policy
    /// - `TLS_*`: mutual TLS for the broker connection
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let local_mode = parse_or(&var, "LOCAL_MODE", false, parse_bool)?;
        let storage = match var("DATABASE_URL") {
            Some(url) if !local_mode => StorageMode::Postgres { url },
            _ => StorageMode::InMemory,
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid("LOG_FORMAT", other)),
        };

        let kafka = KafkaConfig {
            enabled: parse_or(&var, "KAFKA_ENABLED", false, parse_bool)?,
            brokers: var("KAFKA_BROKERS").unwrap_or(defaults.kafka.brokers),
            group_id: var("KAFKA_GROUP_ID").unwrap_or(defaults.kafka.group_id),
            order_topic: var("KAFKA_ORDER_TOPIC").unwrap_or(defaults.kafka.order_topic),
            compensation_topic: var("KAFKA_COMPENSATION_TOPIC")
                .unwrap_or(defaults.kafka.compensation_topic),
            stock_deducted_topic: var("KAFKA_STOCK_DEDUCTED_TOPIC"),
        };

        let poll_timeout_ms = parse_or(&var, "CONSUMER_POLL_TIMEOUT_MS", 1000, |v| v.parse().ok())?;
        let max_attempts = parse_or(&var, "CONSUMER_MAX_ATTEMPTS", 3, |v| v.parse().ok())?;
        let retry_backoff_ms = parse_or(&var, "CONSUMER_RETRY_BACKOFF_MS", 200, |v| v.parse().ok())?;
        let idempotency_window = parse_or(
            &var,
            "CONSUMER_IDEMPOTENCY_WINDOW",
            defaults.consumer.idempotency_window,
            |v| v.parse().ok(),
        )?;
        let commit_policy = match var("CONSUMER_COMMIT_POLICY").as_deref() {
            None | Some("advance") => CommitPolicy::AdvanceAlways,
            Some("idempotent-retry") => {
                CommitPolicy::idempotent_retry(max_attempts, Duration::from_millis(retry_backoff_ms))
            }
            Some(other) => return Err(invalid("CONSUMER_COMMIT_POLICY", other)),
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or(&var, "PORT", defaults.port, |v| v.parse().ok())?,
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            storage,
            database_max_connections: parse_or(
                &var,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
                |v| v.parse().ok(),
            )?,
            kafka,
            consumer: ConsumerConfig::default()
                .with_poll_timeout(Duration::from_millis(poll_timeout_ms))
                .with_commit_policy(commit_policy)
                .with_idempotency_window(idempotency_window),
            tls: TlsConfig {
                enabled: parse_or(&var, "TLS_ENABLED", false, parse_bool)?,
                ca_path: var("TLS_CA_PATH").map(PathBuf::from),
                cert_path: var("TLS_CERT_PATH").map(PathBuf::from),
                key_path: var("TLS_KEY_PATH").map(PathBuf::from),
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loads the mutual-TLS identity when TLS is enabled.
    ///
    /// Fails if any of the three PEM paths is unset or does not point at a file.
    pub fn tls_identity(&self) -> Result<Option<Arc<TlsIdentity>>, ConfigError> {
        if !self.tls.enabled {
            return Ok(None);
        }

        let ca = self
            .tls
            .ca_path
            .clone()
            .ok_or(TlsError::NotConfigured("TLS_CA_PATH"))?;
        let cert = self
            .tls
            .cert_path
            .clone()
            .ok_or(TlsError::NotConfigured("TLS_CERT_PATH"))?;
        let key = self
            .tls
            .key_path
            .clone()
            .ok_or(TlsError::NotConfigured("TLS_KEY_PATH"))?;

        Ok(Some(Arc::new(TlsIdentity::load(ca, cert, key)?)))
    }

    /// Kafka client settings carrying the given TLS identity.
    pub fn kafka_settings(&self, tls: Option<Arc<TlsIdentity>>) -> KafkaSettings {
        let settings = KafkaSettings::new(self.kafka.brokers.clone());
        match tls {
            Some(identity) => settings.with_tls(identity),
            None => settings,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            storage: StorageMode::InMemory,
            database_max_connections: 10,
            kafka: KafkaConfig::default(),
            consumer: ConsumerConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_or<T, V, P>(var: &V, key: &'static str, default: T, parse: P) -> Result<T, ConfigError>
where
    V: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match var(key) {
        None => Ok(default),
        Some(value) => parse(&value).ok_or_else(|| invalid(key, &value)),
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}
