use std::{str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;

use crate::{
    broadcast::ChannelBroadcaster,
    notification::{NotificationBackend, NotificationDispatcher, NotificationStore, RecipientId},
};

/// Upper bound on the broadcast ring buffer; every slot is preallocated.
pub const MAX_BROADCAST_CAPACITY: usize = 1 << 20;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: NotificationStore,
    pub dispatcher: NotificationDispatcher,
    pub notification_bus: ChannelBroadcaster,
}

impl AppState {
    pub fn new(config: Arc<Config>, backend: Arc<dyn NotificationBackend>) -> Self {
        let notification_bus = ChannelBroadcaster::new(config.broadcast_capacity);
        let dispatcher = NotificationDispatcher::new(
            NotificationStore::with_system_identity(backend),
            Arc::new(notification_bus.clone()),
            config.publish_timeout,
        );

        Self {
            config,
            store: dispatcher.store().clone(),
            dispatcher,
            notification_bus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::Invalid {
                key: "STORAGE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub broadcast_capacity: usize,
    pub publish_timeout: Duration,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Recipients the in-memory backend accepts. `None` accepts any.
    pub memory_recipients: Option<Vec<RecipientId>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            storage_backend: StorageBackend::Postgres,
            database_url: None,
            database_max_connections: 5,
            broadcast_capacity: 100,
            publish_timeout: Duration::from_millis(2000),
            default_page_size: 20,
            max_page_size: 100,
            memory_recipients: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.storage_backend,
        };
        let database_url = lookup("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let config = Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            storage_backend,
            database_url,
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            broadcast_capacity: parse_or(&lookup, "BROADCAST_CAPACITY", defaults.broadcast_capacity)?,
            publish_timeout: Duration::from_millis(parse_or(
                &lookup,
                "PUBLISH_TIMEOUT_MS",
                defaults.publish_timeout.as_millis() as u64,
            )?),
            default_page_size: parse_or(&lookup, "DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: parse_or(&lookup, "MAX_PAGE_SIZE", defaults.max_page_size)?,
            memory_recipients: lookup("MEMORY_RECIPIENTS")
                .map(|value| parse_recipients(&value))
                .transpose()?,
        };

        if config.broadcast_capacity == 0 || config.broadcast_capacity > MAX_BROADCAST_CAPACITY {
            return Err(ConfigError::Invalid {
                key: "BROADCAST_CAPACITY",
                value: config.broadcast_capacity.to_string(),
            });
        }
        if config.default_page_size == 0 || config.default_page_size > config.max_page_size {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_PAGE_SIZE",
                value: config.default_page_size.to_string(),
            });
        }

        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Requested page size, falling back to the default and capped at the maximum.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Comma-separated recipient ids, blanks ignored.
fn parse_recipients(value: &str) -> Result<Vec<RecipientId>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<RecipientId>().map_err(|_| ConfigError::Invalid {
                key: "MEMORY_RECIPIENTS",
                value: id.to_string(),
            })
        })
        .collect()
}
