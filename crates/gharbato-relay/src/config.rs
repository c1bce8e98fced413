//! Relay configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the relay can start with zero
//! configuration for local development.

use std::path::PathBuf;
use std::str::FromStr;

use gharbato_shared::constants::DEFAULT_MAX_BODY_LEN;
use gharbato_store::feed::DEFAULT_FEED_CAPACITY;

/// Which [`gharbato_store::RemoteStore`] backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Store backend.
    /// Env: `GHARBATO_STORE` (`memory` | `sqlite`)
    /// Default: `memory`
    pub store: StoreBackend,

    /// SQLite database file.
    /// Env: `GHARBATO_DB_PATH`
    /// Default: the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Longest accepted message body, in characters.
    /// Env: `GHARBATO_MAX_BODY_LEN`
    /// Default: `4096`
    pub max_body_len: usize,

    /// Buffered change events per store before slow listeners lag.
    /// Env: `GHARBATO_FEED_CAPACITY`
    /// Default: `256`
    pub feed_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Memory,
            db_path: None,
            max_body_len: DEFAULT_MAX_BODY_LEN,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("GHARBATO_STORE") {
            match val.parse() {
                Ok(backend) => config.store = backend,
                Err(e) => tracing::warn!(value = %val, error = %e, "Invalid GHARBATO_STORE, using default"),
            }
        }

        if let Some(path) = lookup("GHARBATO_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("GHARBATO_MAX_BODY_LEN") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_body_len = n,
                _ => tracing::warn!(value = %val, "Invalid GHARBATO_MAX_BODY_LEN, using default"),
            }
        }

        if let Some(val) = lookup("GHARBATO_FEED_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.feed_capacity = n,
                _ => tracing::warn!(value = %val, "Invalid GHARBATO_FEED_CAPACITY, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
