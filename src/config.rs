//! Application-level configuration loading: storage backend, ports and party timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SOCIAL_PRESENCE_CONFIG_PATH";

/// Which system of record the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// MongoDB, the production backend.
    Mongo,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Some(Self::Mongo),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// TCP port the HTTP server listens on.
    pub port: u16,
    /// MongoDB connection string.
    pub mongo_uri: String,
    /// MongoDB database name.
    pub mongo_db: Option<String>,
    /// Backend used for parties, users and friendships.
    pub storage_backend: StorageBackend,
    /// Default time budget of a party, in seconds.
    pub party_ttl_secs: u64,
    /// Period of the party reaper, in seconds.
    pub reaper_interval_secs: u64,
    /// Upper bound on a single durable store round trip, in milliseconds.
    pub store_timeout_ms: u64,
    /// How long a presence push may wait on a full slot, in milliseconds.
    pub notification_timeout_ms: u64,
    /// Buffered events per party stream.
    pub party_stream_capacity: usize,
}

impl AppConfig {
    /// Load the configuration from disk, then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        config.apply_env();
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn apply_env(&mut self) {
        if let Some(port) = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Ok(uri) = env::var("MONGO_URI") {
            self.mongo_uri = uri;
        }
        if let Ok(db) = env::var("MONGO_DB") {
            self.mongo_db = Some(db);
        }
        if let Ok(value) = env::var("STORAGE_BACKEND") {
            match StorageBackend::parse(&value) {
                Some(backend) => self.storage_backend = backend,
                None => warn!(
                    value = %value,
                    "unknown STORAGE_BACKEND; keeping configured backend"
                ),
            }
        }
    }

    pub fn party_ttl(&self) -> Duration {
        Duration::from_secs(self.party_ttl_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    /// `None` disables the store timeout.
    pub fn store_timeout(&self) -> Option<Duration> {
        (self.store_timeout_ms > 0).then(|| Duration::from_millis(self.store_timeout_ms))
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }

    pub fn party_stream_capacity(&self) -> usize {
        self.party_stream_capacity.max(1)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            mongo_uri: "mongodb://localhost:27017".into(),
            mongo_db: None,
            storage_backend: StorageBackend::Mongo,
            party_ttl_secs: 900,
            reaper_interval_secs: 60,
            store_timeout_ms: 5_000,
            notification_timeout_ms: 250,
            party_stream_capacity: 1,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"party_ttl_secs": 600, "storage_backend": "memory"}"#)
                .unwrap();
        assert_eq!(config.party_ttl(), Duration::from_secs(600));
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.reaper_interval(), Duration::from_secs(60));
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let config = AppConfig {
            store_timeout_ms: 0,
            party_stream_capacity: 0,
            reaper_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.store_timeout(), None);
        assert_eq!(config.party_stream_capacity(), 1);
        assert_eq!(config.reaper_interval(), Duration::from_secs(1));
    }

    #[test]
    fn backend_names_are_case_insensitive() {
        assert_eq!(StorageBackend::parse("MongoDB"), Some(StorageBackend::Mongo));
        assert_eq!(StorageBackend::parse(" memory "), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::parse("couch"), None);
    }
}
