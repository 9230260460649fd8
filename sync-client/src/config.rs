//! Configuration for chat-sync.
//!
//! [`SyncConfig`] is what the engine runs with. [`FileConfig`] is the TOML
//! file layer (default: `chat-sync.toml`) that hosts such as the CLI load
//! and turn into a `SyncConfig`.
//!
//! ```toml
//! [session]
//! user_id = "u-42"
//! display_name = "Ada"
//!
//! [remote]
//! collection = "messages"
//! retry_delay_ms = 5000
//!
//! [cache]
//! key = "messages"
//! dir = "cache"
//! ```

use chat_sync_types::Author;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{validate_key, DEFAULT_CACHE_KEY};
use crate::remote::DEFAULT_COLLECTION;

/// Delay before resubscribing after a subscription failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Author stamped on outgoing messages (from the ambient session).
    pub user: Author,
    /// Remote collection holding the messages.
    pub collection: String,
    /// Local cache key holding the last snapshot.
    pub cache_key: String,
    /// Emit a notice when connectivity drops.
    pub connection_notices: bool,
    /// Resubscribe this long after a subscription failure while still
    /// online. `None` waits for the next online reading.
    pub retry_delay: Option<Duration>,
}

impl SyncConfig {
    /// Create a configuration for the signed-in user.
    pub fn new(user_id: &str, display_name: &str) -> Self {
        Self {
            user: Author::new(user_id, display_name),
            collection: DEFAULT_COLLECTION.to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            connection_notices: true,
            retry_delay: Some(DEFAULT_RETRY_DELAY),
        }
    }

    /// Set the remote collection.
    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collection = collection.to_string();
        self
    }

    /// Set the cache key.
    pub fn with_cache_key(mut self, key: &str) -> Self {
        self.cache_key = key.to_string();
        self
    }

    /// Turn connection-lost notices on or off.
    pub fn with_connection_notices(mut self, enabled: bool) -> Self {
        self.connection_notices = enabled;
        self
    }

    /// Set the resubscribe delay, or `None` to disable timed retries.
    pub fn with_retry_delay(mut self, delay: Option<Duration>) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Root of the TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Session identity.
    #[serde(default)]
    pub session: SessionSection,
    /// Remote store settings.
    #[serde(default)]
    pub remote: RemoteSection,
    /// Local cache settings.
    #[serde(default)]
    pub cache: CacheSection,
}

/// `[session]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// User identifier (default: "local").
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Display name (default: "Me").
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

/// `[remote]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
    /// Collection name (default: "messages").
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Emit connection-lost notices (default: true).
    #[serde(default = "default_connection_notices")]
    pub connection_notices: bool,
    /// Resubscribe delay after a failure in milliseconds, 0 disables
    /// (default: 5000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Cache key (default: "messages").
    #[serde(default = "default_cache_key")]
    pub key: String,
    /// Directory for the file-backed cache (default: "cache").
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

// Default value functions
fn default_user_id() -> String {
    "local".to_string()
}

fn default_display_name() -> String {
    "Me".to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_connection_notices() -> bool {
    true
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_cache_key() -> String {
    DEFAULT_CACHE_KEY.to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            display_name: default_display_name(),
        }
    }
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            connection_notices: default_connection_notices(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            dir: default_cache_dir(),
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { source, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.user_id.trim().is_empty() {
            return Err(ConfigError::Invalid("session.user_id must not be empty".into()));
        }
        if self.remote.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("remote.collection must not be empty".into()));
        }
        if let Err(e) = validate_key(&self.cache.key) {
            return Err(ConfigError::Invalid(format!("cache.key: {e}")));
        }
        Ok(())
    }

    /// Build the engine configuration.
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig::new(&self.session.user_id, &self.session.display_name)
            .with_collection(&self.remote.collection)
            .with_cache_key(&self.cache.key)
            .with_connection_notices(self.remote.connection_notices)
            .with_retry_delay(match self.remote.retry_delay_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
