//! Configuration for the document store.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the connection URL.
pub const ENV_URL: &str = "DOCSTORE_URL";
/// Environment variable holding the database name.
pub const ENV_DATABASE: &str = "DOCSTORE_DATABASE";
/// Environment variable holding the collection name.
pub const ENV_COLLECTION: &str = "DOCSTORE_COLLECTION";
/// Environment variable holding the per-operation timeout in seconds.
pub const ENV_TIMEOUT_SECONDS: &str = "DOCSTORE_TIMEOUT_SECONDS";
/// Environment variable holding the application name.
pub const ENV_APP_NAME: &str = "DOCSTORE_APP_NAME";

const DEFAULT_URL: &str = "mongodb://localhost:27017";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Configuration for a [`DocumentStore`](crate::DocumentStore).
///
/// Immutable once handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`.
    pub url: String,
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
    /// Per-operation deadline in seconds.
    pub timeout_seconds: u64,
    /// Application name reported to the server.
    pub app_name: Option<String>,
}

impl StoreConfig {
    /// Creates a new configuration with the default URL and timeout.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from `DOCSTORE_*` environment variables.
    ///
    /// Unset variables fall back to defaults; the result is validated.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_URL) {
            config.url = url;
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            config.database = database;
        }
        if let Some(collection) = lookup(ENV_COLLECTION) {
            config.collection = collection;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECONDS) {
            config.timeout_seconds = secs.trim().parse().map_err(|_| {
                StoreError::InvalidConfig(format!(
                    "{ENV_TIMEOUT_SECONDS} is not a number: {secs:?}"
                ))
            })?;
        }
        config.app_name = lookup(ENV_APP_NAME);
        config.validate()?;
        Ok(config)
    }

    /// Sets the connection URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the per-operation timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    /// Sets the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Per-operation timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Checks that the configuration can be used to open a store.
    pub fn validate(&self) -> StoreResult<()> {
        if !(self.url.starts_with("mongodb://") || self.url.starts_with("mongodb+srv://")) {
            return Err(StoreError::InvalidConfig(format!(
                "url must use the mongodb:// or mongodb+srv:// scheme, got {:?}",
                self.url
            )));
        }
        if self.database.is_empty() {
            return Err(StoreError::InvalidConfig("database name is empty".into()));
        }
        if self.database.contains(['/', '\\', '.', ' ', '"', '$']) {
            return Err(StoreError::InvalidConfig(format!(
                "database name {:?} contains a forbidden character",
                self.database
            )));
        }
        if self.collection.is_empty() {
            return Err(StoreError::InvalidConfig("collection name is empty".into()));
        }
        if self.collection.contains('$') || self.collection.starts_with("system.") {
            return Err(StoreError::InvalidConfig(format!(
                "collection name {:?} is reserved",
                self.collection
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(StoreError::InvalidConfig("timeout must be at least one second".into()));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            database: String::new(),
            collection: String::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            app_name: None,
        }
    }
}
