//! Configuration for the discovery clients.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{DiscoveryError, Result};

/// Discovery client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Base URL of the discovery registry.
    pub uri: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Max-age assumed for lookups whose response has no `Cache-Control`.
    pub default_max_age_secs: u64,
    /// Re-announce delay when the registry sends no max-age, and the retry
    /// delay after a failed publish for announcers built with
    /// `Announcer::from_config`.
    pub announce_default_delay_secs: u64,
    /// Shortest wait between two publishes, whatever max-age the registry sends.
    pub announce_min_delay_ms: u64,
    /// Lower bound between inventory refresh passes.
    pub min_refresh_delay_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:4111".to_owned(),
            request_timeout_secs: 10,
            default_max_age_secs: 10,
            announce_default_delay_secs: 10,
            announce_min_delay_ms: 1000,
            min_refresh_delay_ms: 1000,
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `discovery.toml` in the current directory (if present)
    /// 3. Environment variables with `SIDEREAL_DISCOVERY_` prefix
    pub fn load() -> Result<Self> {
        Self::from_file("discovery.toml")
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SIDEREAL_DISCOVERY_").split("__"))
            .extract()
            .map_err(|e| DiscoveryError::Config(e.to_string()))
    }

    /// Configuration pointing at the given registry with default timings.
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// `request_timeout_secs` as a duration.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `default_max_age_secs` as a duration.
    pub const fn default_max_age(&self) -> Duration {
        Duration::from_secs(self.default_max_age_secs)
    }

    /// `announce_default_delay_secs` as a duration.
    pub const fn announce_default_delay(&self) -> Duration {
        Duration::from_secs(self.announce_default_delay_secs)
    }

    /// `announce_min_delay_ms` as a duration.
    pub const fn announce_min_delay(&self) -> Duration {
        Duration::from_millis(self.announce_min_delay_ms)
    }

    /// `min_refresh_delay_ms` as a duration.
    pub const fn min_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.min_refresh_delay_ms)
    }
}
