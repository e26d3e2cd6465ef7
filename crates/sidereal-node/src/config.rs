//! Node configuration with validation.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use regex::Regex;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{NodeError, Result};

/// Pool used when none is configured.
pub const DEFAULT_POOL: &str = "general";

static ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][_A-Za-z0-9-]*$").ok());

static ENVIRONMENT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][_a-z0-9]*$").ok());

static HOSTNAME_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][-_a-z0-9]*(?:\.[a-z0-9][-_a-z0-9]*)+$").ok()
});

static POOL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][-_a-zA-Z0-9]*$").ok());

/// Raw node configuration as read from `node.toml` and `NODE_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Deployment environment, e.g. `production`.
    pub environment: String,

    /// Pool this node belongs to.
    #[serde(default = "default_pool")]
    pub pool: String,

    /// Stable node identifier. Generated when absent.
    #[serde(default, alias = "id")]
    pub node_id: Option<String>,

    /// Location path, defaults to `/{node_id}`.
    #[serde(default)]
    pub location: Option<String>,

    /// Internal IP address other nodes should use.
    #[serde(default, alias = "ip")]
    pub internal_ip: Option<IpAddr>,

    /// Internal hostname other nodes should use.
    #[serde(default, alias = "hostname")]
    pub internal_hostname: Option<String>,

    /// Externally reachable address.
    #[serde(default)]
    pub external_address: Option<String>,

    /// Address to bind listeners to.
    #[serde(default)]
    pub bind_ip: Option<IpAddr>,
}

fn default_pool() -> String {
    DEFAULT_POOL.to_owned()
}

impl NodeConfig {
    /// Minimal configuration for the given environment.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            pool: default_pool(),
            node_id: None,
            location: None,
            internal_ip: None,
            internal_hostname: None,
            external_address: None,
            bind_ip: None,
        }
    }

    /// Sets the pool.
    #[must_use]
    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = pool.into();
        self
    }

    /// Sets the node id.
    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Load configuration from `node.toml` (if present) and `NODE_*` variables.
    pub fn load() -> Result<Self> {
        Self::from_file("node.toml")
    }

    /// Load configuration from a specific TOML file, overridden by `NODE_*` variables.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("NODE_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = Figment::new().merge(Toml::string(content)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its allowed pattern.
    pub fn validate(&self) -> Result<()> {
        check("node.environment", &ENVIRONMENT_PATTERN, &self.environment)?;
        check("node.pool", &POOL_PATTERN, &self.pool)?;
        if let Some(node_id) = &self.node_id {
            check("node.id", &ID_PATTERN, node_id)?;
        }
        if let Some(hostname) = &self.internal_hostname {
            check("node.hostname", &HOSTNAME_PATTERN, hostname)?;
        }
        Ok(())
    }
}

fn check(field: &'static str, pattern: &LazyLock<Option<Regex>>, value: &str) -> Result<()> {
    let Some(pattern) = pattern.as_ref() else {
        return Err(NodeError::invalid(field, "validation unavailable"));
    };

    if value.is_empty() {
        return Err(NodeError::invalid(field, "is empty"));
    }

    if !pattern.is_match(value) {
        return Err(NodeError::invalid(field, format!("is malformed: {value:?}")));
    }

    Ok(())
}
