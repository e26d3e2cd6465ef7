//! Immutable node identity.

use std::net::{IpAddr, Ipv4Addr};
use std::time::SystemTime;
use uuid::Uuid;

use crate::config::NodeConfig;
use crate::error::Result;

/// Identity of the running node.
///
/// Built once at startup and shared (usually behind an `Arc`) with every
/// component that needs to identify itself to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    environment: String,
    pool: String,
    node_id: String,
    instance_id: String,
    location: String,
    internal_ip: Option<IpAddr>,
    internal_address: String,
    external_address: String,
    bind_ip: IpAddr,
    start_time: SystemTime,
}

impl NodeInfo {
    /// Build a node identity from validated configuration.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;

        let node_id = config
            .node_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let location = config
            .location
            .unwrap_or_else(|| format!("/{node_id}"));

        let internal_address = match (&config.internal_hostname, config.internal_ip) {
            (Some(hostname), _) => hostname.clone(),
            (None, Some(ip)) => ip.to_string(),
            (None, None) => Ipv4Addr::LOCALHOST.to_string(),
        };
        let external_address = config
            .external_address
            .unwrap_or_else(|| internal_address.clone());

        Ok(Self {
            environment: config.environment,
            pool: config.pool,
            node_id,
            instance_id: Uuid::new_v4().to_string(),
            location,
            internal_ip: config.internal_ip,
            internal_address,
            external_address,
            bind_ip: config
                .bind_ip
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            start_time: SystemTime::now(),
        })
    }

    /// Node identity for the given environment with every other field defaulted.
    pub fn for_environment(environment: impl Into<String>) -> Result<Self> {
        Self::new(NodeConfig::new(environment))
    }

    /// Deployment environment, e.g. `production`.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Pool this node announces its services in.
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Stable id for this node, sent as `User-Agent` and as announcement owner.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Id unique to this process instance.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Location path recorded on announced descriptors.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Configured internal IP, if any.
    pub const fn internal_ip(&self) -> Option<IpAddr> {
        self.internal_ip
    }

    /// Hostname or IP other nodes should connect to.
    pub fn internal_address(&self) -> &str {
        &self.internal_address
    }

    /// Address reachable from outside the cluster.
    pub fn external_address(&self) -> &str {
        &self.external_address
    }

    /// IP local servers should bind to.
    pub const fn bind_ip(&self) -> IpAddr {
        self.bind_ip
    }

    /// When this node identity was created.
    pub const fn start_time(&self) -> SystemTime {
        self.start_time
    }
}
