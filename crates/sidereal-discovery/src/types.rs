//! Service descriptor and announcement types.

use serde::{Deserialize, Serialize};
use sidereal_node::NodeInfo;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{DiscoveryError, Result};

/// Lifecycle state a service instance reports to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    /// Accepting traffic.
    #[default]
    Running,
    /// Registered but not accepting traffic.
    Stopped,
}

/// One registered service instance, as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub id: Uuid,
    pub node_id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub pool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Absent on the wire means running.
    #[serde(default)]
    pub state: ServiceState,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ServiceDescriptor {
    /// Returns true if the instance accepts traffic.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ServiceState::Running
    }

    /// Looks up a single property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Immutable snapshot of every descriptor for one (type, pool).
///
/// The descriptor list is shared: a snapshot revalidated by a
/// `304 Not Modified` reuses its predecessor's list rather than copying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptors {
    service_type: String,
    pool: String,
    descriptors: Arc<[ServiceDescriptor]>,
    etag: Option<String>,
    max_age: Duration,
}

impl ServiceDescriptors {
    /// Build a snapshot, rejecting descriptors that belong to another type or pool.
    pub fn new(
        service_type: impl Into<String>,
        pool: impl Into<String>,
        descriptors: Vec<ServiceDescriptor>,
        max_age: Duration,
        etag: Option<String>,
    ) -> Result<Self> {
        let service_type = service_type.into();
        let pool = pool.into();

        if let Some(stray) = descriptors
            .iter()
            .find(|d| d.service_type != service_type || d.pool != pool)
        {
            return Err(DiscoveryError::InconsistentDescriptor {
                id: stray.id,
                found_type: stray.service_type.clone(),
                found_pool: stray.pool.clone(),
                service_type,
                pool,
            });
        }

        Ok(Self {
            service_type,
            pool,
            descriptors: descriptors.into(),
            etag,
            max_age,
        })
    }

    /// Empty snapshot, useful as a placeholder before the first lookup.
    pub fn empty(service_type: impl Into<String>, pool: impl Into<String>, max_age: Duration) -> Self {
        Self {
            service_type: service_type.into(),
            pool: pool.into(),
            descriptors: Arc::from(Vec::new()),
            etag: None,
            max_age,
        }
    }

    /// Same descriptors with new cache metadata; absent values keep the current ones.
    #[must_use]
    pub fn revalidated(&self, etag: Option<String>, max_age: Option<Duration>) -> Self {
        Self {
            service_type: self.service_type.clone(),
            pool: self.pool.clone(),
            descriptors: Arc::clone(&self.descriptors),
            etag: etag.or_else(|| self.etag.clone()),
            max_age: max_age.unwrap_or(self.max_age),
        }
    }

    /// Service type every descriptor in the snapshot belongs to.
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Pool every descriptor in the snapshot belongs to.
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Descriptors in registry order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Returns true if both snapshots share the same descriptor list allocation.
    pub fn shares_descriptors_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.descriptors, &other.descriptors)
    }

    /// Cache validator from the last response.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// How long the snapshot stays fresh after it was fetched.
    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Number of descriptors, running or not.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if the registry listed no instances.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// A service this node declares to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAnnouncement {
    id: Uuid,
    #[serde(rename = "type")]
    service_type: String,
    properties: BTreeMap<String, String>,
}

impl ServiceAnnouncement {
    /// Start building an announcement for the given service type.
    pub fn builder(service_type: impl Into<String>) -> ServiceAnnouncementBuilder {
        ServiceAnnouncementBuilder {
            service_type: service_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Identity assigned at build time, stable for the announcement's lifetime.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Service type being announced.
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Properties published with the announcement.
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// The descriptor the registry will hold for this announcement.
    pub fn to_service_descriptor(&self, node: &NodeInfo) -> ServiceDescriptor {
        ServiceDescriptor {
            id: self.id,
            node_id: node.node_id().to_owned(),
            service_type: self.service_type.clone(),
            pool: node.pool().to_owned(),
            location: Some(node.location().to_owned()),
            state: ServiceState::Running,
            properties: self.properties.clone(),
        }
    }
}

/// Builder for [`ServiceAnnouncement`].
#[derive(Debug, Clone)]
pub struct ServiceAnnouncementBuilder {
    service_type: String,
    properties: BTreeMap<String, String>,
}

impl ServiceAnnouncementBuilder {
    /// Add or replace a property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Add several properties.
    #[must_use]
    pub fn properties<K, V>(mut self, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Finish the announcement, assigning it a fresh id.
    pub fn build(self) -> ServiceAnnouncement {
        ServiceAnnouncement {
            id: Uuid::new_v4(),
            service_type: self.service_type,
            properties: self.properties,
        }
    }
}

/// Body of an announcement `PUT`: every service this node runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub environment: String,
    pub node_id: String,
    pub pool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub services: Vec<ServiceAnnouncement>,
}

impl Announcement {
    /// Request body announcing `services` on behalf of `node`.
    pub fn new(node: &NodeInfo, services: Vec<ServiceAnnouncement>) -> Self {
        Self {
            environment: node.environment().to_owned(),
            node_id: node.node_id().to_owned(),
            pool: node.pool().to_owned(),
            location: Some(node.location().to_owned()),
            services,
        }
    }
}
