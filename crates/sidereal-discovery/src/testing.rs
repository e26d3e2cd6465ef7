//! In-memory discovery client for tests and single-process deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use sidereal_node::NodeInfo;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::announcement::DiscoveryAnnouncementClient;
use crate::error::Result;
use crate::lookup::DiscoveryLookupClient;
use crate::types::{ServiceAnnouncement, ServiceDescriptor, ServiceDescriptors};

/// Discovery client that keeps the registry in memory.
///
/// Announcements made through it are visible to its own lookups, alongside
/// any descriptors added with [`add_discovered_service`](Self::add_discovered_service).
/// Every lookup returns a fresh ETag and the configured max-age, which is
/// also the delay it hands back from `announce`.
#[derive(Debug)]
pub struct InMemoryDiscoveryClient {
    node: Arc<NodeInfo>,
    max_age: Duration,
    announced: DashMap<String, Vec<ServiceDescriptor>>,
    discovered: DashMap<Uuid, ServiceDescriptor>,
}

impl InMemoryDiscoveryClient {
    /// Empty registry for `node`, answering with `max_age`.
    pub fn new(node: Arc<NodeInfo>, max_age: Duration) -> Self {
        Self {
            node,
            max_age,
            announced: DashMap::new(),
            discovered: DashMap::new(),
        }
    }

    /// Register a descriptor as if another node had announced it.
    ///
    /// Returns the descriptor it replaced, if one had the same id.
    pub fn add_discovered_service(&self, descriptor: ServiceDescriptor) -> Option<ServiceDescriptor> {
        self.discovered.insert(descriptor.id, descriptor)
    }

    /// Drop a descriptor added with `add_discovered_service`.
    pub fn remove_discovered_service(&self, id: Uuid) -> Option<ServiceDescriptor> {
        self.discovered.remove(&id).map(|(_, descriptor)| descriptor)
    }

    /// Descriptors this node currently has announced.
    pub fn announced_services(&self) -> Vec<ServiceDescriptor> {
        self.announced
            .get(self.node.node_id())
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn matching(&self, service_type: &str, pool: &str) -> Vec<ServiceDescriptor> {
        let matches =
            |descriptor: &ServiceDescriptor| descriptor.service_type == service_type && descriptor.pool == pool;

        let announced = self.announced.iter().flat_map(|entry| {
            entry
                .value()
                .iter()
                .filter(|&descriptor| matches(descriptor))
                .cloned()
                .collect::<Vec<_>>()
        });
        let discovered = self
            .discovered
            .iter()
            .filter(|entry| matches(entry.value()))
            .map(|entry| entry.value().clone());

        announced.chain(discovered).collect()
    }
}

#[async_trait]
impl DiscoveryLookupClient for InMemoryDiscoveryClient {
    async fn get_services(&self, service_type: &str, pool: &str) -> Result<ServiceDescriptors> {
        ServiceDescriptors::new(
            service_type,
            pool,
            self.matching(service_type, pool),
            self.max_age,
            Some(Uuid::new_v4().to_string()),
        )
    }

    async fn refresh_services(&self, previous: &ServiceDescriptors) -> Result<ServiceDescriptors> {
        self.get_services(previous.service_type(), previous.pool())
            .await
    }
}

#[async_trait]
impl DiscoveryAnnouncementClient for InMemoryDiscoveryClient {
    async fn announce(&self, services: &[ServiceAnnouncement]) -> Result<Duration> {
        let descriptors = services
            .iter()
            .map(|announcement| announcement.to_service_descriptor(&self.node))
            .collect();
        self.announced
            .insert(self.node.node_id().to_owned(), descriptors);
        debug!(node_id = %self.node.node_id(), services = services.len(), "announced in memory");
        Ok(self.max_age)
    }

    async fn unannounce(&self) -> Result<()> {
        self.announced.remove(self.node.node_id());
        Ok(())
    }
}
