//! Publishing this node's services to the registry.

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Response};
use sidereal_node::NodeInfo;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::http;
use crate::types::{Announcement, ServiceAnnouncement};

/// Re-announce delay used when the registry does not send a max-age.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

/// Shortest wait between publishes, even when the registry sends `max-age=0`.
pub const MIN_DELAY: Duration = Duration::from_secs(1);

/// Publishes and withdraws this node's service announcements.
#[async_trait]
pub trait DiscoveryAnnouncementClient: Send + Sync + std::fmt::Debug {
    /// Replace this node's announcement with `services`.
    ///
    /// Returns how long the registry keeps the announcement, i.e. the delay
    /// before the next publish.
    async fn announce(&self, services: &[ServiceAnnouncement]) -> Result<Duration>;

    /// Withdraw every service this node announced.
    async fn unannounce(&self) -> Result<()>;
}

/// Announcement client speaking to the registry over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDiscoveryAnnouncementClient {
    client: Client,
    base_url: Url,
    node: Arc<NodeInfo>,
    default_delay: Duration,
}

impl HttpDiscoveryAnnouncementClient {
    /// Create an announcement client from configuration.
    pub fn new(config: &DiscoveryConfig, node: Arc<NodeInfo>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DiscoveryError::config(format!("failed to build HTTP client: {e}")))?;

        let mut announcer = Self::with_client(client, &config.uri, node)?;
        announcer.default_delay = config.announce_default_delay();
        Ok(announcer)
    }

    /// Create an announcement client sharing an existing HTTP client.
    pub fn with_client(client: Client, registry_uri: &str, node: Arc<NodeInfo>) -> Result<Self> {
        Ok(Self {
            client,
            base_url: http::parse_base_url(registry_uri)?,
            node,
            default_delay: DEFAULT_DELAY,
        })
    }

    fn announcement_url(&self) -> Url {
        http::registry_url(&self.base_url, &["v1", "announcement", self.node.node_id()])
    }

    async fn rejected(response: Response) -> DiscoveryError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        DiscoveryError::AnnouncementStatus { status, body }
    }
}

#[async_trait]
impl DiscoveryAnnouncementClient for HttpDiscoveryAnnouncementClient {
    async fn announce(&self, services: &[ServiceAnnouncement]) -> Result<Duration> {
        let announcement = Announcement::new(&self.node, services.to_vec());

        debug!(
            node_id = %self.node.node_id(),
            services = services.len(),
            "announcing services"
        );

        let response = self
            .client
            .put(self.announcement_url())
            .header(USER_AGENT, self.node.node_id())
            .json(&announcement)
            .send()
            .await
            .map_err(|source| DiscoveryError::AnnouncementTransport { source })?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        Ok(http::max_age(response.headers()).unwrap_or(self.default_delay))
    }

    async fn unannounce(&self) -> Result<()> {
        debug!(node_id = %self.node.node_id(), "withdrawing announcement");

        let response = self
            .client
            .delete(self.announcement_url())
            .header(USER_AGENT, self.node.node_id())
            .send()
            .await
            .map_err(|source| DiscoveryError::AnnouncementTransport { source })?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        Ok(())
    }
}
