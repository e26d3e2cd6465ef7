//! Service lookup against the registry's HTTP API.

use async_trait::async_trait;
use reqwest::header::{IF_NONE_MATCH, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sidereal_node::NodeInfo;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::http;
use crate::types::{ServiceDescriptor, ServiceDescriptors};

/// Looks up the services registered for a (type, pool).
#[async_trait]
pub trait DiscoveryLookupClient: Send + Sync + std::fmt::Debug {
    /// Fetch the current descriptors without any cache validator.
    async fn get_services(&self, service_type: &str, pool: &str) -> Result<ServiceDescriptors>;

    /// Fetch the descriptors for the same (type, pool) as `previous`,
    /// revalidating against its ETag when it has one.
    async fn refresh_services(&self, previous: &ServiceDescriptors) -> Result<ServiceDescriptors>;
}

/// Body of a successful lookup response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListing {
    pub environment: String,
    pub services: Vec<ServiceDescriptor>,
}

/// Lookup client speaking to the registry over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDiscoveryLookupClient {
    client: Client,
    base_url: Url,
    node: Arc<NodeInfo>,
    default_max_age: Duration,
}

impl HttpDiscoveryLookupClient {
    /// Create a lookup client from configuration.
    pub fn new(config: &DiscoveryConfig, node: Arc<NodeInfo>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DiscoveryError::config(format!("failed to build HTTP client: {e}")))?;

        Self::with_client(client, &config.uri, node, config.default_max_age())
    }

    /// Create a lookup client sharing an existing HTTP client.
    pub fn with_client(
        client: Client,
        registry_uri: &str,
        node: Arc<NodeInfo>,
        default_max_age: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: http::parse_base_url(registry_uri)?,
            node,
            default_max_age,
        })
    }

    fn service_url(&self, service_type: &str, pool: &str) -> Url {
        http::registry_url(&self.base_url, &["v1", "service", service_type, pool])
    }

    /// Fetch the descriptors for `(service_type, pool)`.
    ///
    /// When `previous` is a snapshot of the same key carrying an ETag, the
    /// request is conditional and a `304 Not Modified` yields `previous`'s
    /// descriptors with refreshed cache metadata. A snapshot of another key is
    /// ignored.
    pub async fn fetch(
        &self,
        service_type: &str,
        pool: &str,
        previous: Option<&ServiceDescriptors>,
    ) -> Result<ServiceDescriptors> {
        let previous =
            previous.filter(|p| p.service_type() == service_type && p.pool() == pool);

        let mut request = self
            .client
            .get(self.service_url(service_type, pool))
            .header(USER_AGENT, self.node.node_id());
        if let Some(etag) = previous.and_then(ServiceDescriptors::etag) {
            request = request.header(IF_NONE_MATCH, etag);
        }

        debug!(
            service_type = %service_type,
            pool = %pool,
            conditional = previous.is_some_and(|p| p.etag().is_some()),
            "looking up services"
        );

        let transport = |source: reqwest::Error| DiscoveryError::Transport {
            service_type: service_type.to_owned(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let etag = http::etag(response.headers());
        let max_age = http::max_age(response.headers());

        if status == StatusCode::NOT_MODIFIED {
            let Some(previous) = previous else {
                return Err(DiscoveryError::Status {
                    service_type: service_type.to_owned(),
                    status: status.as_u16(),
                });
            };
            debug!(service_type = %service_type, pool = %pool, "services not modified");
            return Ok(previous.revalidated(etag, max_age));
        }

        if !status.is_success() {
            return Err(DiscoveryError::Status {
                service_type: service_type.to_owned(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        let listing: ServiceListing =
            serde_json::from_slice(&body).map_err(|source| DiscoveryError::Decode {
                service_type: service_type.to_owned(),
                source,
            })?;

        if listing.environment != self.node.environment() {
            return Err(DiscoveryError::EnvironmentMismatch {
                service_type: service_type.to_owned(),
                expected: self.node.environment().to_owned(),
                actual: listing.environment,
            });
        }

        debug!(
            service_type = %service_type,
            pool = %pool,
            count = listing.services.len(),
            "services fetched"
        );

        ServiceDescriptors::new(
            service_type,
            pool,
            listing.services,
            max_age.unwrap_or(self.default_max_age),
            etag,
        )
    }
}

#[async_trait]
impl DiscoveryLookupClient for HttpDiscoveryLookupClient {
    async fn get_services(&self, service_type: &str, pool: &str) -> Result<ServiceDescriptors> {
        self.fetch(service_type, pool, None).await
    }

    async fn refresh_services(&self, previous: &ServiceDescriptors) -> Result<ServiceDescriptors> {
        self.fetch(previous.service_type(), previous.pool(), Some(previous))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn node() -> Arc<NodeInfo> {
        Arc::new(NodeInfo::for_environment("testingenvironment").unwrap())
    }

    #[test]
    fn client_creation() {
        let config = DiscoveryConfig::default();
        assert!(HttpDiscoveryLookupClient::new(&config, node()).is_ok());
    }

    #[test]
    fn rejects_invalid_registry_uri() {
        let config = DiscoveryConfig::with_uri("::not-a-uri");
        assert!(matches!(
            HttpDiscoveryLookupClient::new(&config, node()),
            Err(DiscoveryError::Config(_))
        ));
    }

    #[test]
    fn service_url_layout() {
        let client =
            HttpDiscoveryLookupClient::new(&DiscoveryConfig::with_uri("http://registry:4111"), node())
                .unwrap();
        assert_eq!(
            client.service_url("testService", "testPool").as_str(),
            "http://registry:4111/v1/service/testService/testPool"
        );
    }
}
