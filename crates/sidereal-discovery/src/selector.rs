//! Choosing service instances from the inventory.

use rand::seq::SliceRandom;
use std::sync::Arc;
use url::Url;

use crate::error::Result;
use crate::inventory::ServiceInventory;
use crate::types::ServiceDescriptor;

/// Property holding a service's HTTPS endpoint.
pub const HTTPS_PROPERTY: &str = "https";

/// Property holding a service's plain HTTP endpoint.
pub const HTTP_PROPERTY: &str = "http";

/// Selects the running instances of one (type, pool).
#[derive(Debug, Clone)]
pub struct ServiceSelector {
    service_type: String,
    pool: String,
    inventory: Arc<ServiceInventory>,
}

impl ServiceSelector {
    /// Selector for `service_type` instances in `pool`, backed by `inventory`.
    pub fn new(
        service_type: impl Into<String>,
        pool: impl Into<String>,
        inventory: Arc<ServiceInventory>,
    ) -> Self {
        Self {
            service_type: service_type.into(),
            pool: pool.into(),
            inventory,
        }
    }

    /// The service type this selector looks up.
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// The pool this selector looks up.
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Every running descriptor currently known for this selector's key.
    pub async fn select_all_services(&self) -> Result<Vec<ServiceDescriptor>> {
        let descriptors = self
            .inventory
            .get_descriptors(&self.service_type, &self.pool)
            .await?;

        Ok(descriptors
            .descriptors()
            .iter()
            .filter(|descriptor| descriptor.is_running())
            .cloned()
            .collect())
    }
}

/// Selects HTTP endpoints of running instances, in random order.
#[derive(Debug, Clone)]
pub struct HttpServiceSelector {
    selector: ServiceSelector,
}

impl HttpServiceSelector {
    /// Wrap `selector` to pick HTTP endpoints.
    pub fn new(selector: ServiceSelector) -> Self {
        Self { selector }
    }

    /// The underlying selector.
    pub fn selector(&self) -> &ServiceSelector {
        &self.selector
    }

    /// Endpoints of every running instance, shuffled.
    ///
    /// An instance contributes its `https` URI when that parses, otherwise its
    /// `http` URI; instances with neither are skipped. No instances is an
    /// empty list, not an error.
    pub async fn select_http_service(&self) -> Result<Vec<Url>> {
        let mut urls: Vec<Url> = self
            .selector
            .select_all_services()
            .await?
            .iter()
            .filter_map(endpoint)
            .collect();

        urls.shuffle(&mut rand::thread_rng());
        Ok(urls)
    }
}

fn endpoint(descriptor: &ServiceDescriptor) -> Option<Url> {
    [HTTPS_PROPERTY, HTTP_PROPERTY]
        .into_iter()
        .filter_map(|name| descriptor.property(name))
        .find_map(|value| Url::parse(value).ok())
}
