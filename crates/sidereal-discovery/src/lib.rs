//! Client side of Sidereal service discovery.
//!
//! Two halves share one registry:
//!
//! - **Lookup**: [`HttpDiscoveryLookupClient`] fetches the descriptors for a
//!   (type, pool), revalidating with ETags. [`ServiceInventory`] caches the
//!   results and keeps them fresh in the background, and [`ServiceSelector`] /
//!   [`HttpServiceSelector`] pick running instances out of it.
//! - **Announcement**: [`Announcer`] keeps this node's
//!   [`ServiceAnnouncement`]s published through a
//!   [`DiscoveryAnnouncementClient`], re-announcing whenever the registry's
//!   max-age runs out, and withdraws them on [`Announcer::destroy`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use sidereal_discovery::{
//!     Announcer, DiscoveryConfig, HttpDiscoveryAnnouncementClient, HttpDiscoveryLookupClient,
//!     HttpServiceSelector, ServiceAnnouncement, ServiceInventory, ServiceSelector,
//! };
//! use sidereal_node::NodeInfo;
//!
//! let config = DiscoveryConfig::load()?;
//! let node = Arc::new(NodeInfo::for_environment("production")?);
//!
//! let announcer = Announcer::from_config(
//!     Arc::new(HttpDiscoveryAnnouncementClient::new(&config, node.clone())?),
//!     [ServiceAnnouncement::builder("api").property("http", "http://10.0.0.5:8080").build()],
//!     &config,
//! );
//! announcer.start().await?;
//!
//! let lookup = Arc::new(HttpDiscoveryLookupClient::new(&config, node)?);
//! let inventory = Arc::new(ServiceInventory::new(lookup, config.min_refresh_delay()));
//! let selector = HttpServiceSelector::new(ServiceSelector::new("billing", "general", inventory));
//! let endpoints = selector.select_http_service().await?;
//!
//! announcer.destroy().await;
//! ```

pub mod announcement;
pub mod announcer;
pub mod config;
pub mod error;
mod http;
pub mod inventory;
pub mod lookup;
pub mod selector;
pub mod testing;
pub mod types;

pub use announcement::{
    DiscoveryAnnouncementClient, HttpDiscoveryAnnouncementClient, DEFAULT_DELAY, MIN_DELAY,
};
pub use announcer::{Announcer, AnnouncerState};
pub use config::DiscoveryConfig;
pub use error::{AnnouncerError, DiscoveryError, Result};
pub use inventory::{InventoryUpdater, ServiceInventory, ServiceKey};
pub use lookup::{DiscoveryLookupClient, HttpDiscoveryLookupClient, ServiceListing};
pub use selector::{HttpServiceSelector, ServiceSelector};
pub use testing::InMemoryDiscoveryClient;
pub use types::{
    Announcement, ServiceAnnouncement, ServiceAnnouncementBuilder, ServiceDescriptor,
    ServiceDescriptors, ServiceState,
};
