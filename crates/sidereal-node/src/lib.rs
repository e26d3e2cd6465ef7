//! Node identity for Sidereal services.
//!
//! Every process that talks to the discovery registry carries a [`NodeInfo`]:
//! the environment it runs in, the pool it belongs to, and a stable node id
//! used both as its `User-Agent` and as the owner of its announcements.
//!
//! `NodeInfo` is an immutable value built once from a validated
//! [`NodeConfig`] and passed explicitly to the clients that need it.
//!
//! ```ignore
//! use sidereal_node::{NodeConfig, NodeInfo};
//!
//! let config = NodeConfig::load()?;
//! let node = NodeInfo::new(config)?;
//! println!("{} in {}", node.node_id(), node.environment());
//! ```

pub mod config;
pub mod error;
pub mod info;

pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use info::NodeInfo;
