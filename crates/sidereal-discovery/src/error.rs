//! Error types for discovery lookups and announcements.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using [`DiscoveryError`].
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors returned by the discovery clients.
///
/// Every lookup failure names the service type it was for. Transport and
/// decoding failures chain the underlying cause.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The registry could not be reached or the response body could not be read.
    #[error("Lookup of {service_type} failed")]
    Transport {
        service_type: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not a valid service listing.
    #[error("Lookup of {service_type} failed")]
    Decode {
        service_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// The registry answered with a status the client cannot use.
    ///
    /// This includes `304 Not Modified` for a lookup that had no cached
    /// snapshot to fall back to.
    #[error("Lookup of {service_type} failed with status code {status}")]
    Status { service_type: String, status: u16 },

    /// The registry serves a different environment than this node.
    #[error("Expected environment to be {expected}, but was {actual}")]
    EnvironmentMismatch {
        service_type: String,
        expected: String,
        actual: String,
    },

    /// The registry returned a descriptor for another type or pool.
    #[error("Lookup of {service_type} in pool {pool} returned descriptor {id} for {found_type}/{found_pool}")]
    InconsistentDescriptor {
        service_type: String,
        pool: String,
        id: Uuid,
        found_type: String,
        found_pool: String,
    },

    /// The announcement request could not be sent.
    #[error("Announcement failed")]
    AnnouncementTransport {
        #[source]
        source: reqwest::Error,
    },

    /// The registry rejected the announcement.
    #[error("Announcement failed with status code {status}: {body}")]
    AnnouncementStatus { status: u16, body: String },

    /// Client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DiscoveryError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The service type a lookup error refers to.
    pub fn service_type(&self) -> Option<&str> {
        match self {
            Self::Transport { service_type, .. }
            | Self::Decode { service_type, .. }
            | Self::Status { service_type, .. }
            | Self::EnvironmentMismatch { service_type, .. }
            | Self::InconsistentDescriptor { service_type, .. } => Some(service_type),
            Self::AnnouncementTransport { .. }
            | Self::AnnouncementStatus { .. }
            | Self::Config(_) => None,
        }
    }
}

/// Errors from misusing the announcer lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnouncerError {
    /// `start` was called after `destroy`.
    #[error("announcer has been destroyed")]
    Destroyed,
}
