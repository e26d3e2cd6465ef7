//! Error types for node identity.

use thiserror::Error;

/// Errors raised while building a node identity.
#[derive(Error, Debug)]
pub enum NodeError {
    /// A configuration field is missing or malformed.
    #[error("invalid node configuration: {field} {reason}")]
    Invalid {
        /// Configuration key, e.g. `node.environment`.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),
}

impl NodeError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for NodeError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
