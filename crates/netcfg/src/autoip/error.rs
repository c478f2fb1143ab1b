//! Error types for the device lifecycle layer.

use std::io;

/// Result type for device lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the registry and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The netlink transaction layer failed.
    #[error(transparent)]
    Netlink(#[from] crate::netlink::Error),

    /// The packet-capture transport failed.
    #[error("capture transport: {0}")]
    Capture(String),

    /// The lease store failed.
    #[error("lease store: {0}")]
    LeaseStore(#[from] io::Error),

    /// Discovery could not be started on the interface.
    #[error("{name}: unable to initiate discovery")]
    DiscoveryFailed {
        /// The interface name.
        name: String,
    },
}
