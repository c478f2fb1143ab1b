//! Error types for the netlink transaction layer.

use std::io;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink operations.
///
/// Socket-level failures (`Io`) and protocol-level error frames (`Kernel`)
/// travel through the same `Result` channel but stay distinguishable by
/// variant; both carry an errno reachable through [`Error::errno`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No live channel on the context; open one first.
    #[error("no netlink channel")]
    NoChannel,

    /// The context already holds a live channel.
    #[error("netlink channel already open")]
    ChannelInUse,

    /// Kernel replied with an explicit error frame.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Kernel restarted its object table mid-dump (NLM_F_DUMP_INTR).
    ///
    /// Never retried internally: the partially filled capture list would
    /// be undetectable otherwise. The caller decides whether to re-issue
    /// the whole dump.
    #[error("dump interrupted by the kernel")]
    DumpInterrupted,

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Interface not present in the kernel's link table.
    #[error("link not found: {name}")]
    LinkNotFound {
        /// The interface name that was not found.
        name: String,
    },
}

impl Error {
    /// Create a kernel error from a signed errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Get the errno value if this error carries one.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => matches!(*errno, libc::ENOENT | libc::ENODEV),
            Self::LinkNotFound { .. } => true,
            _ => false,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Kernel { errno, .. } if matches!(*errno, libc::EPERM | libc::EACCES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errno() {
        let err = Error::from_errno(-libc::EPERM);
        assert!(err.is_permission_denied());
        assert_eq!(err.errno(), Some(libc::EPERM));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::from_errno(-libc::ENOENT).is_not_found());
        assert!(Error::from_errno(-libc::ENODEV).is_not_found());
        assert!(
            Error::LinkNotFound {
                name: "eth0".into()
            }
            .is_not_found()
        );
        assert!(!Error::from_errno(-libc::EPERM).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::NoChannel.to_string(), "no netlink channel");
        let err = Error::LinkNotFound {
            name: "eth0".into(),
        };
        assert_eq!(err.to_string(), "link not found: eth0");
    }
}
