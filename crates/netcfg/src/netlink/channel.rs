//! The shared netlink channel and its owning context.
//!
//! The original design kept one process-wide netlink handle; here the
//! same "one logical channel per process" wiring is an explicit
//! [`NetlinkContext`] passed to every operation, so independent contexts
//! can coexist in tests.

use tracing::debug;

use super::error::{Error, Result};
use super::socket::{NetlinkSocket, Protocol};

/// A live netlink channel: exactly one connected socket.
///
/// Opening acquires the socket; any partial acquisition is unwound by
/// drop before the error is returned. Closing releases the socket and
/// its per-call classifier defaults together, never one without the
/// other.
pub struct Channel {
    socket: NetlinkSocket,
}

impl Channel {
    /// Allocate and connect a socket under the given protocol family.
    pub fn open(protocol: Protocol) -> Result<Self> {
        let socket = NetlinkSocket::new(protocol)?;
        debug!(?protocol, pid = socket.pid(), "netlink channel open");
        Ok(Self { socket })
    }

    /// The underlying socket.
    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }
}

/// Explicitly constructed context owning the (single) netlink channel.
///
/// The channel is un-synchronized shared state: callers serialize
/// transactions against it themselves, as all operations are expected to
/// run on one control flow.
#[derive(Default)]
pub struct NetlinkContext {
    channel: Option<Channel>,
}

impl NetlinkContext {
    /// Create a context with no channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the context's channel.
    ///
    /// Fails with [`Error::ChannelInUse`] if a channel is already live;
    /// the context holds a single channel handle, not a pool.
    pub fn open(&mut self, protocol: Protocol) -> Result<()> {
        if self.channel.is_some() {
            return Err(Error::ChannelInUse);
        }
        self.channel = Some(Channel::open(protocol)?);
        Ok(())
    }

    /// Close the channel. Idempotent.
    pub fn close(&mut self) {
        if self.channel.take().is_some() {
            debug!("netlink channel closed");
        }
    }

    /// The live channel, or [`Error::NoChannel`].
    pub fn channel(&self) -> Result<&Channel> {
        self.channel.as_ref().ok_or(Error::NoChannel)
    }

    /// Whether a channel is currently live.
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }
}
