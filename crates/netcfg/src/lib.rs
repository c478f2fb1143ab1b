//! Async netlink transactions and link-local address lifecycle for Linux.
//!
//! This crate has two layers. The [`netlink`] module speaks the raw
//! netlink datagram protocol: a process-wide channel, a request/ack
//! transaction engine, and bulk table dumps collected into capture
//! lists. The [`autoip`] module builds the device side of an IPv4
//! link-local supplicant on top of it: reference-counted device
//! handles, lease records, and the acquisition state machine.
//!
//! # Features
//!
//! - `serde` - Serializable lease records
//!
//! # Example
//!
//! ```ignore
//! use netcfg::netlink::{NetlinkContext, Protocol};
//!
//! #[tokio::main]
//! async fn main() -> netcfg::netlink::Result<()> {
//!     let mut ctx = NetlinkContext::new();
//!     ctx.open(Protocol::Route)?;
//!
//!     let info = netcfg::netlink::link::refresh_link_info(&ctx, "eth0").await?;
//!     println!("eth0: index {} flags {:#x}", info.ifindex, info.flags);
//!
//!     Ok(())
//! }
//! ```

pub mod autoip;
pub mod netlink;

// Re-export common types at crate root for convenience
pub use autoip::{Device, DeviceRegistry, Lease};
pub use netlink::{Error, NetlinkContext, Protocol, Result};
