//! Netlink transaction layer.
//!
//! Gives callers synchronous-looking request/response and bulk-dump
//! semantics over the netlink datagram protocol:
//!
//! ```ignore
//! use netcfg::netlink::{NetlinkContext, Protocol, transaction};
//! use netcfg::netlink::capture::CaptureList;
//! use netcfg::netlink::message::NlMsgType;
//!
//! let mut ctx = NetlinkContext::new();
//! ctx.open(Protocol::Route)?;
//!
//! let mut links = CaptureList::new();
//! transaction::dump_into(&ctx, libc::AF_UNSPEC as u8,
//!         NlMsgType::RTM_GETLINK, &mut links).await?;
//! for frame in &links {
//!     println!("type {} len {}", frame.header().nlmsg_type,
//!             frame.as_bytes().len());
//! }
//! ```
//!
//! The engine's receive loops block the calling task until an ack, an
//! error frame, or a receive failure; call them only where suspending
//! is acceptable. The channel is not internally synchronized.

pub mod attr;
pub mod builder;
pub mod capture;
pub mod channel;
mod error;
pub mod link;
pub mod message;
pub mod transaction;
mod socket;

pub use builder::MessageBuilder;
pub use capture::{CaptureList, CapturedFrame};
pub use channel::{Channel, NetlinkContext};
pub use error::{Error, Result};
pub use link::{LinkInfo, LinkInfoSource};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use socket::{NetlinkSocket, Protocol};
pub use transaction::{DumpFilter, ack_request, dump_request};
