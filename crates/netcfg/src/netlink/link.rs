//! Link metadata refresh over the transaction engine.
//!
//! Only the fields the device lifecycle tracks are decoded here: the
//! interface index and flags, keyed by name. Everything else in a link
//! frame is left to richer consumers.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::attr::get;
use super::capture::{CaptureList, CapturedFrame};
use super::channel::NetlinkContext;
use super::error::{Error, Result};
use super::message::NlMsgType;
use super::transaction::{DumpFilter, dump_filtered};

/// rtnetlink link header (mirrors struct ifinfomsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub _pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

/// Attribute IDs for IFLA_* constants.
pub mod ifla {
    pub const IFLA_ADDRESS: u16 = 1;
    pub const IFLA_IFNAME: u16 = 3;
    pub const IFLA_MTU: u16 = 4;
}

/// Interface flag bits (IFF_*).
pub mod iff {
    pub const UP: u32 = 0x1;
    pub const LOOPBACK: u32 = 0x8;
    pub const POINTOPOINT: u32 = 0x10;
    pub const RUNNING: u32 = 0x40;
    pub const NOARP: u32 = 0x80;
    pub const LOWER_UP: u32 = 0x10000;
}

/// The link metadata a configuration device tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkInfo {
    /// Interface index.
    pub ifindex: u32,
    /// Interface flags (IFF_*).
    pub flags: u32,
}

/// Source of fresh link metadata, keyed by interface name.
///
/// The default implementation rides the shared netlink channel; tests
/// substitute their own.
pub trait LinkInfoSource {
    /// Re-read index and flags for the named interface.
    fn refresh_link_info(&self, name: &str) -> impl Future<Output = Result<LinkInfo>>;
}

impl LinkInfoSource for NetlinkContext {
    fn refresh_link_info(&self, name: &str) -> impl Future<Output = Result<LinkInfo>> {
        refresh_link_info(self, name)
    }
}

/// Dump the kernel's link table and pick out the named interface.
pub async fn refresh_link_info(ctx: &NetlinkContext, name: &str) -> Result<LinkInfo> {
    let filter = DumpFilter {
        expect_type: Some(NlMsgType::RTM_NEWLINK),
        min_payload: std::mem::size_of::<IfInfoMsg>(),
    };

    let mut list = CaptureList::new();
    dump_filtered(
        ctx,
        libc::AF_UNSPEC as u8,
        NlMsgType::RTM_GETLINK,
        filter,
        &mut list,
    )
    .await?;

    for frame in &list {
        if let Some((info, Some(ifname))) = link_from_frame(frame)
            && ifname == name
        {
            return Ok(info);
        }
    }

    Err(Error::LinkNotFound { name: name.into() })
}

/// Decode index, flags, and name from one captured link frame.
pub(crate) fn link_from_frame(frame: &CapturedFrame) -> Option<(LinkInfo, Option<&str>)> {
    let payload = frame.payload();
    let (header, _) = IfInfoMsg::ref_from_prefix(payload).ok()?;

    let info = LinkInfo {
        ifindex: header.ifi_index as u32,
        flags: header.ifi_flags,
    };

    let mut name = None;
    for (kind, data) in frame.attrs_after(std::mem::size_of::<IfInfoMsg>()) {
        if kind == ifla::IFLA_IFNAME {
            name = get::string(data).ok();
            break;
        }
    }

    Some((info, name))
}
