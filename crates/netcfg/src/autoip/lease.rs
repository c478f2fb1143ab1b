//! Lease records for link-local address configuration.

use std::fmt;
use std::net::Ipv4Addr;

/// Lifecycle tag of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LeaseState {
    /// Address claimed, not yet applied to the interface.
    Granted,
    /// Address applied and defended.
    Bound,
    /// Address given up; consumers should tear down configuration.
    Released,
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeaseState::Granted => "granted",
            LeaseState::Bound => "bound",
            LeaseState::Released => "released",
        };
        f.write_str(s)
    }
}

/// The configuration mechanism a lease came from.
///
/// Together with the address family this locates the lease's on-disk
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LeaseType {
    /// IPv4 link-local self-assignment (RFC 3927).
    AutoIp,
}

/// Address family of a lease record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// An acquired (or released) address assignment.
///
/// Owned by exactly one device at a time; dropping it from the device
/// goes through the registry so the "released" transition is persisted
/// before the in-memory record is detached.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lease {
    /// Lifecycle tag.
    pub state: LeaseState,
    /// Mechanism that produced the lease.
    pub lease_type: LeaseType,
    /// Address family of the record.
    pub family: AddressFamily,
    /// The claimed address, if one was assigned.
    pub address: Option<Ipv4Addr>,
}

impl Lease {
    /// A link-local IPv4 lease in the given state.
    pub fn ipv4ll(state: LeaseState, address: Option<Ipv4Addr>) -> Self {
        Self {
            state,
            lease_type: LeaseType::AutoIp,
            family: AddressFamily::Ipv4,
            address,
        }
    }
}
