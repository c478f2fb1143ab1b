//! Device lifecycle for link-local address autoconfiguration.
//!
//! The [`DeviceRegistry`] owns one reference-counted [`Device`] per
//! interface and drives its lease and acquisition state. The pieces
//! with real I/O behind them (packet capture, lease persistence, the
//! probing strategy) sit behind traits so the lifecycle core stays
//! deterministic:
//!
//! ```ignore
//! let mut registry = DeviceRegistry::new(transport, leases, driver);
//! let dev = registry.create("eth0", link_info)?;
//! registry.start(&dev)?;
//! // ... discovery commits a lease, device goes Bound ...
//! registry.release(&dev); // last reference tears everything down
//! ```

pub mod device;
mod error;
pub mod fsm;
pub mod lease;
pub mod timer;

pub use device::{CaptureState, CaptureTransport, Device, DeviceRef, DeviceRegistry, LeaseStore};
pub use error::{Error, Result};
pub use fsm::{DiscoveryDriver, Fsm, FsmState};
pub use lease::{AddressFamily, Lease, LeaseState, LeaseType};
pub use timer::TimerHandle;
