//! Device handles and the registry that owns them.
//!
//! A [`Device`] represents one network interface under address
//! configuration. Handles are reference counted: creation takes the
//! first reference and `acquire`/`release` pair up after that. The
//! final `release` tears the device down exactly once (lease dropped,
//! capture state closed, timer canceled) before it leaves the
//! registry. A device with refcount 0 is unreachable and holds no
//! resources.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::netlink::{LinkInfo, LinkInfoSource};

use super::error::Result;
use super::fsm::{self, Fsm, FsmState};
use super::lease::{AddressFamily, Lease, LeaseState, LeaseType};

/// Opaque per-transport capture state bound to one interface.
///
/// The packet-capture transport itself (raw ARP socket for IPv4LL) is
/// external; this records what it was bound to so it can be refreshed
/// when the link index changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureState {
    /// Interface name the capture socket is bound to.
    pub ifname: String,
    /// Link index at bind time.
    pub ifindex: u32,
}

/// The packet-capture transport collaborator.
pub trait CaptureTransport {
    /// Bind capture state to an interface.
    fn init(&self, name: &str, link: &LinkInfo) -> Result<CaptureState>;

    /// Re-bind existing capture state after link changes.
    fn refresh(&self, state: &mut CaptureState, name: &str, link: &LinkInfo) -> Result<()>;

    /// Release capture state.
    fn close(&self, state: CaptureState) {
        let _ = state;
    }
}

/// The lease persistence collaborator.
pub trait LeaseStore {
    /// Remove the on-disk lease record for an interface.
    fn remove_lease_file(
        &self,
        name: &str,
        lease_type: LeaseType,
        family: AddressFamily,
    ) -> std::io::Result<()>;
}

/// Shared handle to a device. Memory safety is `Rc`'s job; teardown
/// timing is the logical refcount's job.
pub type DeviceRef = Rc<RefCell<Device>>;

/// One network interface under address configuration.
#[derive(Debug)]
pub struct Device {
    name: String,
    /// Link metadata as of the last refresh.
    pub link: LinkInfo,
    capture: Option<CaptureState>,
    lease: Option<Lease>,
    /// Acquisition state machine.
    pub fsm: Fsm,
    notify: bool,
    failed: bool,
    users: u32,
}

impl Device {
    fn new(name: &str, link: LinkInfo) -> Self {
        Self {
            name: name.to_string(),
            link,
            capture: None,
            lease: None,
            fsm: Fsm::default(),
            notify: false,
            failed: false,
            users: 1,
        }
    }

    /// The interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current lease, if one is held.
    pub fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    /// Install a lease, replacing any previous one.
    pub fn set_lease(&mut self, lease: Lease) {
        if self.lease.as_ref() != Some(&lease) {
            self.lease = Some(lease);
        }
    }

    /// The capture state, if bound.
    pub fn capture(&self) -> Option<&CaptureState> {
        self.capture.as_ref()
    }

    /// Whether the last acquisition attempt failed.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub(crate) fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    /// Take the pending "configuration went down" notification, if one
    /// was raised by dropping a lease.
    pub fn take_down_notification(&mut self) -> bool {
        std::mem::take(&mut self.notify)
    }

    /// Current logical reference count.
    pub fn users(&self) -> u32 {
        self.users
    }

    #[cfg(test)]
    pub(crate) fn for_tests(name: &str) -> Self {
        Self::new(name, LinkInfo::default())
    }
}

/// Insertion-ordered collection of reference-counted device handles.
///
/// One registry per process is the expected wiring; nothing here
/// enforces it, so tests run isolated registries. Un-synchronized:
/// mutation must happen from the single control flow.
pub struct DeviceRegistry {
    devices: Vec<DeviceRef>,
    transport: Rc<dyn CaptureTransport>,
    leases: Rc<dyn LeaseStore>,
    driver: Rc<dyn fsm::DiscoveryDriver>,
}

impl DeviceRegistry {
    /// Create a registry wired to its collaborators.
    pub fn new(
        transport: Rc<dyn CaptureTransport>,
        leases: Rc<dyn LeaseStore>,
        driver: Rc<dyn fsm::DiscoveryDriver>,
    ) -> Self {
        Self {
            devices: Vec::new(),
            transport,
            leases,
            driver,
        }
    }

    /// Create a device handle for an interface.
    ///
    /// Callers are expected to check [`find_by_name`](Self::find_by_name)
    /// first; if a live entry already exists it is returned with one
    /// more reference instead of registering a duplicate name. On
    /// capture-transport failure the partially built handle is unwound
    /// and nothing is registered.
    pub fn create(&mut self, name: &str, link: LinkInfo) -> Result<DeviceRef> {
        if let Some(existing) = self.find_by_name(name) {
            existing.borrow_mut().users += 1;
            return Ok(existing);
        }

        let mut dev = Device::new(name, link);
        dev.capture = Some(self.transport.init(name, &link)?);

        debug!(name, ifindex = link.ifindex, "device created");
        let handle = Rc::new(RefCell::new(dev));
        self.devices.push(handle.clone());
        Ok(handle)
    }

    /// Find a live device by interface name. Does not take a logical
    /// reference; callers that retain the handle must `acquire` it.
    pub fn find_by_name(&self, name: &str) -> Option<DeviceRef> {
        self.devices
            .iter()
            .find(|dev| dev.borrow().name == name)
            .cloned()
    }

    /// Find a live device by link index.
    pub fn find_by_index(&self, ifindex: u32) -> Option<DeviceRef> {
        self.devices
            .iter()
            .find(|dev| dev.borrow().link.ifindex == ifindex)
            .cloned()
    }

    /// Take another reference on a live handle.
    ///
    /// Calling this on a fully released handle is a use-after-free
    /// class bug and aborts rather than corrupting state.
    pub fn acquire(&self, dev: &DeviceRef) -> DeviceRef {
        let mut d = dev.borrow_mut();
        assert!(d.users > 0, "{}: acquire after refcount reached zero", d.name);
        d.users += 1;
        drop(d);
        dev.clone()
    }

    /// Give back one reference; the last one tears the device down.
    pub fn release(&mut self, dev: &DeviceRef) {
        let users = {
            let mut d = dev.borrow_mut();
            assert!(d.users > 0, "{}: release after refcount reached zero", d.name);
            d.users -= 1;
            d.users
        };
        if users == 0 {
            self.free(dev);
        }
    }

    fn free(&mut self, dev: &DeviceRef) {
        {
            let d = dev.borrow();
            debug!(name = %d.name, ifindex = d.link.ifindex, "deleting device");
        }
        self.drop_lease(dev);
        self.close(dev);
        // Splice out by identity, not by name.
        self.devices.retain(|entry| !Rc::ptr_eq(entry, dev));
    }

    /// Drop the device's lease, if it holds one.
    ///
    /// Raises the pending down-notification, removes the on-disk lease
    /// record, detaches the in-memory lease, and puts the FSM back to
    /// square one. Returns the detached lease tagged `Released`; a
    /// device without a lease is left untouched.
    pub fn drop_lease(&self, dev: &DeviceRef) -> Option<Lease> {
        let mut d = dev.borrow_mut();
        let mut lease = d.lease.take()?;

        // Configuration may have been applied from this lease; the
        // daemon owes the interface a link-down event.
        d.notify = true;

        if let Err(e) = self
            .leases
            .remove_lease_file(&d.name, lease.lease_type, lease.family)
        {
            warn!(name = %d.name, error = %e, "cannot remove lease file");
        }

        lease.state = LeaseState::Released;
        d.fsm.state = FsmState::Init;
        Some(lease)
    }

    /// Tear configuration down entirely: lease dropped, capture state
    /// closed, timer canceled. The handle itself stays live.
    pub fn stop(&self, dev: &DeviceRef) {
        self.drop_lease(dev);
        self.close(dev);
    }

    fn close(&self, dev: &DeviceRef) {
        let mut d = dev.borrow_mut();
        if let Some(state) = d.capture.take() {
            self.transport.close(state);
        }
        d.fsm.cancel_timer();
    }

    /// Re-read link metadata and re-bind the capture transport, forcing
    /// the next acquisition to start from scratch.
    ///
    /// A failure at the link-info step aborts before the capture
    /// transport is touched.
    pub async fn refresh<L: LinkInfoSource>(&self, dev: &DeviceRef, links: &L) -> Result<()> {
        let name = {
            let mut d = dev.borrow_mut();
            // Back to INIT to force a reclaim.
            d.fsm.state = FsmState::Init;
            d.name.clone()
        };

        let info = match links.refresh_link_info(&name).await {
            Ok(info) => info,
            Err(e) => {
                error!(name = %name, error = %e, "cannot refresh interface");
                return Err(e.into());
            }
        };

        let d = &mut *dev.borrow_mut();
        d.link = info;
        match d.capture.as_mut() {
            Some(state) => self.transport.refresh(state, &d.name, &d.link)?,
            None => d.capture = Some(self.transport.init(&d.name, &d.link)?),
        }
        Ok(())
    }

    /// Begin (or re-begin) address acquisition.
    ///
    /// Any held lease is dropped first and the failure flag cleared. If
    /// discovery cannot be started the error is reported and the device
    /// stays in the INIT state left by the lease drop.
    pub fn start(&self, dev: &DeviceRef) -> Result<()> {
        self.drop_lease(dev);
        let d = &mut *dev.borrow_mut();
        d.failed = false;
        fsm::start_discovery(d, self.driver.as_ref()).inspect_err(|_| {
            error!(name = %d.name, "unable to initiate discovery");
        })
    }

    /// Number of live devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry holds no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate live devices in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceRef> {
        self.devices.iter()
    }
}
