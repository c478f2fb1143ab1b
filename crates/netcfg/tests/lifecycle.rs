//! End-to-end device lifecycle through the public API.
//!
//! These tests wire a [`DeviceRegistry`] to in-memory collaborators and
//! walk a device through create, start, bind, refresh, and release. No
//! privileges or live netlink channel required.

use std::cell::RefCell;
use std::rc::Rc;

use netcfg::autoip::{
    AddressFamily, CaptureState, CaptureTransport, Device, DeviceRegistry, DiscoveryDriver,
    FsmState, Lease, LeaseState, LeaseStore, LeaseType, fsm,
};
use netcfg::netlink::{self, LinkInfo, LinkInfoSource};

#[derive(Default)]
struct FakeTransport {
    closes: RefCell<u32>,
}

impl CaptureTransport for FakeTransport {
    fn init(&self, name: &str, link: &LinkInfo) -> netcfg::autoip::Result<CaptureState> {
        Ok(CaptureState {
            ifname: name.to_string(),
            ifindex: link.ifindex,
        })
    }

    fn refresh(
        &self,
        state: &mut CaptureState,
        _name: &str,
        link: &LinkInfo,
    ) -> netcfg::autoip::Result<()> {
        state.ifindex = link.ifindex;
        Ok(())
    }

    fn close(&self, _state: CaptureState) {
        *self.closes.borrow_mut() += 1;
    }
}

#[derive(Default)]
struct FakeLeaseStore {
    removed: RefCell<Vec<(String, LeaseType, AddressFamily)>>,
}

impl LeaseStore for FakeLeaseStore {
    fn remove_lease_file(
        &self,
        name: &str,
        lease_type: LeaseType,
        family: AddressFamily,
    ) -> std::io::Result<()> {
        self.removed
            .borrow_mut()
            .push((name.to_string(), lease_type, family));
        Ok(())
    }
}

/// Driver that grants a fixed link-local address as soon as discovery
/// begins, standing in for the ARP probe sequence.
struct InstantDriver;

impl DiscoveryDriver for InstantDriver {
    fn begin(&self, dev: &mut Device) -> netcfg::autoip::Result<()> {
        fsm::commit_lease(
            dev,
            Lease::ipv4ll(LeaseState::Bound, Some("169.254.12.34".parse().unwrap())),
        );
        Ok(())
    }
}

struct FixedLinks {
    info: LinkInfo,
}

impl LinkInfoSource for FixedLinks {
    fn refresh_link_info(&self, _name: &str) -> impl Future<Output = netlink::Result<LinkInfo>> {
        let info = self.info;
        async move { Ok(info) }
    }
}

fn registry() -> (DeviceRegistry, Rc<FakeTransport>, Rc<FakeLeaseStore>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let transport = Rc::new(FakeTransport::default());
    let leases = Rc::new(FakeLeaseStore::default());
    let registry = DeviceRegistry::new(transport.clone(), leases.clone(), Rc::new(InstantDriver));
    (registry, transport, leases)
}

#[test]
fn test_full_lifecycle() {
    let (mut registry, transport, leases) = registry();

    let dev = registry
        .create("eth0", LinkInfo { ifindex: 2, flags: 0 })
        .unwrap();
    assert_eq!(dev.borrow().fsm.state, FsmState::Init);
    assert_eq!(dev.borrow().capture().unwrap().ifindex, 2);

    // The instant driver commits its lease inside begin(), so the
    // lease is already installed when start() returns.
    registry.start(&dev).unwrap();
    let lease = dev.borrow().lease().cloned().unwrap();
    assert_eq!(lease.state, LeaseState::Bound);
    assert_eq!(lease.address, Some("169.254.12.34".parse().unwrap()));

    // Releasing the only reference drops the lease, persists the
    // removal, and closes the capture state.
    registry.release(&dev);
    assert!(registry.is_empty());
    assert_eq!(
        leases.removed.borrow().as_slice(),
        &[("eth0".to_string(), LeaseType::AutoIp, AddressFamily::Ipv4)]
    );
    assert_eq!(*transport.closes.borrow(), 1);
    assert!(dev.borrow_mut().take_down_notification());
}

#[test]
fn test_restart_after_bind_drops_old_lease_first() {
    let (mut registry, _transport, leases) = registry();
    let dev = registry
        .create("eth0", LinkInfo { ifindex: 2, flags: 0 })
        .unwrap();

    registry.start(&dev).unwrap();
    registry.start(&dev).unwrap();

    // The first lease went through the released path before the second
    // acquisition began.
    assert_eq!(leases.removed.borrow().len(), 1);
    assert_eq!(dev.borrow().lease().unwrap().state, LeaseState::Bound);

    registry.release(&dev);
}

#[tokio::test]
async fn test_refresh_rebinds_capture_to_new_index() {
    let (mut registry, _transport, _leases) = registry();
    let dev = registry
        .create("eth0", LinkInfo { ifindex: 2, flags: 0 })
        .unwrap();
    registry.start(&dev).unwrap();

    let links = FixedLinks {
        info: LinkInfo {
            ifindex: 9,
            flags: 0x1,
        },
    };
    registry.refresh(&dev, &links).await.unwrap();

    assert_eq!(dev.borrow().fsm.state, FsmState::Init);
    assert_eq!(dev.borrow().link.ifindex, 9);
    assert_eq!(dev.borrow().capture().unwrap().ifindex, 9);

    registry.release(&dev);
}

#[test]
fn test_two_devices_are_independent() {
    let (mut registry, _transport, leases) = registry();
    let eth0 = registry
        .create("eth0", LinkInfo { ifindex: 2, flags: 0 })
        .unwrap();
    let eth1 = registry
        .create("eth1", LinkInfo { ifindex: 3, flags: 0 })
        .unwrap();

    registry.start(&eth0).unwrap();
    assert!(eth0.borrow().lease().is_some());
    assert!(eth1.borrow().lease().is_none());

    registry.release(&eth0);
    assert_eq!(registry.len(), 1);
    assert!(registry.find_by_name("eth1").is_some());
    assert_eq!(leases.removed.borrow().len(), 1);

    registry.release(&eth1);
    assert!(registry.is_empty());
}
