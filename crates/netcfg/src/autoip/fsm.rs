//! Per-device finite-state model for address acquisition.
//!
//! A supplicant keeps trying as long as the interface exists: there is
//! no terminal state, only `Init` to return to. The probe timing policy
//! itself lives behind [`DiscoveryDriver`].

use tracing::debug;

use super::device::Device;
use super::error::Result;
use super::lease::Lease;
use super::timer::TimerHandle;

/// Acquisition state of one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FsmState {
    /// Nothing acquired, nothing in flight.
    #[default]
    Init,
    /// An acquisition strategy is running.
    Discovering,
    /// A lease is installed; stays here until dropped or refreshed.
    Bound,
    /// The last acquisition attempt failed; `start` retries.
    Failed,
}

/// FSM state plus the timer driving the current phase.
#[derive(Debug, Default)]
pub struct Fsm {
    /// Current acquisition state.
    pub state: FsmState,
    /// Timer for the running phase, if any.
    pub timer: Option<TimerHandle>,
}

impl Fsm {
    /// Cancel the phase timer, if armed.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Selects and sequences an acquisition strategy (ARP probing for
/// IPv4LL). External to this core; it gets the device's capture state
/// and timer to work with.
pub trait DiscoveryDriver {
    /// Begin acquiring an address for the device.
    fn begin(&self, dev: &mut Device) -> Result<()>;
}

/// Enter `Discovering` through the given driver.
///
/// The state only moves once the driver has accepted; on failure the
/// device stays where it was.
pub fn start_discovery(dev: &mut Device, driver: &dyn DiscoveryDriver) -> Result<()> {
    driver.begin(dev)?;
    debug!(name = %dev.name(), "discovery started");
    dev.fsm.state = FsmState::Discovering;
    Ok(())
}

/// Install a lease and enter `Bound`.
pub fn commit_lease(dev: &mut Device, lease: Lease) {
    debug!(name = %dev.name(), state = %lease.state, "lease committed");
    dev.set_lease(lease);
    dev.fsm.state = FsmState::Bound;
}

/// Record an acquisition failure and enter `Failed`.
///
/// A subsequent `start` clears the failure flag and retries.
pub fn fail(dev: &mut Device) {
    debug!(name = %dev.name(), "discovery failed");
    dev.set_failed(true);
    dev.fsm.state = FsmState::Failed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autoip::lease::LeaseState;

    struct AcceptingDriver;
    impl DiscoveryDriver for AcceptingDriver {
        fn begin(&self, _dev: &mut Device) -> Result<()> {
            Ok(())
        }
    }

    struct RejectingDriver;
    impl DiscoveryDriver for RejectingDriver {
        fn begin(&self, dev: &mut Device) -> Result<()> {
            Err(crate::autoip::Error::DiscoveryFailed {
                name: dev.name().to_string(),
            })
        }
    }

    #[test]
    fn test_discovery_transition() {
        let mut dev = Device::for_tests("eth0");
        start_discovery(&mut dev, &AcceptingDriver).unwrap();
        assert_eq!(dev.fsm.state, FsmState::Discovering);
    }

    #[test]
    fn test_failed_begin_keeps_state() {
        let mut dev = Device::for_tests("eth0");
        assert!(start_discovery(&mut dev, &RejectingDriver).is_err());
        assert_eq!(dev.fsm.state, FsmState::Init);
    }

    #[test]
    fn test_commit_lease_binds() {
        let mut dev = Device::for_tests("eth0");
        commit_lease(
            &mut dev,
            Lease::ipv4ll(LeaseState::Bound, Some("169.254.3.4".parse().unwrap())),
        );
        assert_eq!(dev.fsm.state, FsmState::Bound);
        assert_eq!(dev.lease().unwrap().state, LeaseState::Bound);
    }

    #[test]
    fn test_fail_sets_flag() {
        let mut dev = Device::for_tests("eth0");
        fail(&mut dev);
        assert_eq!(dev.fsm.state, FsmState::Failed);
        assert!(dev.has_failed());
    }
}
