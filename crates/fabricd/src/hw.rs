//! Hardware switch collaborator.
//!
//! The ASIC driver lives behind this trait. The agent only needs the
//! query surface (hit bits, ECMP sizing), the counter and loopback knobs,
//! and the programming sinks the route/neighbor walkers feed.

use fabric_state::RouteNextHopEntry;
use fabric_types::{IpAddress, IpPrefix, MacAddress, PortId, RouterId, VlanId};
use tracing::debug;

/// The hardware switch as seen by the agent core.
pub trait HwSwitch: Send + Sync {
    /// Per-entry hardware hit bit: asserted when traffic used the entry
    /// since the last read. Opaque to the agent.
    fn is_hit(&self, ip: IpAddress) -> bool;

    /// The ECMP fan-out the ASIC supports.
    fn ecmp_width(&self) -> usize;

    fn attach_acl_counter(&self, acl: &str);
    fn detach_acl_counter(&self, acl: &str);
    fn destroy_acl_counter(&self, acl: &str);

    fn set_port_loopback(&self, port: PortId, enabled: bool);

    // Programming sinks, driven in publication order by the walkers.

    fn route_added(&self, vrf: RouterId, prefix: IpPrefix, forward: &RouteNextHopEntry);
    fn route_changed(
        &self,
        vrf: RouterId,
        prefix: IpPrefix,
        old: &RouteNextHopEntry,
        new: &RouteNextHopEntry,
    );
    fn route_removed(&self, vrf: RouterId, prefix: IpPrefix);

    fn neighbor_added(&self, vlan: VlanId, ip: IpAddress, mac: MacAddress);
    fn neighbor_removed(&self, vlan: VlanId, ip: IpAddress);
}

/// A hardware backend that programs nothing. Backs the daemon skeleton
/// when no ASIC is attached.
#[derive(Debug, Default)]
pub struct NullHwSwitch;

impl HwSwitch for NullHwSwitch {
    fn is_hit(&self, _ip: IpAddress) -> bool {
        false
    }

    fn ecmp_width(&self) -> usize {
        64
    }

    fn attach_acl_counter(&self, acl: &str) {
        debug!(acl, "attach acl counter");
    }

    fn detach_acl_counter(&self, acl: &str) {
        debug!(acl, "detach acl counter");
    }

    fn destroy_acl_counter(&self, acl: &str) {
        debug!(acl, "destroy acl counter");
    }

    fn set_port_loopback(&self, port: PortId, enabled: bool) {
        debug!(port = %port, enabled, "set port loopback");
    }

    fn route_added(&self, vrf: RouterId, prefix: IpPrefix, _forward: &RouteNextHopEntry) {
        debug!(vrf = %vrf, prefix = %prefix, "route added");
    }

    fn route_changed(
        &self,
        vrf: RouterId,
        prefix: IpPrefix,
        _old: &RouteNextHopEntry,
        _new: &RouteNextHopEntry,
    ) {
        debug!(vrf = %vrf, prefix = %prefix, "route changed");
    }

    fn route_removed(&self, vrf: RouterId, prefix: IpPrefix) {
        debug!(vrf = %vrf, prefix = %prefix, "route removed");
    }

    fn neighbor_added(&self, vlan: VlanId, ip: IpAddress, mac: MacAddress) {
        debug!(vlan = %vlan, ip = %ip, mac = %mac, "neighbor added");
    }

    fn neighbor_removed(&self, vlan: VlanId, ip: IpAddress) {
        debug!(vlan = %vlan, ip = %ip, "neighbor removed");
    }
}
