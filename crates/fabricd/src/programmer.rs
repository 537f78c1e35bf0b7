//! Hardware programmer: feeds published deltas into the switch backend.

use crate::hw::HwSwitch;
use crate::state_manager::StateObserver;
use fabric_state::{
    for_each_changed_route_all, neighbor_table_delta, ChangedRouteHandler, FibFamily, Route,
    StateDelta, Vlan,
};
use fabric_types::{AddressFamily, IpPrefix, Ipv4Address, Ipv6Address, RouterId, VlanId};
use std::convert::Infallible;
use std::sync::Arc;

fn erase_prefix<A: AddressFamily>(route: &Route<A>) -> IpPrefix {
    let prefix = route.prefix();
    IpPrefix::new(prefix.network.into_ip(), prefix.mask)
        .expect("typed prefixes are valid by construction")
}

struct RouteSink<'a> {
    hw: &'a dyn HwSwitch,
}

impl ChangedRouteHandler<Infallible> for RouteSink<'_> {
    fn changed<A: FibFamily>(
        &mut self,
        vrf: RouterId,
        old: &Arc<Route<A>>,
        new: &Arc<Route<A>>,
    ) -> Result<(), Infallible> {
        self.hw
            .route_changed(vrf, erase_prefix(new), old.forward_info(), new.forward_info());
        Ok(())
    }

    fn added<A: FibFamily>(&mut self, vrf: RouterId, route: &Arc<Route<A>>) -> Result<(), Infallible> {
        self.hw.route_added(vrf, erase_prefix(route), route.forward_info());
        Ok(())
    }

    fn removed<A: FibFamily>(
        &mut self,
        vrf: RouterId,
        route: &Arc<Route<A>>,
    ) -> Result<(), Infallible> {
        self.hw.route_removed(vrf, erase_prefix(route));
        Ok(())
    }
}

/// Subscribes to state publications and programs route and neighbor
/// changes into the hardware, in publication order.
pub struct HwProgrammer {
    hw: Arc<dyn HwSwitch>,
}

impl HwProgrammer {
    pub fn new(hw: Arc<dyn HwSwitch>) -> Self {
        HwProgrammer { hw }
    }

    fn program_neighbors(&self, vlan_id: VlanId, old: &Vlan, new: &Vlan) {
        for (ip, item) in neighbor_table_delta::<Ipv4Address>(old, new) {
            match (item.old, item.new) {
                (_, Some(fields)) if !fields.pending => {
                    self.hw.neighbor_added(vlan_id, ip.into_ip(), fields.mac)
                }
                (Some(_), None) => self.hw.neighbor_removed(vlan_id, ip.into_ip()),
                _ => {}
            }
        }
        for (ip, item) in neighbor_table_delta::<Ipv6Address>(old, new) {
            match (item.old, item.new) {
                (_, Some(fields)) if !fields.pending => {
                    self.hw.neighbor_added(vlan_id, ip.into_ip(), fields.mac)
                }
                (Some(_), None) => self.hw.neighbor_removed(vlan_id, ip.into_ip()),
                _ => {}
            }
        }
    }
}

impl StateObserver for HwProgrammer {
    fn state_updated(&mut self, delta: &StateDelta) {
        let mut sink = RouteSink { hw: self.hw.as_ref() };
        match for_each_changed_route_all(delta, &mut sink) {
            Ok(()) => {}
            Err(e) => match e {},
        }

        for (vlan_id, item) in delta.vlans_delta() {
            match (item.old, item.new) {
                (Some(old), Some(new)) => self.program_neighbors(vlan_id, &old, &new),
                (None, Some(new)) => {
                    let empty = Vlan::new(vlan_id, new.name(), new.interfaces().to_vec());
                    self.program_neighbors(vlan_id, &empty, &new);
                }
                (Some(old), None) => {
                    let empty = Vlan::new(vlan_id, old.name(), old.interfaces().to_vec());
                    self.program_neighbors(vlan_id, &old, &empty);
                }
                (None, None) => {}
            }
        }
    }
}
