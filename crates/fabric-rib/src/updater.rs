//! Projection of a resolved RIB snapshot into a new switch state.

use crate::map::NetworkToRouteMap;
use crate::route::RibRoute;
use fabric_state::{
    FibContainer, ForwardingInformationBase, Route, SwitchState,
};
use fabric_types::{AddressFamily, Ipv4Address, Ipv6Address, RouterId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds the FIBs of one VRF from its resolved RIB snapshot.
///
/// The projection is identity-preserving twice over: a prior FIB route
/// whose class id and forwarding info are unchanged is reused as the same
/// node, and when neither family produced a difference the input state is
/// returned untouched.
#[derive(Debug)]
pub struct ForwardingInformationBaseUpdater {
    vrf: RouterId,
}

impl ForwardingInformationBaseUpdater {
    pub fn new(vrf: RouterId) -> Self {
        ForwardingInformationBaseUpdater { vrf }
    }

    /// Applies the snapshot, returning the new state or the input state
    /// unchanged.
    pub fn apply(
        &self,
        v4: &NetworkToRouteMap<Ipv4Address>,
        v6: &NetworkToRouteMap<Ipv6Address>,
        state: &Arc<SwitchState>,
    ) -> Arc<SwitchState> {
        let empty = FibContainer::new(self.vrf);
        let previous = state
            .get_fib_container(self.vrf)
            .map(|c| c.as_ref())
            .unwrap_or(&empty);

        let new_v4 = create_updated_fib(v4, previous.fib_v4());
        let new_v6 = create_updated_fib(v6, previous.fib_v6());

        if new_v4.is_none() && new_v6.is_none() {
            return Arc::clone(state);
        }

        let next_container = previous.with_fibs(new_v4, new_v6);
        state.with_fib_container(Arc::new(next_container))
    }
}

/// Builds an updated FIB for one family, or `None` when the prior FIB
/// already matches the resolved snapshot.
fn create_updated_fib<A: AddressFamily>(
    rib: &NetworkToRouteMap<A>,
    fib: &Arc<ForwardingInformationBase<A>>,
) -> Option<Arc<ForwardingInformationBase<A>>> {
    let mut updated = false;
    let mut next = BTreeMap::new();

    for (prefix, rib_route) in rib.iter() {
        let forward = match rib_route.forward_info() {
            Some(forward) => forward,
            // Unresolved routes never reach the FIB.
            None => continue,
        };

        let fib_route = match fib.exact_match(prefix) {
            Some(prior)
                if prior.class_id() == rib_route.class_id()
                    && prior.forward_info() == forward =>
            {
                // Reuse the prior node to preserve identity for diffing.
                Arc::clone(prior)
            }
            prior => {
                updated = true;
                Arc::new(to_fib_route(rib_route, prior))
            }
        };
        next.insert(*prefix, fib_route);
    }

    // Catch prior routes that fell out of the resolved set.
    if !updated {
        for (prefix, _) in fib.iter() {
            match rib.exact_match(prefix) {
                Some(rib_route) if rib_route.is_resolved() => {}
                _ => {
                    updated = true;
                    break;
                }
            }
        }
    }

    debug_assert_eq!(
        next.len(),
        rib.iter().filter(|(_, r)| r.is_resolved()).count()
    );

    if updated {
        Some(Arc::new(ForwardingInformationBase::from_routes(next)))
    } else {
        None
    }
}

fn to_fib_route<A: AddressFamily>(
    rib_route: &RibRoute<A>,
    prior: Option<&Arc<Route<A>>>,
) -> Route<A> {
    let forward = rib_route
        .forward_info()
        .expect("only resolved routes are projected")
        .clone();

    match prior {
        Some(prior) => prior.with_forward_info(
            forward,
            rib_route.class_id(),
            rib_route.is_connected(),
        ),
        None => Route::new(
            *rib_route.prefix(),
            forward,
            rib_route.class_id(),
            rib_route.is_connected(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use fabric_state::{RouteNextHopEntry, RoutePrefix};
    use fabric_types::{AdminDistance, ClassId, ClientId};
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> RoutePrefix<Ipv4Address> {
        s.parse().unwrap()
    }

    fn resolved_maps(
        prefixes: &[&str],
    ) -> (NetworkToRouteMap<Ipv4Address>, NetworkToRouteMap<Ipv6Address>) {
        let mut v4 = NetworkToRouteMap::new();
        for (i, p) in prefixes.iter().enumerate() {
            let mut route = RibRoute::new(prefix(p));
            route.set_entry(
                ClientId::STATIC,
                RouteNextHopEntry::drop(AdminDistance::STATIC_ROUTE),
                i as u64,
            );
            v4.insert(route);
        }
        resolve(&mut v4);
        (v4, NetworkToRouteMap::new())
    }

    #[test]
    fn test_projection_installs_resolved_routes() {
        let (v4, v6) = resolved_maps(&["10.0.0.0/8", "172.16.0.0/12"]);
        let state = Arc::new(SwitchState::new());

        let updater = ForwardingInformationBaseUpdater::new(RouterId::DEFAULT);
        let next = updater.apply(&v4, &v6, &state);

        let fib = next
            .get_fib_container(RouterId::DEFAULT)
            .unwrap()
            .fib_v4()
            .clone();
        assert_eq!(fib.len(), 2);
        assert!(fib
            .exact_match(&prefix("10.0.0.0/8"))
            .unwrap()
            .forward_info()
            .action
            .is_drop());
    }

    #[test]
    fn test_unresolved_routes_absent() {
        let mut v4 = NetworkToRouteMap::new();
        let mut route = RibRoute::new(prefix("192.0.2.0/24"));
        let mut hops = fabric_state::NextHopSet::new();
        hops.insert(fabric_state::NextHop::unresolved(
            "10.0.0.1".parse().unwrap(),
            1,
        ));
        route.set_entry(
            ClientId::BGP,
            RouteNextHopEntry::from_next_hops(hops, AdminDistance::EBGP),
            0,
        );
        v4.insert(route);
        resolve(&mut v4);

        let state = Arc::new(SwitchState::new());
        let updater = ForwardingInformationBaseUpdater::new(RouterId::DEFAULT);
        let next = updater.apply(&v4, &NetworkToRouteMap::new(), &state);

        // Nothing resolved, so the projection is a no-op.
        assert!(Arc::ptr_eq(&next, &state));
    }

    #[test]
    fn test_reapplying_same_snapshot_preserves_state_identity() {
        let (v4, v6) = resolved_maps(&["10.0.0.0/8"]);
        let state = Arc::new(SwitchState::new());
        let updater = ForwardingInformationBaseUpdater::new(RouterId::DEFAULT);

        let once = updater.apply(&v4, &v6, &state);
        assert!(!Arc::ptr_eq(&once, &state));

        let twice = updater.apply(&v4, &v6, &once);
        assert!(Arc::ptr_eq(&twice, &once));
    }

    #[test]
    fn test_prior_route_reused_when_unchanged() {
        let (v4, v6) = resolved_maps(&["10.0.0.0/8", "172.16.0.0/12"]);
        let state = Arc::new(SwitchState::new());
        let updater = ForwardingInformationBaseUpdater::new(RouterId::DEFAULT);
        let once = updater.apply(&v4, &v6, &state);

        // Add a route; the untouched prefix keeps its node.
        let (v4_more, v6_more) = resolved_maps(&["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"]);
        let twice = updater.apply(&v4_more, &v6_more, &once);

        let before = once
            .get_fib_container(RouterId::DEFAULT)
            .unwrap()
            .fib_v4()
            .exact_match(&prefix("10.0.0.0/8"))
            .unwrap()
            .clone();
        let after = twice
            .get_fib_container(RouterId::DEFAULT)
            .unwrap()
            .fib_v4()
            .exact_match(&prefix("10.0.0.0/8"))
            .unwrap()
            .clone();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_route_deletion_detected() {
        let (v4, v6) = resolved_maps(&["10.0.0.0/8", "172.16.0.0/12"]);
        let state = Arc::new(SwitchState::new());
        let updater = ForwardingInformationBaseUpdater::new(RouterId::DEFAULT);
        let once = updater.apply(&v4, &v6, &state);

        let (v4_less, v6_less) = resolved_maps(&["10.0.0.0/8"]);
        let twice = updater.apply(&v4_less, &v6_less, &once);

        assert!(!Arc::ptr_eq(&twice, &once));
        let fib = twice
            .get_fib_container(RouterId::DEFAULT)
            .unwrap()
            .fib_v4()
            .clone();
        assert_eq!(fib.len(), 1);
        assert!(fib.exact_match(&prefix("172.16.0.0/12")).is_none());
    }

    #[test]
    fn test_class_id_change_rebuilds_route() {
        let (mut v4, v6) = resolved_maps(&["10.0.0.0/8"]);
        let state = Arc::new(SwitchState::new());
        let updater = ForwardingInformationBaseUpdater::new(RouterId::DEFAULT);
        let once = updater.apply(&v4, &v6, &state);

        v4.exact_match_mut(&prefix("10.0.0.0/8"))
            .unwrap()
            .set_class_id(Some(ClassId(7)));
        let twice = updater.apply(&v4, &v6, &once);

        assert!(!Arc::ptr_eq(&twice, &once));
        let route = twice
            .get_fib_container(RouterId::DEFAULT)
            .unwrap()
            .fib_v4()
            .exact_match(&prefix("10.0.0.0/8"))
            .unwrap()
            .clone();
        assert_eq!(route.class_id(), Some(ClassId(7)));
    }
}
