//! End-to-end scenarios over the RIB, the FIB projection and the route
//! walkers.

use fabric_rib::{Rib, RouteAddition, RouteUpdate};
use fabric_state::{
    for_each_changed_route, ForwardAction, NextHop, NextHopSet, RouteNextHopEntry, StateDelta,
    SwitchState,
};
use fabric_types::{AdminDistance, ClientId, InterfaceId, Ipv4Address, RouterId};
use pretty_assertions::assert_eq;
use std::convert::Infallible;
use std::sync::Arc;

fn drop_add(prefix: &str) -> RouteAddition {
    RouteAddition::new(
        prefix.parse().unwrap(),
        RouteNextHopEntry::drop(AdminDistance::STATIC_ROUTE),
    )
}

fn collect_walk(delta: &StateDelta) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut changed = vec![];
    let mut added = vec![];
    let mut removed = vec![];
    for_each_changed_route::<Ipv4Address, Infallible, _, _, _>(
        delta,
        |vrf, _, new| {
            changed.push(format!("{}:{}", vrf, new.prefix()));
            Ok(())
        },
        |vrf, route| {
            added.push(format!("{}:{}", vrf, route.prefix()));
            Ok(())
        },
        |vrf, route| {
            removed.push(format!("{}:{}", vrf, route.prefix()));
            Ok(())
        },
    )
    .unwrap();
    (changed, added, removed)
}

// Route add: an empty VRF gains a drop route; the new state carries it
// and the walker reports exactly one addition.
#[test]
fn route_add_programs_fib_and_walker_sees_it() {
    let rib = Rib::new([RouterId::DEFAULT]);
    let initial = Arc::new(SwitchState::new());

    let (next, stats) = rib
        .update(
            RouterId::DEFAULT,
            ClientId::STATIC,
            RouteUpdate::new().add(drop_add("10.0.0.0/8")),
            &initial,
        )
        .unwrap();

    assert_eq!(stats.routes_added, 1);
    assert_eq!(stats.resolved, 1);

    let fib = next
        .get_fib_container(RouterId::DEFAULT)
        .unwrap()
        .fib_v4()
        .clone();
    assert_eq!(fib.len(), 1);
    let route = fib.exact_match(&"10.0.0.0/8".parse().unwrap()).unwrap();
    assert!(route.forward_info().action.is_drop());

    let delta = StateDelta::new(initial, next);
    let (changed, added, removed) = collect_walk(&delta);
    assert!(changed.is_empty() && removed.is_empty());
    assert_eq!(added, vec!["vrf0:10.0.0.0/8"]);
}

// Idempotent reprogram: the identical batch applied twice returns the
// same root by identity, and a walk over (S, S) emits nothing.
#[test]
fn identical_batch_twice_preserves_identity() {
    let rib = Rib::new([RouterId::DEFAULT]);
    let initial = Arc::new(SwitchState::new());

    let batch = RouteUpdate::new().add(drop_add("10.0.0.0/8"));
    let (once, _) = rib
        .update(RouterId::DEFAULT, ClientId::STATIC, batch.clone(), &initial)
        .unwrap();
    let (twice, _) = rib
        .update(RouterId::DEFAULT, ClientId::STATIC, batch, &once)
        .unwrap();

    assert!(Arc::ptr_eq(&once, &twice));

    let delta = StateDelta::new(once, twice);
    let (changed, added, removed) = collect_walk(&delta);
    assert!(changed.is_empty() && added.is_empty() && removed.is_empty());
}

// Recursive resolution: a BGP route via a gateway inside a connected
// prefix resolves to the gateway bound to the connected interface.
#[test]
fn recursive_resolution_through_connected_route() {
    let rib = Rib::new([RouterId::DEFAULT]);
    let initial = Arc::new(SwitchState::new());

    let mut connected_hops = NextHopSet::new();
    connected_hops.insert(NextHop::resolved(
        "10.0.0.1".parse().unwrap(),
        InterfaceId(1),
        1,
    ));
    let connected = RouteAddition::new(
        "10.0.0.0/8".parse().unwrap(),
        RouteNextHopEntry::from_next_hops(connected_hops, AdminDistance::DIRECTLY_CONNECTED),
    );

    let mut via_hops = NextHopSet::new();
    via_hops.insert(NextHop::unresolved("10.0.0.1".parse().unwrap(), 1));
    let via = RouteAddition::new(
        "192.0.2.0/24".parse().unwrap(),
        RouteNextHopEntry::from_next_hops(via_hops, AdminDistance::EBGP),
    );

    let (state, _) = rib
        .update(
            RouterId::DEFAULT,
            ClientId::INTERFACE,
            RouteUpdate::new().add(connected),
            &initial,
        )
        .unwrap();
    let (state, stats) = rib
        .update(
            RouterId::DEFAULT,
            ClientId::BGP,
            RouteUpdate::new().add(via),
            &state,
        )
        .unwrap();
    assert_eq!(stats.unresolved, 0);

    let fib = state
        .get_fib_container(RouterId::DEFAULT)
        .unwrap()
        .fib_v4()
        .clone();
    let route = fib.exact_match(&"192.0.2.0/24".parse().unwrap()).unwrap();
    match &route.forward_info().action {
        ForwardAction::NextHops(hops) => {
            let hops: Vec<_> = hops.iter().collect();
            assert_eq!(hops.len(), 1);
            assert_eq!(hops[0].addr, "10.0.0.1".parse().unwrap());
            assert_eq!(hops[0].interface, Some(InterfaceId(1)));
            assert_eq!(hops[0].weight, 1);
        }
        other => panic!("expected next hops, got {:?}", other),
    }

    // The connected route landed too, flagged as connected.
    let route = fib.exact_match(&"10.0.0.0/8".parse().unwrap()).unwrap();
    assert!(route.is_connected());
}

// The FIB holds exactly the resolved subset of the RIB, prefix for
// prefix.
#[test]
fn fib_is_resolved_subset_of_rib() {
    let rib = Rib::new([RouterId::DEFAULT]);
    let initial = Arc::new(SwitchState::new());

    let mut dangling_hops = NextHopSet::new();
    dangling_hops.insert(NextHop::unresolved("203.0.113.1".parse().unwrap(), 1));
    let dangling = RouteAddition::new(
        "198.51.100.0/24".parse().unwrap(),
        RouteNextHopEntry::from_next_hops(dangling_hops, AdminDistance::EBGP),
    );

    let (state, stats) = rib
        .update(
            RouterId::DEFAULT,
            ClientId::BGP,
            RouteUpdate::new().add(drop_add("10.0.0.0/8")).add(dangling),
            &initial,
        )
        .unwrap();

    assert_eq!(stats.routes_added, 2);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.unresolved, 1);
    assert_eq!(stats.unreachable, 1);

    let fib = state
        .get_fib_container(RouterId::DEFAULT)
        .unwrap()
        .fib_v4()
        .clone();
    assert_eq!(fib.len(), 1);
    assert!(fib.exact_match(&"10.0.0.0/8".parse().unwrap()).is_some());
    assert!(fib.exact_match(&"198.51.100.0/24".parse().unwrap()).is_none());
}

// Replacing one route leaves the other's node identity intact and the
// walker reports exactly the differing prefix.
#[test]
fn walker_reports_each_difference_once() {
    let rib = Rib::new([RouterId::DEFAULT]);
    let initial = Arc::new(SwitchState::new());

    let (state, _) = rib
        .update(
            RouterId::DEFAULT,
            ClientId::STATIC,
            RouteUpdate::new()
                .add(drop_add("10.0.0.0/8"))
                .add(drop_add("172.16.0.0/12")),
            &initial,
        )
        .unwrap();

    // Swap 172.16/12 from drop to punt.
    let (next, _) = rib
        .update(
            RouterId::DEFAULT,
            ClientId::STATIC,
            RouteUpdate::new().add(RouteAddition::new(
                "172.16.0.0/12".parse().unwrap(),
                RouteNextHopEntry::to_cpu(AdminDistance::STATIC_ROUTE),
            )),
            &state,
        )
        .unwrap();

    let delta = StateDelta::new(Arc::clone(&state), Arc::clone(&next));
    let (changed, added, removed) = collect_walk(&delta);
    assert_eq!(changed, vec!["vrf0:172.16.0.0/12"]);
    assert!(added.is_empty() && removed.is_empty());

    // The untouched prefix kept its node.
    let before = state
        .get_fib_container(RouterId::DEFAULT)
        .unwrap()
        .fib_v4()
        .exact_match(&"10.0.0.0/8".parse().unwrap())
        .unwrap()
        .clone();
    let after = next
        .get_fib_container(RouterId::DEFAULT)
        .unwrap()
        .fib_v4()
        .exact_match(&"10.0.0.0/8".parse().unwrap())
        .unwrap()
        .clone();
    assert!(Arc::ptr_eq(&before, &after));
}

// Batches in different VRFs do not interfere.
#[test]
fn vrfs_are_isolated() {
    let rib = Rib::new([RouterId(0), RouterId(1)]);
    let initial = Arc::new(SwitchState::new());

    let (state, _) = rib
        .update(
            RouterId(0),
            ClientId::STATIC,
            RouteUpdate::new().add(drop_add("10.0.0.0/8")),
            &initial,
        )
        .unwrap();
    let (state, _) = rib
        .update(
            RouterId(1),
            ClientId::STATIC,
            RouteUpdate::new().add(drop_add("172.16.0.0/12")),
            &state,
        )
        .unwrap();

    let fib0 = state.get_fib_container(RouterId(0)).unwrap().fib_v4().clone();
    let fib1 = state.get_fib_container(RouterId(1)).unwrap().fib_v4().clone();
    assert_eq!(fib0.len(), 1);
    assert_eq!(fib1.len(), 1);
    assert!(fib0.exact_match(&"172.16.0.0/12".parse().unwrap()).is_none());
    assert!(fib1.exact_match(&"10.0.0.0/8".parse().unwrap()).is_none());
}
