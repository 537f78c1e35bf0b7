//! Route walkers over state deltas and whole states.
//!
//! Hardware programmers consume FIB changes through these helpers rather
//! than diffing states themselves. Ordering within a VRF is prefix-sorted;
//! across VRFs it follows VRF id. A callback error halts the walk and
//! propagates to the caller.

use crate::delta::{fib_delta, StateDelta};
use crate::fib::FibFamily;
use crate::route::Route;
use crate::switch_state::SwitchState;
use fabric_types::{Ipv4Address, Ipv6Address, RouterId};
use std::sync::Arc;

/// Walks every route-level difference of one address family.
///
/// A VRF present only in the old state emits `removed` for every route in
/// its FIB; a VRF present only in the new state emits `added` for every
/// route; otherwise each differing prefix emits exactly one callback.
pub fn for_each_changed_route<A, E, C, Ad, R>(
    delta: &StateDelta,
    mut changed: C,
    mut added: Ad,
    mut removed: R,
) -> Result<(), E>
where
    A: FibFamily,
    C: FnMut(RouterId, &Arc<Route<A>>, &Arc<Route<A>>) -> Result<(), E>,
    Ad: FnMut(RouterId, &Arc<Route<A>>) -> Result<(), E>,
    R: FnMut(RouterId, &Arc<Route<A>>) -> Result<(), E>,
{
    for (vrf, item) in delta.fibs_delta() {
        match (item.old, item.new) {
            (Some(old_container), None) => {
                for (_, route) in A::fib_of(&old_container).iter() {
                    removed(vrf, route)?;
                }
            }
            (None, Some(new_container)) => {
                for (_, route) in A::fib_of(&new_container).iter() {
                    added(vrf, route)?;
                }
            }
            (Some(old_container), Some(new_container)) => {
                for (_, route_item) in fib_delta::<A>(&old_container, &new_container) {
                    match (route_item.old, route_item.new) {
                        (Some(old_route), None) => removed(vrf, &old_route)?,
                        (None, Some(new_route)) => added(vrf, &new_route)?,
                        (Some(old_route), Some(new_route)) => {
                            changed(vrf, &old_route, &new_route)?
                        }
                        (None, None) => unreachable!("delta item with neither side"),
                    }
                }
            }
            (None, None) => unreachable!("delta item with neither side"),
        }
    }
    Ok(())
}

/// Family-generic callbacks for the untyped walker.
pub trait ChangedRouteHandler<E> {
    fn changed<A: FibFamily>(
        &mut self,
        vrf: RouterId,
        old: &Arc<Route<A>>,
        new: &Arc<Route<A>>,
    ) -> Result<(), E>;

    fn added<A: FibFamily>(&mut self, vrf: RouterId, route: &Arc<Route<A>>) -> Result<(), E>;

    fn removed<A: FibFamily>(&mut self, vrf: RouterId, route: &Arc<Route<A>>) -> Result<(), E>;
}

/// Walks both families, IPv4 first then IPv6.
pub fn for_each_changed_route_all<E, H: ChangedRouteHandler<E>>(
    delta: &StateDelta,
    handler: &mut H,
) -> Result<(), E> {
    let handler = std::cell::RefCell::new(handler);
    for_each_changed_route::<Ipv4Address, E, _, _, _>(
        delta,
        |vrf, old, new| handler.borrow_mut().changed(vrf, old, new),
        |vrf, route| handler.borrow_mut().added(vrf, route),
        |vrf, route| handler.borrow_mut().removed(vrf, route),
    )?;
    for_each_changed_route::<Ipv6Address, E, _, _, _>(
        delta,
        |vrf, old, new| handler.borrow_mut().changed(vrf, old, new),
        |vrf, route| handler.borrow_mut().added(vrf, route),
        |vrf, route| handler.borrow_mut().removed(vrf, route),
    )
}

/// Family-generic callback for [`for_all_routes`].
pub trait RouteVisitor<E> {
    fn route<A: FibFamily>(&mut self, vrf: RouterId, route: &Arc<Route<A>>) -> Result<(), E>;
}

/// Visits every route of every VRF in the given state.
pub fn for_all_routes<E, V: RouteVisitor<E>>(
    state: &Arc<SwitchState>,
    visitor: &mut V,
) -> Result<(), E> {
    for container in state.fibs().values() {
        let vrf = container.vrf();
        for (_, route) in container.fib_v4().iter() {
            visitor.route(vrf, route)?;
        }
        for (_, route) in container.fib_v6().iter() {
            visitor.route(vrf, route)?;
        }
    }
    Ok(())
}
