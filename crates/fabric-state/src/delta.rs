//! Structural diffs between two switch state roots.

use crate::fib::{FibContainer, FibFamily};
use crate::neighbor::{NeighborEntryFields, NeighborFamily};
use crate::port::{AggregatePort, Port};
use crate::route::{Route, RoutePrefix};
use crate::switch_state::SwitchState;
use crate::vlan::Vlan;
use fabric_types::{AggregatePortId, PortId, RouterId, VlanId};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::sync::Arc;

/// One differing value: absence on one side encodes add or remove, both
/// sides present encodes change.
#[derive(Debug, Clone)]
pub struct Delta<V> {
    pub old: Option<Arc<V>>,
    pub new: Option<Arc<V>>,
}

impl<V> Delta<V> {
    pub fn is_added(&self) -> bool {
        self.old.is_none() && self.new.is_some()
    }

    pub fn is_removed(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }

    pub fn is_changed(&self) -> bool {
        self.old.is_some() && self.new.is_some()
    }
}

/// Ordered merge-diff over two `BTreeMap`s of shared nodes.
///
/// Pairs whose values are pointer-identical are skipped entirely; when the
/// two maps are the same allocation the iterator yields nothing without
/// walking it.
pub struct MapDelta<'a, K: Ord + Copy, V> {
    old: Peekable<btree_map::Iter<'a, K, Arc<V>>>,
    new: Peekable<btree_map::Iter<'a, K, Arc<V>>>,
    skip_all: bool,
}

impl<'a, K: Ord + Copy, V> MapDelta<'a, K, V> {
    pub fn between(old: &'a BTreeMap<K, Arc<V>>, new: &'a BTreeMap<K, Arc<V>>) -> Self {
        MapDelta {
            old: old.iter().peekable(),
            new: new.iter().peekable(),
            skip_all: std::ptr::eq(old, new),
        }
    }
}

impl<'a, K: Ord + Copy, V> Iterator for MapDelta<'a, K, V> {
    type Item = (K, Delta<V>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.skip_all {
            return None;
        }
        loop {
            match (self.old.peek(), self.new.peek()) {
                (None, None) => return None,
                (Some((k, v)), None) => {
                    let item = (
                        **k,
                        Delta {
                            old: Some(Arc::clone(v)),
                            new: None,
                        },
                    );
                    self.old.next();
                    return Some(item);
                }
                (None, Some((k, v))) => {
                    let item = (
                        **k,
                        Delta {
                            old: None,
                            new: Some(Arc::clone(v)),
                        },
                    );
                    self.new.next();
                    return Some(item);
                }
                (Some((ok, ov)), Some((nk, nv))) => {
                    if ok < nk {
                        let item = (
                            **ok,
                            Delta {
                                old: Some(Arc::clone(ov)),
                                new: None,
                            },
                        );
                        self.old.next();
                        return Some(item);
                    } else if nk < ok {
                        let item = (
                            **nk,
                            Delta {
                                old: None,
                                new: Some(Arc::clone(nv)),
                            },
                        );
                        self.new.next();
                        return Some(item);
                    } else if Arc::ptr_eq(ov, nv) {
                        // Identical subtree, nothing underneath can differ.
                        self.old.next();
                        self.new.next();
                    } else {
                        let item = (
                            **ok,
                            Delta {
                                old: Some(Arc::clone(ov)),
                                new: Some(Arc::clone(nv)),
                            },
                        );
                        self.old.next();
                        self.new.next();
                        return Some(item);
                    }
                }
            }
        }
    }
}

/// A zipper over two state roots.
#[derive(Debug, Clone)]
pub struct StateDelta {
    old: Arc<SwitchState>,
    new: Arc<SwitchState>,
}

impl StateDelta {
    pub fn new(old: Arc<SwitchState>, new: Arc<SwitchState>) -> Self {
        StateDelta { old, new }
    }

    pub fn old_state(&self) -> &Arc<SwitchState> {
        &self.old
    }

    pub fn new_state(&self) -> &Arc<SwitchState> {
        &self.new
    }

    pub fn fibs_delta(&self) -> MapDelta<'_, RouterId, FibContainer> {
        MapDelta::between(self.old.fibs(), self.new.fibs())
    }

    pub fn vlans_delta(&self) -> MapDelta<'_, VlanId, Vlan> {
        MapDelta::between(self.old.vlans(), self.new.vlans())
    }

    pub fn ports_delta(&self) -> MapDelta<'_, PortId, Port> {
        MapDelta::between(self.old.ports(), self.new.ports())
    }

    pub fn aggregate_ports_delta(&self) -> MapDelta<'_, AggregatePortId, AggregatePort> {
        MapDelta::between(self.old.aggregate_ports(), self.new.aggregate_ports())
    }
}

/// Route-level diff between the per-family FIBs of two containers.
///
/// The container pair comes from a [`StateDelta::fibs_delta`] change item.
pub fn fib_delta<'a, A: FibFamily>(
    old: &'a FibContainer,
    new: &'a FibContainer,
) -> MapDelta<'a, RoutePrefix<A>, Route<A>> {
    let old_fib = A::fib_of(old);
    let new_fib = A::fib_of(new);
    if Arc::ptr_eq(old_fib, new_fib) {
        // Same node; diffing the same map yields nothing.
        MapDelta::between(old_fib.routes(), old_fib.routes())
    } else {
        MapDelta::between(old_fib.routes(), new_fib.routes())
    }
}

/// Entry-level diff between the per-family neighbor tables of two VLANs.
pub fn neighbor_table_delta<'a, A: NeighborFamily>(
    old: &'a Vlan,
    new: &'a Vlan,
) -> MapDelta<'a, A, NeighborEntryFields<A>> {
    let old_table = A::table_of(old);
    let new_table = A::table_of(new);
    if Arc::ptr_eq(old_table, new_table) {
        MapDelta::between(old_table.entries(), old_table.entries())
    } else {
        MapDelta::between(old_table.entries(), new_table.entries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fib::ForwardingInformationBase;
    use crate::route::RouteNextHopEntry;
    use fabric_types::{AdminDistance, InterfaceId, Ipv4Address};
    use pretty_assertions::assert_eq;

    fn drop_route(s: &str) -> Arc<Route<Ipv4Address>> {
        Arc::new(Route::new(
            s.parse().unwrap(),
            RouteNextHopEntry::drop(AdminDistance::STATIC_ROUTE),
            None,
            false,
        ))
    }

    #[test]
    fn test_identical_roots_yield_nothing() {
        let state = Arc::new(SwitchState::new());
        let state = state.with_fib_container(Arc::new(FibContainer::new(RouterId::DEFAULT)));

        let delta = StateDelta::new(Arc::clone(&state), Arc::clone(&state));
        assert_eq!(delta.fibs_delta().count(), 0);
        assert_eq!(delta.vlans_delta().count(), 0);
    }

    #[test]
    fn test_vlan_add_and_remove() {
        let empty = Arc::new(SwitchState::new());
        let id = VlanId::new(100).unwrap();
        let with_vlan = empty.with_vlan(Arc::new(Vlan::new(id, "vlan100", vec![InterfaceId(1)])));

        let added: Vec<_> = StateDelta::new(Arc::clone(&empty), Arc::clone(&with_vlan))
            .vlans_delta()
            .collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].0, id);
        assert!(added[0].1.is_added());

        let removed: Vec<_> = StateDelta::new(with_vlan, empty).vlans_delta().collect();
        assert_eq!(removed.len(), 1);
        assert!(removed[0].1.is_removed());
    }

    #[test]
    fn test_unchanged_container_skipped() {
        let state = Arc::new(SwitchState::new());
        let state = state.with_fib_container(Arc::new(FibContainer::new(RouterId(0))));
        let state = state.with_fib_container(Arc::new(FibContainer::new(RouterId(1))));

        // Replace only vrf1's container.
        let container = state.get_fib_container(RouterId(1)).unwrap();
        let mut routes = BTreeMap::new();
        routes.insert(*drop_route("10.0.0.0/8").prefix(), drop_route("10.0.0.0/8"));
        let replaced = container.with_fibs(
            Some(Arc::new(ForwardingInformationBase::from_routes(routes))),
            None,
        );
        let next = state.with_fib_container(Arc::new(replaced));

        let changed: Vec<_> = StateDelta::new(state, next).fibs_delta().collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, RouterId(1));
        assert!(changed[0].1.is_changed());
    }

    #[test]
    fn test_fib_delta_route_levels() {
        let old_container = FibContainer::new(RouterId::DEFAULT);

        let mut routes = BTreeMap::new();
        let kept = drop_route("10.0.0.0/8");
        routes.insert(*kept.prefix(), Arc::clone(&kept));
        routes.insert(*drop_route("172.16.0.0/12").prefix(), drop_route("172.16.0.0/12"));
        let new_container = old_container.with_fibs(
            Some(Arc::new(ForwardingInformationBase::from_routes(routes))),
            None,
        );

        let items: Vec<_> = fib_delta::<Ipv4Address>(&old_container, &new_container).collect();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|(_, d)| d.is_added()));
    }
}
