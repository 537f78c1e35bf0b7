//! The per-VRF routing information base.

use crate::map::NetworkToRouteMap;
use crate::resolve::resolve;
use crate::route::RibRoute;
use crate::updater::ForwardingInformationBaseUpdater;
use fabric_state::{RouteNextHopEntry, RoutePrefix, SwitchState};
use fabric_types::{
    AddressFamily, ClassId, ClientId, IpAddress, IpPrefix, Ipv4Address, Ipv6Address, RouterId,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Errors from RIB batch operations. A failed batch leaves the RIB
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RibError {
    #[error("unknown VRF: {0}")]
    VrfUnknown(RouterId),

    #[error("malformed prefix: {0}")]
    PrefixMalformed(String),
}

/// Result type for RIB operations.
pub type Result<T> = std::result::Result<T, RibError>;

/// One prefix contributed by a client in a batch.
#[derive(Debug, Clone)]
pub struct RouteAddition {
    pub prefix: IpPrefix,
    pub entry: RouteNextHopEntry,
    pub class_id: Option<ClassId>,
}

impl RouteAddition {
    pub fn new(prefix: IpPrefix, entry: RouteNextHopEntry) -> Self {
        RouteAddition {
            prefix,
            entry,
            class_id: None,
        }
    }

    pub fn with_class_id(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }
}

/// A batch of route changes from one client.
#[derive(Debug, Clone, Default)]
pub struct RouteUpdate {
    pub additions: Vec<RouteAddition>,
    pub deletions: Vec<IpPrefix>,
}

impl RouteUpdate {
    pub fn new() -> Self {
        RouteUpdate::default()
    }

    pub fn add(mut self, addition: RouteAddition) -> Self {
        self.additions.push(addition);
        self
    }

    pub fn delete(mut self, prefix: IpPrefix) -> Self {
        self.deletions.push(prefix);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// Counters returned by [`Rib::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub routes_added: usize,
    pub routes_deleted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub unreachable: usize,
    pub cycles: usize,
    pub duration: Duration,
}

/// The v4/v6 route maps of one VRF plus the insertion-sequence counter
/// used for client tie-breaks.
#[derive(Debug, Clone, Default)]
pub struct VrfRib {
    v4: NetworkToRouteMap<Ipv4Address>,
    v6: NetworkToRouteMap<Ipv6Address>,
    next_seq: u64,
}

/// Selects the per-family route map out of a [`VrfRib`].
pub trait RibFamily: AddressFamily {
    fn map_of(rib: &VrfRib) -> &NetworkToRouteMap<Self>;
}

impl RibFamily for Ipv4Address {
    fn map_of(rib: &VrfRib) -> &NetworkToRouteMap<Self> {
        &rib.v4
    }
}

impl RibFamily for Ipv6Address {
    fn map_of(rib: &VrfRib) -> &NetworkToRouteMap<Self> {
        &rib.v6
    }
}

/// The RIB: a fixed set of VRFs, each guarded by its own mutex so batches
/// for different VRFs never serialize against each other.
#[derive(Debug, Default)]
pub struct Rib {
    vrfs: BTreeMap<RouterId, Mutex<VrfRib>>,
}

impl Rib {
    /// A RIB over the given VRF set. Updates against any other VRF fail
    /// with [`RibError::VrfUnknown`].
    pub fn new(vrfs: impl IntoIterator<Item = RouterId>) -> Self {
        Rib {
            vrfs: vrfs
                .into_iter()
                .map(|vrf| (vrf, Mutex::new(VrfRib::default())))
                .collect(),
        }
    }

    pub fn has_vrf(&self, vrf: RouterId) -> bool {
        self.vrfs.contains_key(&vrf)
    }

    pub fn vrf_ids(&self) -> Vec<RouterId> {
        self.vrfs.keys().copied().collect()
    }

    /// Applies one client's batch under the VRF's critical section, runs
    /// resolution, and projects the result onto `state`.
    ///
    /// All-or-nothing: any error leaves the RIB exactly as it was.
    pub fn update(
        &self,
        vrf: RouterId,
        client: ClientId,
        update: RouteUpdate,
        state: &Arc<SwitchState>,
    ) -> Result<(Arc<SwitchState>, UpdateStats)> {
        let start = Instant::now();
        let lock = self
            .vrfs
            .get(&vrf)
            .ok_or(RibError::VrfUnknown(vrf))?;
        let mut guard = lock.lock().expect("vrf rib lock poisoned");

        // Work on a copy so a malformed prefix mid-batch cannot leave a
        // half-applied RIB behind.
        let mut next = guard.clone();
        let mut stats = UpdateStats::default();

        for prefix in &update.deletions {
            match prefix.address() {
                IpAddress::V4(_) => {
                    delete_route(&mut next.v4, typed_prefix::<Ipv4Address>(prefix)?, client, &mut stats)
                }
                IpAddress::V6(_) => {
                    delete_route(&mut next.v6, typed_prefix::<Ipv6Address>(prefix)?, client, &mut stats)
                }
            }
        }

        for addition in &update.additions {
            let seq = next.next_seq;
            next.next_seq += 1;
            match addition.prefix.address() {
                IpAddress::V4(_) => add_route(
                    &mut next.v4,
                    typed_prefix::<Ipv4Address>(&addition.prefix)?,
                    client,
                    addition,
                    seq,
                    &mut stats,
                ),
                IpAddress::V6(_) => add_route(
                    &mut next.v6,
                    typed_prefix::<Ipv6Address>(&addition.prefix)?,
                    client,
                    addition,
                    seq,
                    &mut stats,
                ),
            }
        }

        let v4_stats = resolve(&mut next.v4);
        let v6_stats = resolve(&mut next.v6);
        stats.resolved = v4_stats.resolved + v6_stats.resolved;
        stats.unresolved = v4_stats.unresolved + v6_stats.unresolved;
        stats.unreachable = v4_stats.unreachable + v6_stats.unreachable;
        stats.cycles = v4_stats.cycles + v6_stats.cycles;

        let updater = ForwardingInformationBaseUpdater::new(vrf);
        let new_state = updater.apply(&next.v4, &next.v6, state);

        *guard = next;
        stats.duration = start.elapsed();

        info!(
            vrf = %vrf,
            client = %client,
            added = stats.routes_added,
            deleted = stats.routes_deleted,
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            "applied route batch"
        );

        Ok((new_state, stats))
    }

    /// Exact-prefix lookup, returning a snapshot of the route.
    pub fn exact_match<A: RibFamily>(
        &self,
        vrf: RouterId,
        prefix: &RoutePrefix<A>,
    ) -> Option<RibRoute<A>> {
        let guard = self.vrfs.get(&vrf)?.lock().expect("vrf rib lock poisoned");
        A::map_of(&guard).exact_match(prefix).cloned()
    }

    /// Longest-prefix lookup, returning a snapshot of the route.
    pub fn longest_match<A: RibFamily>(&self, vrf: RouterId, addr: A) -> Option<RibRoute<A>> {
        let guard = self.vrfs.get(&vrf)?.lock().expect("vrf rib lock poisoned");
        A::map_of(&guard).longest_match(addr).cloned()
    }

    /// Ordered traversal of one VRF and family.
    pub fn for_each_route<A: RibFamily>(
        &self,
        vrf: RouterId,
        mut f: impl FnMut(&RibRoute<A>),
    ) -> Result<()> {
        let lock = self.vrfs.get(&vrf).ok_or(RibError::VrfUnknown(vrf))?;
        let guard = lock.lock().expect("vrf rib lock poisoned");
        for (_, route) in A::map_of(&guard).iter() {
            f(route);
        }
        Ok(())
    }
}

fn typed_prefix<A: AddressFamily>(prefix: &IpPrefix) -> Result<RoutePrefix<A>> {
    let network = A::from_ip(*prefix.address())
        .ok_or_else(|| RibError::PrefixMalformed(prefix.to_string()))?;
    RoutePrefix::new(network, prefix.prefix_len())
        .map_err(|e| RibError::PrefixMalformed(e.to_string()))
}

fn delete_route<A: AddressFamily>(
    map: &mut NetworkToRouteMap<A>,
    prefix: RoutePrefix<A>,
    client: ClientId,
    stats: &mut UpdateStats,
) {
    if let Some(route) = map.exact_match_mut(&prefix) {
        if route.remove_entry(client) {
            stats.routes_deleted += 1;
            if !route.has_entries() {
                map.erase(&prefix);
            }
        } else {
            debug!(prefix = %prefix, client = %client, "delete for client without entry");
        }
    } else {
        debug!(prefix = %prefix, "delete for unknown prefix");
    }
}

fn add_route<A: AddressFamily>(
    map: &mut NetworkToRouteMap<A>,
    prefix: RoutePrefix<A>,
    client: ClientId,
    addition: &RouteAddition,
    seq: u64,
    stats: &mut UpdateStats,
) {
    let route = map.entry_or_insert(prefix);
    route.set_entry(client, addition.entry.clone(), seq);
    if addition.class_id.is_some() {
        route.set_class_id(addition.class_id);
    }
    stats.routes_added += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_types::AdminDistance;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn drop_add(prefix: &str) -> RouteAddition {
        RouteAddition::new(
            prefix.parse().unwrap(),
            RouteNextHopEntry::drop(AdminDistance::STATIC_ROUTE),
        )
    }

    #[test]
    fn test_unknown_vrf_rejected() {
        let rib = Rib::new([RouterId::DEFAULT]);
        let state = Arc::new(SwitchState::new());

        let result = rib.update(
            RouterId(9),
            ClientId::STATIC,
            RouteUpdate::new().add(drop_add("10.0.0.0/8")),
            &state,
        );
        assert_eq!(result.unwrap_err(), RibError::VrfUnknown(RouterId(9)));
    }

    #[test]
    fn test_malformed_prefix_aborts_batch() {
        let rib = Rib::new([RouterId::DEFAULT]);
        let state = Arc::new(SwitchState::new());

        // First addition is fine, second has host bits set; the whole
        // batch must be rejected.
        let update = RouteUpdate::new()
            .add(drop_add("10.0.0.0/8"))
            .add(drop_add("192.168.1.1/16"));
        let result = rib.update(RouterId::DEFAULT, ClientId::STATIC, update, &state);
        assert!(matches!(result, Err(RibError::PrefixMalformed(_))));

        // Nothing from the batch landed.
        let lookup = rib.exact_match::<Ipv4Address>(
            RouterId::DEFAULT,
            &"10.0.0.0/8".parse().unwrap(),
        );
        assert!(lookup.is_none());
    }

    #[test]
    fn test_add_then_delete_round_trip() {
        let rib = Rib::new([RouterId::DEFAULT]);
        let state = Arc::new(SwitchState::new());

        let (state, stats) = rib
            .update(
                RouterId::DEFAULT,
                ClientId::STATIC,
                RouteUpdate::new().add(drop_add("10.0.0.0/8")),
                &state,
            )
            .unwrap();
        assert_eq!(stats.routes_added, 1);
        assert_eq!(stats.resolved, 1);

        let (state, stats) = rib
            .update(
                RouterId::DEFAULT,
                ClientId::STATIC,
                RouteUpdate::new().delete("10.0.0.0/8".parse().unwrap()),
                &state,
            )
            .unwrap();
        assert_eq!(stats.routes_deleted, 1);
        assert!(state
            .get_fib_container(RouterId::DEFAULT)
            .unwrap()
            .fib_v4()
            .is_empty());
    }

    #[test]
    fn test_delete_only_removes_own_client_entry() {
        let rib = Rib::new([RouterId::DEFAULT]);
        let state = Arc::new(SwitchState::new());

        let (state, _) = rib
            .update(
                RouterId::DEFAULT,
                ClientId::STATIC,
                RouteUpdate::new().add(drop_add("10.0.0.0/8")),
                &state,
            )
            .unwrap();
        let (state, _) = rib
            .update(
                RouterId::DEFAULT,
                ClientId::BGP,
                RouteUpdate::new().add(RouteAddition::new(
                    "10.0.0.0/8".parse().unwrap(),
                    RouteNextHopEntry::to_cpu(AdminDistance::EBGP),
                )),
                &state,
            )
            .unwrap();

        // Static wins on distance.
        let route = rib
            .exact_match::<Ipv4Address>(RouterId::DEFAULT, &"10.0.0.0/8".parse().unwrap())
            .unwrap();
        assert!(route.forward_info().unwrap().action.is_drop());

        // Deleting the static entry leaves BGP's contribution in place.
        let (_, _) = rib
            .update(
                RouterId::DEFAULT,
                ClientId::STATIC,
                RouteUpdate::new().delete("10.0.0.0/8".parse().unwrap()),
                &state,
            )
            .unwrap();
        let route = rib
            .exact_match::<Ipv4Address>(RouterId::DEFAULT, &"10.0.0.0/8".parse().unwrap())
            .unwrap();
        assert!(route.forward_info().unwrap().action.is_to_cpu());
    }

    #[test]
    fn test_for_each_route_ordered() {
        let rib = Rib::new([RouterId::DEFAULT]);
        let state = Arc::new(SwitchState::new());
        rib.update(
            RouterId::DEFAULT,
            ClientId::STATIC,
            RouteUpdate::new()
                .add(drop_add("192.168.0.0/16"))
                .add(drop_add("10.0.0.0/8")),
            &state,
        )
        .unwrap();

        let mut seen = vec![];
        rib.for_each_route::<Ipv4Address>(RouterId::DEFAULT, |route| {
            seen.push(route.prefix().to_string());
        })
        .unwrap();
        assert_eq!(seen, vec!["10.0.0.0/8", "192.168.0.0/16"]);
    }
}
