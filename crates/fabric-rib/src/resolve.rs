//! Recursive next-hop resolution.
//!
//! For every route whose winning contribution points at gateway addresses,
//! the resolver chases longest-prefix matches within the same VRF until it
//! reaches a connected or interface-bound route. Weights multiply along
//! the chain and the flattened set is deduplicated by (address,
//! interface). A route whose chase exceeds the depth bound or revisits a
//! prefix stays unresolved and will be absent from the FIB.

use crate::map::NetworkToRouteMap;
use crate::route::ResolutionFailure;
use fabric_state::{ForwardAction, NextHop, NextHopSet, RouteNextHopEntry, RoutePrefix};
use fabric_types::{AddressFamily, ClientId, InterfaceId, IpAddress};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Bound on the resolution chain length.
pub const MAX_RESOLUTION_DEPTH: usize = 16;

/// Counters produced by one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved: usize,
    pub unresolved: usize,
    pub unreachable: usize,
    pub cycles: usize,
}

#[derive(Debug, Clone)]
enum Outcome {
    Resolved {
        forward: RouteNextHopEntry,
        connected: bool,
    },
    Unreachable,
    Cycle,
}

/// Resolves every route in the map, writing each route's forwarding
/// decision (or clearing it) in place.
pub fn resolve<A: AddressFamily>(map: &mut NetworkToRouteMap<A>) -> ResolveStats {
    let prefixes = map.prefixes();
    let mut memo: BTreeMap<RoutePrefix<A>, Outcome> = BTreeMap::new();
    let mut outcomes: BTreeMap<RoutePrefix<A>, Outcome> = BTreeMap::new();

    for prefix in &prefixes {
        let mut visiting = BTreeSet::new();
        let outcome = resolve_prefix(map, *prefix, &mut memo, &mut visiting, 0);
        outcomes.insert(*prefix, outcome);
    }

    let mut stats = ResolveStats::default();
    for (prefix, outcome) in outcomes {
        if let Some(route) = map.exact_match_mut(&prefix) {
            match outcome {
                Outcome::Resolved { forward, connected } => {
                    stats.resolved += 1;
                    route.set_resolved(forward, connected);
                }
                Outcome::Unreachable => {
                    stats.unresolved += 1;
                    stats.unreachable += 1;
                    route.clear_resolution(ResolutionFailure::NextHopUnreachable);
                    warn!(prefix = %prefix, "route has no reachable next hop");
                }
                Outcome::Cycle => {
                    stats.unresolved += 1;
                    stats.cycles += 1;
                    route.clear_resolution(ResolutionFailure::NextHopCycle);
                    warn!(prefix = %prefix, "next-hop resolution cycle");
                }
            }
        }
    }
    stats
}

fn resolve_prefix<A: AddressFamily>(
    map: &NetworkToRouteMap<A>,
    prefix: RoutePrefix<A>,
    memo: &mut BTreeMap<RoutePrefix<A>, Outcome>,
    visiting: &mut BTreeSet<RoutePrefix<A>>,
    depth: usize,
) -> Outcome {
    if let Some(done) = memo.get(&prefix) {
        return done.clone();
    }
    if depth > MAX_RESOLUTION_DEPTH {
        // Not memoized: the bound is a property of this chain, not of
        // the prefix itself.
        return Outcome::Cycle;
    }

    let route = match map.exact_match(&prefix) {
        Some(route) => route,
        None => return Outcome::Unreachable,
    };
    let (best_client, best) = match route.best_entry() {
        Some(best) => best,
        None => return Outcome::Unreachable,
    };
    let connected = best_client == ClientId::INTERFACE;
    let distance = best.entry.distance;

    let outcome = match &best.entry.action {
        ForwardAction::Drop => Outcome::Resolved {
            forward: RouteNextHopEntry::drop(distance),
            connected,
        },
        ForwardAction::ToCpu => Outcome::Resolved {
            forward: RouteNextHopEntry::to_cpu(distance),
            connected,
        },
        ForwardAction::NextHops(hops) => {
            visiting.insert(prefix);

            // Dedup by (address, interface), first occurrence wins.
            let mut flattened: BTreeMap<(IpAddress, InterfaceId), NextHop> = BTreeMap::new();
            let mut saw_cycle = false;

            for nh in hops {
                if let Some(intf) = nh.interface {
                    flattened
                        .entry((nh.addr, intf))
                        .or_insert(NextHop::resolved(nh.addr, intf, nh.weight));
                    continue;
                }

                // Gateways must be of the route's own family.
                let gw = match A::from_ip(nh.addr) {
                    Some(gw) => gw,
                    None => continue,
                };
                let target_prefix = match map.longest_match(gw) {
                    Some(target) => *target.prefix(),
                    None => continue,
                };
                if visiting.contains(&target_prefix) {
                    saw_cycle = true;
                    continue;
                }

                match resolve_prefix(map, target_prefix, memo, visiting, depth + 1) {
                    Outcome::Resolved {
                        forward,
                        connected: via_connected,
                    } => {
                        if let ForwardAction::NextHops(resolved) = &forward.action {
                            for rh in resolved {
                                let intf = match rh.interface {
                                    Some(intf) => intf,
                                    None => continue,
                                };
                                // Through a connected route the gateway
                                // itself is the adjacency; otherwise the
                                // deeper triples carry through.
                                let addr = if via_connected { nh.addr } else { rh.addr };
                                let weight = nh.weight.saturating_mul(rh.weight);
                                flattened
                                    .entry((addr, intf))
                                    .or_insert(NextHop::resolved(addr, intf, weight));
                            }
                        }
                        // A chain ending in Drop or ToCpu contributes no
                        // adjacency.
                    }
                    Outcome::Cycle => saw_cycle = true,
                    Outcome::Unreachable => {}
                }
            }

            visiting.remove(&prefix);

            if flattened.is_empty() {
                if saw_cycle {
                    Outcome::Cycle
                } else {
                    Outcome::Unreachable
                }
            } else {
                let set: NextHopSet = flattened.into_values().collect();
                Outcome::Resolved {
                    forward: RouteNextHopEntry::from_next_hops(set, distance),
                    connected,
                }
            }
        }
    };

    // Cycle outcomes depend on the chain they were discovered on (the
    // depth bound in particular), so only context-free outcomes are
    // memoized; cyclic routes are re-chased from their own root.
    match outcome {
        Outcome::Cycle => {}
        ref done => {
            memo.insert(prefix, done.clone());
        }
    }
    outcome
}
