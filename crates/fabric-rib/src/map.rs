//! The per-family prefix map backing a VRF's RIB.

use crate::route::RibRoute;
use fabric_state::RoutePrefix;
use fabric_types::AddressFamily;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Ordered map of prefix to RIB route with exact and longest-prefix
/// lookups. No two entries share a prefix by construction of the map.
#[derive(Debug, Clone)]
pub struct NetworkToRouteMap<A: AddressFamily> {
    routes: BTreeMap<RoutePrefix<A>, RibRoute<A>>,
}

impl<A: AddressFamily> Default for NetworkToRouteMap<A> {
    fn default() -> Self {
        NetworkToRouteMap::new()
    }
}

impl<A: AddressFamily> NetworkToRouteMap<A> {
    pub fn new() -> Self {
        NetworkToRouteMap {
            routes: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Inserts a route, replacing any previous route with the same prefix.
    pub fn insert(&mut self, route: RibRoute<A>) {
        self.routes.insert(*route.prefix(), route);
    }

    /// Removes a route by prefix.
    pub fn erase(&mut self, prefix: &RoutePrefix<A>) -> Option<RibRoute<A>> {
        self.routes.remove(prefix)
    }

    pub fn exact_match(&self, prefix: &RoutePrefix<A>) -> Option<&RibRoute<A>> {
        self.routes.get(prefix)
    }

    pub fn exact_match_mut(&mut self, prefix: &RoutePrefix<A>) -> Option<&mut RibRoute<A>> {
        self.routes.get_mut(prefix)
    }

    /// Gets an existing route or inserts an empty one for the prefix.
    pub fn entry_or_insert(&mut self, prefix: RoutePrefix<A>) -> &mut RibRoute<A> {
        self.routes
            .entry(prefix)
            .or_insert_with(|| RibRoute::new(prefix))
    }

    /// Longest-prefix-match lookup, walking mask lengths from the most
    /// specific down.
    pub fn longest_match(&self, addr: A) -> Option<&RibRoute<A>> {
        for mask in (0..=A::BITS).rev() {
            let key = RoutePrefix {
                network: addr.masked(mask),
                mask,
            };
            if let Some(route) = self.routes.get(&key) {
                return Some(route);
            }
        }
        None
    }

    /// Prefix-ordered iteration.
    pub fn iter(&self) -> btree_map::Iter<'_, RoutePrefix<A>, RibRoute<A>> {
        self.routes.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, RoutePrefix<A>, RibRoute<A>> {
        self.routes.iter_mut()
    }

    /// The prefixes currently present, in order.
    pub fn prefixes(&self) -> Vec<RoutePrefix<A>> {
        self.routes.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_state::RouteNextHopEntry;
    use fabric_types::{AdminDistance, ClientId, Ipv4Address};
    use pretty_assertions::assert_eq;

    fn map_with(prefixes: &[&str]) -> NetworkToRouteMap<Ipv4Address> {
        let mut map = NetworkToRouteMap::new();
        for (i, p) in prefixes.iter().enumerate() {
            let mut route = RibRoute::new(p.parse().unwrap());
            route.set_entry(
                ClientId::STATIC,
                RouteNextHopEntry::drop(AdminDistance::STATIC_ROUTE),
                i as u64,
            );
            map.insert(route);
        }
        map
    }

    #[test]
    fn test_insert_replaces_same_prefix() {
        let mut map = map_with(&["10.0.0.0/8"]);
        map.insert(RibRoute::new("10.0.0.0/8".parse().unwrap()));
        assert_eq!(map.len(), 1);
        assert!(!map
            .exact_match(&"10.0.0.0/8".parse().unwrap())
            .unwrap()
            .has_entries());
    }

    #[test]
    fn test_exact_match_distinguishes_masks() {
        let map = map_with(&["10.0.0.0/8", "10.0.0.0/16"]);
        assert!(map.exact_match(&"10.0.0.0/8".parse().unwrap()).is_some());
        assert!(map.exact_match(&"10.0.0.0/16".parse().unwrap()).is_some());
        assert!(map.exact_match(&"10.0.0.0/24".parse().unwrap()).is_none());
    }

    #[test]
    fn test_longest_match() {
        let map = map_with(&["0.0.0.0/0", "10.0.0.0/8", "10.1.0.0/16"]);

        let hit = map.longest_match("10.1.2.3".parse().unwrap()).unwrap();
        assert_eq!(hit.prefix().to_string(), "10.1.0.0/16");

        let hit = map.longest_match("10.9.0.1".parse().unwrap()).unwrap();
        assert_eq!(hit.prefix().to_string(), "10.0.0.0/8");

        let hit = map.longest_match("8.8.8.8".parse().unwrap()).unwrap();
        assert_eq!(hit.prefix().to_string(), "0.0.0.0/0");
    }

    #[test]
    fn test_erase() {
        let mut map = map_with(&["10.0.0.0/8"]);
        assert!(map.erase(&"10.0.0.0/8".parse().unwrap()).is_some());
        assert!(map.erase(&"10.0.0.0/8".parse().unwrap()).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_ordered_iteration() {
        let map = map_with(&["192.168.0.0/16", "10.0.0.0/8"]);
        let order: Vec<String> = map.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(order, vec!["10.0.0.0/8", "192.168.0.0/16"]);
    }
}
