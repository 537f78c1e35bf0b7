//! Per-VRF forwarding information bases.

use crate::route::{Route, RoutePrefix};
use fabric_types::{AddressFamily, Ipv4Address, Ipv6Address, RouterId};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An ordered map of prefix to resolved route for one address family.
///
/// A FIB is created whole from a resolved RIB snapshot and never mutated
/// afterwards; the updater swaps the entire node in the parent container.
#[derive(Debug)]
pub struct ForwardingInformationBase<A: AddressFamily> {
    routes: BTreeMap<RoutePrefix<A>, Arc<Route<A>>>,
}

impl<A: AddressFamily> Default for ForwardingInformationBase<A> {
    fn default() -> Self {
        ForwardingInformationBase::new()
    }
}

impl<A: AddressFamily> ForwardingInformationBase<A> {
    pub fn new() -> Self {
        ForwardingInformationBase {
            routes: BTreeMap::new(),
        }
    }

    pub fn from_routes(routes: BTreeMap<RoutePrefix<A>, Arc<Route<A>>>) -> Self {
        ForwardingInformationBase { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Exact-prefix lookup.
    pub fn exact_match(&self, prefix: &RoutePrefix<A>) -> Option<&Arc<Route<A>>> {
        self.routes.get(prefix)
    }

    /// Longest-prefix-match lookup, walking mask lengths from the most
    /// specific down.
    pub fn longest_match(&self, addr: A) -> Option<&Arc<Route<A>>> {
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
    pub fn iter(&self) -> btree_map::Iter<'_, RoutePrefix<A>, Arc<Route<A>>> {
        self.routes.iter()
    }

    pub(crate) fn routes(&self) -> &BTreeMap<RoutePrefix<A>, Arc<Route<A>>> {
        &self.routes
    }
}

impl<'a, A: AddressFamily> IntoIterator for &'a ForwardingInformationBase<A> {
    type Item = (&'a RoutePrefix<A>, &'a Arc<Route<A>>);
    type IntoIter = btree_map::Iter<'a, RoutePrefix<A>, Arc<Route<A>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

/// Selects the per-family FIB out of a [`FibContainer`].
pub trait FibFamily: AddressFamily {
    fn fib_of(container: &FibContainer) -> &Arc<ForwardingInformationBase<Self>>;
}

impl FibFamily for Ipv4Address {
    fn fib_of(container: &FibContainer) -> &Arc<ForwardingInformationBase<Self>> {
        container.fib_v4()
    }
}

impl FibFamily for Ipv6Address {
    fn fib_of(container: &FibContainer) -> &Arc<ForwardingInformationBase<Self>> {
        container.fib_v6()
    }
}

/// The pair of v4/v6 FIBs for one VRF.
#[derive(Debug)]
pub struct FibContainer {
    vrf: RouterId,
    fib_v4: Arc<ForwardingInformationBase<Ipv4Address>>,
    fib_v6: Arc<ForwardingInformationBase<Ipv6Address>>,
}

impl FibContainer {
    /// An empty container for a VRF.
    pub fn new(vrf: RouterId) -> Self {
        FibContainer {
            vrf,
            fib_v4: Arc::new(ForwardingInformationBase::new()),
            fib_v6: Arc::new(ForwardingInformationBase::new()),
        }
    }

    pub fn vrf(&self) -> RouterId {
        self.vrf
    }

    pub fn fib_v4(&self) -> &Arc<ForwardingInformationBase<Ipv4Address>> {
        &self.fib_v4
    }

    pub fn fib_v6(&self) -> &Arc<ForwardingInformationBase<Ipv6Address>> {
        &self.fib_v6
    }

    /// Clone with one or both FIBs replaced; untouched families keep
    /// their node identity.
    pub fn with_fibs(
        &self,
        fib_v4: Option<Arc<ForwardingInformationBase<Ipv4Address>>>,
        fib_v6: Option<Arc<ForwardingInformationBase<Ipv6Address>>>,
    ) -> Self {
        FibContainer {
            vrf: self.vrf,
            fib_v4: fib_v4.unwrap_or_else(|| Arc::clone(&self.fib_v4)),
            fib_v6: fib_v6.unwrap_or_else(|| Arc::clone(&self.fib_v6)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteNextHopEntry;
    use fabric_types::AdminDistance;
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> RoutePrefix<Ipv4Address> {
        s.parse().unwrap()
    }

    fn drop_route(s: &str) -> Arc<Route<Ipv4Address>> {
        Arc::new(Route::new(
            prefix(s),
            RouteNextHopEntry::drop(AdminDistance::STATIC_ROUTE),
            None,
            false,
        ))
    }

    fn fib(prefixes: &[&str]) -> ForwardingInformationBase<Ipv4Address> {
        let mut routes = BTreeMap::new();
        for p in prefixes {
            routes.insert(prefix(p), drop_route(p));
        }
        ForwardingInformationBase::from_routes(routes)
    }

    #[test]
    fn test_exact_match() {
        let fib = fib(&["10.0.0.0/8", "10.0.0.0/16"]);
        assert!(fib.exact_match(&prefix("10.0.0.0/8")).is_some());
        assert!(fib.exact_match(&prefix("10.0.0.0/24")).is_none());
    }

    #[test]
    fn test_longest_match_prefers_specific() {
        let fib = fib(&["10.0.0.0/8", "10.1.0.0/16", "0.0.0.0/0"]);

        let hit = fib.longest_match("10.1.2.3".parse().unwrap()).unwrap();
        assert_eq!(*hit.prefix(), prefix("10.1.0.0/16"));

        let hit = fib.longest_match("10.2.0.1".parse().unwrap()).unwrap();
        assert_eq!(*hit.prefix(), prefix("10.0.0.0/8"));

        let hit = fib.longest_match("192.168.0.1".parse().unwrap()).unwrap();
        assert_eq!(*hit.prefix(), prefix("0.0.0.0/0"));
    }

    #[test]
    fn test_longest_match_miss() {
        let fib = fib(&["10.0.0.0/8"]);
        assert!(fib.longest_match("192.168.0.1".parse().unwrap()).is_none());
    }

    #[test]
    fn test_ordered_iteration() {
        let fib = fib(&["192.168.0.0/16", "10.0.0.0/8", "172.16.0.0/12"]);
        let prefixes: Vec<String> = fib.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(
            prefixes,
            vec!["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"]
        );
    }

    #[test]
    fn test_container_keeps_identity_of_untouched_family() {
        let container = FibContainer::new(RouterId::DEFAULT);
        let v6_before = Arc::clone(container.fib_v6());

        let replaced = container.with_fibs(Some(Arc::new(fib(&["10.0.0.0/8"]))), None);
        assert!(Arc::ptr_eq(replaced.fib_v6(), &v6_before));
        assert_eq!(replaced.fib_v4().len(), 1);
    }
}
