//! Route prefixes, next hops and forwarding decisions.

use crate::StateError;
use fabric_types::{AddressFamily, AdminDistance, ClassId, InterfaceId, IpAddress};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A network prefix keyed by (network, mask).
///
/// Ordering is lexicographic by network address first, mask second, which
/// gives the ordered iteration the FIB programmers rely on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(bound = "A: AddressFamily")]
pub struct RoutePrefix<A: AddressFamily> {
    pub network: A,
    pub mask: u8,
}

impl<A: AddressFamily> RoutePrefix<A> {
    /// Creates a prefix, rejecting masks wider than the family and
    /// networks with host bits set beyond the mask.
    pub fn new(network: A, mask: u8) -> Result<Self, StateError> {
        if mask > A::BITS {
            return Err(StateError::PrefixMalformed(format!(
                "mask /{} exceeds maximum /{}",
                mask,
                A::BITS
            )));
        }
        if network.masked(mask) != network {
            return Err(StateError::PrefixMalformed(format!(
                "{} has host bits set beyond /{}",
                network, mask
            )));
        }
        Ok(RoutePrefix { network, mask })
    }

    /// Returns true if `addr` falls inside this prefix.
    pub fn contains(&self, addr: A) -> bool {
        addr.masked(self.mask) == self.network
    }

    /// Returns true if this is the default route for the family.
    pub fn is_default(&self) -> bool {
        self.mask == 0
    }
}

impl<A: AddressFamily> fmt::Display for RoutePrefix<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.mask)
    }
}

impl<A: AddressFamily> FromStr for RoutePrefix<A> {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (net_str, mask_str) = s
            .rsplit_once('/')
            .ok_or_else(|| StateError::PrefixMalformed(s.to_string()))?;
        let network: A = net_str
            .parse()
            .map_err(|_| StateError::PrefixMalformed(s.to_string()))?;
        let mask: u8 = mask_str
            .parse()
            .map_err(|_| StateError::PrefixMalformed(s.to_string()))?;
        RoutePrefix::new(network, mask)
    }
}

/// A single next hop: a gateway address, the interface it is reachable
/// over once resolved, and a UCMP weight.
///
/// Ordering is (addr, interface, weight) so sets of next hops iterate
/// deterministically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NextHop {
    pub addr: IpAddress,
    pub interface: Option<InterfaceId>,
    pub weight: u32,
}

impl NextHop {
    /// Default ECMP weight.
    pub const DEFAULT_WEIGHT: u32 = 1;

    /// A next hop already bound to an interface.
    pub fn resolved(addr: IpAddress, interface: InterfaceId, weight: u32) -> Self {
        NextHop {
            addr,
            interface: Some(interface),
            weight,
        }
    }

    /// A gateway next hop that still needs recursive resolution.
    pub fn unresolved(addr: IpAddress, weight: u32) -> Self {
        NextHop {
            addr,
            interface: None,
            weight,
        }
    }

    /// Returns true if the next hop is bound to an interface.
    pub fn is_resolved(&self) -> bool {
        self.interface.is_some()
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interface {
            Some(intf) => write!(f, "{}@{}x{}", self.addr, intf, self.weight),
            None => write!(f, "{}x{}", self.addr, self.weight),
        }
    }
}

/// An ordered multi-path next-hop set.
pub type NextHopSet = BTreeSet<NextHop>;

/// What a route does with matching packets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForwardAction {
    /// Silently discard.
    Drop,
    /// Punt to the CPU for software handling.
    ToCpu,
    /// Forward over the contained next-hop set.
    NextHops(NextHopSet),
}

impl ForwardAction {
    pub fn is_drop(&self) -> bool {
        matches!(self, ForwardAction::Drop)
    }

    pub fn is_to_cpu(&self) -> bool {
        matches!(self, ForwardAction::ToCpu)
    }

    /// The next-hop set, if this action forwards.
    pub fn next_hops(&self) -> Option<&NextHopSet> {
        match self {
            ForwardAction::NextHops(set) => Some(set),
            _ => None,
        }
    }
}

impl fmt::Display for ForwardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardAction::Drop => write!(f, "drop"),
            ForwardAction::ToCpu => write!(f, "to-cpu"),
            ForwardAction::NextHops(set) => {
                let mut first = true;
                for nh in set {
                    if !first {
                        write!(f, ",")?;
                    }
                    first = false;
                    write!(f, "{}", nh)?;
                }
                Ok(())
            }
        }
    }
}

/// A forwarding decision: an action plus the admin distance of the client
/// that contributed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteNextHopEntry {
    pub action: ForwardAction,
    pub distance: AdminDistance,
}

impl RouteNextHopEntry {
    pub fn drop(distance: AdminDistance) -> Self {
        RouteNextHopEntry {
            action: ForwardAction::Drop,
            distance,
        }
    }

    pub fn to_cpu(distance: AdminDistance) -> Self {
        RouteNextHopEntry {
            action: ForwardAction::ToCpu,
            distance,
        }
    }

    pub fn from_next_hops(next_hops: NextHopSet, distance: AdminDistance) -> Self {
        RouteNextHopEntry {
            action: ForwardAction::NextHops(next_hops),
            distance,
        }
    }
}

impl fmt::Display for RouteNextHopEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (distance {})", self.action, self.distance)
    }
}

/// A fully-resolved route as installed in a FIB.
///
/// FIB routes are resolved by construction: `forward` always carries a
/// meaningful action, and a `NextHops` action always has a non-empty set
/// of interface-bound hops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "A: AddressFamily")]
pub struct Route<A: AddressFamily> {
    prefix: RoutePrefix<A>,
    forward: RouteNextHopEntry,
    class_id: Option<ClassId>,
    connected: bool,
}

impl<A: AddressFamily> Route<A> {
    pub fn new(
        prefix: RoutePrefix<A>,
        forward: RouteNextHopEntry,
        class_id: Option<ClassId>,
        connected: bool,
    ) -> Self {
        Route {
            prefix,
            forward,
            class_id,
            connected,
        }
    }

    pub fn prefix(&self) -> &RoutePrefix<A> {
        &self.prefix
    }

    pub fn forward_info(&self) -> &RouteNextHopEntry {
        &self.forward
    }

    pub fn class_id(&self) -> Option<ClassId> {
        self.class_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Clone with a replacement forwarding decision, keeping the fields
    /// that are unrelated to resolution.
    pub fn with_forward_info(
        &self,
        forward: RouteNextHopEntry,
        class_id: Option<ClassId>,
        connected: bool,
    ) -> Self {
        Route {
            prefix: self.prefix,
            forward,
            class_id,
            connected,
        }
    }
}

impl<A: AddressFamily> fmt::Display for Route<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.prefix, self.forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_types::Ipv4Address;
    use pretty_assertions::assert_eq;

    fn v4(s: &str) -> Ipv4Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_prefix_ordering() {
        let a: RoutePrefix<Ipv4Address> = "10.0.0.0/8".parse().unwrap();
        let b: RoutePrefix<Ipv4Address> = "10.0.0.0/16".parse().unwrap();
        let c: RoutePrefix<Ipv4Address> = "192.168.0.0/16".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_prefix_rejects_host_bits() {
        assert!(RoutePrefix::new(v4("10.0.0.1"), 8).is_err());
        assert!(RoutePrefix::new(v4("10.0.0.0"), 8).is_ok());
    }

    #[test]
    fn test_prefix_rejects_wide_mask() {
        assert!(RoutePrefix::new(v4("10.0.0.0"), 33).is_err());
    }

    #[test]
    fn test_prefix_contains() {
        let p: RoutePrefix<Ipv4Address> = "10.0.0.0/8".parse().unwrap();
        assert!(p.contains(v4("10.1.2.3")));
        assert!(!p.contains(v4("11.0.0.0")));
    }

    #[test]
    fn test_prefix_serde_round_trip() {
        let p: RoutePrefix<Ipv4Address> = "172.16.0.0/12".parse().unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: RoutePrefix<Ipv4Address> = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn test_prefix_display_round_trip() {
        let p: RoutePrefix<Ipv4Address> = "192.168.0.0/16".parse().unwrap();
        assert_eq!(p.to_string().parse::<RoutePrefix<Ipv4Address>>().unwrap(), p);
    }

    #[test]
    fn test_next_hop_resolution_flag() {
        let gw = NextHop::unresolved("10.0.0.1".parse().unwrap(), 1);
        assert!(!gw.is_resolved());

        let bound = NextHop::resolved(
            "10.0.0.1".parse().unwrap(),
            fabric_types::InterfaceId(1),
            2,
        );
        assert!(bound.is_resolved());
    }

    #[test]
    fn test_forward_action_accessors() {
        assert!(ForwardAction::Drop.is_drop());
        assert!(ForwardAction::ToCpu.is_to_cpu());

        let mut set = NextHopSet::new();
        set.insert(NextHop::unresolved("10.0.0.1".parse().unwrap(), 1));
        let action = ForwardAction::NextHops(set);
        assert_eq!(action.next_hops().unwrap().len(), 1);
    }
}
