//! Routing identifiers: VRFs, interfaces, route clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a virtual routing instance (VRF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterId(pub u32);

impl RouterId {
    /// The default VRF.
    pub const DEFAULT: RouterId = RouterId(0);
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vrf{}", self.0)
    }
}

/// Identifier of an L3 interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(pub u32);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intf{}", self.0)
    }
}

/// Identifier of a route-contributing client.
///
/// Multiple control-plane clients may advertise the same prefix; the
/// winner is picked by admin distance with client recency as the
/// tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl ClientId {
    pub const BGP: ClientId = ClientId(0);
    pub const STATIC: ClientId = ClientId(1);
    pub const INTERFACE: ClientId = ClientId(2);
    pub const LINK_LOCAL: ClientId = ClientId(3);
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client{}", self.0)
    }
}

/// Per-client route preference. Lower wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminDistance(pub u8);

impl AdminDistance {
    pub const DIRECTLY_CONNECTED: AdminDistance = AdminDistance(0);
    pub const STATIC_ROUTE: AdminDistance = AdminDistance(1);
    pub const EBGP: AdminDistance = AdminDistance(20);
    pub const IBGP: AdminDistance = AdminDistance(200);
    pub const MAX: AdminDistance = AdminDistance(255);
}

impl fmt::Display for AdminDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque class-of-service tag carried by a route and programmed into
/// hardware alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(RouterId::DEFAULT.to_string(), "vrf0");
        assert_eq!(InterfaceId(4).to_string(), "intf4");
        assert_eq!(ClientId::BGP.to_string(), "client0");
    }

    #[test]
    fn test_admin_distance_ordering() {
        assert!(AdminDistance::DIRECTLY_CONNECTED < AdminDistance::STATIC_ROUTE);
        assert!(AdminDistance::STATIC_ROUTE < AdminDistance::EBGP);
        assert!(AdminDistance::EBGP < AdminDistance::IBGP);
        assert!(AdminDistance::IBGP < AdminDistance::MAX);
    }
}
