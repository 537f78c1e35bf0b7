//! Common value types for the fabricd switch agent.
//!
//! This crate provides type-safe representations of the primitives shared
//! by the control plane and the forwarding state:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`IpAddress`], [`Ipv4Address`], [`Ipv6Address`]: IP addresses
//! - [`IpPrefix`]: IP network prefixes (CIDR notation)
//! - [`AddressFamily`]: the trait routing containers are generic over
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers
//! - [`PortId`], [`AggregatePortId`], [`PortDescriptor`]: switch ports
//! - [`RouterId`], [`InterfaceId`], [`ClientId`], [`AdminDistance`],
//!   [`ClassId`]: routing identifiers

mod ids;
mod ip;
mod mac;
mod port;
mod vlan;

pub use ids::{AdminDistance, ClassId, ClientId, InterfaceId, RouterId};
pub use ip::{AddressFamily, IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
pub use mac::MacAddress;
pub use port::{AggregatePortId, PortDescriptor, PortId};
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid port descriptor: {0}")]
    InvalidPortDescriptor(String),
}
