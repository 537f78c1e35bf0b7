//! Packet I/O collaborator.
//!
//! The agent hands probe transmissions and switched packets to this
//! boundary; the wire encoding behind it is not the agent's concern.

use async_trait::async_trait;
use fabric_state::NeighborFamily;
use fabric_types::{InterfaceId, Ipv4Address, Ipv6Address, VlanId};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by the packet I/O layer. Send failures are logged and
/// counted by the caller; they never change neighbor state.
#[derive(Debug, Clone, Error)]
pub enum PacketError {
    #[error("transmit failed: {0}")]
    Transmit(String),
}

/// The transmit side of the packet pipeline.
#[async_trait]
pub trait PacketIo: Send + Sync {
    async fn send_arp_request(
        &self,
        vlan: VlanId,
        intf: InterfaceId,
        target: Ipv4Address,
    ) -> Result<(), PacketError>;

    async fn send_ndp_solicitation(
        &self,
        vlan: VlanId,
        intf: InterfaceId,
        target: Ipv6Address,
    ) -> Result<(), PacketError>;

    async fn send_packet_switched(&self, buf: Vec<u8>) -> Result<(), PacketError>;
}

/// Dispatches a probe to the family-appropriate transmit call, so the
/// neighbor cache can stay generic over ARP vs NDP.
#[async_trait]
pub trait ProbeFamily: NeighborFamily {
    async fn send_probe(
        io: &dyn PacketIo,
        vlan: VlanId,
        intf: InterfaceId,
        target: Self,
    ) -> Result<(), PacketError>;
}

#[async_trait]
impl ProbeFamily for Ipv4Address {
    async fn send_probe(
        io: &dyn PacketIo,
        vlan: VlanId,
        intf: InterfaceId,
        target: Self,
    ) -> Result<(), PacketError> {
        io.send_arp_request(vlan, intf, target).await
    }
}

#[async_trait]
impl ProbeFamily for Ipv6Address {
    async fn send_probe(
        io: &dyn PacketIo,
        vlan: VlanId,
        intf: InterfaceId,
        target: Self,
    ) -> Result<(), PacketError> {
        io.send_ndp_solicitation(vlan, intf, target).await
    }
}

/// A transmit sink that only logs. Backs the daemon skeleton and tests
/// that don't inspect probes.
#[derive(Debug, Default)]
pub struct NullPacketIo;

#[async_trait]
impl PacketIo for NullPacketIo {
    async fn send_arp_request(
        &self,
        vlan: VlanId,
        intf: InterfaceId,
        target: Ipv4Address,
    ) -> Result<(), PacketError> {
        debug!(vlan = %vlan, intf = %intf, target = %target, "arp request");
        Ok(())
    }

    async fn send_ndp_solicitation(
        &self,
        vlan: VlanId,
        intf: InterfaceId,
        target: Ipv6Address,
    ) -> Result<(), PacketError> {
        debug!(vlan = %vlan, intf = %intf, target = %target, "ndp solicitation");
        Ok(())
    }

    async fn send_packet_switched(&self, buf: Vec<u8>) -> Result<(), PacketError> {
        debug!(len = buf.len(), "switched packet");
        Ok(())
    }
}
