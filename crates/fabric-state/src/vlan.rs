//! VLAN nodes of the switch state tree.

use crate::neighbor::{NeighborFamily, NeighborTable};
use fabric_types::{InterfaceId, Ipv4Address, Ipv6Address, VlanId};
use std::sync::Arc;

/// A VLAN with its member interfaces and the ARP/NDP tables learned on it.
#[derive(Debug)]
pub struct Vlan {
    id: VlanId,
    name: String,
    interfaces: Vec<InterfaceId>,
    arp_table: Arc<NeighborTable<Ipv4Address>>,
    ndp_table: Arc<NeighborTable<Ipv6Address>>,
}

impl Vlan {
    pub fn new(id: VlanId, name: impl Into<String>, interfaces: Vec<InterfaceId>) -> Self {
        Vlan {
            id,
            name: name.into(),
            interfaces,
            arp_table: Arc::new(NeighborTable::new()),
            ndp_table: Arc::new(NeighborTable::new()),
        }
    }

    pub fn id(&self) -> VlanId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interfaces(&self) -> &[InterfaceId] {
        &self.interfaces
    }

    pub fn arp_table(&self) -> &Arc<NeighborTable<Ipv4Address>> {
        &self.arp_table
    }

    pub fn ndp_table(&self) -> &Arc<NeighborTable<Ipv6Address>> {
        &self.ndp_table
    }

    /// Clone with a replacement ARP table; everything else keeps its
    /// node identity.
    pub fn with_arp_table(&self, table: Arc<NeighborTable<Ipv4Address>>) -> Self {
        Vlan {
            id: self.id,
            name: self.name.clone(),
            interfaces: self.interfaces.clone(),
            arp_table: table,
            ndp_table: Arc::clone(&self.ndp_table),
        }
    }

    /// Clone with a replacement NDP table.
    pub fn with_ndp_table(&self, table: Arc<NeighborTable<Ipv6Address>>) -> Self {
        Vlan {
            id: self.id,
            name: self.name.clone(),
            interfaces: self.interfaces.clone(),
            arp_table: Arc::clone(&self.arp_table),
            ndp_table: table,
        }
    }
}

impl NeighborFamily for Ipv4Address {
    fn table_of(vlan: &Vlan) -> &Arc<NeighborTable<Self>> {
        vlan.arp_table()
    }

    fn vlan_with_table(vlan: &Vlan, table: Arc<NeighborTable<Self>>) -> Vlan {
        vlan.with_arp_table(table)
    }
}

impl NeighborFamily for Ipv6Address {
    fn table_of(vlan: &Vlan) -> &Arc<NeighborTable<Self>> {
        vlan.ndp_table()
    }

    fn vlan_with_table(vlan: &Vlan, table: Arc<NeighborTable<Self>>) -> Vlan {
        vlan.with_ndp_table(table)
    }
}
