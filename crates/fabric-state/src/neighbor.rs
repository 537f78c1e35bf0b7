//! Published neighbor table state.

use crate::vlan::Vlan;
use fabric_types::{AddressFamily, InterfaceId, MacAddress, PortDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The fields of a neighbor entry needed to program forwarding state.
///
/// `pending` entries are placeholders created while resolution is in
/// flight; they have no MAC or port yet. All other entries carry a
/// non-zero MAC and the port the neighbor was learned on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "A: AddressFamily")]
pub struct NeighborEntryFields<A: AddressFamily> {
    pub ip: A,
    pub mac: MacAddress,
    pub port: Option<PortDescriptor>,
    pub interface: InterfaceId,
    pub pending: bool,
}

impl<A: AddressFamily> NeighborEntryFields<A> {
    /// A fully-resolved entry.
    pub fn new(ip: A, mac: MacAddress, port: PortDescriptor, interface: InterfaceId) -> Self {
        NeighborEntryFields {
            ip,
            mac,
            port: Some(port),
            interface,
            pending: false,
        }
    }

    /// A pending entry awaiting resolution.
    pub fn pending(ip: A, interface: InterfaceId) -> Self {
        NeighborEntryFields {
            ip,
            mac: MacAddress::ZERO,
            port: None,
            interface,
            pending: true,
        }
    }
}

/// Ordered map of neighbor IP to entry fields for one VLAN and family.
#[derive(Debug)]
pub struct NeighborTable<A: AddressFamily> {
    entries: BTreeMap<A, Arc<NeighborEntryFields<A>>>,
}

impl<A: AddressFamily> Default for NeighborTable<A> {
    fn default() -> Self {
        NeighborTable::new()
    }
}

impl<A: AddressFamily> NeighborTable<A> {
    pub fn new() -> Self {
        NeighborTable {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries(entries: BTreeMap<A, Arc<NeighborEntryFields<A>>>) -> Self {
        NeighborTable { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, ip: &A) -> Option<&Arc<NeighborEntryFields<A>>> {
        self.entries.get(ip)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, A, Arc<NeighborEntryFields<A>>> {
        self.entries.iter()
    }

    /// Copy with one entry inserted or replaced.
    pub fn with_entry(&self, fields: NeighborEntryFields<A>) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(fields.ip, Arc::new(fields));
        NeighborTable { entries }
    }

    /// Copy with one entry removed.
    pub fn without_entry(&self, ip: &A) -> Self {
        let mut entries = self.entries.clone();
        entries.remove(ip);
        NeighborTable { entries }
    }

    pub(crate) fn entries(&self) -> &BTreeMap<A, Arc<NeighborEntryFields<A>>> {
        &self.entries
    }
}

/// Selects the per-family neighbor table out of a [`Vlan`], so cache code
/// can be generic over ARP vs NDP.
pub trait NeighborFamily: AddressFamily {
    fn table_of(vlan: &Vlan) -> &Arc<NeighborTable<Self>>;
    fn vlan_with_table(vlan: &Vlan, table: Arc<NeighborTable<Self>>) -> Vlan;
}
