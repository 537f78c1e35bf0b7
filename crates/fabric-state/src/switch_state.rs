//! The copy-on-write switch state root.

use crate::fib::FibContainer;
use crate::port::{AggregatePort, Port};
use crate::vlan::Vlan;
use fabric_types::{AggregatePortId, PortId, RouterId, VlanId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The root of the immutable switch state tree.
///
/// Every child is held through an `Arc`, so a new root produced by one of
/// the `with_*` mutators shares all untouched branches with its
/// predecessor. `Arc::ptr_eq` on any node therefore implies semantic
/// equality, which is what [`crate::StateDelta`] exploits to short-circuit
/// diffs.
#[derive(Debug, Default)]
pub struct SwitchState {
    fibs: BTreeMap<RouterId, Arc<FibContainer>>,
    vlans: BTreeMap<VlanId, Arc<Vlan>>,
    ports: BTreeMap<PortId, Arc<Port>>,
    aggregate_ports: BTreeMap<AggregatePortId, Arc<AggregatePort>>,
}

impl SwitchState {
    pub fn new() -> Self {
        SwitchState::default()
    }

    pub fn fibs(&self) -> &BTreeMap<RouterId, Arc<FibContainer>> {
        &self.fibs
    }

    pub fn vlans(&self) -> &BTreeMap<VlanId, Arc<Vlan>> {
        &self.vlans
    }

    pub fn ports(&self) -> &BTreeMap<PortId, Arc<Port>> {
        &self.ports
    }

    pub fn aggregate_ports(&self) -> &BTreeMap<AggregatePortId, Arc<AggregatePort>> {
        &self.aggregate_ports
    }

    pub fn get_fib_container(&self, vrf: RouterId) -> Option<&Arc<FibContainer>> {
        self.fibs.get(&vrf)
    }

    pub fn get_vlan(&self, id: VlanId) -> Option<&Arc<Vlan>> {
        self.vlans.get(&id)
    }

    pub fn get_port(&self, id: PortId) -> Option<&Arc<Port>> {
        self.ports.get(&id)
    }

    pub fn get_aggregate_port(&self, id: AggregatePortId) -> Option<&Arc<AggregatePort>> {
        self.aggregate_ports.get(&id)
    }

    fn clone_children(&self) -> SwitchState {
        SwitchState {
            fibs: self.fibs.clone(),
            vlans: self.vlans.clone(),
            ports: self.ports.clone(),
            aggregate_ports: self.aggregate_ports.clone(),
        }
    }

    /// New root with one FIB container inserted or replaced.
    pub fn with_fib_container(&self, container: Arc<FibContainer>) -> Arc<SwitchState> {
        let mut next = self.clone_children();
        next.fibs.insert(container.vrf(), container);
        Arc::new(next)
    }

    /// New root with one VLAN inserted or replaced.
    pub fn with_vlan(&self, vlan: Arc<Vlan>) -> Arc<SwitchState> {
        let mut next = self.clone_children();
        next.vlans.insert(vlan.id(), vlan);
        Arc::new(next)
    }

    /// New root with one VLAN removed.
    pub fn without_vlan(&self, id: VlanId) -> Arc<SwitchState> {
        let mut next = self.clone_children();
        next.vlans.remove(&id);
        Arc::new(next)
    }

    /// New root with one port inserted or replaced.
    pub fn with_port(&self, port: Arc<Port>) -> Arc<SwitchState> {
        let mut next = self.clone_children();
        next.ports.insert(port.id(), port);
        Arc::new(next)
    }

    /// New root with one port removed.
    pub fn without_port(&self, id: PortId) -> Arc<SwitchState> {
        let mut next = self.clone_children();
        next.ports.remove(&id);
        Arc::new(next)
    }

    /// New root with one aggregate port inserted or replaced.
    pub fn with_aggregate_port(&self, aggregate: Arc<AggregatePort>) -> Arc<SwitchState> {
        let mut next = self.clone_children();
        next.aggregate_ports.insert(aggregate.id(), aggregate);
        Arc::new(next)
    }

    /// New root with one aggregate port removed.
    pub fn without_aggregate_port(&self, id: AggregatePortId) -> Arc<SwitchState> {
        let mut next = self.clone_children();
        next.aggregate_ports.remove(&id);
        Arc::new(next)
    }
}
