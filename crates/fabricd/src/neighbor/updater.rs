//! Neighbor updater: the state observer that owns the caches.
//!
//! Every external path that touches the ARP or NDP tables goes through
//! this type, which dispatches to the per-VLAN caches. The caches are
//! self-managing; this type only creates and destroys them as VLANs come
//! and go, and flushes entries whose ports disappear. Deltas under the
//! arp/ndp subtrees are ignored here: the caches author those and they
//! must not round-trip.

use crate::hw::HwSwitch;
use crate::neighbor::cache::{NeighborCache, NeighborCacheConfig};
use crate::packet::PacketIo;
use crate::state_manager::{StateHandle, StateObserver};
use fabric_state::{StateDelta, Vlan};
use fabric_types::{
    AggregatePortId, InterfaceId, IpAddress, Ipv4Address, Ipv6Address, MacAddress,
    PortDescriptor, VlanId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct CachePair {
    arp: Arc<NeighborCache<Ipv4Address>>,
    ndp: Arc<NeighborCache<Ipv6Address>>,
    arp_task: JoinHandle<()>,
    ndp_task: JoinHandle<()>,
}

impl CachePair {
    fn destroy(self) {
        // Timers are cancelled before the entries are released; the
        // service tasks go with them, so nothing fires afterwards.
        self.arp.destroy();
        self.ndp.destroy();
        self.arp_task.abort();
        self.ndp_task.abort();
    }
}

struct NeighborUpdaterImpl {
    config: NeighborCacheConfig,
    caches: Mutex<HashMap<VlanId, CachePair>>,
    io: Arc<dyn PacketIo>,
    hw: Arc<dyn HwSwitch>,
    state: StateHandle,
}

impl NeighborUpdaterImpl {
    fn create_caches(&self, vlan: &Vlan) {
        let (arp, arp_rx) = NeighborCache::<Ipv4Address>::new(
            vlan.id(),
            self.config.clone(),
            Arc::clone(&self.io),
            Arc::clone(&self.hw),
            self.state.clone(),
        );
        let (ndp, ndp_rx) = NeighborCache::<Ipv6Address>::new(
            vlan.id(),
            self.config.clone(),
            Arc::clone(&self.io),
            Arc::clone(&self.hw),
            self.state.clone(),
        );
        let arp_task = NeighborCache::spawn_service(&arp, arp_rx);
        let ndp_task = NeighborCache::spawn_service(&ndp, ndp_rx);

        // Adopt whatever the state already knows about this VLAN:
        // configured static neighbors and entries surviving a restart.
        for (_, fields) in vlan.arp_table().iter() {
            arp.seed_entry((**fields).clone());
        }
        for (_, fields) in vlan.ndp_table().iter() {
            ndp.seed_entry((**fields).clone());
        }

        info!(vlan = %vlan.id(), seeded_v4 = vlan.arp_table().len(), seeded_v6 = vlan.ndp_table().len(), "neighbor caches created");
        let mut caches = self.lock();
        if let Some(previous) = caches.insert(
            vlan.id(),
            CachePair {
                arp,
                ndp,
                arp_task,
                ndp_task,
            },
        ) {
            warn!(vlan = %vlan.id(), "replacing existing neighbor caches");
            previous.destroy();
        }
    }

    fn destroy_caches(&self, vlan: VlanId) {
        let pair = self.lock().remove(&vlan);
        match pair {
            Some(pair) => {
                pair.destroy();
                info!(vlan = %vlan, "neighbor caches destroyed");
            }
            None => warn!(vlan = %vlan, "no caches for deleted vlan"),
        }
    }

    fn flush_port(&self, port: PortDescriptor) {
        let caches = self.lock();
        let mut flushed = 0;
        for pair in caches.values() {
            flushed += pair.arp.flush_if(|f| f.port == Some(port));
            flushed += pair.ndp.flush_if(|f| f.port == Some(port));
        }
        if flushed > 0 {
            info!(port = %port, flushed, "flushed neighbors for dead port");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<VlanId, CachePair>> {
        self.caches.lock().expect("neighbor updater lock poisoned")
    }
}

/// Handle to the neighbor subsystem. Clones share the same caches, so
/// the state manager can own one as an observer while the packet and
/// RPC paths hold others.
#[derive(Clone)]
pub struct NeighborUpdater {
    inner: Arc<NeighborUpdaterImpl>,
}

impl NeighborUpdater {
    pub fn new(
        config: NeighborCacheConfig,
        io: Arc<dyn PacketIo>,
        hw: Arc<dyn HwSwitch>,
        state: StateHandle,
    ) -> Self {
        NeighborUpdater {
            inner: Arc::new(NeighborUpdaterImpl {
                config,
                caches: Mutex::new(HashMap::new()),
                io,
                hw,
                state,
            }),
        }
    }

    pub fn vlan_count(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn arp_cache(&self, vlan: VlanId) -> Option<Arc<NeighborCache<Ipv4Address>>> {
        self.inner.lock().get(&vlan).map(|pair| Arc::clone(&pair.arp))
    }

    pub fn ndp_cache(&self, vlan: VlanId) -> Option<Arc<NeighborCache<Ipv6Address>>> {
        self.inner.lock().get(&vlan).map(|pair| Arc::clone(&pair.ndp))
    }

    pub fn receive_arp_advertisement(
        &self,
        vlan: VlanId,
        ip: Ipv4Address,
        mac: MacAddress,
        port: PortDescriptor,
        interface: InterfaceId,
    ) {
        match self.arp_cache(vlan) {
            Some(cache) => cache.receive_advertisement(ip, mac, port, interface),
            None => warn!(vlan = %vlan, ip = %ip, "arp advertisement for unknown vlan"),
        }
    }

    pub fn receive_arp_solicitation(
        &self,
        vlan: VlanId,
        ip: Ipv4Address,
        mac: MacAddress,
        port: PortDescriptor,
        interface: InterfaceId,
    ) {
        match self.arp_cache(vlan) {
            Some(cache) => cache.receive_solicitation(ip, mac, port, interface),
            None => warn!(vlan = %vlan, ip = %ip, "arp solicitation for unknown vlan"),
        }
    }

    pub fn receive_ndp_advertisement(
        &self,
        vlan: VlanId,
        ip: Ipv6Address,
        mac: MacAddress,
        port: PortDescriptor,
        interface: InterfaceId,
    ) {
        match self.ndp_cache(vlan) {
            Some(cache) => cache.receive_advertisement(ip, mac, port, interface),
            None => warn!(vlan = %vlan, ip = %ip, "ndp advertisement for unknown vlan"),
        }
    }

    pub fn receive_ndp_solicitation(
        &self,
        vlan: VlanId,
        ip: Ipv6Address,
        mac: MacAddress,
        port: PortDescriptor,
        interface: InterfaceId,
    ) {
        match self.ndp_cache(vlan) {
            Some(cache) => cache.receive_solicitation(ip, mac, port, interface),
            None => warn!(vlan = %vlan, ip = %ip, "ndp solicitation for unknown vlan"),
        }
    }

    /// Kicks off resolution of an IPv4 address with no adjacency yet.
    pub async fn start_arp_resolution(
        &self,
        vlan: VlanId,
        ip: Ipv4Address,
        interface: InterfaceId,
    ) {
        match self.arp_cache(vlan) {
            Some(cache) => cache.set_pending_entry(ip, interface).await,
            None => warn!(vlan = %vlan, ip = %ip, "arp resolution for unknown vlan"),
        }
    }

    /// Kicks off resolution of an IPv6 address with no adjacency yet.
    pub async fn start_ndp_resolution(
        &self,
        vlan: VlanId,
        ip: Ipv6Address,
        interface: InterfaceId,
    ) {
        match self.ndp_cache(vlan) {
            Some(cache) => cache.set_pending_entry(ip, interface).await,
            None => warn!(vlan = %vlan, ip = %ip, "ndp resolution for unknown vlan"),
        }
    }

    /// Drops one neighbor from its cache. Returns true if it existed.
    pub fn flush_neighbor(&self, vlan: VlanId, ip: IpAddress) -> bool {
        match ip {
            IpAddress::V4(v4) => self
                .arp_cache(vlan)
                .map(|cache| cache.flush(&v4))
                .unwrap_or(false),
            IpAddress::V6(v6) => self
                .ndp_cache(vlan)
                .map(|cache| cache.flush(&v6))
                .unwrap_or(false),
        }
    }
}

impl StateObserver for NeighborUpdater {
    fn state_updated(&mut self, delta: &StateDelta) {
        for (vlan_id, item) in delta.vlans_delta() {
            match (item.old, item.new) {
                (None, Some(vlan)) => self.inner.create_caches(&vlan),
                (Some(_), None) => self.inner.destroy_caches(vlan_id),
                (Some(_), Some(_)) => {
                    // Changed VLANs carry arp/ndp table edits authored by
                    // the caches themselves; nothing to do.
                }
                (None, None) => {}
            }
        }

        for (port_id, item) in delta.ports_delta() {
            match (item.old, item.new) {
                (Some(_), None) => self.inner.flush_port(PortDescriptor::Physical(port_id)),
                (Some(old), Some(new)) if old.is_admin_up() && !new.is_admin_up() => {
                    self.inner.flush_port(PortDescriptor::Physical(port_id))
                }
                _ => {}
            }
        }

        for (agg_id, item) in delta.aggregate_ports_delta() {
            match (item.old, item.new) {
                (Some(_), None) => self.flush_aggregate(agg_id),
                (Some(old), Some(new)) => {
                    let lost_member = old
                        .members()
                        .iter()
                        .any(|member| !new.members().contains(member));
                    if lost_member {
                        self.flush_aggregate(agg_id);
                    }
                }
                _ => {}
            }
        }
    }
}

impl NeighborUpdater {
    fn flush_aggregate(&self, agg: AggregatePortId) {
        self.inner.flush_port(PortDescriptor::Aggregate(agg));
    }
}
