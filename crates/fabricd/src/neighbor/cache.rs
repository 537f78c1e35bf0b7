//! The per-(VLAN, family) neighbor cache.
//!
//! One mutex serializes every mutation of the entry map. Entry timers
//! never call back into the cache synchronously: a fired timer posts an
//! event onto the cache's channel and the cache's own service task runs
//! the state machine under the lock. Probe transmission and switch-state
//! publication happen after the lock is released, so nothing blocks on
//! I/O while holding it.

use crate::error::AgentError;
use crate::hw::HwSwitch;
use crate::neighbor::entry::{
    calculate_lifetime, EntryAction, NeighborCacheEntry, NeighborEntryState,
};
use crate::packet::{PacketIo, ProbeFamily};
use crate::state_manager::StateHandle;
use fabric_state::NeighborEntryFields;
use fabric_types::{InterfaceId, MacAddress, PortDescriptor, VlanId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timing knobs of a cache.
#[derive(Debug, Clone)]
pub struct NeighborCacheConfig {
    /// Solicitations sent before an unanswered entry expires.
    pub max_probes: u8,
    /// Re-examination interval for STALE entries whose hit bit is clear.
    pub stale_interval: Duration,
    /// Base reachable time; actual lifetimes are drawn from
    /// `[base/2, 3*base/2)`.
    pub base_reachable: Duration,
}

impl Default for NeighborCacheConfig {
    fn default() -> Self {
        NeighborCacheConfig {
            max_probes: 5,
            stale_interval: Duration::from_secs(10),
            base_reachable: Duration::from_secs(30),
        }
    }
}

/// A fired entry timer, tagged with the schedule generation so stale
/// events (the entry was rescheduled after this one fired) are ignored.
#[derive(Debug, Clone, Copy)]
pub struct TimerEvent<A> {
    ip: A,
    generation: u64,
}

/// Transmit/expiry counters of one cache.
#[derive(Debug, Default)]
pub struct CacheStats {
    probes_sent: AtomicU64,
    send_failures: AtomicU64,
    expired: AtomicU64,
    flushed: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub probes_sent: u64,
    pub send_failures: u64,
    pub expired: u64,
    pub flushed: u64,
}

pub struct NeighborCache<A: ProbeFamily> {
    vlan: VlanId,
    config: NeighborCacheConfig,
    entries: Mutex<HashMap<A, NeighborCacheEntry<A>>>,
    events_tx: mpsc::UnboundedSender<TimerEvent<A>>,
    io: Arc<dyn PacketIo>,
    hw: Arc<dyn HwSwitch>,
    state: StateHandle,
    stats: CacheStats,
}

impl<A: ProbeFamily> NeighborCache<A> {
    /// Builds a cache plus the receiving end of its timer channel. The
    /// caller passes the receiver to [`NeighborCache::spawn_service`].
    pub fn new(
        vlan: VlanId,
        config: NeighborCacheConfig,
        io: Arc<dyn PacketIo>,
        hw: Arc<dyn HwSwitch>,
        state: StateHandle,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TimerEvent<A>>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cache = Arc::new(NeighborCache {
            vlan,
            config,
            entries: Mutex::new(HashMap::new()),
            events_tx,
            io,
            hw,
            state,
            stats: CacheStats::default(),
        });
        (cache, events_rx)
    }

    /// Starts the service task that drains timer events.
    pub fn spawn_service(
        cache: &Arc<Self>,
        mut events_rx: mpsc::UnboundedReceiver<TimerEvent<A>>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(cache);
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                cache.process(event.ip, Some(event.generation)).await;
            }
        })
    }

    pub fn vlan(&self) -> VlanId {
        self.vlan
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            probes_sent: self.stats.probes_sent.load(Ordering::Relaxed),
            send_failures: self.stats.send_failures.load(Ordering::Relaxed),
            expired: self.stats.expired.load(Ordering::Relaxed),
            flushed: self.stats.flushed.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of an entry's programmable fields.
    pub fn lookup(&self, ip: &A) -> Option<NeighborEntryFields<A>> {
        self.lock().get(ip).map(|entry| entry.fields().clone())
    }

    pub fn entry_state(&self, ip: &A) -> Option<NeighborEntryState> {
        self.lock().get(ip).map(|entry| entry.state())
    }

    /// Whether a timer is currently scheduled for the entry. Used by
    /// tests asserting the one-timer invariant.
    pub fn has_timer(&self, ip: &A) -> Option<bool> {
        self.lock().get(ip).map(|entry| entry.has_timer())
    }

    /// An advertisement (or any external update carrying a valid MAC):
    /// the entry re-enters REACHABLE with a fresh probe budget. A
    /// confirmation for an entry that is already current is a no-op on
    /// forwarding state but still resets the budget and the lifetime
    /// timer.
    pub fn receive_advertisement(
        &self,
        ip: A,
        mac: MacAddress,
        port: PortDescriptor,
        interface: InterfaceId,
    ) {
        let fields = NeighborEntryFields::new(ip, mac, port, interface);
        let changed;
        {
            let mut entries = self.lock();
            match entries.get_mut(&ip) {
                Some(entry) => {
                    changed = entry.enter_reachable(fields.clone(), self.config.max_probes);
                    self.schedule(entry, ip);
                }
                None => {
                    let mut entry =
                        NeighborCacheEntry::new_reachable(fields.clone(), self.config.max_probes);
                    self.schedule(&mut entry, ip);
                    entries.insert(ip, entry);
                    changed = true;
                }
            }
        }
        if changed {
            debug!(vlan = %self.vlan, ip = %ip, mac = %mac, "neighbor reachable");
            self.publish_entry(fields);
        }
    }

    /// A solicitation received from the neighbor itself also proves its
    /// adjacency.
    pub fn receive_solicitation(
        &self,
        ip: A,
        mac: MacAddress,
        port: PortDescriptor,
        interface: InterfaceId,
    ) {
        self.receive_advertisement(ip, mac, port, interface);
    }

    /// Starts resolving an address we have no adjacency for: a pending
    /// entry is created, published, and the first solicitation goes out.
    pub async fn set_pending_entry(&self, ip: A, interface: InterfaceId) {
        let created;
        {
            let mut entries = self.lock();
            if entries.contains_key(&ip) {
                created = false;
            } else {
                let mut entry =
                    NeighborCacheEntry::new_incomplete(ip, interface, self.config.max_probes);
                self.schedule(&mut entry, ip);
                entries.insert(ip, entry);
                created = true;
            }
        }
        if created {
            debug!(vlan = %self.vlan, ip = %ip, "pending neighbor entry");
            self.publish_entry(NeighborEntryFields::pending(ip, interface));
            self.send_probe(ip, interface).await;
        }
    }

    /// Runs the entry's state machine as if its timer fired now.
    pub async fn process_entry(&self, ip: A) {
        self.process(ip, None).await;
    }

    async fn process(&self, ip: A, expected_generation: Option<u64>) {
        // The hit bit is an opaque hardware query; read it before taking
        // the lock so the critical section never touches the collaborator.
        let is_hit = self.hw.is_hit(ip.into_ip());

        let mut probe_interface = None;
        let mut expired = false;
        {
            let mut entries = self.lock();
            let entry = match entries.get_mut(&ip) {
                Some(entry) => entry,
                None => return,
            };
            if let Some(expected) = expected_generation {
                if entry.generation() != expected {
                    // The entry was rescheduled after this timer fired.
                    return;
                }
            }
            if let Some(handle) = entry.take_timer() {
                handle.abort();
            }

            let action = match entry.run_state_machine(is_hit) {
                Ok(action) => action,
                // Invariant violation; the agent must not keep running
                // with a corrupt neighbor table.
                Err(e) => panic!("neighbor cache invariant violated: {}", e),
            };
            match action {
                EntryAction::Expire => {
                    entries.remove(&ip);
                    expired = true;
                }
                EntryAction::Probe => {
                    probe_interface = Some(entry.interface());
                    self.schedule(entry, ip);
                }
                EntryAction::Idle => {
                    self.schedule(entry, ip);
                }
            }
        }

        if expired {
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
            info!(vlan = %self.vlan, ip = %ip, "neighbor expired after probe exhaustion");
            self.publish_removal(ip);
        }
        if let Some(interface) = probe_interface {
            self.send_probe(ip, interface).await;
        }
    }

    /// Drops one entry, cancelling its timer, and publishes the removal.
    pub fn flush(&self, ip: &A) -> bool {
        let removed = {
            let mut entries = self.lock();
            entries.remove(ip).map(|mut entry| entry.cancel_timer()).is_some()
        };
        if removed {
            self.stats.flushed.fetch_add(1, Ordering::Relaxed);
            self.publish_removal(*ip);
        }
        removed
    }

    /// Drops every entry and publishes the removals.
    pub fn flush_all(&self) -> usize {
        let ips: Vec<A> = {
            let mut entries = self.lock();
            let ips = entries.keys().copied().collect();
            for (_, entry) in entries.iter_mut() {
                entry.cancel_timer();
            }
            entries.clear();
            ips
        };
        for ip in &ips {
            self.stats.flushed.fetch_add(1, Ordering::Relaxed);
            self.publish_removal(*ip);
        }
        ips.len()
    }

    /// Drops every entry matching the predicate (e.g. bound to a dead
    /// port) and publishes the removals.
    pub fn flush_if(&self, pred: impl Fn(&NeighborEntryFields<A>) -> bool) -> usize {
        let ips: Vec<A> = {
            let mut entries = self.lock();
            let ips: Vec<A> = entries
                .iter()
                .filter(|(_, entry)| pred(entry.fields()))
                .map(|(ip, _)| *ip)
                .collect();
            for ip in &ips {
                if let Some(mut entry) = entries.remove(ip) {
                    entry.cancel_timer();
                }
            }
            ips
        };
        for ip in &ips {
            self.stats.flushed.fetch_add(1, Ordering::Relaxed);
            self.publish_removal(*ip);
        }
        ips.len()
    }

    /// Adopts an entry already present in the published switch state
    /// (static or surviving from before this cache existed). No
    /// publication: the state already has it.
    pub fn seed_entry(&self, fields: NeighborEntryFields<A>) {
        let mut entries = self.lock();
        if entries.contains_key(&fields.ip) {
            return;
        }
        let ip = fields.ip;
        let mut entry = if fields.pending {
            NeighborCacheEntry::new_incomplete(ip, fields.interface, self.config.max_probes)
        } else {
            NeighborCacheEntry::new_reachable(fields, self.config.max_probes)
        };
        self.schedule(&mut entry, ip);
        entries.insert(ip, entry);
    }

    /// Tears the cache down: cancels every timer and drops the entries
    /// without touching the published state (the VLAN subtree is going
    /// away with them).
    pub fn destroy(&self) {
        let mut entries = self.lock();
        for (_, entry) in entries.iter_mut() {
            entry.cancel_timer();
        }
        entries.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<A, NeighborCacheEntry<A>>> {
        self.entries.lock().expect("neighbor cache lock poisoned")
    }

    /// Arms the timer matching the entry's state. EXPIRED entries are
    /// never scheduled.
    fn schedule(&self, entry: &mut NeighborCacheEntry<A>, ip: A) {
        let duration = match entry.state() {
            NeighborEntryState::Reachable => calculate_lifetime(self.config.base_reachable),
            NeighborEntryState::Stale => self.config.stale_interval,
            NeighborEntryState::Probe | NeighborEntryState::Incomplete => Duration::from_secs(1),
            NeighborEntryState::Expired => return,
            NeighborEntryState::Delay | NeighborEntryState::Uninitialized => {
                panic!(
                    "{}",
                    AgentError::InvalidStateTransition(format!(
                        "{} scheduled in state {}",
                        ip,
                        entry.state()
                    ))
                );
            }
        };
        let generation = entry.next_generation();
        let tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(TimerEvent { ip, generation });
        });
        if let Err(e) = entry.arm_timer(handle) {
            panic!("neighbor cache invariant violated: {}", e);
        }
    }

    async fn send_probe(&self, ip: A, interface: InterfaceId) {
        self.stats.probes_sent.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = A::send_probe(self.io.as_ref(), self.vlan, interface, ip).await {
            // The entry keeps its state; the next tick retries.
            self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
            warn!(vlan = %self.vlan, ip = %ip, error = %e, "probe transmit failed");
        }
    }

    fn publish_entry(&self, fields: NeighborEntryFields<A>) {
        let vlan_id = self.vlan;
        self.state.update("neighbor-entry", move |state| {
            let vlan = state.get_vlan(vlan_id)?;
            let table = A::table_of(vlan);
            if let Some(existing) = table.get(&fields.ip) {
                if **existing == fields {
                    return None;
                }
            }
            let next_table = Arc::new(table.with_entry(fields));
            Some(state.with_vlan(Arc::new(A::vlan_with_table(vlan, next_table))))
        });
    }

    fn publish_removal(&self, ip: A) {
        let vlan_id = self.vlan;
        self.state.update("neighbor-remove", move |state| {
            let vlan = state.get_vlan(vlan_id)?;
            let table = A::table_of(vlan);
            table.get(&ip)?;
            let next_table = Arc::new(table.without_entry(&ip));
            Some(state.with_vlan(Arc::new(A::vlan_with_table(vlan, next_table))))
        });
    }
}

impl<A: ProbeFamily> Drop for NeighborCache<A> {
    fn drop(&mut self) {
        // Entry drops cancel any remaining timers.
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
