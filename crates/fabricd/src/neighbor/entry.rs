//! The per-neighbor liveness state machine.
//!
//! Loosely modeled after the NDP neighbor state machine of RFC 4861 but
//! used for both ARP and NDP entries. Each entry corresponds to one
//! neighbor table row in the switch state and carries the fields needed
//! to program that row.
//!
//! States:
//!
//! - `REACHABLE` - recently known valid. Re-examined after a randomized
//!   lifetime.
//! - `STALE` - exceeded its lifetime. If traffic is using the entry (hit
//!   bit set) it moves to `PROBE`.
//! - `PROBE` - once valid, now actively solicited to confirm validity.
//!   Still programmed, so still forwarding.
//! - `INCOMPLETE` - missing the fields needed to program a valid entry;
//!   corresponds to a pending table row while solicitation is in flight.
//! - `EXPIRED` - exhausted its probes without an answer; the cache
//!   flushes it.
//! - `DELAY` - declared for RFC completeness, never entered here.
//! - `UNINITIALIZED` - placeholder before construction completes.
//!
//! There is no locking here. The cache serializes every call to an entry
//! under its own lock; the entry never calls back into the cache.

use crate::error::AgentError;
use fabric_state::{NeighborEntryFields, NeighborFamily};
use fabric_types::InterfaceId;
use rand::Rng;
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Liveness state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborEntryState {
    Uninitialized,
    Incomplete,
    Delay,
    Probe,
    Stale,
    Reachable,
    Expired,
}

impl NeighborEntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeighborEntryState::Uninitialized => "UNINITIALIZED",
            NeighborEntryState::Incomplete => "INCOMPLETE",
            NeighborEntryState::Delay => "DELAY",
            NeighborEntryState::Probe => "PROBE",
            NeighborEntryState::Stale => "STALE",
            NeighborEntryState::Reachable => "REACHABLE",
            NeighborEntryState::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for NeighborEntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the cache must do after a state machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryAction {
    /// Nothing beyond rescheduling.
    Idle,
    /// Emit a solicitation, then reschedule.
    Probe,
    /// The entry expired; flush it.
    Expire,
}

/// Draws a REACHABLE lifetime uniformly from `[base/2, base + base/2)`,
/// the RFC 4861 §6.3.2 randomization that de-synchronizes refreshes
/// across a fleet.
pub fn calculate_lifetime(base: Duration) -> Duration {
    let base_ms = base.as_millis().max(1) as u64;
    let jitter = rand::thread_rng().gen_range(0..base_ms);
    Duration::from_millis(base_ms / 2 + jitter)
}

pub(crate) struct NeighborCacheEntry<A: NeighborFamily> {
    fields: NeighborEntryFields<A>,
    state: NeighborEntryState,
    probes_left: u8,
    /// The pending timer task, if one is scheduled. Exactly one timer is
    /// scheduled while the entry is not EXPIRED.
    timer: Option<JoinHandle<()>>,
    /// Monotonic schedule generation; a fired timer carrying an older
    /// generation is stale and must be ignored.
    generation: u64,
}

impl<A: NeighborFamily> NeighborCacheEntry<A> {
    /// An entry with full fields, starting REACHABLE.
    pub(crate) fn new_reachable(fields: NeighborEntryFields<A>, max_probes: u8) -> Self {
        NeighborCacheEntry {
            fields,
            state: NeighborEntryState::Reachable,
            probes_left: max_probes,
            timer: None,
            generation: 0,
        }
    }

    /// A pending entry, starting INCOMPLETE. One solicitation is assumed
    /// to go out at creation, hence `max_probes - 1` probes remain.
    pub(crate) fn new_incomplete(ip: A, interface: InterfaceId, max_probes: u8) -> Self {
        NeighborCacheEntry {
            fields: NeighborEntryFields::pending(ip, interface),
            state: NeighborEntryState::Incomplete,
            probes_left: max_probes.saturating_sub(1),
            timer: None,
            generation: 0,
        }
    }

    pub(crate) fn fields(&self) -> &NeighborEntryFields<A> {
        &self.fields
    }

    pub(crate) fn fields_match(&self, fields: &NeighborEntryFields<A>) -> bool {
        self.fields == *fields
    }

    pub(crate) fn state(&self) -> NeighborEntryState {
        self.state
    }

    pub(crate) fn is_probing(&self) -> bool {
        matches!(
            self.state,
            NeighborEntryState::Probe | NeighborEntryState::Incomplete
        )
    }

    pub(crate) fn interface(&self) -> InterfaceId {
        self.fields.interface
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Records a newly spawned timer task. The previous timer must have
    /// been cancelled or consumed first.
    pub(crate) fn arm_timer(&mut self, handle: JoinHandle<()>) -> Result<u64, AgentError> {
        if self.timer.is_some() {
            return Err(AgentError::TimerAlreadyScheduled(self.fields.ip.to_string()));
        }
        self.timer = Some(handle);
        Ok(self.generation)
    }

    /// Bumps the generation for the next schedule.
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Cancels any pending timer.
    pub(crate) fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    /// Consumes the fired timer ahead of a state machine step.
    pub(crate) fn take_timer(&mut self) -> Option<JoinHandle<()>> {
        self.timer.take()
    }

    /// An external update with a valid MAC re-enters REACHABLE with a
    /// full probe budget. The caller reschedules the lifetime timer.
    pub(crate) fn enter_reachable(
        &mut self,
        fields: NeighborEntryFields<A>,
        max_probes: u8,
    ) -> bool {
        let changed = !self.fields_match(&fields);
        self.fields = fields;
        self.state = NeighborEntryState::Reachable;
        self.probes_left = max_probes;
        self.cancel_timer();
        changed
    }

    /// One timer tick. `is_hit` is the hardware hit bit for the entry's
    /// address; it is only consulted when leaving STALE.
    pub(crate) fn run_state_machine(&mut self, is_hit: bool) -> Result<EntryAction, AgentError> {
        match self.state {
            NeighborEntryState::Incomplete | NeighborEntryState::Probe => {
                Ok(self.probe_if_probes_left())
            }
            NeighborEntryState::Stale => Ok(self.probe_stale_if_hit(is_hit)),
            NeighborEntryState::Reachable => {
                // A REACHABLE entry being processed has outlived its
                // lifetime; it is now stale and examined right away.
                self.state = NeighborEntryState::Stale;
                Ok(self.probe_stale_if_hit(is_hit))
            }
            NeighborEntryState::Expired
            | NeighborEntryState::Delay
            | NeighborEntryState::Uninitialized => Err(AgentError::InvalidStateTransition(
                format!("{} ticked in state {}", self.fields.ip, self.state),
            )),
        }
    }

    fn probe_if_probes_left(&mut self) -> EntryAction {
        if self.probes_left > 0 {
            self.probes_left -= 1;
            EntryAction::Probe
        } else {
            self.state = NeighborEntryState::Expired;
            EntryAction::Expire
        }
    }

    fn probe_stale_if_hit(&mut self, is_hit: bool) -> EntryAction {
        if is_hit {
            self.state = NeighborEntryState::Probe;
            self.probe_if_probes_left()
        } else {
            EntryAction::Idle
        }
    }
}

impl<A: NeighborFamily> Drop for NeighborCacheEntry<A> {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
