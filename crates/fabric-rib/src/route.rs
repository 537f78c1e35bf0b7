//! RIB routes and their client contributions.

use fabric_state::{RouteNextHopEntry, RoutePrefix};
use fabric_types::{AddressFamily, ClassId, ClientId};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

/// Why a route failed resolution. Unresolvable routes stay in the RIB,
/// absent from the FIB, and expose their failure here for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// No chain of routes reaches an interface-bound next hop.
    NextHopUnreachable,
    /// The resolution chain revisited a prefix or exceeded the depth
    /// bound.
    NextHopCycle,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::NextHopUnreachable => write!(f, "next hop unreachable"),
            ResolutionFailure::NextHopCycle => write!(f, "next hop cycle"),
        }
    }
}

/// One client's contribution to a route, stamped with an insertion
/// sequence so ties between clients at the same admin distance break
/// toward the most recent contributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEntry {
    pub entry: RouteNextHopEntry,
    pub seq: u64,
}

/// A route under resolution in the RIB.
///
/// Unlike a FIB route, the forwarding decision is optional: `forward` is
/// `None` until a resolution pass succeeds, and a route whose resolution
/// failed (unreachable next hops, cycle, depth bound) stays unresolved
/// and never reaches the FIB.
#[derive(Debug, Clone)]
pub struct RibRoute<A: AddressFamily> {
    prefix: RoutePrefix<A>,
    entries: BTreeMap<ClientId, ClientEntry>,
    forward: Option<RouteNextHopEntry>,
    failure: Option<ResolutionFailure>,
    class_id: Option<ClassId>,
    connected: bool,
}

impl<A: AddressFamily> RibRoute<A> {
    pub fn new(prefix: RoutePrefix<A>) -> Self {
        RibRoute {
            prefix,
            entries: BTreeMap::new(),
            forward: None,
            failure: None,
            class_id: None,
            connected: false,
        }
    }

    pub fn prefix(&self) -> &RoutePrefix<A> {
        &self.prefix
    }

    /// Inserts or replaces one client's contribution.
    pub fn set_entry(&mut self, client: ClientId, entry: RouteNextHopEntry, seq: u64) {
        self.entries.insert(client, ClientEntry { entry, seq });
    }

    /// Removes one client's contribution. Returns true if it was present.
    pub fn remove_entry(&mut self, client: ClientId) -> bool {
        self.entries.remove(&client).is_some()
    }

    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn entry_for(&self, client: ClientId) -> Option<&ClientEntry> {
        self.entries.get(&client)
    }

    /// The winning contribution: lowest admin distance, most recently
    /// inserted client on a tie.
    pub fn best_entry(&self) -> Option<(ClientId, &ClientEntry)> {
        self.entries
            .iter()
            .min_by_key(|(_, ce)| (ce.entry.distance, Reverse(ce.seq)))
            .map(|(client, ce)| (*client, ce))
    }

    pub fn is_resolved(&self) -> bool {
        self.forward.is_some()
    }

    pub fn forward_info(&self) -> Option<&RouteNextHopEntry> {
        self.forward.as_ref()
    }

    /// Why the last resolution pass left this route out of the FIB, if
    /// it did.
    pub fn resolution_failure(&self) -> Option<ResolutionFailure> {
        self.failure
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn class_id(&self) -> Option<ClassId> {
        self.class_id
    }

    pub fn set_class_id(&mut self, class_id: Option<ClassId>) {
        self.class_id = class_id;
    }

    pub(crate) fn set_resolved(&mut self, forward: RouteNextHopEntry, connected: bool) {
        self.forward = Some(forward);
        self.failure = None;
        self.connected = connected;
    }

    pub(crate) fn clear_resolution(&mut self, failure: ResolutionFailure) {
        self.forward = None;
        self.failure = Some(failure);
        self.connected = false;
    }
}
