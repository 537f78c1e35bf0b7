//! Immutable switch state for the fabricd agent.
//!
//! The forwarding state of the switch is a single immutable tree rooted at
//! [`SwitchState`]. Mutations never happen in place: every update produces
//! a new root that shares all unchanged branches with its predecessor, so
//! two roots can be compared node-by-node with pointer identity and a
//! pointer-equal subtree is known to be semantically equal.
//!
//! On top of the tree this crate provides [`StateDelta`], a structural
//! diff between two roots, and the route walkers hardware programmers
//! consume.

mod delta;
mod fib;
mod neighbor;
mod port;
mod route;
mod switch_state;
mod vlan;
mod walk;

pub use delta::{fib_delta, neighbor_table_delta, Delta, MapDelta, StateDelta};
pub use fib::{FibContainer, FibFamily, ForwardingInformationBase};
pub use neighbor::{NeighborEntryFields, NeighborFamily, NeighborTable};
pub use port::{AggregatePort, Port};
pub use route::{
    ForwardAction, NextHop, NextHopSet, Route, RouteNextHopEntry, RoutePrefix,
};
pub use switch_state::SwitchState;
pub use vlan::Vlan;
pub use walk::{for_all_routes, for_each_changed_route, for_each_changed_route_all,
    ChangedRouteHandler, RouteVisitor};

/// Errors raised when building state tree values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The mask is wider than the address family or the network has host
    /// bits set beyond the mask.
    #[error("malformed prefix: {0}")]
    PrefixMalformed(String),
}
