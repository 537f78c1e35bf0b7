//! Routing information base for the fabricd agent.
//!
//! Control-plane clients contribute unresolved routes into a per-VRF
//! [`Rib`]. A batch update applies the contributions under the VRF's
//! critical section, recursively resolves every route's forwarding
//! decision, and projects the resolved snapshot into a new immutable
//! switch state through the [`ForwardingInformationBaseUpdater`]. The
//! projection preserves node identity wherever nothing changed, so an
//! identical batch applied twice returns the input state untouched.

mod map;
mod resolve;
mod rib;
mod route;
mod updater;

pub use map::NetworkToRouteMap;
pub use resolve::{resolve, ResolveStats, MAX_RESOLUTION_DEPTH};
pub use rib::{Rib, RibError, RibFamily, RouteAddition, RouteUpdate, UpdateStats, VrfRib};
pub use route::{ClientEntry, ResolutionFailure, RibRoute};
pub use updater::ForwardingInformationBaseUpdater;
