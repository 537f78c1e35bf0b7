//! fabricd: the fabric switch agent.
//!
//! The agent owns a single immutable [`fabric_state::SwitchState`] tree,
//! mutated only by the update task in [`state_manager`]. Two subsystems
//! hang off it:
//!
//! - Routing: control-plane clients push batches into the
//!   [`fabric_rib::Rib`]; resolution and FIB projection run on the update
//!   thread via [`Agent::update_routes`].
//! - Neighbors: per-VLAN ARP/NDP caches in [`neighbor`] solicit, confirm
//!   and expire adjacencies on timers, publishing table changes through
//!   the same update queue.
//!
//! Hardware programming and packet transmission live behind the
//! collaborator traits in [`hw`] and [`packet`]; the [`programmer`]
//! walks every published delta into the hardware sink.

pub mod config;
pub mod error;
pub mod hw;
pub mod neighbor;
pub mod packet;
pub mod programmer;
pub mod state_manager;

mod agent;

pub use agent::Agent;
pub use error::AgentError;
