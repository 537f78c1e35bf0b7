//! Agent error types.

use thiserror::Error;

/// Errors raised by the agent core.
///
/// The neighbor state machine variants mark invariant violations: the
/// cache escalates them to a crash rather than limping along with a
/// corrupt entry.
#[derive(Debug, Error)]
pub enum AgentError {
    /// An entry was driven into a state the machine never enters
    /// (`DELAY`, `UNINITIALIZED`) or ticked after expiry.
    #[error("invalid neighbor state transition: {0}")]
    InvalidStateTransition(String),

    /// A timer was scheduled while one was already pending.
    #[error("timer already scheduled for {0}")]
    TimerAlreadyScheduled(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// A route batch was rejected by the RIB.
    #[error(transparent)]
    Rib(#[from] fabric_rib::RibError),

    /// The update queue is gone; the agent is shutting down.
    #[error("update queue closed")]
    UpdateQueueClosed,
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
