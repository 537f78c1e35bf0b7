//! The agent facade tying the RIB to the update queue.

use crate::error::AgentError;
use crate::state_manager::StateHandle;
use fabric_rib::{Rib, RibError, RouteUpdate, UpdateStats};
use fabric_types::{ClientId, RouterId};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Bundles the RIB with the state handle so route batches run on the
/// update thread, against the state they will replace.
pub struct Agent {
    rib: Arc<Rib>,
    state: StateHandle,
}

impl Agent {
    pub fn new(rib: Arc<Rib>, state: StateHandle) -> Self {
        Agent { rib, state }
    }

    pub fn rib(&self) -> &Arc<Rib> {
        &self.rib
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Enqueues a route batch. The returned future resolves with the
    /// batch's stats once the update thread has applied and published
    /// it; the enqueue itself happens before this function returns.
    pub fn update_routes(
        &self,
        vrf: RouterId,
        client: ClientId,
        update: RouteUpdate,
    ) -> impl Future<Output = Result<UpdateStats, AgentError>> {
        let (tx, rx) = oneshot::channel::<Result<UpdateStats, RibError>>();
        let rib = Arc::clone(&self.rib);
        let sent = self.state.update("rib-update", move |state| {
            match rib.update(vrf, client, update, state) {
                Ok((new_state, stats)) => {
                    let _ = tx.send(Ok(stats));
                    Some(new_state)
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    None
                }
            }
        });

        async move {
            if !sent {
                return Err(AgentError::UpdateQueueClosed);
            }
            match rx.await {
                Ok(result) => result.map_err(AgentError::from),
                Err(_) => Err(AgentError::UpdateQueueClosed),
            }
        }
    }
}
