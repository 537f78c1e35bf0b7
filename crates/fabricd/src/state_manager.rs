//! Switch state ownership and the update queue.
//!
//! A single update task owns all mutations of the switch state. Everyone
//! else enqueues a pure function over the current root; the task applies
//! the functions in order and notifies observers with a [`StateDelta`]
//! per publication. Returning the input root (or `None`) from an update
//! signals a no-op and produces no publication. Readers follow a watch
//! of the current root and never block writers.

use fabric_state::{StateDelta, SwitchState};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// A queued mutation of the switch state.
pub struct StateUpdate {
    name: &'static str,
    apply: Box<dyn FnOnce(&Arc<SwitchState>) -> Option<Arc<SwitchState>> + Send>,
}

impl StateUpdate {
    pub fn new(
        name: &'static str,
        apply: impl FnOnce(&Arc<SwitchState>) -> Option<Arc<SwitchState>> + Send + 'static,
    ) -> Self {
        StateUpdate {
            name,
            apply: Box::new(apply),
        }
    }
}

/// Receives every state publication, in publication order, on the update
/// task.
pub trait StateObserver: Send {
    fn state_updated(&mut self, delta: &StateDelta);
}

/// Cheap-to-clone handle for enqueuing updates and reading the current
/// root.
#[derive(Clone)]
pub struct StateHandle {
    updates_tx: mpsc::UnboundedSender<StateUpdate>,
    current: watch::Receiver<Arc<SwitchState>>,
}

impl StateHandle {
    /// Enqueues an update. Returns false if the update task is gone.
    pub fn update(
        &self,
        name: &'static str,
        apply: impl FnOnce(&Arc<SwitchState>) -> Option<Arc<SwitchState>> + Send + 'static,
    ) -> bool {
        self.updates_tx.send(StateUpdate::new(name, apply)).is_ok()
    }

    /// The most recently published root.
    pub fn current(&self) -> Arc<SwitchState> {
        Arc::clone(&self.current.borrow())
    }
}

/// Owns the switch state and services the update queue.
pub struct StateManager {
    current_tx: watch::Sender<Arc<SwitchState>>,
    updates_rx: mpsc::UnboundedReceiver<StateUpdate>,
    observers: Vec<Box<dyn StateObserver>>,
}

impl StateManager {
    pub fn new(initial: Arc<SwitchState>) -> (Self, StateHandle) {
        let (current_tx, current_rx) = watch::channel(initial);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        (
            StateManager {
                current_tx,
                updates_rx,
                observers: Vec::new(),
            },
            StateHandle {
                updates_tx,
                current: current_rx,
            },
        )
    }

    /// Registers an observer. Observers are notified in registration
    /// order for every publication.
    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    fn apply_one(&mut self, update: StateUpdate) {
        let old = Arc::clone(&self.current_tx.borrow());
        match (update.apply)(&old) {
            Some(new) if !Arc::ptr_eq(&new, &old) => {
                debug!(update = update.name, "publishing state");
                self.current_tx.send_replace(Arc::clone(&new));
                let delta = StateDelta::new(old, new);
                for observer in &mut self.observers {
                    observer.state_updated(&delta);
                }
            }
            _ => {
                trace!(update = update.name, "state update was a no-op");
            }
        }
    }

    /// Applies every update already queued, without waiting. Test
    /// harnesses drive the manager with this.
    pub fn run_pending(&mut self) {
        while let Ok(update) = self.updates_rx.try_recv() {
            self.apply_one(update);
        }
    }

    /// Services the queue until every [`StateHandle`] is dropped.
    pub async fn run(mut self) {
        while let Some(update) = self.updates_rx.recv().await {
            self.apply_one(update);
        }
        debug!("state manager stopping: all handles dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_state::Vlan;
    use fabric_types::VlanId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver(Arc<AtomicUsize>);

    impl StateObserver for CountingObserver {
        fn state_updated(&mut self, _delta: &StateDelta) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_updates_apply_in_order_and_notify() {
        let (mut manager, handle) = StateManager::new(Arc::new(SwitchState::new()));
        let publications = Arc::new(AtomicUsize::new(0));
        manager.add_observer(Box::new(CountingObserver(Arc::clone(&publications))));

        handle.update("add-vlan-100", |state| {
            Some(state.with_vlan(Arc::new(Vlan::new(
                VlanId::new(100).unwrap(),
                "vlan100",
                vec![],
            ))))
        });
        handle.update("add-vlan-200", |state| {
            Some(state.with_vlan(Arc::new(Vlan::new(
                VlanId::new(200).unwrap(),
                "vlan200",
                vec![],
            ))))
        });
        manager.run_pending();

        assert_eq!(publications.load(Ordering::SeqCst), 2);
        let current = handle.current();
        assert!(current.get_vlan(VlanId::new(100).unwrap()).is_some());
        assert!(current.get_vlan(VlanId::new(200).unwrap()).is_some());
    }

    #[test]
    fn test_noop_update_publishes_nothing() {
        let (mut manager, handle) = StateManager::new(Arc::new(SwitchState::new()));
        let publications = Arc::new(AtomicUsize::new(0));
        manager.add_observer(Box::new(CountingObserver(Arc::clone(&publications))));

        let before = handle.current();
        handle.update("noop-none", |_| None);
        handle.update("noop-same", |state| Some(Arc::clone(state)));
        manager.run_pending();

        assert_eq!(publications.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(&handle.current(), &before));
    }
}
