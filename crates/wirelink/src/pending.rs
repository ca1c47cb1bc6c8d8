//! The correlation table: pending calls keyed by request id.

use std::collections::HashMap;

use core::fmt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::ErrorObject;

/// Terminal outcome delivered to a suspended caller.
#[derive(Debug)]
pub enum CallOutcome {
    /// The server responded with a `result` payload.
    Result(Value),
    /// The server responded with an `error` object.
    Error(ErrorObject),
    /// The transport closed before a response arrived.
    Closed,
}

/// Internal-consistency failure: an id was registered while still pending.
///
/// The allocator guarantees uniqueness among live calls, so hitting this
/// means the engine itself is broken; it is never a server-facing condition.
#[derive(Debug)]
pub struct DuplicateId(pub u64);

impl fmt::Display for DuplicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call id {} is already pending", self.0)
    }
}

impl std::error::Error for DuplicateId {}

/// Concurrent map from call id to its single-assignment completion slot.
///
/// One entry per in-flight call. Each entry is removed on exactly one of:
/// result arrival, error arrival, timeout expiry, or transport-closed
/// cancellation. The oneshot sender gives first-writer-wins for free.
#[derive(Debug, Default)]
pub struct PendingTable {
    slots: Mutex<HashMap<u64, oneshot::Sender<CallOutcome>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh pending call and hand back its completion receiver.
    pub fn register(&self, id: u64) -> Result<oneshot::Receiver<CallOutcome>, DuplicateId> {
        let mut slots = self.slots.lock();
        if slots.contains_key(&id) {
            return Err(DuplicateId(id));
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(id, tx);
        tracing::debug!(id, pending = slots.len(), "registered pending call");
        Ok(rx)
    }

    /// Complete the pending call for `id`, if it is still pending.
    ///
    /// Returns `false` when the id is unknown: the call already timed out,
    /// was cancelled, or the response was never ours. Late responses hit
    /// this path under timeout races, so it performs no mutation and leaves
    /// logging to the caller.
    pub fn complete(&self, id: u64, outcome: CallOutcome) -> bool {
        let waiter = self.slots.lock().remove(&id);
        match waiter {
            Some(tx) => {
                // The receiver may have just been dropped by a timed-out
                // caller; the entry is gone either way.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove a pending call without completing it.
    ///
    /// Used by the caller itself on timeout and send failure; the caller
    /// already knows the outcome and only needs the entry gone.
    pub fn remove(&self, id: u64) -> bool {
        self.slots.lock().remove(&id).is_some()
    }

    /// Complete every still-pending call with [`CallOutcome::Closed`],
    /// waking all suspended callers. Invoked on transport closure.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = {
            let mut slots = self.slots.lock();
            slots.drain().collect()
        };
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "cancelling pending calls");
        }
        for (_, tx) in drained {
            let _ = tx.send(CallOutcome::Closed);
        }
    }

    /// Ids of calls still waiting for a response (diagnostics).
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.slots.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn complete_on_unknown_id_is_a_silent_no_op() {
        let table = PendingTable::new();
        assert!(!table.complete(99, CallOutcome::Result(json!(1))));
        assert!(table.is_empty());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let table = PendingTable::new();
        let _rx = table.register(1).unwrap();
        assert!(table.register(1).is_err());
        assert_eq!(table.ids(), vec![1]);
    }

    #[tokio::test]
    async fn first_completion_wins_and_second_is_a_no_op() {
        let table = PendingTable::new();
        let rx = table.register(5).unwrap();

        assert!(table.complete(5, CallOutcome::Result(json!("first"))));
        assert!(!table.complete(5, CallOutcome::Result(json!("second"))));

        match rx.await.unwrap() {
            CallOutcome::Result(value) => assert_eq!(value, json!("first")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn cancel_all_wakes_every_waiter_with_closed() {
        let table = PendingTable::new();
        let rx1 = table.register(1).unwrap();
        let rx2 = table.register(2).unwrap();

        table.cancel_all();
        assert!(table.is_empty());

        assert!(matches!(rx1.await.unwrap(), CallOutcome::Closed));
        assert!(matches!(rx2.await.unwrap(), CallOutcome::Closed));
    }
}
