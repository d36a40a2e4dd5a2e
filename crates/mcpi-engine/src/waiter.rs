//! The rendezvous waiter table: the single suspension point tying a paused
//! tool handler call to an eventual matching `interaction.respond` (or a
//! cancellation/expiration sentinel).
//!
//! A `parking_lot::Mutex<HashMap<...>>` keyed by session id holding one
//! per-session control structure, here a `tokio::sync::oneshot::Sender`
//! instead of a cancellation flag.

use std::collections::HashMap;

use mcpi_domain::TraceEvent;
use mcpi_protocol::Response;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// What a suspended `prompt()` call is ultimately woken with.
#[derive(Debug, Clone)]
pub enum WaiterMessage {
    Responded(Response),
    Cancelled,
}

/// Tracks the single outstanding waiter per session. At most one waiter may
/// exist per session id — enforced upstream by the state machine, which
/// refuses a second `prompt()` before the first has resolved.
#[derive(Default)]
pub struct WaiterTable {
    senders: Mutex<HashMap<String, oneshot::Sender<WaiterMessage>>>,
}

impl WaiterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new waiter for `session_id`, returning the receiver half.
    /// Any stale sender previously registered for this id (e.g. left behind
    /// by a handler that never observed its own cancellation) is dropped.
    pub fn register(&self, session_id: &str) -> oneshot::Receiver<WaiterMessage> {
        let (tx, rx) = oneshot::channel();
        self.senders.lock().insert(session_id.to_string(), tx);
        TraceEvent::WaiterRegistered { session_id: session_id.to_string() }.emit();
        rx
    }

    /// Delivers `msg` to the pending waiter for `session_id`, if any.
    /// Returns `true` if a waiter was found (and removed).
    pub fn fulfill(&self, session_id: &str, msg: WaiterMessage) -> bool {
        let Some(tx) = self.senders.lock().remove(session_id) else {
            return false;
        };
        match &msg {
            WaiterMessage::Responded(_) => {
                TraceEvent::WaiterDelivered { session_id: session_id.to_string() }.emit()
            }
            WaiterMessage::Cancelled => {
                TraceEvent::WaiterCancelled { session_id: session_id.to_string() }.emit()
            }
        }
        let _ = tx.send(msg);
        true
    }

    /// Removes any pending waiter for `session_id` without waking it.
    /// Idempotent.
    pub fn remove(&self, session_id: &str) {
        self.senders.lock().remove(session_id);
    }

    pub fn has_waiter(&self, session_id: &str) -> bool {
        self.senders.lock().contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fulfill_wakes_registered_waiter() {
        let table = WaiterTable::new();
        let rx = table.register("s1");
        assert!(table.fulfill("s1", WaiterMessage::Cancelled));
        let msg = rx.await.unwrap();
        assert!(matches!(msg, WaiterMessage::Cancelled));
    }

    #[test]
    fn fulfill_with_no_waiter_returns_false() {
        let table = WaiterTable::new();
        assert!(!table.fulfill("missing", WaiterMessage::Cancelled));
    }

    #[test]
    fn register_replaces_a_stale_sender() {
        let table = WaiterTable::new();
        let _first = table.register("s1");
        let _second = table.register("s1");
        assert!(table.has_waiter("s1"));
        assert!(table.fulfill("s1", WaiterMessage::Cancelled));
        assert!(!table.has_waiter("s1"));
    }

    #[test]
    fn remove_clears_without_waking() {
        let table = WaiterTable::new();
        let rx = table.register("s1");
        table.remove("s1");
        assert!(!table.has_waiter("s1"));
        drop(rx);
    }
}
