//! Per-session cancellation tokens.
//!
//! Handler tasks are made observable-cancellable rather than left to run
//! unbounded: `prompt()` checks the token on every suspend/resume boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks one cancellation token per live session.
#[derive(Default)]
pub struct CancelTable {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(session_id.to_string(), token.clone());
        token
    }

    /// Signals cancellation for `session_id`. Returns `true` if a token was
    /// registered (the session had a running handler task).
    pub fn cancel(&self, session_id: &str) -> bool {
        if let Some(token) = self.tokens.lock().get(session_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    pub fn remove(&self, session_id: &str) {
        self.tokens.lock().remove(session_id);
    }
}
