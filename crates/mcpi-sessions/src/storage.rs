//! Session storage abstraction: `set`/`get`(deep clone)/`has`/`delete`/
//! `keys`/`count`/`close`, with `on_expired`/`on_deleted` hooks.
//!
//! The in-memory backend is a `parking_lot::RwLock<HashMap<...>>` guarded
//! store rather than an async `tokio::sync::Mutex`: every operation here is
//! a CPU-bound map mutation with no internal `.await`, so a synchronous lock
//! is the right tool, and `tokio::sync` primitives are reserved for the
//! rendezvous waiter table in `mcpi-engine`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mcpi_protocol::SessionValue;
use parking_lot::RwLock;

pub type ExpiryCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Pluggable key/value contract backing session storage.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Inserts or replaces `id`, refreshing its TTL. Returns `false` when
    /// the backend refused admission (a brand-new key arriving at
    /// capacity); refreshing an existing key always succeeds.
    async fn set(&self, id: &str, value: SessionValue, ttl: Duration) -> bool;
    /// Returns a deep clone; callers cannot mutate stored state through it.
    async fn get(&self, id: &str) -> Option<SessionValue>;
    async fn has(&self, id: &str) -> bool;
    async fn delete(&self, id: &str) -> bool;
    async fn keys(&self) -> Vec<String>;
    async fn count(&self) -> usize;
    async fn close(&self);

    /// Registers a callback fired when a key's TTL elapses.
    fn on_expired(&self, cb: ExpiryCallback);
    /// Registers a callback fired on explicit [`delete`](SessionStorage::delete).
    fn on_deleted(&self, cb: ExpiryCallback);
}

struct Entry {
    value: SessionValue,
    expires_at: Instant,
}

/// Single-process in-memory store with per-key TTL, a periodic sweep, and
/// `max_keys` admission control.
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, Entry>>,
    max_keys: usize,
    expired_hooks: RwLock<Vec<ExpiryCallback>>,
    deleted_hooks: RwLock<Vec<ExpiryCallback>>,
    closed: RwLock<bool>,
}

impl InMemoryStorage {
    pub fn new(max_keys: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            max_keys,
            expired_hooks: RwLock::new(Vec::new()),
            deleted_hooks: RwLock::new(Vec::new()),
            closed: RwLock::new(false),
        })
    }

    /// Sweeps expired entries, firing `on_expired` for each. Intended to be
    /// driven by a periodic task at `prune_interval_ms`.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let expired_ids: Vec<String> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, e)| e.expires_at <= now)
                .map(|(k, _)| k.clone())
                .collect()
        };
        if expired_ids.is_empty() {
            return;
        }
        {
            let mut entries = self.entries.write();
            for id in &expired_ids {
                entries.remove(id);
            }
        }
        let hooks = self.expired_hooks.read();
        for id in &expired_ids {
            for hook in hooks.iter() {
                hook(id);
            }
        }
    }

    /// Spawns the periodic sweep task. The returned handle is owned by the
    /// caller (typically the `SessionManager`) and aborted on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if *this.closed.read() {
                    break;
                }
                this.sweep_expired();
            }
        })
    }
}

#[async_trait]
impl SessionStorage for InMemoryStorage {
    async fn set(&self, id: &str, value: SessionValue, ttl: Duration) -> bool {
        let mut entries = self.entries.write();
        if !entries.contains_key(id) && entries.len() >= self.max_keys {
            return false;
        }
        entries.insert(
            id.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        true
    }

    async fn get(&self, id: &str) -> Option<SessionValue> {
        self.entries.read().get(id).map(|e| e.value.clone())
    }

    async fn has(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    async fn delete(&self, id: &str) -> bool {
        let removed = self.entries.write().remove(id).is_some();
        if removed {
            let hooks = self.deleted_hooks.read();
            for hook in hooks.iter() {
                hook(id);
            }
        }
        removed
    }

    async fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    async fn count(&self) -> usize {
        self.entries.read().len()
    }

    async fn close(&self) {
        *self.closed.write() = true;
        self.entries.write().clear();
    }

    fn on_expired(&self, cb: ExpiryCallback) {
        self.expired_hooks.write().push(cb);
    }

    fn on_deleted(&self, cb: ExpiryCallback) {
        self.deleted_hooks.write().push(cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpi_protocol::{SessionMetadata, SessionState};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample(id: &str) -> SessionValue {
        SessionValue {
            session_id: id.into(),
            state: SessionState::Idle,
            metadata: SessionMetadata {
                created_at: 0,
                last_activity_at: 0,
                tool_name: "greet".into(),
                caller_context: None,
            },
            history: vec![],
            current_prompt: None,
            accumulated_data: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn set_then_get_returns_deep_clone() {
        let storage = InMemoryStorage::new(100);
        storage.set("s1", sample("s1"), Duration::from_secs(60)).await;
        let mut first = storage.get("s1").await.unwrap();
        first.metadata.tool_name = "mutated".into();
        let second = storage.get("s1").await.unwrap();
        assert_eq!(second.metadata.tool_name, "greet");
    }

    #[tokio::test]
    async fn delete_fires_on_deleted_hook() {
        let storage = InMemoryStorage::new(100);
        storage.set("s1", sample("s1"), Duration::from_secs(60)).await;
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        storage.on_deleted(Arc::new(move |_id| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(storage.delete("s1").await);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!storage.delete("s1").await);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sweep_expired_fires_hook_and_removes_entry() {
        let storage = InMemoryStorage::new(100);
        storage.set("s1", sample("s1"), Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        storage.on_expired(Arc::new(move |_id| {
            fired2.fetch_add(1, Ordering::SeqCst);
        }));
        storage.sweep_expired();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!storage.has("s1").await);
    }

    #[tokio::test]
    async fn max_keys_caps_new_insertions() {
        let storage = InMemoryStorage::new(1);
        assert!(storage.set("s1", sample("s1"), Duration::from_secs(60)).await);
        assert!(!storage.set("s2", sample("s2"), Duration::from_secs(60)).await);
        assert_eq!(storage.count().await, 1);
        // Refreshing the existing key is always allowed, even at capacity.
        assert!(storage.set("s1", sample("s1"), Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn count_and_keys_reflect_contents() {
        let storage = InMemoryStorage::new(100);
        storage.set("a", sample("a"), Duration::from_secs(60)).await;
        storage.set("b", sample("b"), Duration::from_secs(60)).await;
        assert_eq!(storage.count().await, 2);
        let mut keys = storage.keys().await;
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn close_clears_all_entries() {
        let storage = InMemoryStorage::new(100);
        storage.set("a", sample("a"), Duration::from_secs(60)).await;
        storage.close().await;
        assert_eq!(storage.count().await, 0);
    }
}
