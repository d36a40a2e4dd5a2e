//! Distributed session storage: the same [`SessionStorage`] contract backed
//! by a remote key/value store with server-side TTL.
//!
//! This module does not bundle a concrete remote-store client — no such
//! dependency is part of the corpus this engine was grown from, and
//! fabricating one would be worse than not having it. Instead it defines
//! the [`RemoteKv`] seam a deployment plugs a real client into (Redis,
//! memcached, an internal KV service); [`DistributedStorage`] supplies the
//! namespacing, expiration demultiplexing, and cursor-based counting the
//! contract requires on top of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcpi_protocol::SessionValue;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::storage::{ExpiryCallback, SessionStorage};

/// A notification that a remotely-stored key's TTL elapsed. Emitted by a
/// `RemoteKv` implementation's own keyspace-notification mechanism.
#[derive(Debug, Clone)]
pub struct ExpirationEvent {
    pub key: String,
}

/// The seam a deployment implements against its chosen remote store.
/// Values already cross the wire as JSON; `RemoteKv` only needs to move
/// bytes and TTLs.
#[async_trait]
pub trait RemoteKv: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> std::io::Result<()>;
    async fn get(&self, key: &str) -> std::io::Result<Option<Vec<u8>>>;
    async fn exists(&self, key: &str) -> std::io::Result<bool>;
    async fn remove(&self, key: &str) -> std::io::Result<bool>;
    /// Cursor-based key iteration under `prefix`, avoiding an O(N) blocking
    /// scan on the remote store.
    async fn scan_keys(&self, prefix: &str) -> std::io::Result<Vec<String>>;
    /// Cursor-based count under `prefix`.
    async fn count(&self, prefix: &str) -> std::io::Result<usize>;
}

/// Wraps a [`RemoteKv`] client with key-prefix namespacing and an
/// expiration-event demultiplexer, satisfying [`SessionStorage`].
pub struct DistributedStorage<K: RemoteKv> {
    client: Arc<K>,
    prefix: String,
    expired_hooks: RwLock<Vec<ExpiryCallback>>,
    deleted_hooks: RwLock<Vec<ExpiryCallback>>,
}

impl<K: RemoteKv + 'static> DistributedStorage<K> {
    pub fn new(client: Arc<K>, prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            client,
            prefix: prefix.into(),
            expired_hooks: RwLock::new(Vec::new()),
            deleted_hooks: RwLock::new(Vec::new()),
        })
    }

    fn namespaced(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.prefix.as_str()).unwrap_or(key)
    }

    /// Spawns a task that demultiplexes a notification channel of remote
    /// expiration events to the registered `on_expired` hooks. The sender
    /// side is owned by whatever subscribes to the remote store's
    /// keyspace-notification feed.
    pub fn spawn_expiration_demux(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<ExpirationEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !event.key.starts_with(this.prefix.as_str()) {
                    continue;
                }
                let id = this.strip_prefix(&event.key).to_string();
                let hooks = this.expired_hooks.read();
                for hook in hooks.iter() {
                    hook(&id);
                }
            }
        })
    }
}

#[async_trait]
impl<K: RemoteKv> SessionStorage for DistributedStorage<K> {
    async fn set(&self, id: &str, value: SessionValue, ttl: Duration) -> bool {
        let Ok(bytes) = serde_json::to_vec(&value) else {
            return false;
        };
        self.client.put(&self.namespaced(id), bytes, ttl).await.is_ok()
    }

    async fn get(&self, id: &str) -> Option<SessionValue> {
        let bytes = self.client.get(&self.namespaced(id)).await.ok().flatten()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn has(&self, id: &str) -> bool {
        self.client.exists(&self.namespaced(id)).await.unwrap_or(false)
    }

    async fn delete(&self, id: &str) -> bool {
        let removed = self.client.remove(&self.namespaced(id)).await.unwrap_or(false);
        if removed {
            let hooks = self.deleted_hooks.read();
            for hook in hooks.iter() {
                hook(id);
            }
        }
        removed
    }

    async fn keys(&self) -> Vec<String> {
        self.client
            .scan_keys(&self.prefix)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|k| self.strip_prefix(&k).to_string())
            .collect()
    }

    async fn count(&self) -> usize {
        self.client.count(&self.prefix).await.unwrap_or(0)
    }

    async fn close(&self) {}

    fn on_expired(&self, cb: ExpiryCallback) {
        self.expired_hooks.write().push(cb);
    }

    fn on_deleted(&self, cb: ExpiryCallback) {
        self.deleted_hooks.write().push(cb);
    }
}
