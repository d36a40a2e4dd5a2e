//! The session manager: input sanitization, ID generation, resource
//! limiting, timer ownership, state-machine enforcement, and event emission
//! on top of the storage abstraction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mcpi_domain::TraceEvent;
use mcpi_protocol::{SessionMetadata, SessionState, SessionSummary, SessionValue, Turn};
use parking_lot::RwLock;

use crate::error::{Result, SessionError};
use crate::state_machine::is_legal_transition;
use crate::storage::SessionStorage;

pub const HISTORY_CAP: usize = 100;
pub const MAX_CONTEXT_BYTES: usize = 10 * 1024;
pub const MAX_SESSION_ID_BYTES: usize = 256;
pub const CLEANUP_GRACE: Duration = Duration::from_secs(5);
pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 3_600_000;

const ACCUMULATED_DATA_KEY_BLOCKLIST: &[&str] = &["__proto__", "constructor", "prototype"];

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn is_valid_data_key(key: &str) -> bool {
    !key.is_empty()
        && !ACCUMULATED_DATA_KEY_BLOCKLIST.contains(&key)
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Sanitizes a JSON value by round-tripping it through serialization,
/// dropping anything that doesn't survive the trip, and enforces a byte cap.
fn sanitize_json(value: &serde_json::Value, max_bytes: usize) -> Result<serde_json::Value> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| SessionError::Internal(format!("value not serializable: {e}")))?;
    if bytes.len() > max_bytes {
        return Err(SessionError::PayloadTooLarge(format!(
            "value exceeds {max_bytes} bytes"
        )));
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::Internal(format!("round-trip failed: {e}")))
}

pub struct SessionManager {
    storage: Arc<dyn SessionStorage>,
    max_sessions: usize,
    default_timeout_ms: u64,
    session_locks: RwLock<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    session_ttls: RwLock<HashMap<String, Duration>>,
    cleanup_timers: RwLock<HashMap<String, tokio::task::JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn SessionStorage>, max_sessions: usize, default_timeout_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            storage,
            max_sessions,
            default_timeout_ms,
            session_locks: RwLock::new(HashMap::new()),
            session_ttls: RwLock::new(HashMap::new()),
            cleanup_timers: RwLock::new(HashMap::new()),
        })
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        if let Some(lock) = self.session_locks.read().get(id) {
            return Arc::clone(lock);
        }
        let mut locks = self.session_locks.write();
        Arc::clone(locks.entry(id.to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))))
    }

    fn forget_lock(&self, id: &str) {
        self.session_locks.write().remove(id);
        self.session_ttls.write().remove(id);
    }

    // ── Create ───────────────────────────────────────────────────────

    pub async fn create_session(
        &self,
        tool_name: &str,
        caller_context: Option<serde_json::Value>,
        timeout_ms: Option<u64>,
    ) -> Result<(String, SessionState)> {
        if tool_name.trim().is_empty() {
            return Err(SessionError::InvalidKey("tool_name must not be empty".into()));
        }

        let timeout_ms = timeout_ms
            .unwrap_or(self.default_timeout_ms)
            .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);

        let caller_context = match caller_context {
            Some(v) => Some(sanitize_json(&v, MAX_CONTEXT_BYTES)?),
            None => None,
        };

        if self.storage.count().await >= self.max_sessions {
            return Err(SessionError::CapReached(self.max_sessions));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        debug_assert!(session_id.len() <= MAX_SESSION_ID_BYTES);

        let now = now_millis();
        let value = SessionValue {
            session_id: session_id.clone(),
            state: SessionState::Idle,
            metadata: SessionMetadata {
                created_at: now,
                last_activity_at: now,
                tool_name: tool_name.to_string(),
                caller_context,
            },
            history: vec![],
            current_prompt: None,
            accumulated_data: Default::default(),
        };

        let ttl = Duration::from_millis(timeout_ms);
        self.session_ttls.write().insert(session_id.clone(), ttl);
        if !self.storage.set(&session_id, value, ttl).await {
            self.session_ttls.write().remove(&session_id);
            return Err(SessionError::CapReached(self.max_sessions));
        }

        TraceEvent::SessionCreated {
            session_id: session_id.clone(),
            tool_name: tool_name.to_string(),
            timeout_ms,
        }
        .emit();

        Ok((session_id, SessionState::Idle))
    }

    // ── Read ─────────────────────────────────────────────────────────

    pub async fn get_session(&self, id: &str) -> Result<SessionValue> {
        if id.is_empty() || id.len() > MAX_SESSION_ID_BYTES {
            return Err(SessionError::NotFound(id.to_string()));
        }
        self.storage
            .get(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut out = Vec::new();
        for id in self.storage.keys().await {
            if let Some(value) = self.storage.get(&id).await {
                out.push(SessionSummary::from(&value));
            }
        }
        out
    }

    fn ttl_for(&self, id: &str) -> Duration {
        self.session_ttls
            .read()
            .get(id)
            .copied()
            .unwrap_or_else(|| Duration::from_millis(self.default_timeout_ms))
    }

    async fn write_back(&self, id: &str, value: SessionValue) {
        let ttl = self.ttl_for(id);
        // Refreshing an existing key is always admitted by the storage
        // contract; only a brand-new key can be refused for capacity.
        let stored = self.storage.set(id, value, ttl).await;
        debug_assert!(stored, "write_back must only refresh an existing session");
    }

    // ── Mutate ───────────────────────────────────────────────────────

    /// Validates and applies a state transition, refreshing the session's
    /// TTL on write-back.
    pub async fn update_state(&self, id: &str, target: SessionState) -> Result<SessionValue> {
        let _guard = self.lock_for(id).lock().await;
        let mut value = self.get_session(id).await?;

        if !is_legal_transition(value.state, target) {
            return Err(SessionError::InvalidTransition(format!(
                "{} -> {:?}",
                value.state, target
            )));
        }

        let from = value.state;
        value.state = target;
        value.metadata.last_activity_at = now_millis();
        self.write_back(id, value.clone()).await;

        TraceEvent::SessionStateChanged {
            session_id: id.to_string(),
            from: from.to_string(),
            to: target.to_string(),
        }
        .emit();

        Ok(value)
    }

    /// Appends a turn, evicting the oldest on cap overflow, and sets
    /// `current_prompt` when the turn carries one.
    pub async fn add_turn(
        &self,
        id: &str,
        prompt: Option<mcpi_protocol::Prompt>,
        response: Option<mcpi_protocol::Response>,
    ) -> Result<SessionValue> {
        let _guard = self.lock_for(id).lock().await;
        let mut value = self.get_session(id).await?;

        if value.history.len() >= HISTORY_CAP {
            value.history.remove(0);
        }
        let turn_id = value.history.len();
        let has_prompt = prompt.is_some();
        let has_response = response.is_some();
        if let Some(p) = prompt.clone() {
            value.current_prompt = Some(p);
        }
        value.history.push(Turn {
            turn_id,
            prompt,
            response,
            timestamp: now_millis(),
        });
        value.metadata.last_activity_at = now_millis();
        self.write_back(id, value.clone()).await;

        TraceEvent::TurnRecorded {
            session_id: id.to_string(),
            turn_id,
            has_prompt,
            has_response,
        }
        .emit();

        Ok(value)
    }

    /// Records a normalized response against the current prompt, clears it,
    /// and transitions to `target`, all under one acquisition of the
    /// session's logical lock. Must be used instead of separate `add_turn` +
    /// `update_state` calls: splitting them lets a concurrent read observe
    /// `current_prompt == None` while `state` is still `WaitingUser`,
    /// violating the invariant that the two agree.
    pub async fn respond_to_prompt(
        &self,
        id: &str,
        response: mcpi_protocol::Response,
        target: SessionState,
    ) -> Result<SessionValue> {
        let _guard = self.lock_for(id).lock().await;
        let mut value = self.get_session(id).await?;

        if !is_legal_transition(value.state, target) {
            return Err(SessionError::InvalidTransition(format!(
                "{} -> {:?}",
                value.state, target
            )));
        }

        let from = value.state;
        if value.history.len() >= HISTORY_CAP {
            value.history.remove(0);
        }
        let turn_id = value.history.len();
        value.current_prompt = None;
        value.history.push(Turn {
            turn_id,
            prompt: None,
            response: Some(response),
            timestamp: now_millis(),
        });
        value.state = target;
        value.metadata.last_activity_at = now_millis();
        self.write_back(id, value.clone()).await;

        TraceEvent::TurnRecorded {
            session_id: id.to_string(),
            turn_id,
            has_prompt: false,
            has_response: true,
        }
        .emit();
        TraceEvent::SessionStateChanged {
            session_id: id.to_string(),
            from: from.to_string(),
            to: target.to_string(),
        }
        .emit();

        Ok(value)
    }

    pub async fn set_data(&self, id: &str, key: &str, value_json: serde_json::Value) -> Result<SessionValue> {
        if !is_valid_data_key(key) {
            return Err(SessionError::InvalidKey(key.to_string()));
        }
        let _guard = self.lock_for(id).lock().await;
        let mut value = self.get_session(id).await?;
        let sanitized = sanitize_json(&value_json, MAX_CONTEXT_BYTES)?;
        value.accumulated_data.insert(key.to_string(), sanitized);

        let total_bytes = serde_json::to_vec(&value.accumulated_data)
            .map(|b| b.len())
            .unwrap_or(usize::MAX);
        if total_bytes > MAX_CONTEXT_BYTES {
            return Err(SessionError::PayloadTooLarge(
                "accumulated_data exceeds 10 KB".into(),
            ));
        }

        value.metadata.last_activity_at = now_millis();
        self.write_back(id, value.clone()).await;
        Ok(value)
    }

    pub async fn get_data(&self, id: &str, key: Option<&str>) -> Result<serde_json::Value> {
        let value = self.get_session(id).await?;
        match key {
            Some(k) => Ok(value.accumulated_data.get(k).cloned().unwrap_or(serde_json::Value::Null)),
            None => Ok(serde_json::to_value(&value.accumulated_data).unwrap_or(serde_json::Value::Null)),
        }
    }

    // ── Terminal transitions ────────────────────────────────────────

    async fn finish(&self, id: &str, target: SessionState, result_key_value: Option<serde_json::Value>) -> Result<SessionValue> {
        let mut value = self.update_state(id, target).await?;
        if let Some(result) = result_key_value {
            value.accumulated_data.insert("result".to_string(), result);
            self.write_back(id, value.clone()).await;
        }
        self.schedule_cleanup(id);
        Ok(value)
    }

    pub async fn complete_session(&self, id: &str, result: serde_json::Value) -> Result<SessionValue> {
        let value = self.finish(id, SessionState::Completed, Some(result)).await?;
        TraceEvent::SessionCompleted { session_id: id.to_string() }.emit();
        Ok(value)
    }

    pub async fn cancel_session(&self, id: &str, reason: Option<String>) -> Result<SessionValue> {
        let current = self.get_session(id).await?;
        if current.state.is_terminal() {
            return Err(SessionError::AlreadyTerminal(id.to_string()));
        }
        let value = self.finish(id, SessionState::Cancelled, None).await?;
        TraceEvent::SessionCancelled { session_id: id.to_string(), reason }.emit();
        Ok(value)
    }

    pub async fn error_session(&self, id: &str, message: String) -> Result<SessionValue> {
        let value = self.finish(id, SessionState::Error, None).await?;
        TraceEvent::SessionErrored { session_id: id.to_string(), message }.emit();
        Ok(value)
    }

    // ── Destruction ──────────────────────────────────────────────────

    fn schedule_cleanup(&self, id: &str) {
        let storage = Arc::clone(&self.storage);
        let id_owned = id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(CLEANUP_GRACE).await;
            storage.delete(&id_owned).await;
            TraceEvent::SessionDestroyed { session_id: id_owned }.emit();
        });
        self.cleanup_timers.write().insert(id.to_string(), handle);
    }

    /// Cancels all timers, closes storage, drops listeners for one session.
    pub async fn destroy_session(&self, id: &str) {
        if let Some(handle) = self.cleanup_timers.write().remove(id) {
            handle.abort();
        }
        self.storage.delete(id).await;
        self.forget_lock(id);
    }

    /// Wires the manager's own bookkeeping to the storage's expiration
    /// hook: on TTL elapse, drop any scheduled cleanup timer and forget the
    /// per-session lock. The engine registers its waiter-cancellation
    /// callback through the same storage hook independently.
    pub fn install_expiration_hook(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.storage.on_expired(Arc::new(move |id: &str| {
            let id = id.to_string();
            this.cleanup_timers.write().remove(&id);
            this.session_locks.write().remove(&id);
            this.session_ttls.write().remove(&id);
            TraceEvent::SessionExpired { session_id: id }.emit();
        }));
    }

    pub fn storage(&self) -> Arc<dyn SessionStorage> {
        Arc::clone(&self.storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn manager() -> Arc<SessionManager> {
        let storage = InMemoryStorage::new(1000);
        SessionManager::new(storage, 1000, 300_000)
    }

    #[tokio::test]
    async fn create_session_starts_idle() {
        let mgr = manager();
        let (id, state) = mgr.create_session("greet", None, None).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(state, SessionState::Idle);
    }

    #[tokio::test]
    async fn create_rejects_empty_tool_name() {
        let mgr = manager();
        assert!(mgr.create_session("", None, None).await.is_err());
    }

    #[tokio::test]
    async fn create_clamps_timeout_below_minimum() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, Some(500)).await.unwrap();
        let ttl = mgr.ttl_for(&id);
        assert_eq!(ttl, Duration::from_millis(MIN_TIMEOUT_MS));
    }

    #[tokio::test]
    async fn create_clamps_timeout_above_maximum() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, Some(3_600_001)).await.unwrap();
        let ttl = mgr.ttl_for(&id);
        assert_eq!(ttl, Duration::from_millis(MAX_TIMEOUT_MS));
    }

    #[tokio::test]
    async fn session_cap_refuses_creation() {
        let storage = InMemoryStorage::new(1000);
        let mgr = SessionManager::new(storage, 1, 300_000);
        mgr.create_session("greet", None, None).await.unwrap();
        let err = mgr.create_session("greet", None, None).await.unwrap_err();
        assert!(matches!(err, SessionError::CapReached(1)));
    }

    #[tokio::test]
    async fn distinct_sessions_get_distinct_ids() {
        let mgr = manager();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..200 {
            let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
            assert!(ids.insert(id));
        }
        assert_eq!(ids.len(), 200);
    }

    #[tokio::test]
    async fn illegal_transition_leaves_session_unchanged() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
        let err = mgr.update_state(&id, SessionState::Completed).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition(_)));
        let value = mgr.get_session(&id).await.unwrap();
        assert_eq!(value.state, SessionState::Idle);
    }

    #[tokio::test]
    async fn legal_transition_updates_state_and_activity() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
        let before = mgr.get_session(&id).await.unwrap().metadata.last_activity_at;
        let value = mgr.update_state(&id, SessionState::Active).await.unwrap();
        assert_eq!(value.state, SessionState::Active);
        assert!(value.metadata.last_activity_at >= before);
    }

    #[tokio::test]
    async fn history_cap_evicts_oldest() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
        for i in 0..HISTORY_CAP + 10 {
            let prompt = mcpi_protocol::Prompt::Text(mcpi_protocol::PromptFields {
                message: format!("q{i}"),
                ..Default::default()
            });
            mgr.add_turn(&id, Some(prompt), None).await.unwrap();
        }
        let value = mgr.get_session(&id).await.unwrap();
        assert_eq!(value.history.len(), HISTORY_CAP);
        assert!(matches!(&value.history[0].prompt, Some(mcpi_protocol::Prompt::Text(f)) if f.message == "q10"));
    }

    #[tokio::test]
    async fn turn_ids_match_insertion_index() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
        for i in 0..5 {
            let prompt = mcpi_protocol::Prompt::Text(mcpi_protocol::PromptFields {
                message: format!("q{i}"),
                ..Default::default()
            });
            let value = mgr.add_turn(&id, Some(prompt), None).await.unwrap();
            assert_eq!(value.history.last().unwrap().turn_id, i);
        }
    }

    #[tokio::test]
    async fn set_data_rejects_blocklisted_and_malformed_keys() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
        assert!(mgr.set_data(&id, "__proto__", serde_json::json!(1)).await.is_err());
        assert!(mgr.set_data(&id, "bad key!", serde_json::json!(1)).await.is_err());
        assert!(mgr.set_data(&id, "valid-key_1", serde_json::json!(1)).await.is_ok());
    }

    #[tokio::test]
    async fn complete_requires_non_terminal_source_and_writes_result() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
        mgr.update_state(&id, SessionState::Active).await.unwrap();
        let value = mgr
            .complete_session(&id, serde_json::json!({"greeting": "Hello, Alice!"}))
            .await
            .unwrap();
        assert_eq!(value.state, SessionState::Completed);
        assert_eq!(value.accumulated_data.get("result").unwrap()["greeting"], "Hello, Alice!");
    }

    #[tokio::test]
    async fn cancel_twice_fails_already_terminal() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
        mgr.update_state(&id, SessionState::Active).await.unwrap();
        mgr.cancel_session(&id, Some("user cancelled".into())).await.unwrap();
        let err = mgr.cancel_session(&id, None).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyTerminal(_)));
    }

    #[tokio::test]
    async fn get_data_returns_deep_copy_semantics() {
        let mgr = manager();
        let (id, _) = mgr.create_session("greet", None, None).await.unwrap();
        mgr.set_data(&id, "k", serde_json::json!({"n": 1})).await.unwrap();
        let mut v1 = mgr.get_data(&id, Some("k")).await.unwrap();
        v1["n"] = serde_json::json!(999);
        let v2 = mgr.get_data(&id, Some("k")).await.unwrap();
        assert_eq!(v2["n"], 1);
    }

    #[tokio::test]
    async fn list_sessions_reports_every_live_session() {
        let mgr = manager();
        mgr.create_session("greet", None, None).await.unwrap();
        mgr.create_session("greet", None, None).await.unwrap();
        let summaries = mgr.list_sessions().await;
        assert_eq!(summaries.len(), 2);
    }
}
