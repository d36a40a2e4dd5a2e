//! Session value types: the wire-facing shape of a session snapshot, shared
//! by the session manager (which owns the authoritative copy) and the
//! dispatcher (which serializes clones of it to callers).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prompt::{Prompt, Response};

/// Session lifecycle states. See the state machine in `mcpi-sessions` for
/// the legal transition table between these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Active,
    WaitingUser,
    Processing,
    Completed,
    Cancelled,
    Error,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Error
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::WaitingUser => "waiting_user",
            SessionState::Processing => "processing",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
            SessionState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// `{created_at, last_activity_at, tool_name, caller_context}`, monotonic
/// millisecond timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub created_at: i64,
    pub last_activity_at: i64,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_context: Option<Value>,
}

/// `{turn_id, prompt?, response?, timestamp}`. `turn_id` is the index at
/// insertion time (post-eviction).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub turn_id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    pub timestamp: i64,
}

/// The full session snapshot. Storage always hands callers a deep clone of
/// this; nothing here should be mutated through a returned reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionValue {
    pub session_id: String,
    pub state: SessionState,
    pub metadata: SessionMetadata,
    pub history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_prompt: Option<Prompt>,
    #[serde(default)]
    pub accumulated_data: BTreeMap<String, Value>,
}

/// Lightweight listing entry exposed by `interaction.list` (additive,
/// §3.3 supplement).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub tool_name: String,
    pub state: SessionState,
    pub created_at: i64,
    pub last_activity_at: i64,
}

impl From<&SessionValue> for SessionSummary {
    fn from(v: &SessionValue) -> Self {
        Self {
            session_id: v.session_id.clone(),
            tool_name: v.metadata.tool_name.clone(),
            state: v.state,
            created_at: v.metadata.created_at,
            last_activity_at: v.metadata.last_activity_at,
        }
    }
}
