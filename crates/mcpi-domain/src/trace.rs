use serde::Serialize;

/// Structured trace events emitted across the interaction-engine crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        tool_name: String,
        timeout_ms: u64,
    },
    SessionStateChanged {
        session_id: String,
        from: String,
        to: String,
    },
    TurnRecorded {
        session_id: String,
        turn_id: usize,
        has_prompt: bool,
        has_response: bool,
    },
    SessionCompleted {
        session_id: String,
    },
    SessionCancelled {
        session_id: String,
        reason: Option<String>,
    },
    SessionErrored {
        session_id: String,
        message: String,
    },
    SessionExpired {
        session_id: String,
    },
    SessionDestroyed {
        session_id: String,
    },
    WaiterRegistered {
        session_id: String,
    },
    WaiterDelivered {
        session_id: String,
    },
    WaiterCancelled {
        session_id: String,
    },
    ToolRegistered {
        tool_name: String,
    },
    ToolHandlerErrored {
        session_id: String,
        tool_name: String,
        message: String,
    },
    ValidationFailed {
        session_id: String,
        prompt_type: String,
        error: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "mcpi_event");
    }
}
