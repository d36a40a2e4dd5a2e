//! `InteractionEngine`: the facade the dispatcher drives. Ties the tool
//! registry, the session manager, the waiter table, and per-session cancel
//! tokens together, and owns the `JoinHandle` of every spawned handler task.

use std::collections::HashMap;
use std::sync::Arc;

use mcpi_domain::TraceEvent;
use mcpi_protocol::{Response, SessionState, SessionSummary, SessionValue};
use mcpi_sessions::SessionManager;
use parking_lot::Mutex;
use serde_json::Value;

use crate::cancel::CancelTable;
use crate::context::{ExecutionContext, PromptHook, ProgressHook};
use crate::error::{EngineError, Result};
use crate::registry::ToolRegistry;
use crate::waiter::{WaiterMessage, WaiterTable};

/// Outcome of `interaction.respond`: validation failures are not engine
/// errors — they are part of the success envelope.
pub enum RespondOutcome {
    Accepted(SessionValue),
    Rejected { error: String, suggestion: Option<Value> },
}

pub struct InteractionEngine {
    registry: Arc<ToolRegistry>,
    manager: Arc<SessionManager>,
    waiters: Arc<WaiterTable>,
    cancels: Arc<CancelTable>,
    handlers: Arc<Mutex<HashMap<String, tokio::task::JoinHandle<()>>>>,
    progress_hook: Option<ProgressHook>,
    prompt_hook: Option<PromptHook>,
}

impl InteractionEngine {
    pub fn new(registry: Arc<ToolRegistry>, manager: Arc<SessionManager>) -> Arc<Self> {
        Self::with_hooks(registry, manager, None, None)
    }

    pub fn with_progress_hook(registry: Arc<ToolRegistry>, manager: Arc<SessionManager>, hook: ProgressHook) -> Arc<Self> {
        Self::with_hooks(registry, manager, Some(hook), None)
    }

    /// Wires both optional notification hooks a push-first transport needs:
    /// `prompt_hook` fires on every new suspend (`interaction.prompt`),
    /// `progress_hook` fires on every `update_progress` call
    /// (`interaction.continue`).
    pub fn with_hooks(
        registry: Arc<ToolRegistry>,
        manager: Arc<SessionManager>,
        progress_hook: Option<ProgressHook>,
        prompt_hook: Option<PromptHook>,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            registry,
            manager,
            waiters: Arc::new(WaiterTable::new()),
            cancels: Arc::new(CancelTable::new()),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            progress_hook,
            prompt_hook,
        });
        engine.manager.install_expiration_hook();
        engine.install_expiration_waiter_wakeup();
        engine
    }

    /// On TTL expiration, wake any pending waiter and flip the session's
    /// cancel token so an in-flight handler observes it cooperatively.
    fn install_expiration_waiter_wakeup(self: &Arc<Self>) {
        let waiters = Arc::clone(&self.waiters);
        let cancels = Arc::clone(&self.cancels);
        self.manager.storage().on_expired(Arc::new(move |id: &str| {
            cancels.cancel(id);
            waiters.fulfill(id, WaiterMessage::Cancelled);
        }));
    }

    // ── interaction.start ────────────────────────────────────────────

    pub async fn start(
        &self,
        tool_name: &str,
        initial_params: Value,
        caller_context: Option<Value>,
        timeout_ms: Option<u64>,
    ) -> Result<(String, SessionState)> {
        let tool = self
            .registry
            .lookup(tool_name)
            .ok_or_else(|| EngineError::NoSuchTool(tool_name.to_string()))?;

        let (session_id, state) = self
            .manager
            .create_session(tool_name, caller_context.clone(), timeout_ms)
            .await?;

        self.manager.update_state(&session_id, SessionState::Active).await?;

        let cancel_token = self.cancels.register(&session_id);
        let ctx = ExecutionContext::new(
            session_id.clone(),
            initial_params,
            caller_context,
            Arc::clone(&self.manager),
            Arc::clone(&self.waiters),
            cancel_token,
            self.progress_hook.clone(),
            self.prompt_hook.clone(),
        );

        let manager = Arc::clone(&self.manager);
        let handlers = Arc::clone(&self.handlers);
        let tool_name_owned = tool_name.to_string();
        let session_id_for_task = session_id.clone();
        let join = tokio::spawn(async move {
            let session_id = session_id_for_task;
            match tool.handler.call(ctx).await {
                Ok(result) => {
                    if let Err(e) = manager.complete_session(&session_id, result).await {
                        tracing::warn!(session_id = %session_id, error = %e, "failed to mark session completed");
                    }
                }
                Err(EngineError::Cancelled(_)) => {
                    // The session has already moved to Cancelled/Error via
                    // the path that set the cancel token; nothing further
                    // to record here.
                }
                Err(e) => {
                    TraceEvent::ToolHandlerErrored {
                        session_id: session_id.clone(),
                        tool_name: tool_name_owned,
                        message: e.to_string(),
                    }
                    .emit();
                    if let Err(e2) = manager.error_session(&session_id, e.to_string()).await {
                        tracing::warn!(session_id = %session_id, error = %e2, "failed to mark session errored");
                    }
                }
            }
            handlers.lock().remove(&session_id);
        });

        self.handlers.lock().insert(session_id.clone(), join);
        Ok((session_id, state))
    }

    // ── interaction.respond ──────────────────────────────────────────

    pub async fn respond(&self, session_id: &str, response: Response) -> Result<RespondOutcome> {
        let session = self.manager.get_session(session_id).await?;
        let Some(current_prompt) = session.current_prompt.clone() else {
            return Err(EngineError::Session(mcpi_sessions::SessionError::InvalidTransition(
                format!("session {session_id} has no active prompt"),
            )));
        };

        match mcpi_validator::validate(&response, &current_prompt) {
            mcpi_validator::ValidationOutcome::Invalid { error, suggestion } => {
                mcpi_domain::TraceEvent::ValidationFailed {
                    session_id: session_id.to_string(),
                    prompt_type: current_prompt.type_name().to_string(),
                    error: error.clone(),
                }
                .emit();
                Ok(RespondOutcome::Rejected { error, suggestion })
            }
            mcpi_validator::ValidationOutcome::Valid => {
                let normalized = mcpi_validator::normalize(response.value.clone(), &current_prompt);
                let mut normalized_response = response;
                normalized_response.value = normalized;

                let session = self
                    .manager
                    .respond_to_prompt(session_id, normalized_response.clone(), SessionState::Processing)
                    .await?;

                if !self
                    .waiters
                    .fulfill(session_id, WaiterMessage::Responded(normalized_response))
                {
                    return Err(EngineError::Session(mcpi_sessions::SessionError::NoActivePrompt(
                        session_id.to_string(),
                    )));
                }

                Ok(RespondOutcome::Accepted(session))
            }
        }
    }

    // ── interaction.cancel ───────────────────────────────────────────

    pub async fn cancel(&self, session_id: &str, reason: Option<String>) -> Result<SessionValue> {
        let value = self.manager.cancel_session(session_id, reason).await?;
        self.cancels.cancel(session_id);
        self.waiters.fulfill(session_id, WaiterMessage::Cancelled);
        self.handlers.lock().remove(session_id);
        Ok(value)
    }

    // ── interaction.getState / interaction.list ─────────────────────

    pub async fn get_state(&self, session_id: &str) -> Result<SessionValue> {
        Ok(self.manager.get_session(session_id).await?)
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.manager.list_sessions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcpi_protocol::{Prompt, PromptFields, Validation};
    use mcpi_sessions::InMemoryStorage;

    struct Greet;

    #[async_trait]
    impl crate::registry::ToolHandler for Greet {
        async fn call(&self, ctx: ExecutionContext) -> Result<Value> {
            let prompt = Prompt::Text(PromptFields {
                message: "What is your name?".into(),
                validation: Some(Validation { required: true, ..Default::default() }),
                ..Default::default()
            });
            let response = ctx.prompt(prompt).await?;
            let name = response.value.as_str().unwrap_or_default();
            Ok(serde_json::json!({ "greeting": format!("Hello, {name}!") }))
        }
    }

    fn build_engine() -> Arc<InteractionEngine> {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(crate::registry::Tool {
                name: "greet".into(),
                description: "greets the caller".into(),
                handler: Arc::new(Greet),
            })
            .unwrap();
        let storage = InMemoryStorage::new(100);
        let manager = SessionManager::new(storage, 100, 300_000);
        InteractionEngine::new(registry, manager)
    }

    #[tokio::test]
    async fn simple_greet_end_to_end() {
        let engine = build_engine();
        let (session_id, state) = engine.start("greet", Value::Null, None, None).await.unwrap();
        assert_eq!(state, SessionState::Idle);

        // Give the spawned handler task a chance to reach its first prompt.
        for _ in 0..50 {
            let s = engine.get_state(&session_id).await.unwrap();
            if s.state == SessionState::WaitingUser {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let s = engine.get_state(&session_id).await.unwrap();
        assert_eq!(s.state, SessionState::WaitingUser);
        assert_eq!(s.current_prompt.unwrap().type_name(), "text");

        let outcome = engine
            .respond(&session_id, Response::new(Value::String("Alice".into()), 0))
            .await
            .unwrap();
        assert!(matches!(outcome, RespondOutcome::Accepted(_)));

        for _ in 0..50 {
            let s = engine.get_state(&session_id).await.unwrap();
            if s.state == SessionState::Completed {
                assert_eq!(s.accumulated_data.get("result").unwrap()["greeting"], "Hello, Alice!");
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("session never completed");
    }

    struct TwoQuestions;

    #[async_trait]
    impl crate::registry::ToolHandler for TwoQuestions {
        async fn call(&self, ctx: ExecutionContext) -> Result<Value> {
            let first = Prompt::Text(PromptFields {
                message: "What is your name?".into(),
                validation: Some(Validation { required: true, ..Default::default() }),
                ..Default::default()
            });
            let name = ctx.prompt(first).await?;

            let second = Prompt::Number(PromptFields {
                message: "What is your age?".into(),
                validation: Some(Validation { required: true, ..Default::default() }),
                ..Default::default()
            });
            let age = ctx.prompt(second).await?;

            Ok(serde_json::json!({
                "name": name.value,
                "age": age.value,
            }))
        }
    }

    /// A handler that prompts a second time after the first `respond` must
    /// resume from `Processing` through `Active` to reach `WaitingUser`
    /// again, rather than attempting the illegal `Processing -> WaitingUser`
    /// edge directly.
    #[tokio::test]
    async fn multi_turn_tool_completes_after_two_prompts() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(crate::registry::Tool {
                name: "two_questions".into(),
                description: "asks two questions".into(),
                handler: Arc::new(TwoQuestions),
            })
            .unwrap();
        let storage = InMemoryStorage::new(100);
        let manager = SessionManager::new(storage, 100, 300_000);
        let engine = InteractionEngine::new(registry, manager);

        let (session_id, _) = engine.start("two_questions", Value::Null, None, None).await.unwrap();

        for _ in 0..50 {
            let s = engine.get_state(&session_id).await.unwrap();
            if s.state == SessionState::WaitingUser {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let outcome = engine
            .respond(&session_id, Response::new(Value::String("Alice".into()), 0))
            .await
            .unwrap();
        assert!(matches!(outcome, RespondOutcome::Accepted(_)));

        for _ in 0..50 {
            let s = engine.get_state(&session_id).await.unwrap();
            if s.state == SessionState::WaitingUser {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let s = engine.get_state(&session_id).await.unwrap();
        assert_eq!(s.state, SessionState::WaitingUser);
        assert_eq!(s.current_prompt.unwrap().type_name(), "number");

        let outcome = engine
            .respond(&session_id, Response::new(Value::from(30), 0))
            .await
            .unwrap();
        assert!(matches!(outcome, RespondOutcome::Accepted(_)));

        for _ in 0..50 {
            let s = engine.get_state(&session_id).await.unwrap();
            if s.state == SessionState::Completed {
                assert_eq!(s.accumulated_data.get("result").unwrap()["name"], "Alice");
                assert_eq!(s.accumulated_data.get("result").unwrap()["age"], 30.0);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("session never completed");
    }

    #[tokio::test]
    async fn start_with_unknown_tool_fails() {
        let engine = build_engine();
        let err = engine.start("missing", Value::Null, None, None).await.unwrap_err();
        assert!(matches!(err, EngineError::NoSuchTool(_)));
    }

    #[tokio::test]
    async fn respond_without_active_prompt_is_rejected() {
        let engine = build_engine();
        let registry = Arc::new(ToolRegistry::new());
        let storage = InMemoryStorage::new(100);
        let manager = SessionManager::new(storage, 100, 300_000);
        let (id, _) = manager.create_session("greet", None, None).await.unwrap();
        let _ = registry; // not used further — manager is standalone here
        let err = engine.respond(&id, Response::new(Value::Null, 0)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn cancel_wakes_a_pending_waiter_as_cancelled() {
        let engine = build_engine();
        let (session_id, _) = engine.start("greet", Value::Null, None, None).await.unwrap();

        for _ in 0..50 {
            let s = engine.get_state(&session_id).await.unwrap();
            if s.state == SessionState::WaitingUser {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        engine.cancel(&session_id, Some("user cancelled".into())).await.unwrap();
        let s = engine.get_state(&session_id).await.unwrap();
        assert_eq!(s.state, SessionState::Cancelled);

        let err = engine.cancel(&session_id, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Session(mcpi_sessions::SessionError::AlreadyTerminal(_))));
    }

    #[tokio::test]
    async fn session_expires_and_reports_not_found() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(crate::registry::Tool {
                name: "greet".into(),
                description: "greets the caller".into(),
                handler: Arc::new(Greet),
            })
            .unwrap();
        let storage = InMemoryStorage::new(100);
        let manager = SessionManager::new(storage.clone(), 100, 1_500);
        let engine = InteractionEngine::new(registry, manager);

        let (session_id, _) = engine.start("greet", Value::Null, None, Some(1_500)).await.unwrap();

        for _ in 0..50 {
            let s = engine.get_state(&session_id).await.unwrap();
            if s.state == SessionState::WaitingUser {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        // Past the 1.5s timeout with no response: the next sweep evicts it.
        tokio::time::sleep(std::time::Duration::from_millis(1_700)).await;
        storage.sweep_expired();

        let err = engine.get_state(&session_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Session(mcpi_sessions::SessionError::NotFound(_))));

        // Already gone: a second sweep cannot fire the hook again for it.
        storage.sweep_expired();
        let err = engine.get_state(&session_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Session(mcpi_sessions::SessionError::NotFound(_))));
    }
}
