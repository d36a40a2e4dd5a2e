//! `ExecutionContext`: the per-session object a tool handler is given. It
//! is the only way a handler can suspend (`prompt`), touch session-scoped
//! state (`set_data`/`get_data`), or report progress.

use std::sync::Arc;

use mcpi_protocol::{Prompt, Response};
use mcpi_sessions::SessionManager;
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::error::{EngineError, Result};
use crate::waiter::{WaiterMessage, WaiterTable};

/// Advisory progress update a handler may report via
/// [`ExecutionContext::update_progress`]. The core does not require a
/// transport to forward this; a transport MAY surface it as an
/// `interaction.continue` notification (§4.6).
#[derive(Debug, Clone)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub message: Option<String>,
}

pub type ProgressHook = Arc<dyn Fn(&str, Progress) + Send + Sync>;

/// Fired the moment a handler suspends on a new prompt, i.e. right after
/// the session lands in `WaitingUser`. A push-first transport (§9) uses
/// this to emit an `interaction.prompt` notification instead of making the
/// caller poll `interaction.getState`.
pub type PromptHook = Arc<dyn Fn(&str, &Prompt) + Send + Sync>;

pub struct ExecutionContext {
    pub session_id: String,
    pub initial_params: Value,
    pub caller_context: Option<Value>,

    manager: Arc<SessionManager>,
    waiters: Arc<WaiterTable>,
    cancel_token: CancelToken,
    progress_hook: Option<ProgressHook>,
    prompt_hook: Option<PromptHook>,
}

impl ExecutionContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        initial_params: Value,
        caller_context: Option<Value>,
        manager: Arc<SessionManager>,
        waiters: Arc<WaiterTable>,
        cancel_token: CancelToken,
        progress_hook: Option<ProgressHook>,
        prompt_hook: Option<PromptHook>,
    ) -> Self {
        Self {
            session_id,
            initial_params,
            caller_context,
            manager,
            waiters,
            cancel_token,
            progress_hook,
            prompt_hook,
        }
    }

    /// Suspends the handler until a matching `interaction.respond` arrives
    /// (or the session is cancelled/expired). This is the engine's only
    /// suspension point.
    pub async fn prompt(&self, prompt: Prompt) -> Result<Response> {
        if self.cancel_token.is_cancelled() {
            return Err(EngineError::Cancelled(self.session_id.clone()));
        }

        // A second (or later) prompt call resumes from `Processing`, where
        // `respond` left the session after delivering the prior answer.
        // `Processing -> WaitingUser` is not a legal edge (state_machine.rs);
        // the table only allows `WaitingUser` from `Active`, so this handler
        // must take the `Resume` edge back to `Active` first.
        let current = self.manager.get_session(&self.session_id).await?;
        if current.state == mcpi_protocol::SessionState::Processing {
            self.manager
                .update_state(&self.session_id, mcpi_protocol::SessionState::Active)
                .await?;
        }

        self.manager.add_turn(&self.session_id, Some(prompt.clone()), None).await?;
        self.manager
            .update_state(&self.session_id, mcpi_protocol::SessionState::WaitingUser)
            .await?;

        if let Some(hook) = &self.prompt_hook {
            hook(&self.session_id, &prompt);
        }

        let rx = self.waiters.register(&self.session_id);

        let msg = rx.await.unwrap_or(WaiterMessage::Cancelled);

        if self.cancel_token.is_cancelled() {
            return Err(EngineError::Cancelled(self.session_id.clone()));
        }

        match msg {
            WaiterMessage::Responded(response) => Ok(response),
            WaiterMessage::Cancelled => Err(EngineError::Cancelled(self.session_id.clone())),
        }
    }

    pub async fn set_data(&self, key: &str, value: Value) -> Result<()> {
        self.manager.set_data(&self.session_id, key, value).await?;
        Ok(())
    }

    pub async fn get_data(&self, key: Option<&str>) -> Result<Value> {
        Ok(self.manager.get_data(&self.session_id, key).await?)
    }

    /// Non-suspending advisory progress report; forwarded to the registered
    /// hook (typically owned by the transport) if one was installed.
    pub fn update_progress(&self, current: u64, total: u64, message: Option<String>) {
        if let Some(hook) = &self.progress_hook {
            hook(&self.session_id, Progress { current, total, message });
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpi_protocol::PromptFields;
    use mcpi_sessions::InMemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn ctx_for(session_id: &str, manager: &Arc<SessionManager>, waiters: &Arc<WaiterTable>) -> ExecutionContext {
        ExecutionContext::new(
            session_id.to_string(),
            Value::Null,
            None,
            Arc::clone(manager),
            Arc::clone(waiters),
            CancelToken::new(),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn prompt_suspends_until_response_arrives() {
        let storage = InMemoryStorage::new(100);
        let manager = SessionManager::new(storage, 100, 300_000);
        let (id, _) = manager.create_session("greet", None, None).await.unwrap();
        manager.update_state(&id, mcpi_protocol::SessionState::Active).await.unwrap();

        let waiters = Arc::new(WaiterTable::new());
        let ctx = ctx_for(&id, &manager, &waiters).await;

        let waiters2 = Arc::clone(&waiters);
        let id2 = id.clone();
        let responder = tokio::spawn(async move {
            // give the prompt call a chance to register its waiter
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            waiters2.fulfill(
                &id2,
                WaiterMessage::Responded(Response::new(Value::String("Alice".into()), 0)),
            );
        });

        let prompt = Prompt::Text(PromptFields { message: "name?".into(), ..Default::default() });
        let response = ctx.prompt(prompt).await.unwrap();
        assert_eq!(response.value, Value::String("Alice".into()));
        responder.await.unwrap();

        let session = manager.get_session(&id).await.unwrap();
        assert_eq!(session.state, mcpi_protocol::SessionState::WaitingUser);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_suspending() {
        let storage = InMemoryStorage::new(100);
        let manager = SessionManager::new(storage, 100, 300_000);
        let (id, _) = manager.create_session("greet", None, None).await.unwrap();
        manager.update_state(&id, mcpi_protocol::SessionState::Active).await.unwrap();

        let waiters = Arc::new(WaiterTable::new());
        let token = CancelToken::new();
        token.cancel();
        let ctx = ExecutionContext::new(id, Value::Null, None, manager, waiters, token, None, None);

        let prompt = Prompt::Text(PromptFields { message: "name?".into(), ..Default::default() });
        let err = ctx.prompt(prompt).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled(_)));
    }

    #[tokio::test]
    async fn progress_hook_receives_updates() {
        let storage = InMemoryStorage::new(100);
        let manager = SessionManager::new(storage, 100, 300_000);
        let (id, _) = manager.create_session("greet", None, None).await.unwrap();
        let waiters = Arc::new(WaiterTable::new());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let hook: ProgressHook = Arc::new(move |_id, _p| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        let ctx = ExecutionContext::new(id, Value::Null, None, manager, waiters, CancelToken::new(), Some(hook), None);
        ctx.update_progress(1, 2, Some("halfway".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
