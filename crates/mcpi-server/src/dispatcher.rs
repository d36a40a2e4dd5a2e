//! The JSON-RPC dispatcher: single entry point `handle(request) -> response`
//! over the full interactive-session method table.
//!
//! A plain `match req.method.as_str() { ... }` over an explicit method list,
//! not a macro-registered router, so every method's error path is explicit
//! and unit-testable without a running transport.

use std::sync::Arc;

use mcpi_engine::InteractionEngine;
use mcpi_protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcError, INVALID_PARAMS,
    METHOD_NOT_FOUND,
};
use serde::Deserialize;
use serde_json::Value;

pub struct RpcDispatcher {
    engine: Arc<InteractionEngine>,
    server_name: String,
    server_version: String,
    /// HMAC key backing the optional stateless-session token export
    /// (`interaction.exportToken`). Empty disables signing, matching
    /// `mcpi_stateless`'s own empty-secret convention.
    token_secret: Vec<u8>,
}

fn invalid_params(method: &str, err: impl std::fmt::Display) -> RpcError {
    RpcError::InvalidParams(format!("{method}: {err}"))
}

fn parse_params<T: for<'de> Deserialize<'de>>(method: &str, params: Option<Value>) -> Result<T, RpcError> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params).map_err(|e| invalid_params(method, e))
}

fn ok(id: u64, value: Value) -> JsonRpcResponse {
    JsonRpcResponse::ok(id, value)
}

fn fail(id: u64, err: RpcError) -> JsonRpcResponse {
    JsonRpcResponse::err(id, JsonRpcError::from(err))
}

impl RpcDispatcher {
    pub fn new(engine: Arc<InteractionEngine>, server_name: impl Into<String>, server_version: impl Into<String>) -> Self {
        Self::with_token_secret(engine, server_name, server_version, Vec::new())
    }

    pub fn with_token_secret(
        engine: Arc<InteractionEngine>,
        server_name: impl Into<String>,
        server_version: impl Into<String>,
        token_secret: Vec<u8>,
    ) -> Self {
        Self {
            engine,
            server_name: server_name.into(),
            server_version: server_version.into(),
            token_secret,
        }
    }

    pub async fn dispatch(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id;
        tracing::debug!(method = %req.method, id, "dispatching request");

        match req.method.as_str() {
            "initialize" | "capabilities" => self.handle_initialize(id),
            "interaction.start" => self.handle_start(id, req.params).await,
            "interaction.respond" => self.handle_respond(id, req.params).await,
            "interaction.cancel" => self.handle_cancel(id, req.params).await,
            "interaction.getState" => self.handle_get_state(id, req.params).await,
            "interaction.list" => self.handle_list(id).await,
            "interaction.exportToken" => self.handle_export_token(id, req.params).await,
            other => fail(
                id,
                RpcError::MethodNotFound(format!("unknown method {other:?}")),
            ),
        }
    }

    fn handle_initialize(&self, id: u64) -> JsonRpcResponse {
        let result = InitializeResult::new(self.server_name.clone(), self.server_version.clone());
        ok(id, serde_json::to_value(result).unwrap_or(Value::Null))
    }

    async fn handle_start(&self, id: u64, params: Option<Value>) -> JsonRpcResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            tool_name: String,
            #[serde(default)]
            initial_params: Value,
            #[serde(default)]
            context: Option<Value>,
            #[serde(default)]
            timeout: Option<u64>,
        }

        let p: Params = match parse_params("interaction.start", params) {
            Ok(p) => p,
            Err(e) => return fail(id, e),
        };

        match self
            .engine
            .start(&p.tool_name, p.initial_params, p.context, p.timeout)
            .await
        {
            Ok((session_id, state)) => ok(
                id,
                serde_json::json!({ "sessionId": session_id, "state": state }),
            ),
            Err(e) => fail(id, e.into()),
        }
    }

    async fn handle_respond(&self, id: u64, params: Option<Value>) -> JsonRpcResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            session_id: String,
            response: mcpi_protocol::Response,
        }

        let p: Params = match parse_params("interaction.respond", params) {
            Ok(p) => p,
            Err(e) => return fail(id, e),
        };

        match self.engine.respond(&p.session_id, p.response).await {
            Ok(mcpi_engine::RespondOutcome::Accepted(_)) => ok(
                id,
                serde_json::json!({ "accepted": true, "validation": { "valid": true } }),
            ),
            Ok(mcpi_engine::RespondOutcome::Rejected { error, suggestion }) => ok(
                id,
                serde_json::json!({
                    "accepted": false,
                    "validation": { "valid": false, "error": error, "suggestion": suggestion },
                }),
            ),
            Err(e) => fail(id, e.into()),
        }
    }

    async fn handle_cancel(&self, id: u64, params: Option<Value>) -> JsonRpcResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            session_id: String,
            #[serde(default)]
            reason: Option<String>,
        }

        let p: Params = match parse_params("interaction.cancel", params) {
            Ok(p) => p,
            Err(e) => return fail(id, e),
        };

        match self.engine.cancel(&p.session_id, p.reason).await {
            Ok(_) => ok(id, serde_json::json!({ "cancelled": true })),
            Err(e) => fail(id, e.into()),
        }
    }

    async fn handle_get_state(&self, id: u64, params: Option<Value>) -> JsonRpcResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            session_id: String,
        }

        let p: Params = match parse_params("interaction.getState", params) {
            Ok(p) => p,
            Err(e) => return fail(id, e),
        };

        match self.engine.get_state(&p.session_id).await {
            Ok(value) => ok(id, serde_json::to_value(value).unwrap_or(Value::Null)),
            Err(e) => fail(id, e.into()),
        }
    }

    /// Lists active sessions. Supplemental to the core five methods.
    async fn handle_list(&self, id: u64) -> JsonRpcResponse {
        let summaries = self.engine.list_sessions().await;
        ok(id, serde_json::to_value(summaries).unwrap_or(Value::Null))
    }

    /// Exports the current session state as a portable, signed stateless
    /// token. Supplemental to the core method set; a deployment that never
    /// configures a secret gets an unsigned (but still well-formed) token
    /// back.
    async fn handle_export_token(&self, id: u64, params: Option<Value>) -> JsonRpcResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            session_id: String,
        }

        let p: Params = match parse_params("interaction.exportToken", params) {
            Ok(p) => p,
            Err(e) => return fail(id, e),
        };

        let session = match self.engine.get_state(&p.session_id).await {
            Ok(s) => s,
            Err(e) => return fail(id, e.into()),
        };

        match mcpi_stateless::StatelessToken::sign(&session, &self.token_secret) {
            Ok(token) => ok(id, serde_json::json!({ "token": token.to_compact() })),
            Err(e) => fail(id, RpcError::Internal(format!("failed to sign token: {e}"))),
        }
    }
}

// Silence an unused-import warning when `INVALID_PARAMS`/`METHOD_NOT_FOUND`
// aren't referenced directly (they're exercised via `RpcError::code()`).
#[allow(dead_code)]
const _ASSERT_CODES_IN_SCOPE: (i64, i64) = (INVALID_PARAMS, METHOD_NOT_FOUND);
