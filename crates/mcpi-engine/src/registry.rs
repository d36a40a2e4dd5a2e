//! The tool registry: `register`/`unregister`/`lookup` over the handlers
//! that `interaction.start` can spawn.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcpi_domain::TraceEvent;
use parking_lot::RwLock;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};

/// A tool handler: given an [`ExecutionContext`], produces a final JSON
/// value or fails. Implemented by whatever the hosting binary registers
/// (see `mcpi-server`'s reference tools for examples).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: ExecutionContext) -> Result<Value>;
}

/// A registered tool: its name, human-readable description, and handler.
pub struct Tool {
    pub name: String,
    pub description: String,
    pub handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Tool) -> Result<()> {
        let mut tools = self.tools.write();
        if tools.contains_key(&tool.name) {
            return Err(EngineError::AlreadyRegistered(tool.name));
        }
        let name = tool.name.clone();
        tools.insert(name.clone(), Arc::new(tool));
        TraceEvent::ToolRegistered { tool_name: name }.emit();
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.tools.write().remove(name).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, ctx: ExecutionContext) -> Result<Value> {
            Ok(ctx.initial_params.clone())
        }
    }

    fn echo_tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: "echoes its params".into(),
            handler: Arc::new(Echo),
        }
    }

    #[test]
    fn register_then_lookup_finds_the_tool() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        assert!(registry.lookup("echo").is_some());
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        let err = registry.register(echo_tool("echo")).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRegistered(_)));
    }

    #[test]
    fn unregister_removes_the_tool() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        assert!(registry.unregister("echo"));
        assert!(registry.lookup("echo").is_none());
        assert!(!registry.unregister("echo"));
    }

    #[tokio::test]
    async fn registered_handler_is_callable() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        let tool = registry.lookup("echo").unwrap();

        let storage = mcpi_sessions::InMemoryStorage::new(10);
        let manager = mcpi_sessions::SessionManager::new(storage, 10, 300_000);
        let (id, _) = manager.create_session("echo", None, None).await.unwrap();
        let ctx = ExecutionContext::new(
            id,
            serde_json::json!({"hello": "world"}),
            None,
            manager,
            Arc::new(crate::waiter::WaiterTable::new()),
            crate::cancel::CancelToken::new(),
            None,
            None,
        );
        let result = tool.handler.call(ctx).await.unwrap();
        assert_eq!(result, serde_json::json!({"hello": "world"}));
    }
}
