use async_trait::async_trait;
use mcpi_engine::{ExecutionContext, Result, ToolHandler};
use mcpi_protocol::{Prompt, PromptFields, Validation};
use serde_json::Value;

/// Scenario 1 (simple greet): prompts for a name, returns a greeting.
pub struct Greet;

#[async_trait]
impl ToolHandler for Greet {
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
