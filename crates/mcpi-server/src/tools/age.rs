use async_trait::async_trait;
use mcpi_engine::{ExecutionContext, Result, ToolHandler};
use mcpi_protocol::{Prompt, PromptFields, Validation};
use serde_json::Value;

/// Scenario 2 (validation retry): prompts for an age in `[18, 120]`. The
/// validator rejects out-of-range values before this handler ever resumes,
/// so it only ever observes an already-valid answer.
pub struct AgeCheck;

#[async_trait]
impl ToolHandler for AgeCheck {
    async fn call(&self, ctx: ExecutionContext) -> Result<Value> {
        let prompt = Prompt::Number(PromptFields {
            message: "Enter your age".into(),
            validation: Some(Validation {
                required: true,
                min: Some(18.0),
                max: Some(120.0),
                ..Default::default()
            }),
            ..Default::default()
        });
        let response = ctx.prompt(prompt).await?;
        let age = response.value.as_f64().unwrap_or_default();
        Ok(serde_json::json!({ "message": format!("Age {} verified", age as i64) }))
    }
}
