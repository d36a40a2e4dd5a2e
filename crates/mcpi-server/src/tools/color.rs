use async_trait::async_trait;
use mcpi_engine::{ExecutionContext, Result, ToolHandler};
use mcpi_protocol::{ChoiceFields, ChoiceOption, Prompt, PromptFields, Validation};
use serde_json::Value;

/// Scenario 3 (choice rejection): prompts for one of `red`/`blue`/`green`.
pub struct ColorPick;

#[async_trait]
impl ToolHandler for ColorPick {
    async fn call(&self, ctx: ExecutionContext) -> Result<Value> {
        let prompt = Prompt::Choice(ChoiceFields {
            base: PromptFields {
                message: "Pick a color".into(),
                validation: Some(Validation { required: true, ..Default::default() }),
                ..Default::default()
            },
            choices: vec![
                ChoiceOption { value: "red".into(), label: "Red".into() },
                ChoiceOption { value: "blue".into(), label: "Blue".into() },
                ChoiceOption { value: "green".into(), label: "Green".into() },
            ],
        });
        let response = ctx.prompt(prompt).await?;
        let color = response.value.as_str().unwrap_or_default();
        Ok(serde_json::json!({ "selectedColor": color }))
    }
}
