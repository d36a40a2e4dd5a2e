//! Prompt and response value types exchanged between a suspended tool
//! handler and its caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single selectable option for a `Choice` prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// Validation constraints attached to a prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Validation {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Opaque marker: validation is delegated to the tool handler for
    /// `Custom` and `File` prompt types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

/// The type-tagged question a tool sends to its caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Prompt {
    Text(PromptFields),
    Number(PromptFields),
    Choice(ChoiceFields),
    Confirm(PromptFields),
    Date(PromptFields),
    File(PromptFields),
    Custom(PromptFields),
}

impl Prompt {
    pub fn type_name(&self) -> &'static str {
        match self {
            Prompt::Text(_) => "text",
            Prompt::Number(_) => "number",
            Prompt::Choice(_) => "choice",
            Prompt::Confirm(_) => "confirm",
            Prompt::Date(_) => "date",
            Prompt::File(_) => "file",
            Prompt::Custom(_) => "custom",
        }
    }

    pub fn fields(&self) -> &PromptFields {
        match self {
            Prompt::Text(f) | Prompt::Number(f) | Prompt::Confirm(f) | Prompt::Date(f)
            | Prompt::File(f) | Prompt::Custom(f) => f,
            Prompt::Choice(f) => &f.base,
        }
    }

    pub fn choices(&self) -> Option<&[ChoiceOption]> {
        match self {
            Prompt::Choice(f) => Some(&f.choices),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptFields {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceFields {
    #[serde(flatten)]
    pub base: PromptFields,
    pub choices: Vec<ChoiceOption>,
}

/// A typed answer supplied by the caller to the most recent outstanding
/// prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub value: Value,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Response {
    pub fn new(value: Value, timestamp: i64) -> Self {
        Self {
            value,
            timestamp,
            metadata: None,
        }
    }
}
