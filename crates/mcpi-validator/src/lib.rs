//! Validates and normalizes a caller-supplied `Response` against the
//! `Prompt` it answers.

use chrono::DateTime;
use mcpi_protocol::{Prompt, Response};
use serde_json::Value;

/// Upper bound on the serialized size of a single response, enforced before
/// any type-specific rule runs.
pub const MAX_RESPONSE_BYTES: usize = 100 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    Invalid {
        error: String,
        suggestion: Option<Value>,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    fn invalid(error: impl Into<String>) -> Self {
        ValidationOutcome::Invalid {
            error: error.into(),
            suggestion: None,
        }
    }

    fn invalid_with_suggestion(error: impl Into<String>, suggestion: Value) -> Self {
        ValidationOutcome::Invalid {
            error: error.into(),
            suggestion: Some(suggestion),
        }
    }
}

/// Validates `response` against `prompt`. Does not mutate either; callers
/// apply [`normalize`] separately once a response is accepted.
pub fn validate(response: &Response, prompt: &Prompt) -> ValidationOutcome {
    let size = match serde_json::to_vec(&response.value) {
        Ok(bytes) => bytes.len(),
        Err(e) => return ValidationOutcome::invalid(format!("response is not serializable: {e}")),
    };
    if size > MAX_RESPONSE_BYTES {
        return ValidationOutcome::invalid(format!(
            "response exceeds maximum size of {MAX_RESPONSE_BYTES} bytes"
        ));
    }

    let fields = prompt.fields();
    let validation = fields.validation.clone().unwrap_or_default();

    if validation.required && is_empty(&response.value) {
        return ValidationOutcome::invalid("this field is required");
    }

    // An empty, non-required value short-circuits type-specific checks —
    // there is nothing further to validate.
    if !validation.required && is_empty(&response.value) {
        return ValidationOutcome::Valid;
    }

    match prompt {
        Prompt::Text(_) => validate_text(&response.value, &validation),
        Prompt::Number(_) => validate_number(&response.value, &validation),
        Prompt::Choice(choice_fields) => validate_choice(&response.value, &choice_fields.choices),
        Prompt::Confirm(_) => validate_confirm(&response.value),
        Prompt::Date(_) => validate_date(&response.value),
        Prompt::Custom(_) | Prompt::File(_) => ValidationOutcome::Valid,
    }
}

/// Applied after a response passes [`validate`]: canonicalizes the value to
/// the type's natural representation. Idempotent: `normalize(normalize(v))
/// == normalize(v)`.
pub fn normalize(value: Value, prompt: &Prompt) -> Value {
    match prompt {
        Prompt::Number(_) => normalize_number(&value).map(Value::from).unwrap_or(value),
        Prompt::Confirm(_) => normalize_confirm(&value).map(Value::Bool).unwrap_or(value),
        Prompt::Date(_) => normalize_date(&value)
            .map(|ms| Value::from(ms))
            .unwrap_or(value),
        _ => value,
    }
}

fn is_empty(value: &Value) -> bool {
    matches!(value, Value::Null) || matches!(value, Value::String(s) if s.is_empty())
}

fn validate_text(value: &Value, validation: &mcpi_protocol::Validation) -> ValidationOutcome {
    let Value::String(s) = value else {
        return ValidationOutcome::invalid("expected a string value");
    };
    if let Some(pattern) = &validation.pattern {
        match regex::Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(s) {
                    return ValidationOutcome::invalid(format!("value does not match pattern {pattern}"));
                }
            }
            Err(_) => return ValidationOutcome::invalid("bad pattern configuration"),
        }
    }
    let len = s.chars().count() as f64;
    if let Some(min) = validation.min {
        if len < min {
            return ValidationOutcome::invalid(format!("Minimum length is {}", min as i64));
        }
    }
    if let Some(max) = validation.max {
        if len > max {
            return ValidationOutcome::invalid(format!("Maximum length is {}", max as i64));
        }
    }
    ValidationOutcome::Valid
}

fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn validate_number(value: &Value, validation: &mcpi_protocol::Validation) -> ValidationOutcome {
    let Some(n) = parse_numeric(value) else {
        return ValidationOutcome::invalid("expected a numeric value");
    };
    if !n.is_finite() {
        return ValidationOutcome::invalid("value must be finite");
    }
    if let Some(min) = validation.min {
        if n < min {
            return ValidationOutcome::invalid(format!("Minimum value is {min}"));
        }
    }
    if let Some(max) = validation.max {
        if n > max {
            return ValidationOutcome::invalid(format!("Maximum value is {max}"));
        }
    }
    ValidationOutcome::Valid
}

fn normalize_number(value: &Value) -> Option<f64> {
    parse_numeric(value)
}

fn validate_choice(value: &Value, choices: &[mcpi_protocol::ChoiceOption]) -> ValidationOutcome {
    let as_str = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if choices.iter().any(|c| c.value == as_str) {
        ValidationOutcome::Valid
    } else {
        let suggestion = Value::Array(
            choices
                .iter()
                .map(|c| Value::String(c.value.clone()))
                .collect(),
        );
        ValidationOutcome::invalid_with_suggestion(
            format!("\"{as_str}\" is not a valid choice"),
            suggestion,
        )
    }
}

const CONFIRM_TRUE_TOKENS: &[&str] = &["true", "yes", "y"];
const CONFIRM_FALSE_TOKENS: &[&str] = &["false", "no", "n"];

fn normalize_confirm(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let lower = s.to_lowercase();
            if CONFIRM_TRUE_TOKENS.contains(&lower.as_str()) {
                Some(true)
            } else if CONFIRM_FALSE_TOKENS.contains(&lower.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn validate_confirm(value: &Value) -> ValidationOutcome {
    if normalize_confirm(value).is_some() {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::invalid("expected true/false or yes/no/y/n")
    }
}

fn normalize_date(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .ok(),
        _ => None,
    }
}

fn validate_date(value: &Value) -> ValidationOutcome {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                ValidationOutcome::Valid
            } else {
                ValidationOutcome::invalid("date value is not a finite epoch-millis integer")
            }
        }
        Value::String(s) => {
            if DateTime::parse_from_rfc3339(s).is_ok() {
                ValidationOutcome::Valid
            } else {
                ValidationOutcome::invalid("expected an ISO-8601 date string or epoch millis")
            }
        }
        _ => ValidationOutcome::invalid("expected an ISO-8601 date string or epoch millis"),
    }
}
