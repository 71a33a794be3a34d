use crate::errors::ToolError;
use crate::utils::suggest::suggest;
use serde_json::Value;

pub fn unknown_action_error(
    tool: &str,
    action: Option<&Value>,
    known_actions: &[&str],
) -> ToolError {
    let action_value = action
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let known: Vec<String> = known_actions.iter().map(|s| s.to_string()).collect();
    let suggestions = if action_value.is_empty() {
        Vec::new()
    } else {
        suggest(&action_value, &known, 3)
    };

    let mut hint_parts = Vec::new();
    if !suggestions.is_empty() {
        hint_parts.push(format!("Did you mean: {}?", suggestions.join(", ")));
    }
    if !known.is_empty() {
        hint_parts.push(format!("Use one of: {}.", known.join(", ")));
    }

    let mut err = ToolError::invalid_params(format!("Unknown {} action: {}", tool, action_value));
    if !hint_parts.is_empty() {
        err = err.with_hint(hint_parts.join(" "));
    }
    if !known.is_empty() {
        err = err.with_details(serde_json::json!({
            "known_actions": known,
            "did_you_mean": suggestions,
        }));
    }
    err
}
