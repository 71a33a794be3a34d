use crate::errors::ToolError;
use serde_json::Value;

/// Argument extraction helpers shared by the managers. Every failure is an
/// InvalidParams ToolError naming the offending field.
#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(&self, value: &Value, label: &str) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(trimmed.to_string())
    }

    pub fn required_string(&self, args: &Value, key: &str) -> Result<String, ToolError> {
        match args.get(key) {
            Some(value) if !value.is_null() => self.ensure_string(value, key),
            _ => Err(ToolError::invalid_params(format!("No {} provided", key))),
        }
    }

    pub fn optional_string(&self, args: &Value, key: &str) -> Result<Option<String>, ToolError> {
        match args.get(key) {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(None),
            Some(value) => self.ensure_string(value, key).map(Some),
        }
    }

    /// String list argument; a lone string is accepted as a one-element list.
    pub fn optional_string_list(
        &self,
        args: &Value,
        key: &str,
    ) -> Result<Option<Vec<String>>, ToolError> {
        match args.get(key) {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(None),
            Some(Value::String(text)) => Ok(Some(vec![text.clone()])),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.ensure_string(item, key)?);
                }
                Ok(Some(out))
            }
            Some(_) => Err(ToolError::invalid_params(format!(
                "{} must be an array of strings",
                key
            ))),
        }
    }

    pub fn required_string_list(&self, args: &Value, key: &str) -> Result<Vec<String>, ToolError> {
        match self.optional_string_list(args, key)? {
            Some(list) if !list.is_empty() => Ok(list),
            _ => Err(ToolError::invalid_params(format!("No {} provided", key))),
        }
    }

    pub fn optional_u64(&self, args: &Value, key: &str) -> Result<Option<u64>, ToolError> {
        match args.get(key) {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(None),
            Some(value) => value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
                .map(Some)
                .ok_or_else(|| {
                    ToolError::invalid_params(format!("{} must be a non-negative integer", key))
                }),
        }
    }

    pub fn optional_bool(&self, args: &Value, key: &str) -> Result<Option<bool>, ToolError> {
        match args.get(key) {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(_) => Err(ToolError::invalid_params(format!(
                "{} must be a boolean",
                key
            ))),
        }
    }

    /// Status argument constrained to a fixed set of lifecycle values.
    pub fn ensure_status(
        &self,
        args: &Value,
        key: &str,
        allowed: &[&str],
    ) -> Result<String, ToolError> {
        let status = self.required_string(args, key)?;
        if allowed.contains(&status.as_str()) {
            return Ok(status);
        }
        Err(ToolError::invalid_params(format!(
            "Invalid status '{}'. Must be one of: {}",
            status,
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::statuses;
    use serde_json::json;

    #[test]
    fn required_string_rejects_blank_values() {
        let validation = Validation::new();
        let err = validation
            .required_string(&json!({"name": "   "}), "name")
            .expect_err("must reject");
        assert!(err.message.contains("name"));
    }

    #[test]
    fn optional_string_list_accepts_single_string() {
        let validation = Validation::new();
        let list = validation
            .optional_string_list(&json!({"fields": "impressions"}), "fields")
            .expect("must parse")
            .expect("must be present");
        assert_eq!(list, vec!["impressions".to_string()]);
    }

    #[test]
    fn ensure_status_rejects_unknown_value() {
        let validation = Validation::new();
        let err = validation
            .ensure_status(&json!({"status": "RUNNING"}), "status", statuses::LIFECYCLE)
            .expect_err("must reject");
        assert!(err.message.contains("RUNNING"));
    }

    #[test]
    fn optional_u64_parses_numeric_strings() {
        let validation = Validation::new();
        let value = validation
            .optional_u64(&json!({"limit": "50"}), "limit")
            .expect("must parse");
        assert_eq!(value, Some(50));
    }
}
