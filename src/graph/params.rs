use crate::errors::ToolError;
use serde_json::Value;

/// Wire encoding for one request parameter.
///
/// Each endpoint wrapper declares the encoding of every structured parameter
/// it forwards, so a field name never picks up an encoding from an unrelated
/// endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encode {
    /// Forwarded as the value's plain string form.
    Plain,
    /// Array joined into one comma-separated string, order preserved.
    CsvList,
    /// Array or object serialized to JSON text; strings pass through as
    /// pre-serialized JSON.
    JsonBlob,
    /// Boolean rendered as the literal string "true" or "false".
    BoolString,
    /// Number rendered as a plain decimal string.
    NumericString,
}

/// Parameter-name to encoding table owned by one endpoint wrapper.
/// Names absent from the table encode as `Plain`.
pub struct ParamSpec {
    entries: &'static [(&'static str, Encode)],
}

impl ParamSpec {
    pub const fn new(entries: &'static [(&'static str, Encode)]) -> Self {
        Self { entries }
    }

    pub fn kind(&self, key: &str) -> Encode {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| *kind)
            .unwrap_or(Encode::Plain)
    }
}

fn scalar_to_string(key: &str, value: &Value) -> Result<String, ToolError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(num) => Ok(num.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(ToolError::invalid_params(format!(
            "{} must be a scalar value",
            key
        ))),
    }
}

fn encode_value(kind: Encode, key: &str, value: &Value) -> Result<String, ToolError> {
    match kind {
        Encode::Plain => scalar_to_string(key, value),
        Encode::CsvList => match value {
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(scalar_to_string(key, item)?);
                }
                Ok(parts.join(","))
            }
            Value::String(text) => Ok(text.clone()),
            _ => Err(ToolError::invalid_params(format!(
                "{} must be an array or a comma-separated string",
                key
            ))),
        },
        Encode::JsonBlob => match value {
            Value::Array(_) | Value::Object(_) => serde_json::to_string(value)
                .map_err(|err| ToolError::internal(format!("{}: {}", key, err))),
            // Callers may pre-serialize; pass through unchanged.
            Value::String(text) => Ok(text.clone()),
            _ => Err(ToolError::invalid_params(format!(
                "{} must be an object, an array, or a JSON string",
                key
            ))),
        },
        Encode::BoolString => match value {
            Value::Bool(flag) => Ok(if *flag { "true" } else { "false" }.to_string()),
            Value::String(text) => Ok(text.clone()),
            _ => Err(ToolError::invalid_params(format!(
                "{} must be a boolean",
                key
            ))),
        },
        Encode::NumericString => match value {
            Value::Number(num) => Ok(num.to_string()),
            Value::String(text) => Ok(text.clone()),
            _ => Err(ToolError::invalid_params(format!(
                "{} must be a number",
                key
            ))),
        },
    }
}

/// Ordered parameter list under construction for one request. Absent optional
/// values are never added, so the transmitted set contains only keys the
/// caller actually supplied (plus the wrapper's base keys).
pub struct ParamBuilder<'a> {
    spec: &'a ParamSpec,
    pairs: Vec<(String, String)>,
}

impl<'a> ParamBuilder<'a> {
    pub fn new(spec: &'a ParamSpec) -> Self {
        Self {
            spec,
            pairs: Vec::new(),
        }
    }

    /// Base parameter with a known string value.
    pub fn push(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key.to_string(), value.into()));
        self
    }

    /// Optional parameter encoded per the wrapper's spec; `None` and JSON
    /// null are omitted entirely.
    pub fn set(&mut self, key: &str, value: Option<&Value>) -> Result<&mut Self, ToolError> {
        let Some(value) = value else {
            return Ok(self);
        };
        if value.is_null() {
            return Ok(self);
        }
        let encoded = encode_value(self.spec.kind(key), key, value)?;
        self.pairs.push((key.to_string(), encoded));
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(name, _)| name == key)
    }

    pub fn finish(self) -> Vec<(String, String)> {
        self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPEC: ParamSpec = ParamSpec::new(&[
        ("fields", Encode::CsvList),
        ("filtering", Encode::JsonBlob),
        ("targeting", Encode::JsonBlob),
        ("campaign_budget_optimization", Encode::BoolString),
        ("daily_budget", Encode::NumericString),
    ]);

    fn lookup<'p>(pairs: &'p [(String, String)], key: &str) -> Option<&'p str> {
        pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn absent_and_null_optionals_are_omitted() {
        let mut builder = ParamBuilder::new(&SPEC);
        builder.set("fields", None).expect("must accept");
        builder
            .set("filtering", Some(&Value::Null))
            .expect("must accept");
        let pairs = builder.finish();
        assert!(pairs.is_empty());
    }

    #[test]
    fn csv_list_preserves_order_without_dedup() {
        let mut builder = ParamBuilder::new(&SPEC);
        builder
            .set("fields", Some(&json!(["name", "id", "name"])))
            .expect("must encode");
        let pairs = builder.finish();
        assert_eq!(lookup(&pairs, "fields"), Some("name,id,name"));
    }

    #[test]
    fn json_blob_matches_canonical_serialization() {
        let filtering = json!([{"field": "name", "operator": "CONTAIN", "value": "summer"}]);
        let mut builder = ParamBuilder::new(&SPEC);
        builder
            .set("filtering", Some(&filtering))
            .expect("must encode");
        let pairs = builder.finish();
        assert_eq!(
            lookup(&pairs, "filtering"),
            Some(serde_json::to_string(&filtering).unwrap().as_str())
        );
    }

    #[test]
    fn json_blob_passes_preserialized_strings_through() {
        let mut builder = ParamBuilder::new(&SPEC);
        builder
            .set("targeting", Some(&json!("{\"age_min\":18}")))
            .expect("must encode");
        let pairs = builder.finish();
        assert_eq!(lookup(&pairs, "targeting"), Some("{\"age_min\":18}"));
    }

    #[test]
    fn bool_string_renders_literals() {
        let mut builder = ParamBuilder::new(&SPEC);
        builder
            .set("campaign_budget_optimization", Some(&json!(false)))
            .expect("must encode");
        let pairs = builder.finish();
        assert_eq!(lookup(&pairs, "campaign_budget_optimization"), Some("false"));
    }

    #[test]
    fn numeric_string_keeps_decimal_form() {
        let mut builder = ParamBuilder::new(&SPEC);
        builder
            .set("daily_budget", Some(&json!(5000)))
            .expect("must encode");
        let pairs = builder.finish();
        assert_eq!(lookup(&pairs, "daily_budget"), Some("5000"));
    }

    #[test]
    fn unknown_keys_default_to_plain_scalars() {
        let mut builder = ParamBuilder::new(&SPEC);
        builder
            .set("limit", Some(&json!(25)))
            .expect("must encode");
        let pairs = builder.finish();
        assert_eq!(lookup(&pairs, "limit"), Some("25"));
    }
}
