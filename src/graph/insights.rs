use crate::errors::ToolError;
use crate::graph::params::{Encode, ParamBuilder, ParamSpec};
use serde_json::Value;

pub const INSIGHTS_SPEC: ParamSpec = ParamSpec::new(&[
    ("fields", Encode::CsvList),
    ("action_attribution_windows", Encode::CsvList),
    ("action_breakdowns", Encode::CsvList),
    ("breakdowns", Encode::CsvList),
    ("filtering", Encode::JsonBlob),
    ("time_range", Encode::JsonBlob),
    ("time_ranges", Encode::JsonBlob),
]);

const PASSTHROUGH_KEYS: &[&str] = &[
    "fields",
    "level",
    "action_attribution_windows",
    "action_breakdowns",
    "action_report_time",
    "breakdowns",
    "filtering",
    "sort",
    "limit",
    "after",
    "before",
    "offset",
    "locale",
];

fn provided(args: &Value, key: &str) -> bool {
    matches!(args.get(key), Some(value) if !value.is_null())
}

fn truthy_flag(args: &Value, key: &str, default: bool) -> bool {
    match args.get(key) {
        None | Some(Value::Null) => default,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => {
            matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        }
        Some(Value::Number(num)) => num.as_f64().map(|n| n != 0.0).unwrap_or(default),
        Some(_) => default,
    }
}

/// Resolves the reporting window for an insights request.
///
/// Callers may hand over any mix of `time_ranges`, `time_range`,
/// `since`/`until`, and `date_preset`; the resolver applies a fixed
/// precedence instead of rejecting the combination:
///
/// 1. explicit range objects (`time_ranges`, then `time_range`) win,
/// 2. otherwise `since`/`until` are forwarded,
/// 3. `date_preset` (or `default_preset`) is emitted only when no other
///    time parameter is present.
///
/// `time_increment` is forwarded only when it differs from the remote
/// default of `all_days`, and the three attribution flags are emitted as
/// `"true"` only when enabled, never as `"false"`.
pub fn apply_insights_params(
    builder: &mut ParamBuilder<'_>,
    args: &Value,
    default_preset: Option<&str>,
) -> Result<(), ToolError> {
    for key in PASSTHROUGH_KEYS {
        builder.set(key, args.get(*key))?;
    }

    let has_range = provided(args, "time_range") || provided(args, "time_ranges");
    let has_time = has_range || provided(args, "since") || provided(args, "until");

    builder.set("time_range", args.get("time_range"))?;
    builder.set("time_ranges", args.get("time_ranges"))?;
    if !has_range {
        builder.set("since", args.get("since"))?;
        builder.set("until", args.get("until"))?;
    }
    if !has_time {
        if provided(args, "date_preset") {
            builder.set("date_preset", args.get("date_preset"))?;
        } else if let Some(preset) = default_preset {
            builder.push("date_preset", preset);
        }
    }

    if let Some(increment) = args.get("time_increment") {
        let literal = match increment {
            Value::String(text) => Some(text.clone()),
            Value::Number(num) => Some(num.to_string()),
            _ => None,
        };
        if let Some(literal) = literal {
            if literal != crate::constants::graph::TIME_INCREMENT_DEFAULT {
                builder.push("time_increment", literal);
            }
        }
    }

    if truthy_flag(args, "default_summary", false) {
        builder.push("default_summary", "true");
    }
    if truthy_flag(args, "use_account_attribution_setting", false) {
        builder.push("use_account_attribution_setting", "true");
    }
    if truthy_flag(args, "use_unified_attribution_setting", true) {
        builder.push("use_unified_attribution_setting", "true");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(args: Value) -> Vec<(String, String)> {
        let mut builder = ParamBuilder::new(&INSIGHTS_SPEC);
        apply_insights_params(&mut builder, &args, Some("last_30d")).expect("must resolve");
        builder.finish()
    }

    fn lookup<'p>(pairs: &'p [(String, String)], key: &str) -> Option<&'p str> {
        pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn default_preset_applies_when_no_time_given() {
        let pairs = resolve(json!({}));
        assert_eq!(lookup(&pairs, "date_preset"), Some("last_30d"));
        assert_eq!(lookup(&pairs, "use_unified_attribution_setting"), Some("true"));
        assert_eq!(lookup(&pairs, "use_account_attribution_setting"), None);
        assert_eq!(lookup(&pairs, "default_summary"), None);
    }

    #[test]
    fn explicit_range_suppresses_preset_and_since_until() {
        let pairs = resolve(json!({
            "time_range": {"since": "2024-01-01", "until": "2024-01-31"},
            "since": "2023-06-01",
            "until": "2023-06-30",
            "date_preset": "last_7d",
        }));
        assert!(lookup(&pairs, "time_range").is_some());
        assert_eq!(lookup(&pairs, "since"), None);
        assert_eq!(lookup(&pairs, "until"), None);
        assert_eq!(lookup(&pairs, "date_preset"), None);
    }

    #[test]
    fn since_until_suppress_preset_only() {
        let pairs = resolve(json!({"since": "2024-03-01", "date_preset": "last_7d"}));
        assert_eq!(lookup(&pairs, "since"), Some("2024-03-01"));
        assert_eq!(lookup(&pairs, "date_preset"), None);
    }

    #[test]
    fn explicit_preset_overrides_default() {
        let pairs = resolve(json!({"date_preset": "yesterday"}));
        assert_eq!(lookup(&pairs, "date_preset"), Some("yesterday"));
    }

    #[test]
    fn time_increment_default_is_dropped() {
        let pairs = resolve(json!({"time_increment": "all_days"}));
        assert_eq!(lookup(&pairs, "time_increment"), None);
        let pairs = resolve(json!({"time_increment": 7}));
        assert_eq!(lookup(&pairs, "time_increment"), Some("7"));
    }

    #[test]
    fn disabled_flags_are_never_sent_as_false() {
        let pairs = resolve(json!({
            "use_unified_attribution_setting": false,
            "default_summary": false,
        }));
        assert_eq!(lookup(&pairs, "use_unified_attribution_setting"), None);
        assert_eq!(lookup(&pairs, "default_summary"), None);
    }

    #[test]
    fn csv_and_blob_fields_pass_through() {
        let pairs = resolve(json!({
            "fields": ["impressions", "spend"],
            "breakdowns": ["age", "gender"],
            "filtering": [{"field": "spend", "operator": "GREATER_THAN", "value": 0}],
            "limit": 50,
        }));
        assert_eq!(lookup(&pairs, "fields"), Some("impressions,spend"));
        assert_eq!(lookup(&pairs, "breakdowns"), Some("age,gender"));
        assert_eq!(lookup(&pairs, "limit"), Some("50"));
        assert!(lookup(&pairs, "filtering").unwrap().starts_with("[{"));
    }
}
