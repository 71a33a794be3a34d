use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

static INLINE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // Graph API user/page access tokens
        (
            Regex::new(r"\bEAA[A-Za-z0-9]{20,}\b").expect("inline redaction regex"),
            "EAA***REDACTED***",
        ),
        (
            Regex::new(r"\b(Bearer)\s+([A-Za-z0-9._~-]{10,})\b").expect("inline redaction regex"),
            "$1 ***REDACTED***",
        ),
        (
            Regex::new(r#"\b(access[_-]?token|token|secret|api[_-]?key)\b\s*([:=])\s*([^\s&"'`]+)"#)
                .expect("inline redaction regex"),
            "$1$2***REDACTED***",
        ),
    ]
});

/// A key is a credential if its name contains token, secret, or key,
/// case-insensitively. Values under such keys never reach logs or
/// error payloads.
pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    normalized.contains("token") || normalized.contains("secret") || normalized.contains("key")
}

pub fn redact_text(value: &str) -> String {
    let mut out = value.to_string();
    for (re, replacement) in INLINE_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).to_string();
        }
    }
    out
}

/// Recursively replace credential values inside a JSON value.
pub fn redact_object(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(redact_object).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map.iter() {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact_object(entry));
                }
            }
            Value::Object(out)
        }
        Value::String(text) => Value::String(redact_text(text)),
        _ => value.clone(),
    }
}

/// Drop credential keys entirely. Used for the `payload_sent` diagnostic
/// attached to remote errors, where even a placeholder is unwanted.
pub fn strip_sensitive_keys(params: &[(String, String)]) -> Value {
    let mut out = serde_json::Map::new();
    for (key, value) in params {
        if !is_sensitive_key(key) {
            out.insert(key.clone(), Value::String(value.clone()));
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sensitive_key_matches_are_case_insensitive_substrings() {
        assert!(is_sensitive_key("access_token"));
        assert!(is_sensitive_key("AWS_SECRET_ACCESS_KEY"));
        assert!(is_sensitive_key("ApiKey"));
        assert!(!is_sensitive_key("fields"));
        assert!(!is_sensitive_key("daily_budget"));
    }

    #[test]
    fn redact_object_masks_nested_credentials() {
        let input = json!({
            "params": {"access_token": "EAAabc", "fields": "id,name"},
            "url": "https://graph.facebook.com/v22.0/act_1/campaigns",
        });
        let out = redact_object(&input);
        assert_eq!(out["params"]["access_token"], json!(REDACTED));
        assert_eq!(out["params"]["fields"], json!("id,name"));
    }

    #[test]
    fn strip_sensitive_keys_removes_rather_than_masks() {
        let params = vec![
            ("access_token".to_string(), "EAAabc".to_string()),
            ("name".to_string(), "Summer".to_string()),
        ];
        let out = strip_sensitive_keys(&params);
        assert!(out.get("access_token").is_none());
        assert_eq!(out["name"], json!("Summer"));
    }

    #[test]
    fn redact_text_masks_key_value_credentials() {
        let input = "retrying https://graph.facebook.com?access_token=abc123&fields=id with secret: s3cr3t";
        let out = redact_text(input);
        assert!(!out.contains("abc123"));
        assert!(!out.contains("s3cr3t"));
        assert!(out.contains("access_token=***REDACTED***"));
        assert!(out.contains("fields=id"));
    }

    #[test]
    fn redact_text_masks_graph_tokens_inline() {
        let input = "call failed for token EAA0123456789abcdefghijKLMNOP at act_1";
        let out = redact_text(input);
        assert!(!out.contains("EAA0123456789abcdefghijKLMNOP"));
        assert!(out.contains("EAA***REDACTED***"));
    }
}
