// Redaction of secret-bearing fields before structured data reaches a log
// line or an error response.

use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

// Matched against lowercased field names with separators stripped, so both
// `privateKey` and `private_key` are caught.
const SENSITIVE_MARKERS: [&str; 4] = ["secret", "privatekey", "password", "encryptedsecretkey"];

// Fields that must survive sanitization even though a broader marker could
// be added around them later.
const ALLOWED_FIELDS: [&str; 3] = ["publickey", "walletpublickey", "tokenpublickey"];

fn normalize(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = normalize(key);
    if ALLOWED_FIELDS.contains(&normalized.as_str()) {
        return false;
    }
    SENSITIVE_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
}

// Recursively replace the values of sensitive fields with a fixed marker.
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String(REDACTED.to_owned()))
                    } else {
                        (key.clone(), sanitize_value(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_fields() {
        let input = json!({
            "privateKey": "abc",
            "encrypted_secret_key": "def",
            "password": "hunter2",
            "nested": {"apiSecret": "x", "amount": 3},
        });
        let out = sanitize_value(&input);
        assert_eq!(out["privateKey"], REDACTED);
        assert_eq!(out["encrypted_secret_key"], REDACTED);
        assert_eq!(out["password"], REDACTED);
        assert_eq!(out["nested"]["apiSecret"], REDACTED);
        assert_eq!(out["nested"]["amount"], 3);
    }

    #[test]
    fn public_key_is_preserved() {
        let input = json!({"publicKey": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"});
        let out = sanitize_value(&input);
        assert_eq!(out["publicKey"], input["publicKey"]);
    }
}
