//! Sensitive-key redaction for nested request structures.
//!
//! Redaction is structural: any mapping key matching a sensitive key
//! (case-insensitive, at any depth) has its value replaced with the
//! [`FILTERED`] sentinel. Sequence elements are walked; other leaves pass
//! through untouched.

use serde_json::Value;

/// Sentinel that replaces redacted values.
pub const FILTERED: &str = "[FILTERED]";

/// Session identifier attribute forced to the sentinel on secure requests.
pub const SESSION_ID_KEY: &str = "session_id";

/// Redacts configured sensitive keys from arbitrary nested structures.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    /// Lowercased sensitive key names.
    keys: Vec<String>,
}

impl FilterPolicy {
    pub fn new<I, S>(sensitive_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: sensitive_keys
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        let lowered = key.to_lowercase();
        self.keys.iter().any(|k| *k == lowered)
    }

    /// Recursively redact sensitive keys in `value`.
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, nested)| {
                        if self.is_sensitive(key) {
                            (key.clone(), Value::String(FILTERED.to_string()))
                        } else {
                            (key.clone(), self.redact(nested))
                        }
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            leaf => leaf.clone(),
        }
    }

    /// Redact a session structure.
    ///
    /// On top of the regular key rules, a session established over a secure
    /// transport always shows its [`SESSION_ID_KEY`] as the sentinel,
    /// regardless of the configured sensitive keys.
    pub fn redact_session(&self, session: &Value, secure: bool) -> Value {
        let mut redacted = self.redact(session);
        if secure {
            if let Value::Object(map) = &mut redacted {
                map.insert(
                    SESSION_ID_KEY.to_string(),
                    Value::String(FILTERED.to_string()),
                );
            }
        }
        redacted
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SENSITIVE_KEYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_top_level_key() {
        let policy = FilterPolicy::default();
        let out = policy.redact(&json!({"secret": "x", "name": "bob"}));
        assert_eq!(out, json!({"secret": FILTERED, "name": "bob"}));
    }

    #[test]
    fn redacts_nested_keys_at_any_depth() {
        let policy = FilterPolicy::default();
        let out = policy.redact(&json!({
            "user": {"password": "hunter2", "profile": {"secret": [1, 2]}},
            "items": [{"password": "p"}]
        }));
        assert_eq!(
            out,
            json!({
                "user": {"password": FILTERED, "profile": {"secret": FILTERED}},
                "items": [{"password": FILTERED}]
            })
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let policy = FilterPolicy::new(["Token"]);
        let out = policy.redact(&json!({"TOKEN": "abc", "token": "def", "other": 1}));
        assert_eq!(out, json!({"TOKEN": FILTERED, "token": FILTERED, "other": 1}));
    }

    #[test]
    fn non_mapping_leaves_pass_through() {
        let policy = FilterPolicy::default();
        assert_eq!(policy.redact(&json!(42)), json!(42));
        assert_eq!(policy.redact(&json!("secret")), json!("secret"));
        assert_eq!(policy.redact(&json!(null)), json!(null));
    }

    #[test]
    fn secure_session_forces_session_id_sentinel() {
        let policy = FilterPolicy::new(Vec::<String>::new());
        let out = policy.redact_session(&json!({"session_id": "abc123", "cart": 3}), true);
        assert_eq!(out, json!({"session_id": FILTERED, "cart": 3}));
    }

    #[test]
    fn secure_empty_session_still_shows_sentinel() {
        let policy = FilterPolicy::default();
        let out = policy.redact_session(&json!({}), true);
        assert_eq!(out, json!({"session_id": FILTERED}));
    }

    #[test]
    fn insecure_session_keeps_session_id() {
        let policy = FilterPolicy::default();
        let out = policy.redact_session(&json!({"session_id": "abc123"}), false);
        assert_eq!(out, json!({"session_id": "abc123"}));
    }
}
