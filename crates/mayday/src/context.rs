//! Context extraction: exception + ambient environment → [`ExceptionReport`].
//!
//! Extraction is total. Each subsection is built independently; a
//! subsection that cannot be built becomes a warning rendered in its
//! place, and the remaining subsections are still produced. Delivering
//! the report takes priority over a complete one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::exception::{CaughtException, Cause};
use crate::filter::FilterPolicy;

/// Well-known keys read from the ambient environment map.
pub mod env_keys {
    pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
    pub const REQUEST_URI: &str = "REQUEST_URI";
    pub const HTTP_HOST: &str = "HTTP_HOST";
    pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
    pub const HTTP_USER_AGENT: &str = "HTTP_USER_AGENT";
    pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
    pub const HTTPS: &str = "HTTPS";
    pub const URL_SCHEME: &str = "url_scheme";
    pub const SESSION: &str = "session";
    pub const PARAMS: &str = "params";
}

/// Outcome of building one report subsection: the value, or the warning
/// rendered in its place.
#[derive(Debug, Clone)]
pub enum Section<T> {
    Built(T),
    Failed(String),
}

impl<T> Section<T> {
    fn failed(label: &str) -> Self {
        Section::Failed(format!("ERROR: Failed to generate {label}"))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Section::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Section::Built(v) => Some(v),
            Section::Failed(_) => None,
        }
    }
}

/// A normalized, privacy-filtered report. Immutable once built.
#[derive(Debug, Clone)]
pub struct ExceptionReport {
    pub exception_class: String,
    pub message: String,
    pub cause_chain: Vec<Cause>,
    /// Formatted backtrace frames, one per entry.
    pub backtrace: Vec<String>,
    /// Captured at extraction time, not at raise time.
    pub timestamp: DateTime<Utc>,
    /// Exception summary paragraph (class, message, request URL).
    pub summary: Section<String>,
    /// Request metadata derived from well-known environment keys.
    pub request: Section<BTreeMap<String, String>>,
    /// Session data, redacted.
    pub session: Section<Value>,
    /// Request parameters, redacted.
    pub params: Section<Value>,
    /// Caller-supplied data, merged verbatim and never redacted.
    pub data: Value,
    /// Warnings for every subsection that failed to build.
    pub warnings: Vec<String>,
}

/// Builds an [`ExceptionReport`] from an exception and its ambient state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextExtractor;

impl ContextExtractor {
    /// Extract a report. Never fails: malformed environment data degrades
    /// individual subsections to warnings.
    pub fn extract(
        &self,
        exception: &CaughtException,
        env: &Value,
        extra: Option<Value>,
        filter: &FilterPolicy,
    ) -> ExceptionReport {
        let timestamp = Utc::now();
        let env_ok = env.is_object();
        let secure = is_secure(env);

        let summary = if env_ok {
            Section::Built(build_summary(exception, env))
        } else {
            Section::failed("exception summary")
        };

        let request = if env_ok {
            Section::Built(request_metadata(env, secure))
        } else {
            Section::failed("request summary")
        };

        let session = if env_ok {
            match env.get(env_keys::SESSION) {
                None | Some(Value::Null) => {
                    Section::Built(filter.redact_session(&Value::Object(Default::default()), secure))
                }
                Some(value @ Value::Object(_)) => {
                    Section::Built(filter.redact_session(value, secure))
                }
                Some(_) => Section::failed("session"),
            }
        } else {
            Section::failed("session")
        };

        let params = if env_ok {
            match env.get(env_keys::PARAMS) {
                None | Some(Value::Null) => Section::Built(Value::Object(Default::default())),
                Some(value @ Value::Object(_)) => Section::Built(filter.redact(value)),
                Some(_) => Section::failed("parameters"),
            }
        } else {
            Section::failed("parameters")
        };

        let warnings: Vec<String> = section_warning(&summary)
            .into_iter()
            .chain(section_warning(&request))
            .chain(section_warning(&session))
            .chain(section_warning(&params))
            .collect();

        for warning in &warnings {
            tracing::warn!(class = %exception.class_name, %warning, "degraded extraction");
        }

        ExceptionReport {
            exception_class: exception.class_name.clone(),
            message: exception.message.clone(),
            cause_chain: exception.causes.clone(),
            backtrace: exception.backtrace_lines(),
            timestamp,
            summary,
            request,
            session,
            params,
            data: extra.unwrap_or_else(|| Value::Object(Default::default())),
            warnings,
        }
    }
}

fn section_warning<T>(section: &Section<T>) -> Option<String> {
    match section {
        Section::Failed(w) => Some(w.clone()),
        Section::Built(_) => None,
    }
}

/// Whether the originating request used a secure transport.
pub fn is_secure(env: &Value) -> bool {
    let https_flag = match env.get(env_keys::HTTPS) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.to_ascii_lowercase();
            s == "on" || s == "true" || s == "https"
        }
        _ => false,
    };
    https_flag
        || env
            .get(env_keys::URL_SCHEME)
            .and_then(Value::as_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("https"))
}

/// Reconstruct the request URL from host, scheme, and URI, when present.
fn request_url(env: &Value, secure: bool) -> Option<String> {
    let uri = env.get(env_keys::REQUEST_URI).and_then(Value::as_str);
    let host = env.get(env_keys::HTTP_HOST).and_then(Value::as_str);
    match (host, uri) {
        (Some(host), uri) => {
            let scheme = if secure { "https" } else { "http" };
            Some(format!("{scheme}://{host}{}", uri.unwrap_or("")))
        }
        (None, Some(uri)) => Some(uri.to_string()),
        (None, None) => None,
    }
}

fn build_summary(exception: &CaughtException, env: &Value) -> String {
    let mut summary = format!(
        "A {} occurred:\n\n  {}",
        exception.class_name, exception.message
    );
    if let Some(url) = request_url(env, is_secure(env)) {
        summary.push_str(&format!("\n  {url}"));
    }
    for cause in &exception.causes {
        summary.push_str(&format!(
            "\n  caused by {}: {}",
            cause.class_name, cause.message
        ));
    }
    summary
}

/// Request metadata from well-known keys; absent keys are omitted.
fn request_metadata(env: &Value, secure: bool) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    let string_keys = [
        (env_keys::REQUEST_METHOD, "method"),
        (env_keys::REMOTE_ADDR, "remote_ip"),
        (env_keys::HTTP_USER_AGENT, "user_agent"),
        (env_keys::SERVER_PROTOCOL, "protocol"),
    ];
    for (env_key, field) in string_keys {
        if let Some(value) = env.get(env_key).and_then(Value::as_str) {
            meta.insert(field.to_string(), value.to_string());
        }
    }
    if let Some(url) = request_url(env, secure) {
        meta.insert("url".to_string(), url);
    }
    if env.get(env_keys::HTTPS).is_some() || env.get(env_keys::URL_SCHEME).is_some() {
        meta.insert("ssl".to_string(), secure.to_string());
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_exception() -> CaughtException {
        CaughtException::new("NoMethodError", "undefined method 'nw'")
            .frame("app/controllers/posts.rs", 18, "create")
            .frame("lib/router.rs", 101, "route")
    }

    fn sample_env() -> Value {
        json!({
            "REQUEST_METHOD": "POST",
            "REQUEST_URI": "/posts",
            "HTTP_HOST": "example.com",
            "REMOTE_ADDR": "10.0.0.9",
            "HTTP_USER_AGENT": "Mozilla/5.0",
            "HTTPS": "off",
            "session": {"user_id": 7, "password": "nope"},
            "params": {"title": "hi", "secret": "x-secret-value"}
        })
    }

    #[test]
    fn extracts_full_report() {
        let report = ContextExtractor.extract(
            &sample_exception(),
            &sample_env(),
            Some(json!({"message": "while saving a post"})),
            &FilterPolicy::default(),
        );

        assert_eq!(report.exception_class, "NoMethodError");
        assert_eq!(report.backtrace[0], "app/controllers/posts.rs:18:in `create'");
        assert!(report.warnings.is_empty());

        let request = report.request.value().unwrap();
        assert_eq!(request["method"], "POST");
        assert_eq!(request["url"], "http://example.com/posts");
        assert_eq!(request["ssl"], "false");

        assert_eq!(
            report.session.value().unwrap()["password"],
            json!("[FILTERED]")
        );
        assert_eq!(
            report.params.value().unwrap()["secret"],
            json!("[FILTERED]")
        );
        assert_eq!(report.data["message"], json!("while saving a post"));
    }

    #[test]
    fn custom_data_is_never_redacted() {
        let report = ContextExtractor.extract(
            &sample_exception(),
            &sample_env(),
            Some(json!({"secret": "keep-me"})),
            &FilterPolicy::default(),
        );
        assert_eq!(report.data["secret"], json!("keep-me"));
    }

    #[test]
    fn missing_env_keys_are_omitted_not_errors() {
        let report = ContextExtractor.extract(
            &sample_exception(),
            &json!({}),
            None,
            &FilterPolicy::default(),
        );
        assert!(report.warnings.is_empty());
        assert!(report.request.value().unwrap().is_empty());
        assert_eq!(report.session.value().unwrap(), &json!({}));
    }

    #[test]
    fn non_map_env_degrades_to_warnings() {
        let report = ContextExtractor.extract(
            &sample_exception(),
            &json!("not a map"),
            None,
            &FilterPolicy::default(),
        );
        assert!(report.summary.is_failed());
        assert!(report
            .warnings
            .contains(&"ERROR: Failed to generate exception summary".to_string()));
        // The rest of the report is still produced.
        assert_eq!(report.exception_class, "NoMethodError");
        assert_eq!(report.backtrace.len(), 2);
    }

    #[test]
    fn malformed_session_fails_only_that_section() {
        let mut env = sample_env();
        env["session"] = json!("bogus");
        let report =
            ContextExtractor.extract(&sample_exception(), &env, None, &FilterPolicy::default());
        assert!(report.session.is_failed());
        assert!(!report.params.is_failed());
        assert_eq!(report.warnings, vec!["ERROR: Failed to generate session"]);
    }

    #[test]
    fn secure_request_detected_from_https_flag() {
        assert!(is_secure(&json!({"HTTPS": "on"})));
        assert!(is_secure(&json!({"HTTPS": true})));
        assert!(is_secure(&json!({"url_scheme": "https"})));
        assert!(!is_secure(&json!({"HTTPS": "off"})));
        assert!(!is_secure(&json!({})));
        assert!(!is_secure(&json!("garbage")));
    }

    #[test]
    fn cause_chain_appears_in_summary() {
        let ex = sample_exception().caused_by("KeyError", "missing key :nw");
        let report =
            ContextExtractor.extract(&ex, &sample_env(), None, &FilterPolicy::default());
        let summary = report.summary.value().unwrap();
        assert!(summary.contains("caused by KeyError: missing key :nw"));
        assert_eq!(report.cause_chain.len(), 1);
    }
}
