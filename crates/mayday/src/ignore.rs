//! Suppression policy: decides whether an exception produces a report.
//!
//! Pure decision function. Checks run in order and short-circuit on the
//! first match; any match suppresses. A malformed or missing environment
//! never raises; absent keys simply don't match.

use serde_json::Value;

use crate::config::NotifierConfig;
use crate::context::env_keys;
use crate::exception::CaughtException;

/// `true` means the exception should be reported through this channel.
pub fn should_notify(exception: &CaughtException, env: &Value, config: &NotifierConfig) -> bool {
    if config
        .ignored_exceptions
        .contains(exception.class_name.as_str())
    {
        tracing::debug!(
            class = %exception.class_name,
            "notification suppressed: ignored exception class"
        );
        return false;
    }

    if let Some(user_agent) = env.get(env_keys::HTTP_USER_AGENT).and_then(Value::as_str) {
        if config
            .ignore_crawlers
            .iter()
            .any(|crawler| !crawler.is_empty() && user_agent.contains(crawler.as_str()))
        {
            tracing::debug!(user_agent, "notification suppressed: crawler user agent");
            return false;
        }
    }

    if let Some(predicate) = &config.ignore_if {
        if predicate(exception, env) {
            tracing::debug!(
                class = %exception.class_name,
                "notification suppressed: ignore_if predicate"
            );
            return false;
        }
    }

    true
}
