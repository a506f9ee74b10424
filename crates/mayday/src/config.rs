//! Per-channel notifier configuration.
//!
//! Each registered channel carries its own [`NotifierConfig`]; suppression,
//! redaction, and rendering are all evaluated against the config of the
//! channel being delivered to, never against a global one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ExceptionReport;
use crate::exception::CaughtException;

/// Sensitive keys redacted by default.
pub const DEFAULT_SENSITIVE_KEYS: [&str; 2] = ["password", "secret"];

/// Default subject prefix.
pub const DEFAULT_EMAIL_PREFIX: &str = "[ERROR]";

/// Custom suppression predicate. Returning `true` suppresses the report.
pub type IgnorePredicate = Arc<dyn Fn(&CaughtException, &Value) -> bool + Send + Sync>;

/// Renderer for a user-defined body section.
///
/// An `Err` degrades to a warning line in the body; it never aborts the
/// notification.
pub type SectionRenderer = Arc<dyn Fn(&ExceptionReport) -> anyhow::Result<String> + Send + Sync>;

/// A `(title, renderer)` pair appended to the rendered body.
#[derive(Clone)]
pub struct CustomSection {
    pub title: String,
    pub render: SectionRenderer,
}

impl CustomSection {
    pub fn new(
        title: impl Into<String>,
        render: impl Fn(&ExceptionReport) -> anyhow::Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            render: Arc::new(render),
        }
    }
}

impl fmt::Debug for CustomSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomSection")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// Body format for email-style channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailFormat {
    #[default]
    Plain,
    Html,
}

/// Decision and rendering options for one registered channel.
#[derive(Clone)]
pub struct NotifierConfig {
    /// Subject prefix, e.g. `"[APP ERROR]"`.
    pub email_prefix: String,
    /// Include the exception message in the subject.
    pub verbose_subject: bool,
    /// Fully-qualified exception class names that never notify.
    pub ignored_exceptions: BTreeSet<String>,
    /// User-agent substrings that never notify.
    pub ignore_crawlers: Vec<String>,
    /// Custom suppression predicate, evaluated last.
    pub ignore_if: Option<IgnorePredicate>,
    /// Keys redacted from session/params structures (case-insensitive).
    pub sensitive_keys: Vec<String>,
    /// Plain-text or multipart HTML body.
    pub email_format: EmailFormat,
    /// Headers merged over the renderer's defaults.
    pub custom_headers: BTreeMap<String, String>,
    /// Extra body sections, rendered in registration order.
    pub custom_sections: Vec<CustomSection>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            email_prefix: DEFAULT_EMAIL_PREFIX.to_string(),
            verbose_subject: true,
            ignored_exceptions: BTreeSet::new(),
            ignore_crawlers: Vec::new(),
            ignore_if: None,
            sensitive_keys: DEFAULT_SENSITIVE_KEYS.iter().map(|s| s.to_string()).collect(),
            email_format: EmailFormat::Plain,
            custom_headers: BTreeMap::new(),
            custom_sections: Vec::new(),
        }
    }
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("email_prefix", &self.email_prefix)
            .field("verbose_subject", &self.verbose_subject)
            .field("ignored_exceptions", &self.ignored_exceptions)
            .field("ignore_crawlers", &self.ignore_crawlers)
            .field("ignore_if", &self.ignore_if.as_ref().map(|_| "<predicate>"))
            .field("sensitive_keys", &self.sensitive_keys)
            .field("email_format", &self.email_format)
            .field("custom_headers", &self.custom_headers)
            .field("custom_sections", &self.custom_sections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NotifierConfig::default();
        assert_eq!(config.email_prefix, "[ERROR]");
        assert!(config.verbose_subject);
        assert!(config.ignored_exceptions.is_empty());
        assert_eq!(config.sensitive_keys, vec!["password", "secret"]);
        assert_eq!(config.email_format, EmailFormat::Plain);
        assert!(config.custom_sections.is_empty());
    }

    #[test]
    fn email_format_serde_names() {
        assert_eq!(serde_json::to_string(&EmailFormat::Html).unwrap(), "\"html\"");
        let parsed: EmailFormat = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(parsed, EmailFormat::Plain);
    }

    #[test]
    fn debug_omits_closures() {
        let mut config = NotifierConfig::default();
        config.ignore_if = Some(Arc::new(|_, _| true));
        let printed = format!("{config:?}");
        assert!(printed.contains("<predicate>"));
    }
}
