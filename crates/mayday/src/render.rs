//! Renders an [`ExceptionReport`] into a deliverable message.
//!
//! The plain-text body is assembled in code; the HTML body goes through a
//! minijinja template built from the same section data, so the two never
//! drift apart. Rendering is the only pipeline stage allowed to fail
//! synchronously: without a body there is nothing to deliver.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

use crate::config::{EmailFormat, NotifierConfig};
use crate::context::{ExceptionReport, Section};
use crate::traits::NotifyError;

/// Maximum rendered subject length, in characters.
const SUBJECT_LIMIT: usize = 120;

pub const CONTENT_TYPE_PLAIN: &str = "text/plain; charset=UTF-8";
pub const CONTENT_TYPE_ALTERNATIVE: &str = "multipart/alternative";

const DIVIDER: &str = "-------------------------------";

/// A file attached to a rendered message. Reports never attach files on
/// their own; this exists so transports share one message shape.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// The final subject/body/headers artifact handed to a transport.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedMessage {
    pub subject: String,
    pub text_body: String,
    /// Present only when the channel is configured for HTML.
    pub html_body: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Sender override; transports fall back to their own configuration.
    pub sender: Option<String>,
    /// Recipient overrides; transports fall back to their own configuration.
    pub recipients: Vec<String>,
    pub content_type: String,
    /// Always empty unless a caller explicitly attaches something.
    pub attachments: Vec<Attachment>,
}

/// Renders reports according to a per-channel [`NotifierConfig`].
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer {
    /// Headers applied to every message, overridable per config.
    default_headers: BTreeMap<String, String>,
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_headers(headers: BTreeMap<String, String>) -> Self {
        Self {
            default_headers: headers,
        }
    }

    /// Render a report for one channel.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the HTML template fails to
    /// render. This is the only error that propagates out of the pipeline
    /// synchronously.
    pub fn render(
        &self,
        report: &ExceptionReport,
        config: &NotifierConfig,
    ) -> Result<RenderedMessage, NotifyError> {
        let summary = match &report.summary {
            Section::Built(text) => text.clone(),
            Section::Failed(warning) => warning.clone(),
        };
        let timestamp = report
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let sections = body_sections(report, config);

        let text_body = render_text(&summary, &timestamp, &sections);
        let (html_body, content_type) = match config.email_format {
            EmailFormat::Plain => (None, CONTENT_TYPE_PLAIN.to_string()),
            EmailFormat::Html => (
                Some(render_html(&summary, &timestamp, &sections)?),
                CONTENT_TYPE_ALTERNATIVE.to_string(),
            ),
        };

        let mut headers = self.default_headers.clone();
        headers.extend(config.custom_headers.clone());

        Ok(RenderedMessage {
            subject: subject(report, config),
            text_body,
            html_body,
            headers,
            sender: None,
            recipients: Vec::new(),
            content_type,
            attachments: Vec::new(),
        })
    }
}

/// Build the subject line.
///
/// Verbose: `<prefix> (<Class>) "<message>"`. Non-verbose: the message is
/// omitted entirely and `#` marks the empty summary slot:
/// `<prefix> # (<Class>)`.
fn subject(report: &ExceptionReport, config: &NotifierConfig) -> String {
    let subject = if config.verbose_subject {
        format!(
            "{} ({}) {:?}",
            config.email_prefix, report.exception_class, report.message
        )
    } else {
        format!("{} # ({})", config.email_prefix, report.exception_class)
    };
    truncate_chars(subject, SUBJECT_LIMIT)
}

fn truncate_chars(s: String, limit: usize) -> String {
    if s.chars().count() <= limit {
        s
    } else {
        s.chars().take(limit).collect()
    }
}

/// Titled line blocks shared by the text and HTML bodies, in render order.
fn body_sections(report: &ExceptionReport, config: &NotifierConfig) -> Vec<(String, Vec<String>)> {
    let mut sections = Vec::new();

    sections.push((
        "Backtrace".to_string(),
        report.backtrace.iter().map(|f| format!("  {f}")).collect(),
    ));
    sections.push(("Request".to_string(), request_lines(&report.request)));
    sections.push(("Session".to_string(), value_lines(&report.session)));
    sections.push(("Parameters".to_string(), value_lines(&report.params)));

    if !is_empty_data(&report.data) {
        sections.push((
            "Data".to_string(),
            value_lines(&Section::Built(report.data.clone())),
        ));
    }

    for custom in &config.custom_sections {
        let lines = match (custom.render)(report) {
            Ok(content) => content.lines().map(String::from).collect(),
            Err(error) => {
                tracing::warn!(title = %custom.title, %error, "custom section failed to render");
                vec![format!("ERROR: Failed to generate section {}", custom.title)]
            }
        };
        sections.push((custom.title.clone(), lines));
    }

    sections
}

fn is_empty_data(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn request_lines(request: &Section<BTreeMap<String, String>>) -> Vec<String> {
    match request {
        Section::Built(meta) => meta
            .iter()
            .map(|(key, value)| format!(" * {key} : {value}"))
            .collect(),
        Section::Failed(warning) => vec![warning.clone()],
    }
}

fn value_lines(section: &Section<Value>) -> Vec<String> {
    match section {
        Section::Built(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| format!(" * \"{key}\" => {}", format_value(value)))
            .collect(),
        Section::Built(other) => vec![format!("  {}", format_value(other))],
        Section::Failed(warning) => vec![warning.clone()],
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}

fn render_text(summary: &str, timestamp: &str, sections: &[(String, Vec<String>)]) -> String {
    let mut body = String::new();
    body.push_str(summary);
    body.push_str("\n\n");
    body.push_str(&format!("Timestamp : {timestamp}\n"));
    for (title, lines) in sections {
        body.push_str(DIVIDER);
        body.push('\n');
        body.push_str(&format!("{title}:\n"));
        body.push_str(DIVIDER);
        body.push('\n');
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }
    }
    body
}

// ── HTML rendering ──────────────────────────────────────────────────

#[derive(Serialize)]
struct HtmlSection<'a> {
    title: &'a str,
    lines: &'a [String],
}

#[derive(Serialize)]
struct HtmlContext<'a> {
    summary: &'a str,
    timestamp: &'a str,
    sections: Vec<HtmlSection<'a>>,
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <pre>{{ summary | e }}</pre>
    <p>Timestamp : {{ timestamp }}</p>
{%- for section in sections %}
    <h3>{{ section.title | e }}</h3>
    <pre>
{%- for line in section.lines %}
{{ line | e }}
{%- endfor %}
    </pre>
{%- endfor %}
  </body>
</html>
"#;

/// Render the HTML body. A fresh [`minijinja::Environment`] per call,
/// since nothing is pre-registered.
fn render_html(
    summary: &str,
    timestamp: &str,
    sections: &[(String, Vec<String>)],
) -> Result<String, NotifyError> {
    let ctx = HtmlContext {
        summary,
        timestamp,
        sections: sections
            .iter()
            .map(|(title, lines)| HtmlSection {
                title,
                lines: lines.as_slice(),
            })
            .collect(),
    };
    let env = minijinja::Environment::new();
    env.render_str(HTML_TEMPLATE, &ctx)
        .map_err(|e| NotifyError::Template(e.to_string()))
}
