//! Generic HTTP webhook delivery.
//!
//! Posts the rendered message as a JSON payload. The message's merged
//! headers are sent as HTTP request headers.

use crate::render::RenderedMessage;
use crate::traits::{Notifier, NotifyError};

/// Delivers rendered reports as JSON over HTTP to a configured endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    method: reqwest::Method,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a webhook notifier. `method` defaults to `POST` when `None`.
    pub fn new(url: impl Into<String>, method: Option<reqwest::Method>) -> Self {
        Self {
            url: url.into(),
            method: method.unwrap_or(reqwest::Method::POST),
            client: reqwest::Client::new(),
        }
    }

    /// Construct from config-level primitives; the method is parsed from a
    /// string (e.g. `"POST"`, `"PUT"`).
    pub fn from_config(url: String, method: Option<String>) -> Result<Self, NotifyError> {
        let parsed = match method {
            Some(m) => Some(
                m.to_uppercase()
                    .parse::<reqwest::Method>()
                    .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {m}")))?,
            ),
            None => None,
        };
        Ok(Self::new(url, parsed))
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, message: &RenderedMessage) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(message);

        for (key, value) in &message.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Delivery(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(
            url = %self.url,
            method = %self.method,
            %status,
            "webhook notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_method_is_post() {
        let notifier = WebhookNotifier::from_config("https://example.com".into(), None).unwrap();
        assert_eq!(notifier.method, reqwest::Method::POST);
    }

    #[test]
    fn method_parsing_is_case_insensitive() {
        let notifier =
            WebhookNotifier::from_config("https://example.com".into(), Some("put".into())).unwrap();
        assert_eq!(notifier.method, reqwest::Method::PUT);
    }

    #[test]
    fn invalid_method_is_a_config_error() {
        let result =
            WebhookNotifier::from_config("https://example.com".into(), Some("NOT VALID\0".into()));
        assert!(result.is_err());
    }

    #[test]
    fn channel_name_is_webhook() {
        let notifier = WebhookNotifier::new("https://example.com", None);
        assert_eq!(notifier.channel_name(), "webhook");
    }
}
