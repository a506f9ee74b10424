//! Notifier trait definition and shared error types.

use crate::render::RenderedMessage;

/// Errors that can occur while rendering or delivering a report.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Trait for notification channel implementations.
///
/// A channel receives a fully rendered message; everything upstream
/// (suppression, extraction, redaction, rendering) has already happened
/// with the channel's own configuration.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a rendered message through this channel.
    async fn deliver(&self, message: &RenderedMessage) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "email", "webhook").
    fn channel_name(&self) -> &str;
}
