//! SMTP email delivery via `lettre` with TLS support.
//!
//! One concrete [`Notifier`] instance. The transport is configured once
//! from [`SmtpSettings`] and reused across deliveries; each rendered
//! message becomes a plain or multipart/alternative email.

use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::render::RenderedMessage;
use crate::traits::{Notifier, NotifyError};

/// SMTP transport settings, opaque to the rest of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    /// SMTP server hostname.
    pub host: String,
    /// Port; defaults to 587. Port 465 always uses implicit TLS.
    pub port: Option<u16>,
    /// Use STARTTLS. `None` means yes.
    pub tls: Option<bool>,
    /// Credentials passed to the transport when both are set.
    pub user_name: Option<String>,
    pub password: Option<String>,
    /// Sender address, e.g. `"Alerts <alerts@example.com>"`.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
}

/// Sends rendered reports as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))
}

impl EmailNotifier {
    /// Build an `EmailNotifier` from SMTP settings.
    ///
    /// Credentials come from the settings themselves; when `user_name` and
    /// `password` are both present they are handed to the transport,
    /// otherwise the connection is unauthenticated.
    pub fn from_settings(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&settings.from)?;
        let to = settings
            .to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required".to_string(),
            ));
        }

        let port = settings.port.unwrap_or(587);
        let use_tls = settings.tls.unwrap_or(true);

        // Port 465 uses implicit TLS; everything else uses STARTTLS when TLS is enabled.
        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host).port(port)
        };

        if let (Some(user_name), Some(password)) = (&settings.user_name, &settings.password) {
            builder = builder.credentials(Credentials::new(user_name.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn build_email(&self, message: &RenderedMessage) -> Result<Message, NotifyError> {
        let from = match &message.sender {
            Some(sender) => parse_mailbox(sender)?,
            None => self.from.clone(),
        };
        let to = if message.recipients.is_empty() {
            self.to.clone()
        } else {
            message
                .recipients
                .iter()
                .map(|addr| parse_mailbox(addr))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut builder = Message::builder().from(from);
        for recipient in to {
            builder = builder.to(recipient);
        }
        builder = builder.subject(message.subject.clone());

        let email = match &message.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.text_body.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.text_body.clone()),
        };
        email.map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    /// Send a rendered report to all configured recipients.
    async fn deliver(&self, message: &RenderedMessage) -> Result<(), NotifyError> {
        let email = self.build_email(message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(
            channel = "email",
            subject = %message.subject,
            recipients = self.to.len(),
            "notification delivered"
        );

        Ok(())
    }

    /// Returns `"email"`.
    fn channel_name(&self) -> &str {
        "email"
    }
}
