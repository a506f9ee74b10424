//! In-process exception alerting for request-handling applications.
//!
//! When an unhandled error occurs, this crate decides whether it is worth
//! reporting, assembles a structured and privacy-filtered report, renders
//! it per channel, and delivers it inline or in the background.
//!
//! Pipeline, per registered channel:
//! - [`ignore::should_notify`] — suppression policy (ignored classes,
//!   crawler user agents, custom predicate)
//! - [`ContextExtractor`] — exception + environment → [`ExceptionReport`],
//!   degrading malformed data to warnings instead of failing
//! - [`FilterPolicy`] — sensitive-key redaction over session/params
//! - [`ReportRenderer`] — subject, text body, optional HTML body, headers
//! - [`Notifier`] — delivery backend (email via SMTP, webhook over HTTP)
//!
//! Channels are registered once at startup in a [`NotifierRegistry`] and
//! evaluated independently on every dispatch.

pub mod config;
pub mod context;
pub mod email;
pub mod exception;
pub mod filter;
pub mod ignore;
pub mod registry;
pub mod render;
pub mod traits;
pub mod webhook;

pub use config::{CustomSection, EmailFormat, NotifierConfig};
pub use context::{ContextExtractor, ExceptionReport, Section};
pub use email::{EmailNotifier, SmtpSettings};
pub use exception::{CaughtException, Cause, Frame};
pub use filter::{FilterPolicy, FILTERED};
pub use registry::{DeliveryMode, DispatchResult, Dispatcher, NotifierRegistry, Registration};
pub use render::{RenderedMessage, ReportRenderer};
pub use traits::{Notifier, NotifyError};
pub use webhook::WebhookNotifier;
