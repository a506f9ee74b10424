//! Named notifier registrations and the dispatch pipeline.
//!
//! The registry maps channel names to `(NotifierConfig, Notifier)` pairs.
//! It is populated at application start and read concurrently by every
//! request; re-registration is synchronized and replaces in place.
//!
//! Dispatch evaluates each channel independently: suppression, extraction,
//! redaction, and rendering all use that channel's own config, and one
//! channel's suppression or failure never affects another's delivery. No
//! lock is held while a delivery is in flight.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::config::NotifierConfig;
use crate::context::ContextExtractor;
use crate::exception::CaughtException;
use crate::filter::FilterPolicy;
use crate::ignore;
use crate::render::{RenderedMessage, ReportRenderer};
use crate::traits::{Notifier, NotifyError};

/// One registered channel: its config and its delivery backend.
pub struct Registration {
    pub name: String,
    pub config: NotifierConfig,
    pub notifier: Arc<dyn Notifier>,
}

/// Process-wide mapping from channel name to registration, in
/// registration order.
#[derive(Default)]
pub struct NotifierRegistry {
    inner: RwLock<IndexMap<String, Arc<Registration>>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. Re-registering an existing name replaces its
    /// config and backend, keeping its position.
    pub fn register(
        &self,
        name: impl Into<String>,
        config: NotifierConfig,
        notifier: Arc<dyn Notifier>,
    ) {
        let name = name.into();
        let registration = Arc::new(Registration {
            name: name.clone(),
            config,
            notifier,
        });
        self.inner.write().insert(name, registration);
    }

    /// All registrations except the named ones, in registration order.
    pub fn notifiers_except(&self, excluding: &[&str]) -> Vec<Arc<Registration>> {
        self.inner
            .read()
            .values()
            .filter(|r| !excluding.contains(&r.name.as_str()))
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Registration>> {
        self.inner.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Whether dispatch blocks on delivery or hands it to the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Block the caller until every channel has delivered or failed.
    #[default]
    Inline,
    /// Fire-and-forget: deliveries run as spawned tasks that outlive the
    /// dispatch call; failures are logged, never surfaced.
    Background,
}

/// Result of dispatching through a single channel.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub channel: String,
    /// The channel's ignore policy matched; nothing was rendered.
    pub suppressed: bool,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Runs the decision-and-payload pipeline for every registered channel.
pub struct Dispatcher {
    registry: Arc<NotifierRegistry>,
    renderer: Arc<ReportRenderer>,
}

impl Dispatcher {
    pub fn new(registry: Arc<NotifierRegistry>) -> Self {
        Self::with_renderer(registry, ReportRenderer::new())
    }

    pub fn with_renderer(registry: Arc<NotifierRegistry>, renderer: ReportRenderer) -> Self {
        Self {
            registry,
            renderer: Arc::new(renderer),
        }
    }

    /// Dispatch an exception through every registered channel not in
    /// `excluding`.
    ///
    /// Inline mode returns one result per channel. Background mode returns
    /// immediately with no results; each channel runs as its own task.
    pub async fn dispatch(
        &self,
        exception: &CaughtException,
        env: &Value,
        extra: Option<Value>,
        excluding: &[&str],
        mode: DeliveryMode,
    ) -> Vec<DispatchResult> {
        // Snapshot under the read lock, run the pipeline outside it.
        let registrations = self.registry.notifiers_except(excluding);
        if registrations.is_empty() {
            tracing::debug!("no notification channels registered");
            return Vec::new();
        }

        match mode {
            DeliveryMode::Inline => {
                let mut results = Vec::with_capacity(registrations.len());
                for registration in registrations {
                    results.push(
                        run_channel(&registration, &self.renderer, exception, env, extra.clone())
                            .await,
                    );
                }
                results
            }
            DeliveryMode::Background => {
                for registration in registrations {
                    let renderer = Arc::clone(&self.renderer);
                    let exception = exception.clone();
                    let env = env.clone();
                    let extra = extra.clone();
                    tokio::spawn(async move {
                        run_channel(&registration, &renderer, &exception, &env, extra).await;
                    });
                }
                Vec::new()
            }
        }
    }

    /// Render a message for one named channel without any delivery
    /// decision, for callers who have already decided to notify.
    pub fn create_message(
        &self,
        name: &str,
        exception: &CaughtException,
        env: &Value,
        extra: Option<Value>,
    ) -> Result<RenderedMessage, NotifyError> {
        let registration = self
            .registry
            .get(name)
            .ok_or_else(|| NotifyError::Config(format!("no notifier registered as '{name}'")))?;
        render_for(&registration, &self.renderer, exception, env, extra)
    }
}

fn render_for(
    registration: &Registration,
    renderer: &ReportRenderer,
    exception: &CaughtException,
    env: &Value,
    extra: Option<Value>,
) -> Result<RenderedMessage, NotifyError> {
    let filter = FilterPolicy::new(registration.config.sensitive_keys.iter());
    let report = ContextExtractor.extract(exception, env, extra, &filter);
    renderer.render(&report, &registration.config)
}

/// Run one channel's full pipeline: ignore policy, extraction, rendering,
/// delivery. Always logs the outcome.
async fn run_channel(
    registration: &Registration,
    renderer: &ReportRenderer,
    exception: &CaughtException,
    env: &Value,
    extra: Option<Value>,
) -> DispatchResult {
    let start = Instant::now();
    let channel = registration.name.clone();

    if !ignore::should_notify(exception, env, &registration.config) {
        return DispatchResult {
            channel,
            suppressed: true,
            success: false,
            error: None,
            duration_ms: start.elapsed().as_millis() as u64,
        };
    }

    let outcome = match render_for(registration, renderer, exception, env, extra) {
        Ok(message) => registration.notifier.deliver(&message).await,
        Err(e) => Err(e),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    let (success, error) = match outcome {
        Ok(()) => {
            tracing::info!(
                channel = %channel,
                class = %exception.class_name,
                duration_ms,
                "notification delivered"
            );
            (true, None)
        }
        Err(e) => {
            tracing::warn!(
                channel = %channel,
                class = %exception.class_name,
                error = %e,
                duration_ms,
                "notification delivery failed"
            );
            (false, Some(e.to_string()))
        }
    };

    DispatchResult {
        channel,
        suppressed: false,
        success,
        error,
        duration_ms,
    }
}
