//! crates/logging/src/capture.rs
//! In-memory collection of categorised diagnostics.
//!
//! [`CaptureLayer`] records every event whose target belongs to a
//! [`LogCategory`]. Tests and embedding applications use it to inspect what
//! the core reported without parsing formatted output.

use crate::LogCategory;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Diagnostic collected by a [`CaptureLayer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiagnosticEvent {
    /// Subsystem that emitted the event.
    pub category: LogCategory,
    /// Severity of the event.
    pub level: Level,
    /// Rendered message.
    pub message: String,
}

/// Shared buffer filled by a [`CaptureLayer`].
#[derive(Clone, Debug, Default)]
pub struct CapturedEvents {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl CapturedEvents {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a layer that appends into this buffer.
    #[must_use]
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer {
            events: Arc::clone(&self.events),
        }
    }

    /// Removes and returns every collected event.
    pub fn drain(&self) -> Vec<DiagnosticEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.drain(..).collect()
    }

    /// Returns the events recorded for `category`, leaving the buffer intact.
    pub fn for_category(&self, category: LogCategory) -> Vec<DiagnosticEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events
            .iter()
            .filter(|event| event.category == category)
            .cloned()
            .collect()
    }
}

/// Layer that records categorised events.
pub struct CaptureLayer {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let Some(category) = LogCategory::from_target(metadata.target()) else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = visitor.message.unwrap_or_default();

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DiagnosticEvent {
                category,
                level: *metadata.level(),
                message,
            });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        }
    }
}

/// Runs `f` with a thread-local subscriber that captures categorised events.
///
/// Only events emitted on the calling thread are collected.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<DiagnosticEvent>) {
    use tracing_subscriber::layer::SubscriberExt;

    let captured = CapturedEvents::new();
    let subscriber = tracing_subscriber::registry().with(captured.layer());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, captured.drain())
}
