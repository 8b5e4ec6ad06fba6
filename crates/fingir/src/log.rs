//! Handler-failure reporting for the fake request objects.
//!
//! Lifecycle-event handlers run inside a guarded call; a panic there is
//! captured and handed to an [`ErrorLog`] instead of unwinding through the
//! operation that triggered the event. The reporter is injected per request
//! via [`crate::request::RequestConfig`].

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// How captured handler failures surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogErrorMode {
    /// Report failures as `tracing` error events (or to the custom sink)
    #[default]
    Log,
    /// Discard failures silently
    Quiet,
    /// Report, then re-raise the original panic
    Raise,
}

/// Custom destination for failure reports: receives (handler label, message)
pub type LogSink = Rc<dyn Fn(&str, &str)>;

/// Error reporter injected into each fake request.
///
/// With no sink configured, reports become `tracing::error!` events, which
/// stay silent until the embedding harness installs a subscriber.
#[derive(Clone, Default)]
pub struct ErrorLog {
    mode: LogErrorMode,
    sink: Option<LogSink>,
}

impl ErrorLog {
    /// Create a reporter with the given mode and no custom sink
    #[must_use]
    pub fn new(mode: LogErrorMode) -> Self {
        Self { mode, sink: None }
    }

    /// Route reports to a custom sink instead of `tracing`
    #[must_use]
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Current reporting mode
    #[must_use]
    pub fn mode(&self) -> LogErrorMode {
        self.mode
    }

    /// Report a panic captured from the named handler.
    ///
    /// `label` is the conventional handler name, e.g. `"onload"`.
    /// [`LogErrorMode::Quiet`] discards the report; [`LogErrorMode::Raise`]
    /// re-raises the payload after reporting, so the original panic reaches
    /// the caller of the triggering operation.
    pub fn report(&self, label: &str, payload: Box<dyn Any + Send>) {
        let message = panic_message(payload.as_ref());
        match self.mode {
            LogErrorMode::Quiet => {}
            LogErrorMode::Log | LogErrorMode::Raise => {
                if let Some(sink) = &self.sink {
                    sink(label, &message);
                } else {
                    tracing::error!(handler = label, "fake request handler panicked: {message}");
                }
            }
        }
        if self.mode == LogErrorMode::Raise {
            std::panic::resume_unwind(payload);
        }
    }
}

impl fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorLog")
            .field("mode", &self.mode)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Extract a readable message from a panic payload.
///
/// Handles the two payload types `panic!` produces (`&str` for literal
/// messages, `String` for formatted ones) and falls back to a fixed marker
/// for custom payloads raised through `panic_any`.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
