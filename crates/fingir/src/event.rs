//! Lifecycle events and the single-slot handler targets they dispatch to.
//!
//! The fake request objects follow the browser convention of one optional
//! callback per event name (`onprogress`, `onload`, ...) rather than a
//! multi-subscriber event system. [`HandlerSlot`] is that convention as a
//! type: at most one handler, last write wins, invoked inside a guarded
//! call that routes panics to the injected [`ErrorLog`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::log::ErrorLog;

/// Lifecycle notification raised by a fake request's state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    /// A response chunk is arriving (LOADING while the send flag is set)
    Progress,
    /// The exchange completed normally
    Load,
    /// The exchange failed: aborted or network-level failure (status 0)
    Error,
    /// The exchange timed out
    Timeout,
}

impl RequestEvent {
    /// Conventional handler name for this event (`"onload"`, ...), used to
    /// tag failure reports
    #[must_use]
    pub const fn handler_name(self) -> &'static str {
        match self {
            Self::Progress => "onprogress",
            Self::Load => "onload",
            Self::Error => "onerror",
            Self::Timeout => "ontimeout",
        }
    }
}

/// Boxed no-argument callback stored in a [`HandlerSlot`]
pub type Handler = Box<dyn FnMut()>;

/// Single-slot callback target.
///
/// Holds at most one handler; installing another replaces it. Handlers are
/// plain `FnMut()` closures and need not be `Send`, so tests can capture
/// `Rc`-shared state for assertions.
#[derive(Default)]
pub struct HandlerSlot {
    handler: Option<Handler>,
}

impl HandlerSlot {
    /// Empty slot
    #[must_use]
    pub fn new() -> Self {
        Self { handler: None }
    }

    /// Install a handler, replacing any previous one
    pub fn set<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Remove the handler, leaving the slot empty
    pub fn clear(&mut self) {
        self.handler = None;
    }

    /// Whether a handler is installed
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.handler.is_some()
    }

    /// Invoke the handler, if any, inside a guarded call.
    ///
    /// A panic raised by the handler is captured and handed to `log` tagged
    /// with `label`; it does not unwind into the caller unless the reporter
    /// is in [`crate::log::LogErrorMode::Raise`] mode.
    pub fn invoke_guarded(&mut self, label: &str, log: &ErrorLog) {
        if let Some(handler) = self.handler.as_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler()));
            if let Err(payload) = outcome {
                log.report(label, payload);
            }
        }
    }
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSlot")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::log::LogErrorMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    // ===== Event names =====

    #[test]
    fn test_handler_names_follow_browser_convention() {
        assert_eq!(RequestEvent::Progress.handler_name(), "onprogress");
        assert_eq!(RequestEvent::Load.handler_name(), "onload");
        assert_eq!(RequestEvent::Error.handler_name(), "onerror");
        assert_eq!(RequestEvent::Timeout.handler_name(), "ontimeout");
    }

    // ===== Slot semantics =====

    #[test]
    fn test_empty_slot_invocation_is_a_no_op() {
        let mut slot = HandlerSlot::new();
        assert!(!slot.is_set());
        slot.invoke_guarded("onload", &ErrorLog::default());
    }

    #[test]
    fn test_handler_runs_on_every_invocation() {
        let count = Rc::new(RefCell::new(0));
        let count_in_handler = Rc::clone(&count);
        let mut slot = HandlerSlot::new();
        slot.set(move || *count_in_handler.borrow_mut() += 1);

        let log = ErrorLog::default();
        slot.invoke_guarded("onprogress", &log);
        slot.invoke_guarded("onprogress", &log);

        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_last_write_wins() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::clone(&seen);
        let second = Rc::clone(&seen);

        let mut slot = HandlerSlot::new();
        slot.set(move || first.borrow_mut().push("first"));
        slot.set(move || second.borrow_mut().push("second"));
        slot.invoke_guarded("onload", &ErrorLog::default());

        assert_eq!(seen.borrow().as_slice(), &["second"]);
    }

    #[test]
    fn test_clear_empties_the_slot() {
        let mut slot = HandlerSlot::new();
        slot.set(|| {});
        assert!(slot.is_set());
        slot.clear();
        assert!(!slot.is_set());
    }

    // ===== Guarded invocation =====

    #[test]
    fn test_panicking_handler_is_reported_not_propagated() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in_sink = Rc::clone(&seen);
        let log = ErrorLog::new(LogErrorMode::Log).with_sink(Rc::new(move |label, message| {
            seen_in_sink
                .borrow_mut()
                .push((label.to_string(), message.to_string()));
        }));

        let mut slot = HandlerSlot::new();
        slot.set(|| panic!("handler exploded"));
        slot.invoke_guarded("onerror", &log);

        assert_eq!(
            seen.borrow().as_slice(),
            &[("onerror".to_string(), "handler exploded".to_string())]
        );
    }

    #[test]
    fn test_slot_survives_a_panicking_handler() {
        let mut slot = HandlerSlot::new();
        slot.set(|| panic!("still installed afterwards"));
        slot.invoke_guarded("ontimeout", &ErrorLog::new(LogErrorMode::Quiet));
        assert!(slot.is_set());
    }
}
