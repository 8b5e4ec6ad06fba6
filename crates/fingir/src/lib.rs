//! Fingir: Deterministic Fakes for Cross-Domain Browser Requests
//!
//! Fingir (Spanish: "to fake/pretend") provides an in-process double for
//! the browser's legacy cross-domain request object. Nothing touches the
//! network and nothing is scheduled: test code drives the request through
//! its lifecycle and every event handler fires synchronously inside the
//! call that caused it, so suites stay deterministic and instantaneous.
//!
//! # Request lifecycle
//!
//! ```text
//! ┌────────┐  open()  ┌────────┐  send()  ┌─────────┐ chunks ┌──────┐
//! │ UNSENT │─────────►│ OPENED │─────────►│ LOADING │───────►│ DONE │
//! │   0    │          │   1    │          │    3    │  ...   │  4   │
//! └────────┘          └────────┘          └─────────┘        └──────┘
//!                                         onprogress ×N      onload
//!                                                            onerror
//!                                                            ontimeout
//! ```
//!
//! Code 2 is skipped: the cross-domain object never had a header-receipt
//! phase. `abort()` and `simulate_timeout()` jump straight to DONE.
//!
//! # Quick start
//!
//! ```
//! use jugar_fingir::prelude::*;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let mut request = FakeXDomainRequest::new();
//!
//! let loads = Rc::new(RefCell::new(0));
//! let counter = Rc::clone(&loads);
//! request.on_load(move || *counter.borrow_mut() += 1);
//!
//! request.open("GET", "/stock/quote");
//! request.send(None)?;
//! request.respond(Some(200), None, "42.17")?;
//!
//! assert_eq!(request.response_text(), Some("42.17"));
//! assert_eq!(*loads.borrow(), 1);
//! # Ok::<(), jugar_fingir::FingirError>(())
//! ```
//!
//! Harnesses that resolve the constructor dynamically swap the fake in
//! for a scope with [`use_fake_xdomain_request`]; the returned guard
//! restores the previous binding when dropped.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod event;
mod log;
pub mod registry;
mod request;
mod result;

pub use event::{Handler, HandlerSlot, RequestEvent};
pub use log::{panic_message, ErrorLog, LogErrorMode, LogSink};
pub use registry::{use_fake_xdomain_request, BuildFn, Constructor, CreateHook, FakeXdrGuard};
pub use request::{
    FakeXDomainRequest, ReadyState, RequestConfig, RequestSnapshot, SendHandler, CONTENT_TYPE,
    DEFAULT_CHUNK_SIZE,
};
pub use result::{FingirError, FingirResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::event::*;
    pub use super::log::*;
    pub use super::registry::*;
    pub use super::request::*;
    pub use super::result::*;
}
