//! The fake cross-domain request object.
//!
//! A deterministic, in-process stand-in for the browser's legacy
//! cross-domain request API: no real network, no scheduling, every
//! operation synchronous. Test code drives a request through
//! `open` → `send` → `respond` (or `abort` / `simulate_timeout`) and the
//! object fires its lifecycle events inline, chunking response bodies the
//! way the real object streams them.
//!
//! The simulated object keeps the real one's quirks on purpose: no header
//! introspection beyond the fixed Content-Type stamped by `send`, a coarse
//! status model where only 0 means failure, and a reduced lifecycle with no
//! header-receipt phase.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event::{HandlerSlot, RequestEvent};
use crate::log::{ErrorLog, LogErrorMode, LogSink};
use crate::registry;
use crate::result::{FingirError, FingirResult};

/// Content-Type stamped on every request by `send`
pub const CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// Characters delivered per simulated response chunk, unless configured
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Request lifecycle phase.
///
/// Numeric codes are 0, 1, 3, 4. Code 2 ("headers received" in full XHR
/// lifecycles) is intentionally absent: the cross-domain object has no
/// header-receipt phase, and the gap is preserved for consumers that branch
/// on the numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReadyState {
    /// Not yet opened
    Unsent,
    /// Opened; also re-announced by `send`, which fires no event
    Opened,
    /// A response chunk is being delivered
    Loading,
    /// Terminal: loaded, failed, or timed out
    Done,
}

impl ReadyState {
    /// Numeric code exposed by the browser object
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Unsent => 0,
            Self::Opened => 1,
            Self::Loading => 3,
            Self::Done => 4,
        }
    }

    /// Decode a numeric ready-state code.
    ///
    /// This is the only door through which a forged state can enter the
    /// machine; codes outside the lifecycle (2 included) fail with
    /// [`FingirError::UnhandledState`].
    pub fn from_code(code: u8) -> FingirResult<Self> {
        match code {
            0 => Ok(Self::Unsent),
            1 => Ok(Self::Opened),
            3 => Ok(Self::Loading),
            4 => Ok(Self::Done),
            _ => Err(FingirError::UnhandledState { code }),
        }
    }
}

/// Options accepted by the fake request constructors.
#[derive(Clone)]
pub struct RequestConfig {
    /// How captured handler failures surface
    pub log_mode: LogErrorMode,
    /// Custom failure sink; reports go to `tracing` when absent
    pub sink: Option<LogSink>,
    /// Delivery granularity in characters; 0 falls back to
    /// [`DEFAULT_CHUNK_SIZE`]
    pub chunk_size: usize,
    /// Timeout knob carried on the request; no wall-clock behavior
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Configuration with all defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            log_mode: LogErrorMode::default(),
            sink: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: None,
        }
    }

    /// Set the failure-reporting mode
    #[must_use]
    pub fn with_log_mode(mut self, log_mode: LogErrorMode) -> Self {
        self.log_mode = log_mode;
        self
    }

    /// Route failure reports to a custom sink
    #[must_use]
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the delivery chunk size
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the carried timeout knob
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("log_mode", &self.log_mode)
            .field("has_sink", &self.sink.is_some())
            .field("chunk_size", &self.chunk_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Callback invoked by `send`, receiving the request that was dispatched
pub type SendHandler = Box<dyn FnMut(&FakeXDomainRequest)>;

#[derive(Default)]
struct Handlers {
    send: Option<SendHandler>,
    progress: HandlerSlot,
    load: HandlerSlot,
    error: HandlerSlot,
    timeout: HandlerSlot,
}

/// Deterministic fake of the browser's cross-domain request object.
///
/// One instance simulates one request/response cycle (re-`open` starts the
/// next). All operations run to completion synchronously; lifecycle events
/// fire inline within the triggering call.
///
/// # Examples
///
/// ```
/// use jugar_fingir::FakeXDomainRequest;
///
/// let mut request = FakeXDomainRequest::new();
/// request.open("GET", "/inventory");
/// request.send(None).unwrap();
/// request.respond(Some(200), None, "3 items").unwrap();
///
/// assert_eq!(request.status(), 200);
/// assert_eq!(request.response_text(), Some("3 items"));
/// ```
pub struct FakeXDomainRequest {
    ready_state: ReadyState,
    method: Option<String>,
    url: Option<String>,
    request_body: Option<String>,
    request_headers: HashMap<String, String>,
    /// Set by `send`; cleared only by `abort` and re-`open`, never by
    /// completion (a quirk of the simulated object)
    send_flag: bool,
    error_flag: bool,
    aborted: bool,
    is_timeout: bool,
    status: u16,
    response_text: Option<String>,
    timeout: Option<Duration>,
    chunk_size: usize,
    handlers: Handlers,
    log_error: ErrorLog,
}

impl FakeXDomainRequest {
    /// Numeric code for [`ReadyState::Unsent`]
    pub const UNSENT: u8 = 0;
    /// Numeric code for [`ReadyState::Opened`]
    pub const OPENED: u8 = 1;
    /// Numeric code for [`ReadyState::Loading`]
    pub const LOADING: u8 = 3;
    /// Numeric code for [`ReadyState::Done`]
    pub const DONE: u8 = 4;

    /// Create a request with the default configuration.
    ///
    /// If a creation hook is registered via
    /// [`crate::registry::set_on_create`], it observes the new instance
    /// before this returns.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RequestConfig::default())
    }

    /// Create a request with the given configuration
    #[must_use]
    pub fn with_config(config: RequestConfig) -> Self {
        let mut log_error = ErrorLog::new(config.log_mode);
        if let Some(sink) = config.sink {
            log_error = log_error.with_sink(sink);
        }
        let mut request = Self {
            ready_state: ReadyState::Unsent,
            method: None,
            url: None,
            request_body: None,
            request_headers: HashMap::new(),
            send_flag: false,
            error_flag: false,
            aborted: false,
            is_timeout: false,
            status: 0,
            response_text: None,
            timeout: config.timeout,
            chunk_size: config.chunk_size,
            handlers: Handlers::default(),
            log_error,
        };
        registry::run_on_create(&mut request);
        request
    }

    // ===== Lifecycle operations =====

    /// Open (or re-open) the request.
    ///
    /// Valid from any state. Resets the response text and the send flag,
    /// then transitions to OPENED; no event fires for OPENED. Terminal-cause
    /// flags from a previous cycle are not reset.
    pub fn open(&mut self, method: impl Into<String>, url: impl Into<String>) {
        self.method = Some(method.into());
        self.url = Some(url.into());

        self.response_text = None;
        self.send_flag = false;

        self.ready_state_change(ReadyState::Opened);
    }

    /// Dispatch the request.
    ///
    /// Fails with [`FingirError::InvalidState`] unless the request is
    /// OPENED with no send in flight. Stores `data` as the request body
    /// (HEAD-like methods, case-insensitively, carry none), stamps the fixed
    /// Content-Type header, clears the error flag, raises the send flag, and
    /// re-announces OPENED without firing an event. The send observer, if
    /// installed, then receives the request; that callback is not guarded,
    /// so a panic in it propagates.
    pub fn send(&mut self, data: Option<&str>) -> FingirResult<()> {
        self.verify_state()?;

        let head_like = self
            .method
            .as_deref()
            .is_some_and(|method| method.eq_ignore_ascii_case("head"));
        if !head_like {
            self.request_body = data.map(str::to_string);
        }
        self.request_headers
            .insert("Content-Type".to_string(), CONTENT_TYPE.to_string());

        self.error_flag = false;
        self.send_flag = true;
        self.ready_state_change(ReadyState::Opened);

        if let Some(mut handler) = self.handlers.send.take() {
            handler(self);
            // last write wins: keep a handler installed during the call
            if self.handlers.send.is_none() {
                self.handlers.send = Some(handler);
            }
        }
        Ok(())
    }

    /// Abort the request.
    ///
    /// Always marks the request aborted and failed and clears the response
    /// text. Only a request past UNSENT with the send flag raised
    /// transitions to DONE (firing the error event); aborting before `send`
    /// leaves the state where it was.
    pub fn abort(&mut self) {
        self.aborted = true;
        self.response_text = None;
        self.error_flag = true;

        if self.ready_state > ReadyState::Unsent && self.send_flag {
            self.ready_state_change(ReadyState::Done);
            self.send_flag = false;
        }
    }

    /// Deliver a response body in simulated chunks.
    ///
    /// Fails with [`FingirError::NotSent`] before `send`,
    /// [`FingirError::Done`] once the request completed, and
    /// [`FingirError::InvalidBody`] when `body` is not text (valid UTF-8).
    ///
    /// Delivery appends `chunk_size` characters per LOADING transition;
    /// each transition fires a progress event while the send flag is up.
    /// The loop body runs before its exit check, so even an empty body
    /// produces one LOADING pass. Afterwards the request transitions to
    /// DONE, firing load, error, or timeout per the current flags.
    pub fn set_response_body(&mut self, body: impl AsRef<[u8]>) -> FingirResult<()> {
        self.verify_request_sent()?;
        let body = verify_response_body(body.as_ref())?;

        let chunk_size = if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        };
        let chars: Vec<char> = body.chars().collect();
        let mut index = 0;
        self.response_text = Some(String::new());

        loop {
            self.ready_state_change(ReadyState::Loading);
            let end = (index + chunk_size).min(chars.len());
            if let Some(text) = self.response_text.as_mut() {
                text.extend(&chars[index..end]);
            }
            index += chunk_size;
            if index >= chars.len() {
                break;
            }
        }

        self.ready_state_change(ReadyState::Done);
        Ok(())
    }

    /// Set the status and deliver a body.
    ///
    /// `status` defaults to 200 when `None`. The status is assigned before
    /// delivery, so a rejected body still leaves it mutated.
    pub fn respond(
        &mut self,
        status: Option<u16>,
        _content_type: Option<&str>,
        body: impl AsRef<[u8]>,
    ) -> FingirResult<()> {
        // The content type is accepted but ignored: the real object carries
        // none. The parameter keeps respond(...) call-compatible with the
        // richer sibling fakes so suites can swap objects freely.
        self.status = status.unwrap_or(200);
        self.set_response_body(body)
    }

    /// Simulate a timeout.
    ///
    /// Sets status 0, marks the timeout, makes the response text unreadable
    /// (not merely empty), and transitions directly to DONE, firing the
    /// timeout event.
    pub fn simulate_timeout(&mut self) {
        self.status = 0;
        self.is_timeout = true;
        self.response_text = None;
        self.ready_state_change(ReadyState::Done);
    }

    /// Record a state and run the event-dispatch rule.
    ///
    /// At most one event fires per transition: LOADING raises progress only
    /// while the send flag is up; DONE raises timeout, else error when the
    /// error flag is set or the status is 0, else load. UNSENT and OPENED
    /// announce nothing.
    pub fn ready_state_change(&mut self, state: ReadyState) {
        self.ready_state = state;
        let event = match state {
            ReadyState::Unsent | ReadyState::Opened => None,
            ReadyState::Loading => self.send_flag.then_some(RequestEvent::Progress),
            ReadyState::Done => Some(if self.is_timeout {
                RequestEvent::Timeout
            } else if self.error_flag || self.status == 0 {
                RequestEvent::Error
            } else {
                RequestEvent::Load
            }),
        };
        if let Some(event) = event {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: RequestEvent) {
        let slot = match event {
            RequestEvent::Progress => &mut self.handlers.progress,
            RequestEvent::Load => &mut self.handlers.load,
            RequestEvent::Error => &mut self.handlers.error,
            RequestEvent::Timeout => &mut self.handlers.timeout,
        };
        slot.invoke_guarded(event.handler_name(), &self.log_error);
    }

    fn verify_state(&self) -> FingirResult<()> {
        if self.ready_state != ReadyState::Opened || self.send_flag {
            return Err(FingirError::InvalidState);
        }
        Ok(())
    }

    fn verify_request_sent(&self) -> FingirResult<()> {
        if self.ready_state == ReadyState::Unsent {
            return Err(FingirError::NotSent);
        }
        if self.ready_state == ReadyState::Done {
            return Err(FingirError::Done);
        }
        Ok(())
    }

    // ===== Extension points =====

    /// Install the send observer, replacing any previous one.
    ///
    /// Receives the request right after `send` dispatches it, letting a
    /// harness capture what the code under test transmitted.
    pub fn on_send<F>(&mut self, handler: F)
    where
        F: FnMut(&FakeXDomainRequest) + 'static,
    {
        self.handlers.send = Some(Box::new(handler));
    }

    /// Install the progress handler, replacing any previous one
    pub fn on_progress<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.handlers.progress.set(handler);
    }

    /// Install the load handler, replacing any previous one
    pub fn on_load<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.handlers.load.set(handler);
    }

    /// Install the error handler, replacing any previous one
    pub fn on_error<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.handlers.error.set(handler);
    }

    /// Install the timeout handler, replacing any previous one
    pub fn on_timeout<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.handlers.timeout.set(handler);
    }

    // ===== Accessors =====

    /// Current lifecycle phase
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// Status code; 0 denotes network-level failure or timeout
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response text accumulated so far.
    ///
    /// `None` before any delivery and after a timeout; [`Self::timed_out`]
    /// distinguishes "unreadable" from "not yet delivered".
    #[must_use]
    pub fn response_text(&self) -> Option<&str> {
        self.response_text.as_deref()
    }

    /// Headers attached to the request
    #[must_use]
    pub fn request_headers(&self) -> &HashMap<String, String> {
        &self.request_headers
    }

    /// Body passed to `send`; `None` for HEAD-like methods
    #[must_use]
    pub fn request_body(&self) -> Option<&str> {
        self.request_body.as_deref()
    }

    /// Method set by `open`
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// URL set by `open`
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Carried timeout knob
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the carried timeout knob
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Configured delivery chunk size
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Set the delivery chunk size; 0 falls back to [`DEFAULT_CHUNK_SIZE`]
    /// at delivery time
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    /// Whether a send is in flight (never lowered by completion)
    #[must_use]
    pub fn send_flag(&self) -> bool {
        self.send_flag
    }

    /// Whether `abort` was called on this instance
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Whether the request ended in a simulated timeout
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.is_timeout
    }

    /// Capture the observable fields for later assertions
    #[must_use]
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            ready_state: self.ready_state,
            method: self.method.clone(),
            url: self.url.clone(),
            request_body: self.request_body.clone(),
            request_headers: self.request_headers.clone(),
            status: self.status,
            response_text: self.response_text.clone(),
            aborted: self.aborted,
            timed_out: self.is_timeout,
        }
    }
}

impl Default for FakeXDomainRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FakeXDomainRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeXDomainRequest")
            .field("ready_state", &self.ready_state)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("status", &self.status)
            .field("send_flag", &self.send_flag)
            .field("error_flag", &self.error_flag)
            .field("aborted", &self.aborted)
            .field("is_timeout", &self.is_timeout)
            .field("response_text", &self.response_text)
            .finish()
    }
}

/// Point-in-time copy of a request's observable fields, for harness
/// captures and assertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    /// Lifecycle phase at capture time
    pub ready_state: ReadyState,
    /// Method set by `open`
    pub method: Option<String>,
    /// URL set by `open`
    pub url: Option<String>,
    /// Body passed to `send`
    pub request_body: Option<String>,
    /// Headers attached to the request
    pub request_headers: HashMap<String, String>,
    /// Status code at capture time
    pub status: u16,
    /// Response text accumulated at capture time
    pub response_text: Option<String>,
    /// Whether the request was aborted
    pub aborted: bool,
    /// Whether the request ended in a simulated timeout
    pub timed_out: bool,
}

fn verify_response_body(body: &[u8]) -> FingirResult<&str> {
    std::str::from_utf8(body).map_err(|_| FingirError::InvalidBody {
        value: format!("{body:?}"),
    })
}
