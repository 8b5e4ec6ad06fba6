//! Result and error types for Fingir.

use thiserror::Error;

/// Result type for Fingir operations
pub type FingirResult<T> = Result<T, FingirError>;

/// Errors raised by the fake request objects
///
/// Precondition violations surface synchronously through these kinds.
/// Failures inside user-supplied event handlers never do; those are caught
/// at the dispatch boundary and routed to [`crate::log::ErrorLog`].
#[derive(Debug, Error)]
pub enum FingirError {
    /// `send` called while not OPENED, or while a send is already in flight
    #[error("INVALID_STATE_ERR")]
    InvalidState,

    /// Response driven before the request was sent
    #[error("Request not sent")]
    NotSent,

    /// Response driven after the request already reached DONE
    #[error("Request done")]
    Done,

    /// Response body is not text
    #[error("Attempted to respond to fake XDomainRequest with {value}, which is not a string.")]
    InvalidBody {
        /// Description of the offending value
        value: String,
    },

    /// A ready-state code outside the request lifecycle
    #[error("Unhandled state {code}")]
    UnhandledState {
        /// The unrecognized numeric code
        code: u8,
    },
}
