//! Error types for the fetch bridge.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while translating or registering a bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host request could not be assembled into a [`Request`](crate::Request).
    /// Reported through the "fail" continuation; the handler never runs.
    #[error("invalid request: {0}")]
    Construction(String),

    #[error("fetch bridge is already registered")]
    AlreadyRegistered,

    #[error("host error: {0}")]
    Host(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Sticky terminal error of a [`StreamReader`](crate::StreamReader).
///
/// Handlers see it as the inner error of a `std::io::Error` of kind
/// `Other`, so it can be recovered with `get_ref()` and `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
    /// The host rejected a pull; carries the host-reported message.
    #[error("{0}")]
    Host(String),

    #[error("http reader is closed")]
    Closed,
}

impl From<BodyError> for std::io::Error {
    fn from(err: BodyError) -> Self {
        std::io::Error::other(err)
    }
}
