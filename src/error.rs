use thiserror::Error;

/// Errors surfaced by the driver core.
///
/// Codec and validation failures are synchronous; the remaining variants are
/// delivered asynchronously to the caller awaiting a pending call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// A value failed validation at encode time (e.g. malformed identifier).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The codec was asked to handle a type or tag it does not recognize.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A freshly generated correlation token is already registered.
    ///
    /// Internal only: the dispatcher retries with a new token and never
    /// surfaces this to the caller.
    #[error("Correlation token already in flight: {0}")]
    TokenCollision(String),

    /// The call's deadline elapsed before a response arrived.
    #[error("Request timed out")]
    Timeout,

    /// The server returned an explicit error payload.
    #[error("Server error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The connection was torn down while the call was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A malformed envelope or payload shape on the wire.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Convenience alias used throughout the crate.
pub type DriverResult<T> = Result<T, DriverError>;
