//! Error types for the picture-in-picture engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to script as promise rejections or thrown exceptions
///
/// None of these are fatal: a failure is local to the call that produced it
/// and never tears down an already-open picture-in-picture window.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Missing user activation, UA policy denial, or an operation the
    /// picture-in-picture document is not permitted to perform
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    /// Invalid argument, e.g. a non-positive aspect ratio
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Operation attempted against a closed window, destroyed document or
    /// a lifecycle state that does not permit it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Unparsable URL
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Cross-origin DOM access
    #[error("Security error: {0}")]
    Security(String),

    /// Invalid node insertion
    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),

    /// Node lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Surface allocation or geometry update failed
    #[error("Compositor error: {0}")]
    Compositor(String),

    /// The opener went away while a request was in flight
    #[error("Aborted: {0}")]
    Aborted(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Syntax(err.to_string())
    }
}
