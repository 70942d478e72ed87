//! Error types for the LtiGate core.

/// Core error type for LtiGate infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum LtiGateError {
    /// A session identifier was not a well-formed UUID.
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for LtiGate operations.
pub type LtiGateResult<T> = Result<T, LtiGateError>;
