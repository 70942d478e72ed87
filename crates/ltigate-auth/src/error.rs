//! Error types for OAuth 1.0a authentication.
//!
//! All authentication failures are represented by [`AuthError`], which provides
//! specific variants for each failure mode encountered during verification.

/// Errors that can occur while verifying an OAuth 1.0a signed request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header is present but could not be parsed.
    #[error("Invalid OAuth Authorization header: {0}")]
    InvalidAuthHeader(String),

    /// The request URL could not be normalized for signing.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// A parameter required for verification is absent.
    #[error("Missing OAuth parameter: {0}")]
    MissingParameter(&'static str),

    /// The signature method is not supported (only HMAC-SHA1 is supported).
    #[error("Unsupported signature method: {0}")]
    UnsupportedSignatureMethod(String),

    /// The consumer key was not found in the credential store.
    #[error("Consumer key not found: {0}")]
    ConsumerKeyNotFound(String),

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,
}
