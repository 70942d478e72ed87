//! Launch rejection reasons.
//!
//! Every failure is recoverable by rejecting the launch. [`LaunchError`]
//! carries the detail for the operator log; [`ErrorKind`] is the stable
//! classification reported alongside it.

use std::fmt;

use ltigate_auth::AuthError;

use crate::store::StoreError;

/// Classification of a launch rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A required parameter is absent or empty.
    MissingParameter,
    /// A parameter does not carry its mandated literal value.
    InvalidParameterValue,
    /// The `Authorization` header or request URL could not be parsed.
    OAuthParsingFailure,
    /// The OAuth signature does not match.
    SignatureMismatch,
    /// The consumer key is not registered.
    CredentialNotFound,
    /// Neither the Instructor nor the Learner role was claimed.
    MissingRole,
    /// The session could not be written.
    SessionStoreFailure,
}

impl ErrorKind {
    /// Returns the kind name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::OAuthParsingFailure => "OAuthParsingFailure",
            Self::SignatureMismatch => "SignatureMismatch",
            Self::CredentialNotFound => "CredentialNotFound",
            Self::MissingRole => "MissingRole",
            Self::SessionStoreFailure => "SessionStoreFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reason for rejecting a launch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    /// A required parameter is absent or empty.
    #[error("Missing {0}.")]
    MissingParameter(String),

    /// A parameter carries the wrong value.
    #[error("Wrong {name} ({value}).")]
    InvalidParameterValue {
        /// Parameter name.
        name: String,
        /// The value received.
        value: String,
    },

    /// The `Authorization` header or request URL could not be parsed.
    #[error("OAuth failure ({0}).")]
    OAuthParsingFailure(String),

    /// The OAuth signature does not match.
    #[error("Signature mismatch.")]
    SignatureMismatch,

    /// The consumer key is not registered.
    #[error("Unknown oauth_consumer_key ({0}).")]
    CredentialNotFound(String),

    /// Neither the Instructor nor the Learner role was claimed.
    #[error("Missing required instructor or learner role ({0}).")]
    MissingRole(String),

    /// The session store rejected the write.
    #[error("Session store failure ({0}).")]
    SessionStoreFailure(String),
}

impl LaunchError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingParameter(_) => ErrorKind::MissingParameter,
            Self::InvalidParameterValue { .. } => ErrorKind::InvalidParameterValue,
            Self::OAuthParsingFailure(_) => ErrorKind::OAuthParsingFailure,
            Self::SignatureMismatch => ErrorKind::SignatureMismatch,
            Self::CredentialNotFound(_) => ErrorKind::CredentialNotFound,
            Self::MissingRole(_) => ErrorKind::MissingRole,
            Self::SessionStoreFailure(_) => ErrorKind::SessionStoreFailure,
        }
    }

    pub(crate) fn invalid(name: &str, value: &str) -> Self {
        Self::InvalidParameterValue {
            name: name.to_owned(),
            value: value.to_owned(),
        }
    }
}

impl From<AuthError> for LaunchError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidAuthHeader(reason) => Self::OAuthParsingFailure(reason),
            AuthError::InvalidUrl(url) => Self::OAuthParsingFailure(format!("invalid URL {url}")),
            AuthError::MissingParameter(name) => Self::MissingParameter(name.to_owned()),
            AuthError::UnsupportedSignatureMethod(method) => {
                Self::invalid("oauth_signature_method", &method)
            }
            AuthError::ConsumerKeyNotFound(key) => Self::CredentialNotFound(key),
            AuthError::SignatureDoesNotMatch => Self::SignatureMismatch,
        }
    }
}

impl From<StoreError> for LaunchError {
    fn from(err: StoreError) -> Self {
        Self::SessionStoreFailure(err.to_string())
    }
}

/// One `(kind, message)` entry of a rejection report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    /// Error classification.
    pub kind: ErrorKind,
    /// Operator-facing message.
    pub message: String,
}

impl From<&LaunchError> for Diagnostic {
    fn from(err: &LaunchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
