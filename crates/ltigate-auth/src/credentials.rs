//! Consumer secret lookup.
//!
//! This module defines the [`CredentialProvider`] trait for resolving the
//! shared secret of a tool consumer from its consumer key, along with a
//! [`StaticCredentialProvider`] for configuration-driven and test setups.

use std::collections::HashMap;
use std::fmt;

use crate::error::AuthError;

/// A consumer's shared secret.
///
/// `Debug` and `Display` are redacted so the value cannot leak through logs
/// or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct ConsumerSecret(String);

impl ConsumerSecret {
    /// Wrap a shared secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for signing.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConsumerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConsumerSecret(***)")
    }
}

impl fmt::Display for ConsumerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Trait for looking up consumer secrets by consumer key.
///
/// Implementations may back this with a database, configuration file,
/// or any other credential store, and must tolerate concurrent lookups.
pub trait CredentialProvider: Send + Sync {
    /// Resolve the shared secret for the given consumer key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConsumerKeyNotFound`] if the key is not registered.
    fn resolve_secret(&self, consumer_key: &str) -> Result<ConsumerSecret, AuthError>;
}

/// An in-memory credential provider backed by a `HashMap`.
///
/// # Examples
///
/// ```
/// use ltigate_auth::credentials::{CredentialProvider, StaticCredentialProvider};
///
/// let provider = StaticCredentialProvider::new(vec![
///     ("moodle".to_owned(), "s3cret".to_owned()),
///     ("canvas".to_owned(), "other".to_owned()),
/// ]);
///
/// let secret = provider.resolve_secret("moodle").unwrap();
/// assert_eq!(secret.expose(), "s3cret");
/// ```
#[derive(Clone, Default)]
pub struct StaticCredentialProvider {
    consumers: HashMap<String, ConsumerSecret>,
}

impl StaticCredentialProvider {
    /// Create a provider from an iterable of (consumer_key, secret) pairs.
    pub fn new(consumers: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            consumers: consumers
                .into_iter()
                .map(|(key, secret)| (key, ConsumerSecret::new(secret)))
                .collect(),
        }
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Whether no consumer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("consumers", &self.consumers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn resolve_secret(&self, consumer_key: &str) -> Result<ConsumerSecret, AuthError> {
        self.consumers
            .get(consumer_key)
            .cloned()
            .ok_or_else(|| AuthError::ConsumerKeyNotFound(consumer_key.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_return_secret_for_known_consumer() {
        let provider = StaticCredentialProvider::new(vec![
            ("moodle".to_owned(), "one".to_owned()),
            ("canvas".to_owned(), "two".to_owned()),
        ]);

        assert_eq!(provider.resolve_secret("moodle").unwrap().expose(), "one");
        assert_eq!(provider.resolve_secret("canvas").unwrap().expose(), "two");
        assert_eq!(provider.len(), 2);
    }

    #[test]
    fn test_should_return_error_for_unknown_consumer() {
        let provider = StaticCredentialProvider::new(vec![]);

        let result = provider.resolve_secret("UNKNOWN");
        assert_eq!(
            result,
            Err(AuthError::ConsumerKeyNotFound("UNKNOWN".to_owned()))
        );
    }

    #[test]
    fn test_should_redact_secret_in_debug_output() {
        let provider =
            StaticCredentialProvider::new(vec![("moodle".to_owned(), "hunter2".to_owned())]);
        let secret = provider.resolve_secret("moodle").unwrap();

        assert!(!format!("{secret:?}").contains("hunter2"));
        assert!(!format!("{secret}").contains("hunter2"));
        assert!(!format!("{provider:?}").contains("hunter2"));
    }
}
