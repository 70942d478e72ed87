//! Common type definitions shared across crates.

use std::fmt;

/// Transport session identifier under which a launch session is stored.
///
/// Always the hyphenated form of a UUID, so a value taken from a cookie can be
/// echoed back in a `Set-Cookie` header without further escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh random session identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse a session identifier received from a client.
    ///
    /// # Errors
    /// Returns an error if the value is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, crate::LtiGateError> {
        uuid::Uuid::parse_str(raw.trim())
            .map(|id| Self(id.hyphenated().to_string()))
            .map_err(|_| crate::LtiGateError::InvalidSessionId(raw.to_owned()))
    }

    /// Get the session identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
