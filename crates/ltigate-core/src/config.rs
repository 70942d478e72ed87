//! Configuration management for LtiGate.
//!
//! All configuration is driven by environment variables. See the server
//! binary documentation for the full table.

use std::fmt;

use crate::error::{LtiGateError, LtiGateResult};

/// Global configuration for LtiGate.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtiGateConfig {
    /// Bind address for the gateway.
    pub gateway_listen: String,
    /// Log level.
    pub log_level: String,
    /// Path the tool consumer posts launches to.
    pub launch_path: String,
    /// Scheme used when rebuilding the signed request URL.
    ///
    /// TLS is usually terminated in front of the service, so the scheme the
    /// consumer signed cannot be read from the connection.
    pub public_scheme: String,
    /// Redirect target after a successful launch.
    pub welcome_url: String,
    /// Redirect target after a rejected launch.
    pub error_url: String,
    /// Name of the cookie carrying the session id.
    pub session_cookie: String,
    /// Lifetime of an established launch session, in seconds.
    pub session_ttl_secs: u64,
    /// Registered tool consumers as (consumer key, shared secret) pairs.
    #[serde(skip)]
    pub consumers: Vec<(String, String)>,
}

impl Default for LtiGateConfig {
    fn default() -> Self {
        Self {
            gateway_listen: "0.0.0.0:8080".to_owned(),
            log_level: "info".to_owned(),
            launch_path: "/launch".to_owned(),
            public_scheme: "https".to_owned(),
            welcome_url: "/welcome".to_owned(),
            error_url: "/error".to_owned(),
            session_cookie: "ltigate_session".to_owned(),
            session_ttl_secs: 3600,
            consumers: Vec::new(),
        }
    }
}

impl fmt::Debug for LtiGateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let consumer_keys: Vec<&str> = self.consumers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("LtiGateConfig")
            .field("gateway_listen", &self.gateway_listen)
            .field("log_level", &self.log_level)
            .field("launch_path", &self.launch_path)
            .field("public_scheme", &self.public_scheme)
            .field("welcome_url", &self.welcome_url)
            .field("error_url", &self.error_url)
            .field("session_cookie", &self.session_cookie)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("consumers", &consumer_keys)
            .finish()
    }
}

impl LtiGateConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns [`LtiGateError::Config`] if a variable is set to a value that
    /// cannot be parsed.
    pub fn from_env() -> LtiGateResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns [`LtiGateError::Config`] on unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LtiGateResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("LTI_LAUNCH_PATH") {
            if !v.starts_with('/') {
                return Err(LtiGateError::Config(format!(
                    "LTI_LAUNCH_PATH must start with '/': {v}"
                )));
            }
            config.launch_path = v;
        }
        if let Some(v) = lookup("LTI_PUBLIC_SCHEME") {
            let scheme = v.to_ascii_lowercase();
            if scheme != "http" && scheme != "https" {
                return Err(LtiGateError::Config(format!(
                    "LTI_PUBLIC_SCHEME must be http or https: {v}"
                )));
            }
            config.public_scheme = scheme;
        }
        if let Some(v) = lookup("LTI_WELCOME_URL") {
            config.welcome_url = header_safe("LTI_WELCOME_URL", v)?;
        }
        if let Some(v) = lookup("LTI_ERROR_URL") {
            config.error_url = header_safe("LTI_ERROR_URL", v)?;
        }
        if let Some(v) = lookup("LTI_SESSION_COOKIE") {
            let is_token = v
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
            if v.is_empty() || !is_token {
                return Err(LtiGateError::Config(format!(
                    "LTI_SESSION_COOKIE must be a plain token: {v}"
                )));
            }
            config.session_cookie = v;
        }
        if let Some(v) = lookup("LTI_SESSION_TTL_SECS") {
            config.session_ttl_secs = v.trim().parse().map_err(|_| {
                LtiGateError::Config(format!("LTI_SESSION_TTL_SECS is not a number: {v}"))
            })?;
        }
        if let Some(v) = lookup("LTI_CONSUMERS") {
            config.consumers = parse_consumers(&v)?;
        }

        Ok(config)
    }
}

/// Redirect targets end up verbatim in a `Location` header.
fn header_safe(name: &str, value: String) -> LtiGateResult<String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(LtiGateError::Config(format!(
            "{name} must be a non-empty URL without spaces or control characters"
        )));
    }
    Ok(value)
}

/// Parse a `key:secret,key2:secret2` consumer registry.
///
/// The secret is everything after the first `:`, so secrets may themselves
/// contain colons.
///
/// # Errors
/// Returns [`LtiGateError::Config`] if an entry has no `:` or an empty key or
/// secret.
pub fn parse_consumers(raw: &str) -> LtiGateResult<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, secret) = entry.split_once(':').ok_or_else(|| {
                LtiGateError::Config("LTI_CONSUMERS entries must be key:secret".to_owned())
            })?;
            if key.is_empty() || secret.is_empty() {
                return Err(LtiGateError::Config(
                    "LTI_CONSUMERS entries need a non-empty key and secret".to_owned(),
                ));
            }
            Ok((key.to_owned(), secret.to_owned()))
        })
        .collect()
}
