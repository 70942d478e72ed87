//! OAuth 1.0a HMAC-SHA1 signing and verification.
//!
//! The signing key is `enc(consumer_secret) + "&"`: launches are
//! single-legged, so there is never a token secret after the ampersand.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, KeyInit, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::canonical::{build_base_string, percent_encode};
use crate::credentials::{ConsumerSecret, CredentialProvider};
use crate::error::AuthError;

type HmacSha1 = Hmac<Sha1>;

/// The only signature method accepted.
pub const HMAC_SHA1: &str = "HMAC-SHA1";

/// A request as seen by the verifier: method, URL, and the merged parameters.
#[derive(Debug, Clone, Copy)]
pub struct OAuthRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Absolute request URL.
    pub url: &'a str,
    /// Header and body parameters after merging, `oauth_signature` included.
    pub params: &'a BTreeMap<String, String>,
}

impl<'a> OAuthRequest<'a> {
    /// Create a request view.
    #[must_use]
    pub fn new(method: &'a str, url: &'a str, params: &'a BTreeMap<String, String>) -> Self {
        Self {
            method,
            url,
            params,
        }
    }

    fn param(&self, name: &'static str) -> Result<&'a str, AuthError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or(AuthError::MissingParameter(name))
    }

    fn param_or_empty(&self, name: &str) -> &'a str {
        self.params.get(name).map_or("", String::as_str)
    }

    /// The signed parameter set: every parameter except `oauth_signature`.
    fn signed_params(&self) -> BTreeMap<&'a str, &'a str> {
        self.params
            .iter()
            .filter(|(k, _)| k.as_str() != "oauth_signature")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// The consumer key the request was signed for.
    pub consumer_key: String,
}

/// Compute the base64 HMAC-SHA1 signature for a request.
///
/// Any `oauth_signature` already present in the parameters is left out of the
/// signed set.
///
/// # Errors
///
/// Returns [`AuthError::InvalidUrl`] if the request URL cannot be normalized.
pub fn sign(request: &OAuthRequest<'_>, secret: &ConsumerSecret) -> Result<String, AuthError> {
    let base_string = build_base_string(request.method, request.url, &request.signed_params())?;
    Ok(compute_signature(&base_string, secret))
}

/// Verify an OAuth 1.0a HMAC-SHA1 signed request.
///
/// # Errors
///
/// Returns an [`AuthError`] if a required parameter is missing, the signature
/// method is not HMAC-SHA1, the consumer key is unknown, the URL is invalid,
/// or the signature does not match.
pub fn verify_oauth1(
    request: &OAuthRequest<'_>,
    credential_provider: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    let consumer_key = request.param("oauth_consumer_key")?;
    let method = request.param("oauth_signature_method")?;
    if method != HMAC_SHA1 {
        return Err(AuthError::UnsupportedSignatureMethod(method.to_owned()));
    }
    let provided_signature = request.param("oauth_signature")?;

    debug!(consumer_key = %consumer_key, "Verifying OAuth1 signature");

    let secret = credential_provider.resolve_secret(consumer_key)?;
    let expected_signature = sign(request, &secret)?;

    if provided_signature
        .as_bytes()
        .ct_eq(expected_signature.as_bytes())
        .into()
    {
        debug!(consumer_key = %consumer_key, "OAuth1 verification succeeded");
        Ok(AuthResult {
            consumer_key: consumer_key.to_owned(),
        })
    } else {
        warn!(
            consumer_key = %consumer_key,
            oauth_nonce = %request.param_or_empty("oauth_nonce"),
            oauth_timestamp = %request.param_or_empty("oauth_timestamp"),
            "OAuth1 signature mismatch"
        );
        Err(AuthError::SignatureDoesNotMatch)
    }
}

/// Compute `Base64(HMAC-SHA1(enc(secret) + "&", base_string))`.
fn compute_signature(base_string: &str, secret: &ConsumerSecret) -> String {
    let signing_key = format!("{}&", percent_encode(secret.expose()));
    let mut mac =
        HmacSha1::new_from_slice(signing_key.as_bytes()).expect("HMAC can accept any key length");
    mac.update(base_string.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}
