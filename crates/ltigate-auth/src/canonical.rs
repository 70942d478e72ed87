//! Signature base string construction for OAuth 1.0a.
//!
//! This module implements the base string format from RFC 5849 §3.4.1:
//!
//! ```text
//! HTTP-METHOD "&" enc(BaseStringUri) "&" enc(NormalizedParameters)
//! ```
//!
//! Each component is normalized so the provider reproduces the exact bytes the
//! consumer signed.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::AuthError;

/// Characters that must be percent-encoded in OAuth 1.0a.
///
/// Everything except the RFC 3986 unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) is encoded, and a space becomes `%20`
/// rather than `+`.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a string per RFC 3986, as OAuth 1.0a requires.
///
/// # Examples
///
/// ```
/// use ltigate_auth::canonical::percent_encode;
///
/// assert_eq!(percent_encode("a b+c/~"), "a%20b%2Bc%2F~");
/// assert_eq!(percent_encode("ü"), "%C3%BC");
/// ```
#[must_use]
pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, OAUTH_ENCODE_SET).to_string()
}

/// Normalize a request URL into the base string URI.
///
/// Scheme and host are lowercased, the default port for the scheme is dropped,
/// and any query string or fragment is removed. An empty path becomes `/`.
///
/// # Errors
///
/// Returns [`AuthError::InvalidUrl`] if the URL is not absolute.
///
/// # Examples
///
/// ```
/// use ltigate_auth::canonical::normalize_base_url;
///
/// assert_eq!(
///     normalize_base_url("HTTPS://Tool.Example:443/launch?x=1").unwrap(),
///     "https://tool.example/launch"
/// );
/// ```
pub fn normalize_base_url(url: &str) -> Result<String, AuthError> {
    let uri: http::Uri = url
        .parse()
        .map_err(|_| AuthError::InvalidUrl(url.to_owned()))?;

    let scheme = uri
        .scheme_str()
        .ok_or_else(|| AuthError::InvalidUrl(url.to_owned()))?
        .to_ascii_lowercase();
    let host = uri
        .host()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AuthError::InvalidUrl(url.to_owned()))?
        .to_ascii_lowercase();

    let port = match (scheme.as_str(), uri.port_u16()) {
        (_, None) | ("http", Some(80)) | ("https", Some(443)) => String::new(),
        (_, Some(port)) => format!(":{port}"),
    };

    let path = match uri.path() {
        "" => "/",
        path => path,
    };

    Ok(format!("{scheme}://{host}{port}{path}"))
}

/// Build the normalized parameter string.
///
/// Parameters are sorted by their raw key (byte order), each key and value is
/// percent-encoded, and the pairs are joined as `key=value` with `&`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use ltigate_auth::canonical::build_parameter_string;
///
/// let params = BTreeMap::from([("b", "x y"), ("a", "1")]);
/// assert_eq!(build_parameter_string(&params), "a=1&b=x%20y");
/// ```
#[must_use]
pub fn build_parameter_string<K, V>(params: &BTreeMap<K, V>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                percent_encode(k.as_ref()),
                percent_encode(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the signature base string.
///
/// `params` must already be the signed parameter set, i.e. without
/// `oauth_signature`.
///
/// # Errors
///
/// Returns [`AuthError::InvalidUrl`] if the URL cannot be normalized.
pub fn build_base_string<K, V>(
    method: &str,
    url: &str,
    params: &BTreeMap<K, V>,
) -> Result<String, AuthError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let method = method.to_ascii_uppercase();
    let base_url = normalize_base_url(url)?;
    let parameter_string = build_parameter_string(params);

    Ok(format!(
        "{method}&{}&{}",
        percent_encode(&base_url),
        percent_encode(&parameter_string)
    ))
}
