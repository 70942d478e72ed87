//! `Authorization: OAuth ...` header parsing and parameter merging.
//!
//! The header has the format (RFC 5849 §3.5.1):
//!
//! ```text
//! OAuth realm="Example", oauth_consumer_key="key", oauth_nonce="abc", ...
//! ```
//!
//! Values are percent-encoded by the consumer and decoded here. Only `oauth_*`
//! parameters take part in signing; `realm` is kept apart.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::AuthError;

/// A single `key="value"` item of the header parameter list.
static PARAM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([A-Za-z0-9_]+)\s*=\s*"([^"]*)"$"#).expect("oauth param regex is valid")
});

/// Parsed OAuth parameters from an `Authorization` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthHeader {
    /// The optional protection realm.
    pub realm: Option<String>,
    /// The decoded `oauth_*` parameters.
    pub params: BTreeMap<String, String>,
}

impl OAuthHeader {
    /// Parse an `Authorization` header value.
    ///
    /// Parameters whose name neither is `realm` nor starts with `oauth_` are
    /// ignored, as RFC 5849 excludes them from signing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidAuthHeader`] if the scheme is not `OAuth`,
    /// an item is not `key="value"`, a key repeats, or a value does not
    /// percent-decode to UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use ltigate_auth::OAuthHeader;
    ///
    /// let header = OAuthHeader::parse(r#"OAuth realm="", oauth_nonce="a%20b""#).unwrap();
    /// assert_eq!(header.params["oauth_nonce"], "a b");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let raw = raw.trim();
        let rest = strip_scheme(raw).ok_or_else(|| {
            AuthError::InvalidAuthHeader("authorization scheme is not OAuth".to_owned())
        })?;

        let mut header = Self::default();

        for item in rest.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let caps = PARAM_REGEX.captures(item).ok_or_else(|| {
                AuthError::InvalidAuthHeader(format!("malformed parameter: {item}"))
            })?;
            let key = &caps[1];
            let value = percent_decode_str(&caps[2])
                .decode_utf8()
                .map_err(|_| {
                    AuthError::InvalidAuthHeader(format!("value of {key} is not valid UTF-8"))
                })?
                .into_owned();

            if key == "realm" {
                if header.realm.replace(value).is_some() {
                    return Err(AuthError::InvalidAuthHeader("duplicate realm".to_owned()));
                }
            } else if key.starts_with("oauth_")
                && header.params.insert(key.to_owned(), value).is_some()
            {
                return Err(AuthError::InvalidAuthHeader(format!(
                    "duplicate parameter: {key}"
                )));
            }
        }

        Ok(header)
    }
}

/// Strip the case-insensitive `OAuth` scheme, returning the parameter list.
fn strip_scheme(raw: &str) -> Option<&str> {
    let (scheme, rest) = raw.split_once(char::is_whitespace).unwrap_or((raw, ""));
    scheme.eq_ignore_ascii_case("OAuth").then_some(rest)
}

/// Merge header and body parameters into one set.
///
/// When a key appears in both, the header value wins: the `Authorization`
/// header is the channel the consumer signed its OAuth parameters on. A key
/// repeated within the body keeps its last value.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use ltigate_auth::merge_parameters;
///
/// let header = BTreeMap::from([("oauth_nonce".to_owned(), "from-header".to_owned())]);
/// let body = vec![("oauth_nonce".to_owned(), "from-body".to_owned())];
/// let merged = merge_parameters(&header, body);
/// assert_eq!(merged["oauth_nonce"], "from-header");
/// ```
#[must_use]
pub fn merge_parameters(
    header: &BTreeMap<String, String>,
    body: impl IntoIterator<Item = (String, String)>,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = body.into_iter().collect();
    merged.extend(header.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
