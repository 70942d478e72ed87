//! Extraction of launch inputs from an HTTP request.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use ltigate_core::SessionId;

/// Media type of an LTI launch form post.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Default upper bound on a launch body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Errors raised while reading the request body.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The body exceeded the configured limit.
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
    /// The body stream failed.
    #[error("failed to read request body: {0}")]
    BodyRead(String),
}

/// Collect a body of at most `limit` bytes.
pub async fn collect_body<B>(body: B, limit: usize) -> Result<Bytes, RequestError>
where
    B: http_body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Limited::new(body, limit)
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                RequestError::BodyTooLarge(limit)
            } else {
                RequestError::BodyRead(e.to_string())
            }
        })
}

/// Decode an `application/x-www-form-urlencoded` body, keeping arrival order
/// and duplicates.
#[must_use]
pub fn decode_form(body: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(body).into_owned().collect()
}

/// Whether the request declares a form body. A missing `Content-Type` is
/// accepted as form data.
#[must_use]
pub fn is_form_body(headers: &http::HeaderMap) -> bool {
    let Some(value) = headers.get(http::header::CONTENT_TYPE) else {
        return true;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case(FORM_CONTENT_TYPE)
}

/// Rebuild the absolute URL the consumer signed: public scheme, `Host`
/// header, and path. The query string is not part of the signed base URL.
#[must_use]
pub fn request_url(parts: &http::request::Parts, scheme: &str) -> String {
    let host = parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(http::uri::Authority::as_str))
        .unwrap_or_default();
    format!("{scheme}://{host}{}", parts.uri.path())
}

/// The raw `Authorization` header, if any.
///
/// Non-UTF-8 bytes are replaced rather than dropped so a mangled header still
/// reaches the OAuth parser and is rejected there.
#[must_use]
pub fn authorization(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(http::header::AUTHORIZATION)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// The session id carried in the cookie named `name`, if present and valid.
#[must_use]
pub fn session_cookie(headers: &http::HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(key, _)| *key == name)
        .find_map(|(_, value)| SessionId::parse(value).ok())
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;

    use super::*;

    fn parts(builder: http::request::Builder) -> http::request::Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_should_collect_body_within_limit() {
        let body = Full::new(Bytes::from_static(b"a=1&b=2"));
        let bytes = collect_body(body, 64).await.unwrap();
        assert_eq!(decode_form(&bytes), vec![
            ("a".to_owned(), "1".to_owned()),
            ("b".to_owned(), "2".to_owned()),
        ]);
    }

    #[tokio::test]
    async fn test_should_reject_oversized_body() {
        let body = Full::new(Bytes::from(vec![b'a'; 65]));
        let result = collect_body(body, 64).await;
        assert!(matches!(result, Err(RequestError::BodyTooLarge(64))));
    }

    #[test]
    fn test_should_decode_form_with_duplicates_and_escapes() {
        let params = decode_form(b"roles=Learner%2CInstructor&name=Jane+Doe&roles=Mentor");
        assert_eq!(params, vec![
            ("roles".to_owned(), "Learner,Instructor".to_owned()),
            ("name".to_owned(), "Jane Doe".to_owned()),
            ("roles".to_owned(), "Mentor".to_owned()),
        ]);
    }

    #[test]
    fn test_should_detect_form_content_type() {
        let mut headers = http::HeaderMap::new();
        assert!(is_form_body(&headers));

        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("Application/X-WWW-Form-Urlencoded; charset=UTF-8"),
        );
        assert!(is_form_body(&headers));

        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        assert!(!is_form_body(&headers));
    }

    #[test]
    fn test_should_rebuild_url_from_host_header() {
        let parts = parts(
            http::Request::post("/launch?debug=1")
                .header(http::header::HOST, "tool.example:8443"),
        );
        assert_eq!(
            request_url(&parts, "https"),
            "https://tool.example:8443/launch"
        );
    }

    #[test]
    fn test_should_fall_back_to_uri_authority() {
        let parts = parts(http::Request::post("http://tool.example/launch"));
        assert_eq!(request_url(&parts, "https"), "https://tool.example/launch");
    }

    #[test]
    fn test_should_read_authorization_header() {
        let mut headers = http::HeaderMap::new();
        assert_eq!(authorization(&headers), None);
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("OAuth oauth_nonce=\"n\""),
        );
        assert_eq!(
            authorization(&headers).as_deref(),
            Some("OAuth oauth_nonce=\"n\"")
        );
    }

    #[test]
    fn test_should_pick_valid_session_cookie() {
        let id = SessionId::generate();
        let mut headers = http::HeaderMap::new();
        headers.append(
            http::header::COOKIE,
            http::HeaderValue::from_static("theme=dark; sid=garbage"),
        );
        headers.append(
            http::header::COOKIE,
            http::HeaderValue::from_str(&format!("sid={id}")).unwrap(),
        );

        assert_eq!(session_cookie(&headers, "sid"), Some(id));
        assert_eq!(session_cookie(&headers, "other"), None);
    }
}
