//! Response construction for the launch transport.

use bytes::Bytes;
use http_body_util::Full;
use ltigate_core::SessionId;

/// Body of every response. Redirects carry an empty one.
pub type LaunchResponseBody = Full<Bytes>;

/// Content type for JSON responses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the `Set-Cookie` value binding the browser to `id`.
///
/// Launches arrive as cross-site posts from the consumer, so the cookie needs
/// `SameSite=None`, which browsers only honor together with `Secure`. Plain
/// HTTP deployments fall back to `SameSite=Lax`.
#[must_use]
pub fn session_cookie_value(name: &str, id: &SessionId, secure: bool) -> String {
    if secure {
        format!("{name}={id}; Path=/; HttpOnly; Secure; SameSite=None")
    } else {
        format!("{name}={id}; Path=/; HttpOnly; SameSite=Lax")
    }
}

/// A `303 See Other` redirect, optionally setting a cookie.
#[must_use]
pub fn redirect(location: &str, set_cookie: Option<&str>) -> http::Response<LaunchResponseBody> {
    let mut builder = http::Response::builder()
        .status(http::StatusCode::SEE_OTHER)
        .header(http::header::LOCATION, location)
        .header(http::header::CACHE_CONTROL, "no-store");
    if let Some(cookie) = set_cookie {
        builder = builder.header(http::header::SET_COOKIE, cookie);
    }
    builder
        .body(Full::default())
        .expect("valid redirect response")
}

/// A JSON response with the given status.
#[must_use]
pub fn json_response(
    status: http::StatusCode,
    value: &serde_json::Value,
) -> http::Response<LaunchResponseBody> {
    let json = serde_json::to_vec(value).expect("JSON serialization of a Value cannot fail");
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
        .header(http::header::CACHE_CONTROL, "no-store")
        .body(Full::new(Bytes::from(json)))
        .expect("valid JSON response")
}

/// A JSON error response of the form `{"error": message}`.
#[must_use]
pub fn error_response(status: http::StatusCode, message: &str) -> http::Response<LaunchResponseBody> {
    json_response(status, &serde_json::json!({ "error": message }))
}

/// `404 Not Found`.
#[must_use]
pub fn not_found() -> http::Response<LaunchResponseBody> {
    error_response(http::StatusCode::NOT_FOUND, "not found")
}

/// `405 Method Not Allowed` naming the accepted method.
#[must_use]
pub fn method_not_allowed(allow: &'static str) -> http::Response<LaunchResponseBody> {
    let mut response = error_response(http::StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    response
        .headers_mut()
        .insert(http::header::ALLOW, http::HeaderValue::from_static(allow));
    response
}

/// Liveness response.
#[must_use]
pub fn health_response() -> http::Response<LaunchResponseBody> {
    json_response(
        http::StatusCode::OK,
        &serde_json::json!({ "status": "running" }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_secure_cross_site_cookie() {
        let id = SessionId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            session_cookie_value("sid", &id, true),
            "sid=67e55044-10b1-426f-9247-bb680e5fe0c8; Path=/; HttpOnly; Secure; SameSite=None"
        );
        assert!(session_cookie_value("sid", &id, false).ends_with("SameSite=Lax"));
    }

    #[test]
    fn test_should_build_see_other_redirect() {
        let response = redirect("/welcome", Some("sid=x"));
        assert_eq!(response.status(), http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[http::header::LOCATION], "/welcome");
        assert_eq!(response.headers()[http::header::SET_COOKIE], "sid=x");

        let response = redirect("/error", None);
        assert!(response.headers().get(http::header::SET_COOKIE).is_none());
    }

    #[test]
    fn test_should_name_allowed_method() {
        let response = method_not_allowed("GET");
        assert_eq!(response.status(), http::StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[http::header::ALLOW], "GET");
    }
}
