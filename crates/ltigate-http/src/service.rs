//! LtiGate HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hyper::body::Incoming;
use ltigate_core::{LtiGateConfig, SessionId};
use ltigate_launch::{LaunchInput, LaunchOrchestrator, RedirectTarget};
use tracing::{debug, warn};

use crate::request::{
    DEFAULT_MAX_BODY_BYTES, authorization, collect_body, decode_form, is_form_body, request_url,
    session_cookie,
};
use crate::response::{
    LaunchResponseBody, error_response, health_response, json_response, method_not_allowed, not_found, redirect,
    session_cookie_value,
};

/// Path serving the current session as JSON.
pub const SESSION_PATH: &str = "/session";
/// Liveness path.
pub const HEALTH_PATH: &str = "/health";

/// Configuration for the launch HTTP service.
#[derive(Debug, Clone)]
pub struct LaunchHttpConfig {
    /// Path launches are posted to.
    pub launch_path: String,
    /// Scheme the consumer used when signing.
    pub public_scheme: String,
    /// Redirect target after an admitted launch.
    pub welcome_url: String,
    /// Redirect target after a rejected launch.
    pub error_url: String,
    /// Session cookie name.
    pub session_cookie: String,
    /// Upper bound on a launch body.
    pub max_body_bytes: usize,
}

impl Default for LaunchHttpConfig {
    fn default() -> Self {
        Self::from(&LtiGateConfig::default())
    }
}

impl From<&LtiGateConfig> for LaunchHttpConfig {
    fn from(config: &LtiGateConfig) -> Self {
        Self {
            launch_path: config.launch_path.clone(),
            public_scheme: config.public_scheme.clone(),
            welcome_url: config.welcome_url.clone(),
            error_url: config.error_url.clone(),
            session_cookie: config.session_cookie.clone(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Hyper `Service` implementation for LTI launches.
///
/// Routes the launch path to the [`LaunchOrchestrator`] and answers with a
/// redirect; also serves the current session and a liveness probe.
#[derive(Debug, Clone)]
pub struct LaunchHttpService {
    orchestrator: Arc<LaunchOrchestrator>,
    config: Arc<LaunchHttpConfig>,
}

impl LaunchHttpService {
    /// Create a new `LaunchHttpService`.
    pub fn new(orchestrator: Arc<LaunchOrchestrator>, config: LaunchHttpConfig) -> Self {
        Self {
            orchestrator,
            config: Arc::new(config),
        }
    }

    /// Handle one request with any body type.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<LaunchResponseBody>
    where
        B: http_body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = process_request(req, &self.orchestrator, &self.config).await;
        add_common_headers(response, &request_id)
    }
}

impl hyper::service::Service<http::Request<Incoming>> for LaunchHttpService {
    type Response = http::Response<LaunchResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

async fn process_request<B>(
    req: http::Request<B>,
    orchestrator: &LaunchOrchestrator,
    config: &LaunchHttpConfig,
) -> http::Response<LaunchResponseBody>
where
    B: http_body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_owned();

    if path == config.launch_path {
        return handle_launch(req, orchestrator, config).await;
    }
    if path == SESSION_PATH {
        if req.method() != http::Method::GET {
            return method_not_allowed("GET");
        }
        return current_session(req.headers(), orchestrator, config);
    }
    if path == HEALTH_PATH {
        return health_response();
    }

    debug!(path = %path, "no route");
    not_found()
}

async fn handle_launch<B>(
    req: http::Request<B>,
    orchestrator: &LaunchOrchestrator,
    config: &LaunchHttpConfig,
) -> http::Response<LaunchResponseBody>
where
    B: http_body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    let session_id = session_cookie(&parts.headers, &config.session_cookie)
        .unwrap_or_else(SessionId::generate);

    let body_params = if is_form_body(&parts.headers) {
        match collect_body(body, config.max_body_bytes).await {
            Ok(bytes) => decode_form(&bytes),
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "rejecting launch body");
                orchestrator.revoke(&session_id);
                return redirect(&config.error_url, None);
            }
        }
    } else {
        warn!(
            session_id = %session_id,
            content_type = ?parts.headers.get(http::header::CONTENT_TYPE),
            "ignoring non-form launch body"
        );
        Vec::new()
    };

    let input = LaunchInput {
        method: parts.method.as_str().to_owned(),
        url: request_url(&parts, &config.public_scheme),
        authorization: authorization(&parts.headers),
        body: body_params,
    };

    match orchestrator.admit(input, &session_id).redirect() {
        RedirectTarget::Welcome => {
            let cookie = session_cookie_value(
                &config.session_cookie,
                &session_id,
                config.public_scheme == "https",
            );
            redirect(&config.welcome_url, Some(&cookie))
        }
        RedirectTarget::Error => redirect(&config.error_url, None),
    }
}

fn current_session(
    headers: &http::HeaderMap,
    orchestrator: &LaunchOrchestrator,
    config: &LaunchHttpConfig,
) -> http::Response<LaunchResponseBody> {
    let Some(id) = session_cookie(headers, &config.session_cookie) else {
        return error_response(http::StatusCode::NOT_FOUND, "no active session");
    };

    match orchestrator.sessions().get(&id, chrono::Utc::now()) {
        Ok(Some(session)) => match serde_json::to_value(&session) {
            Ok(value) => json_response(http::StatusCode::OK, &value),
            Err(err) => error_response(
                http::StatusCode::INTERNAL_SERVER_ERROR,
                &format!("failed to serialize session: {err}"),
            ),
        },
        Ok(None) => error_response(http::StatusCode::NOT_FOUND, "no active session"),
        Err(err) => {
            warn!(session_id = %id, error = %err, "session lookup failed");
            error_response(http::StatusCode::SERVICE_UNAVAILABLE, &err.to_string())
        }
    }
}

/// Add common response headers to every response.
fn add_common_headers(
    mut response: http::Response<LaunchResponseBody>,
    request_id: &str,
) -> http::Response<LaunchResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.entry("x-request-id").or_insert(hv);
    }

    headers.insert("server", http::HeaderValue::from_static("LtiGate"));

    response
}
