//! The launch request as seen by the admission pipeline.

use std::collections::BTreeMap;

use ltigate_auth::{OAuthRequest, merge_parameters};

/// Launch parameter names.
pub mod param {
    /// Message type; must be `basic-lti-launch-request`.
    pub const LTI_MESSAGE_TYPE: &str = "lti_message_type";
    /// Protocol version; must be `LTI-1p0`.
    pub const LTI_VERSION: &str = "lti_version";
    /// Placement of the tool in the consumer.
    pub const RESOURCE_LINK_ID: &str = "resource_link_id";
    /// Opaque user identifier.
    pub const USER_ID: &str = "user_id";
    /// Comma-separated role claim.
    pub const ROLES: &str = "roles";
    /// Given name of the user.
    pub const PERSON_NAME_GIVEN: &str = "lis_person_name_given";
    /// Family name of the user.
    pub const PERSON_NAME_FAMILY: &str = "lis_person_name_family";
    /// Grade-return endpoint.
    pub const OUTCOME_SERVICE_URL: &str = "lis_outcome_service_url";
    /// Grade-return result identifier.
    pub const RESULT_SOURCEDID: &str = "lis_result_sourcedid";
    /// OAuth consumer key.
    pub const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
    /// OAuth nonce.
    pub const OAUTH_NONCE: &str = "oauth_nonce";
    /// OAuth signature.
    pub const OAUTH_SIGNATURE: &str = "oauth_signature";
    /// OAuth signature method; must be `HMAC-SHA1`.
    pub const OAUTH_SIGNATURE_METHOD: &str = "oauth_signature_method";
    /// OAuth timestamp.
    pub const OAUTH_TIMESTAMP: &str = "oauth_timestamp";
    /// OAuth version; must be `1.0`.
    pub const OAUTH_VERSION: &str = "oauth_version";
}

/// An immutable launch request: method, URL, and the merged parameter set.
///
/// Values are kept exactly as the transport delivered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    method: String,
    url: String,
    params: BTreeMap<String, String>,
}

impl LaunchRequest {
    /// Create a request from an already merged parameter set.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        params: BTreeMap<String, String>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            params,
        }
    }

    /// Create a request from `Authorization` header parameters and body
    /// parameters. Header values win on key collision.
    pub fn from_parts(
        method: impl Into<String>,
        url: impl Into<String>,
        header_params: &BTreeMap<String, String>,
        body_params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self::new(method, url, merge_parameters(header_params, body_params))
    }

    /// Transport method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// All parameters.
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Value of a parameter, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Value of a parameter, if present and not empty.
    #[must_use]
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    /// View the request for signature verification.
    #[must_use]
    pub fn as_oauth(&self) -> OAuthRequest<'_> {
        OAuthRequest::new(&self.method, &self.url, &self.params)
    }
}
