//! Protocol field validation.
//!
//! Every check runs, so a rejected request reports all of its problems at
//! once, before any signature work is attempted.

use ltigate_auth::signature::HMAC_SHA1;

use crate::error::LaunchError;
use crate::request::{LaunchRequest, param};

/// Required message type.
pub const BASIC_LAUNCH_REQUEST: &str = "basic-lti-launch-request";
/// Required LTI version.
pub const LTI_1P0: &str = "LTI-1p0";
/// Required OAuth version.
pub const OAUTH_1_0: &str = "1.0";

/// Name reported for a wrong transport method.
const REQUEST_METHOD: &str = "REQUEST_METHOD";

/// Validate the protocol-mandated fields of a launch request.
///
/// # Errors
///
/// Returns every [`LaunchError::MissingParameter`] and
/// [`LaunchError::InvalidParameterValue`] finding, in check order.
pub fn validate(request: &LaunchRequest) -> Result<(), Vec<LaunchError>> {
    let mut findings = Findings {
        request,
        errors: Vec::new(),
    };

    if request.method() != "POST" {
        findings
            .errors
            .push(LaunchError::invalid(REQUEST_METHOD, request.method()));
    }

    findings.literal(param::LTI_MESSAGE_TYPE, BASIC_LAUNCH_REQUEST);
    findings.literal(param::LTI_VERSION, LTI_1P0);
    findings.non_empty(param::RESOURCE_LINK_ID);
    findings.non_empty(param::USER_ID);
    findings.non_empty(param::ROLES);

    findings.present(param::OAUTH_CONSUMER_KEY);
    findings.present(param::OAUTH_NONCE);
    findings.present(param::OAUTH_SIGNATURE);
    findings.literal(param::OAUTH_SIGNATURE_METHOD, HMAC_SHA1);
    findings.present(param::OAUTH_TIMESTAMP);
    findings.literal(param::OAUTH_VERSION, OAUTH_1_0);

    if findings.errors.is_empty() {
        Ok(())
    } else {
        Err(findings.errors)
    }
}

struct Findings<'a> {
    request: &'a LaunchRequest,
    errors: Vec<LaunchError>,
}

impl Findings<'_> {
    fn present(&mut self, name: &str) {
        if self.request.get(name).is_none() {
            self.errors.push(LaunchError::MissingParameter(name.to_owned()));
        }
    }

    fn non_empty(&mut self, name: &str) {
        if self.request.get_non_empty(name).is_none() {
            self.errors.push(LaunchError::MissingParameter(name.to_owned()));
        }
    }

    fn literal(&mut self, name: &str, expected: &str) {
        match self.request.get(name) {
            None => self.errors.push(LaunchError::MissingParameter(name.to_owned())),
            Some(value) if value != expected => {
                self.errors.push(LaunchError::invalid(name, value));
            }
            Some(_) => {}
        }
    }
}
