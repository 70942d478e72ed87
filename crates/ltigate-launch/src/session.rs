//! Launch session establishment.
//!
//! This is the terminal decision of admission: the role set decides which
//! capability the session carries, or whether there is a session at all.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::LaunchError;
use crate::request::{LaunchRequest, param};
use crate::roles::RoleSet;

/// Capability a session was admitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Teaching staff.
    Instructor,
    /// Student.
    Learner,
}

/// What a later grade-return call needs to report a score back.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeService {
    /// `lis_outcome_service_url`.
    pub service_url: String,
    /// `lis_result_sourcedid`.
    pub result_sourcedid: String,
}

/// The authenticated actor of an admitted launch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSession {
    /// `user_id`.
    pub user_id: String,
    /// `lis_person_name_given`.
    pub given_name: Option<String>,
    /// `lis_person_name_family`.
    pub family_name: Option<String>,
    /// `resource_link_id`.
    pub resource_link_id: String,
    /// Normalized roles.
    pub roles: RoleSet,
    /// Admitted capability.
    pub capability: Capability,
    /// Grade-return endpoint, present only when the launch supplied one.
    pub outcome: Option<OutcomeService>,
    /// Consumer that signed the launch.
    pub consumer_key: String,
    /// When the session was established.
    pub issued_at: DateTime<Utc>,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl LaunchSession {
    /// Whether the session is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the session can report grades back to the consumer.
    #[must_use]
    pub fn can_return_grades(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Build the session for a validated, signature-verified launch.
///
/// - Instructor: admitted; the outcome service is attached only when both
///   `lis_outcome_service_url` and `lis_result_sourcedid` are non-empty.
/// - Learner (and not Instructor): admitted without outcome service.
/// - Otherwise: [`LaunchError::MissingRole`] with the raw claim.
///
/// # Errors
///
/// Returns [`LaunchError::MissingRole`] as above, or
/// [`LaunchError::MissingParameter`] if an identity field is absent.
pub fn establish_session(
    request: &LaunchRequest,
    consumer_key: &str,
    roles: RoleSet,
    issued_at: DateTime<Utc>,
    ttl: Duration,
) -> Result<LaunchSession, LaunchError> {
    let (capability, outcome) = if roles.has_instructor() {
        (Capability::Instructor, outcome_service(request))
    } else if roles.has_learner() {
        (Capability::Learner, None)
    } else {
        let raw = request.get(param::ROLES).unwrap_or_default();
        return Err(LaunchError::MissingRole(raw.to_owned()));
    };

    debug!(
        capability = ?capability,
        grade_return = outcome.is_some(),
        "resolved launch capability"
    );

    Ok(LaunchSession {
        user_id: required(request, param::USER_ID)?,
        given_name: optional(request, param::PERSON_NAME_GIVEN),
        family_name: optional(request, param::PERSON_NAME_FAMILY),
        resource_link_id: required(request, param::RESOURCE_LINK_ID)?,
        roles,
        capability,
        outcome,
        consumer_key: consumer_key.to_owned(),
        issued_at,
        expires_at: issued_at + ttl,
    })
}

fn outcome_service(request: &LaunchRequest) -> Option<OutcomeService> {
    let service_url = request.get_non_empty(param::OUTCOME_SERVICE_URL)?;
    let result_sourcedid = request.get_non_empty(param::RESULT_SOURCEDID)?;
    Some(OutcomeService {
        service_url: service_url.to_owned(),
        result_sourcedid: result_sourcedid.to_owned(),
    })
}

fn required(request: &LaunchRequest, name: &str) -> Result<String, LaunchError> {
    request
        .get_non_empty(name)
        .map(str::to_owned)
        .ok_or_else(|| LaunchError::MissingParameter(name.to_owned()))
}

fn optional(request: &LaunchRequest, name: &str) -> Option<String> {
    request.get_non_empty(name).map(str::to_owned)
}
