//! Launch admission state machine.
//!
//! ```text
//! Received -> ParamsChecked -> SignatureChecked -> RoleResolved -> SessionEstablished
//!     \______________\________________\_______________\______> Rejected
//! ```
//!
//! Stages run strictly in order with no retries. Parameter validation reports
//! every finding; each later stage stops the pipeline at its first error. Only
//! the final transition writes to the session store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ltigate_auth::{CredentialProvider, OAuthHeader, verify_oauth1};
use ltigate_core::SessionId;
use tracing::{debug, info, warn};

use crate::error::{Diagnostic, LaunchError};
use crate::request::{LaunchRequest, param};
use crate::roles::RoleSet;
use crate::session::{LaunchSession, establish_session};
use crate::store::SessionStore;
use crate::validate::validate;

/// Admission pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LaunchState {
    /// The request has arrived.
    Received,
    /// All protocol fields are present and correct.
    ParamsChecked,
    /// The OAuth signature is verified.
    SignatureChecked,
    /// The role claim is normalized.
    RoleResolved,
    /// The session is stored. Success terminal.
    SessionEstablished,
    /// The launch was refused. Failure terminal.
    Rejected,
}

impl LaunchState {
    /// The state that follows on success, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::ParamsChecked),
            Self::ParamsChecked => Some(Self::SignatureChecked),
            Self::SignatureChecked => Some(Self::RoleResolved),
            Self::RoleResolved => Some(Self::SessionEstablished),
            Self::SessionEstablished | Self::Rejected => None,
        }
    }
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where the transport should send the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// The launch was admitted.
    Welcome,
    /// The launch was rejected.
    Error,
}

/// Outcome of one admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The launch was admitted and its session stored.
    Admitted {
        /// The stored session.
        session: LaunchSession,
    },
    /// The launch was refused.
    Rejected {
        /// Last state reached before the failing stage.
        failed_at: LaunchState,
        /// Every reason, in report order.
        errors: Vec<LaunchError>,
    },
}

impl Admission {
    /// Whether the launch was admitted.
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    /// The terminal state of the pipeline.
    #[must_use]
    pub fn state(&self) -> LaunchState {
        match self {
            Self::Admitted { .. } => LaunchState::SessionEstablished,
            Self::Rejected { .. } => LaunchState::Rejected,
        }
    }

    /// The established session, if admitted.
    #[must_use]
    pub fn session(&self) -> Option<&LaunchSession> {
        match self {
            Self::Admitted { session } => Some(session),
            Self::Rejected { .. } => None,
        }
    }

    /// The rejection reasons; empty if admitted.
    #[must_use]
    pub fn errors(&self) -> &[LaunchError] {
        match self {
            Self::Admitted { .. } => &[],
            Self::Rejected { errors, .. } => errors,
        }
    }

    /// The rejection reasons as `(kind, message)` diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors().iter().map(Diagnostic::from).collect()
    }

    /// The redirect the transport should issue.
    #[must_use]
    pub fn redirect(&self) -> RedirectTarget {
        if self.is_admitted() {
            RedirectTarget::Welcome
        } else {
            RedirectTarget::Error
        }
    }
}

/// Transport-level input of one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchInput {
    /// HTTP method.
    pub method: String,
    /// Absolute URL the consumer posted to.
    pub url: String,
    /// Raw `Authorization` header, if any.
    pub authorization: Option<String>,
    /// Decoded form body parameters, in arrival order.
    pub body: Vec<(String, String)>,
}

impl LaunchInput {
    /// Create an input with no header and an empty body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            authorization: None,
            body: Vec::new(),
        }
    }

    /// Set the raw `Authorization` header.
    #[must_use]
    pub fn with_authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    /// Append a body parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.push((name.into(), value.into()));
        self
    }
}

/// Sequences validation, verification, role resolution, and session storage.
#[derive(Clone)]
pub struct LaunchOrchestrator {
    credentials: Arc<dyn CredentialProvider>,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
}

impl fmt::Debug for LaunchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchOrchestrator")
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

impl LaunchOrchestrator {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        sessions: Arc<dyn SessionStore>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            sessions,
            session_ttl,
        }
    }

    /// The session store admitted launches are written to.
    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Run one launch through the pipeline at the current time.
    pub fn admit(&self, input: LaunchInput, session_id: &SessionId) -> Admission {
        self.admit_at(input, session_id, Utc::now())
    }

    /// Run one launch through the pipeline as of `now`.
    ///
    /// A rejected launch also revokes whatever session was stored under
    /// `session_id`, so a failed relaunch never leaves the previous user
    /// bound to the browser.
    pub fn admit_at(
        &self,
        input: LaunchInput,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Admission {
        let admission = self.run(input, session_id, now);
        if !admission.is_admitted() {
            self.revoke(session_id);
        }
        admission
    }

    /// Drop the session stored under `session_id`, if any.
    ///
    /// A store failure is logged; the caller has already decided to reject.
    pub fn revoke(&self, session_id: &SessionId) {
        match self.sessions.remove(session_id) {
            Ok(Some(previous)) => debug!(
                session_id = %session_id,
                user_id = %previous.user_id,
                "revoked previous launch session"
            ),
            Ok(None) => {}
            Err(err) => warn!(
                session_id = %session_id,
                error = %err,
                "failed to revoke previous launch session"
            ),
        }
    }

    fn run(&self, input: LaunchInput, session_id: &SessionId, now: DateTime<Utc>) -> Admission {
        let mut state = Progress::new(session_id);

        // A malformed header contributes no parameters; its parse error leads
        // the findings so the consumer sees why its OAuth fields went missing.
        let (header_params, header_error) = match input.authorization.as_deref() {
            None => (BTreeMap::new(), None),
            Some(raw) => match OAuthHeader::parse(raw) {
                Ok(header) => (header.params, None),
                Err(err) => (BTreeMap::new(), Some(LaunchError::from(err))),
            },
        };
        let request =
            LaunchRequest::from_parts(input.method, input.url, &header_params, input.body);

        if let Err(mut errors) = validate(&request) {
            if let Some(err) = header_error {
                errors.insert(0, err);
            }
            return state.reject(errors);
        }
        state.advance();

        if let Some(err) = header_error {
            return state.reject(vec![err]);
        }
        let auth = match verify_oauth1(&request.as_oauth(), self.credentials.as_ref()) {
            Ok(auth) => auth,
            Err(err) => return state.reject(vec![err.into()]),
        };
        state.advance();

        let roles = RoleSet::parse(request.get(param::ROLES).unwrap_or_default());
        state.advance();

        let session = match establish_session(
            &request,
            &auth.consumer_key,
            roles,
            now,
            self.session_ttl,
        ) {
            Ok(session) => session,
            Err(err) => return state.reject(vec![err]),
        };
        if let Err(err) = self.sessions.replace(session_id, session.clone()) {
            return state.reject(vec![err.into()]);
        }
        state.advance();

        info!(
            session_id = %session_id,
            consumer_key = %session.consumer_key,
            user_id = %session.user_id,
            capability = ?session.capability,
            "LTI launch admitted"
        );
        Admission::Admitted { session }
    }
}

/// Forward-only tracker of the pipeline state.
struct Progress<'a> {
    state: LaunchState,
    session_id: &'a SessionId,
}

impl<'a> Progress<'a> {
    fn new(session_id: &'a SessionId) -> Self {
        debug!(session_id = %session_id, state = %LaunchState::Received, "LTI launch received");
        Self {
            state: LaunchState::Received,
            session_id,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            debug!(session_id = %self.session_id, from = %self.state, to = %next, "launch state transition");
            self.state = next;
        }
    }

    fn reject(self, errors: Vec<LaunchError>) -> Admission {
        for err in &errors {
            warn!(
                session_id = %self.session_id,
                failed_at = %self.state,
                kind = %err.kind(),
                "{err}"
            );
        }
        Admission::Rejected {
            failed_at: self.state,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ltigate_auth::credentials::ConsumerSecret;
    use ltigate_auth::{AuthError, StaticCredentialProvider, sign};

    use super::*;
    use crate::error::ErrorKind;
    use crate::session::Capability;
    use crate::store::{InMemorySessionStore, StoreError};

    const URL: &str = "https://example.com/launch";
    const KEY: &str = "someKey";
    const SECRET: &str = "s3cret";

    /// Counts lookups so tests can prove the verifier never ran.
    #[derive(Default)]
    struct CountingProvider {
        lookups: AtomicUsize,
    }

    impl CredentialProvider for CountingProvider {
        fn resolve_secret(&self, consumer_key: &str) -> Result<ConsumerSecret, AuthError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if consumer_key == KEY {
                Ok(ConsumerSecret::new(SECRET))
            } else {
                Err(AuthError::ConsumerKeyNotFound(consumer_key.to_owned()))
            }
        }
    }

    struct FailingStore;

    impl SessionStore for FailingStore {
        fn replace(&self, _: &SessionId, _: LaunchSession) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk full".to_owned()))
        }

        fn get(&self, _: &SessionId, _: DateTime<Utc>) -> Result<Option<LaunchSession>, StoreError> {
            Ok(None)
        }

        fn remove(&self, _: &SessionId) -> Result<Option<LaunchSession>, StoreError> {
            Ok(None)
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn base_params(roles: &str) -> Vec<(String, String)> {
        [
            ("lti_message_type", "basic-lti-launch-request"),
            ("lti_version", "LTI-1p0"),
            ("oauth_consumer_key", KEY),
            ("oauth_nonce", "abc123"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1700000000"),
            ("oauth_version", "1.0"),
            ("resource_link_id", "someLinkId"),
            ("user_id", "userId"),
            ("roles", roles),
            ("lis_person_name_given", "Jane"),
            ("lis_person_name_family", "Doe"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
    }

    /// Sign the body parameters the way a tool consumer would.
    fn signed_input(body: Vec<(String, String)>) -> LaunchInput {
        let params = body.iter().cloned().collect();
        let request = LaunchRequest::new("POST", URL, params);
        let signature = sign(&request.as_oauth(), &ConsumerSecret::new(SECRET)).unwrap();

        let mut input = LaunchInput::new("POST", URL);
        input.body = body;
        input.with_param("oauth_signature", signature)
    }

    fn orchestrator_with(
        credentials: Arc<dyn CredentialProvider>,
    ) -> (LaunchOrchestrator, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let orchestrator = LaunchOrchestrator::new(credentials, store.clone(), Duration::hours(1));
        (orchestrator, store)
    }

    fn orchestrator() -> (LaunchOrchestrator, Arc<InMemorySessionStore>) {
        orchestrator_with(Arc::new(StaticCredentialProvider::new(vec![(
            KEY.to_owned(),
            SECRET.to_owned(),
        )])))
    }

    fn kinds(admission: &Admission) -> Vec<ErrorKind> {
        admission.errors().iter().map(LaunchError::kind).collect()
    }

    #[test]
    fn test_should_admit_signed_learner_launch() {
        let (orchestrator, store) = orchestrator();
        let id = SessionId::generate();

        let admission = orchestrator.admit_at(signed_input(base_params("Learner")), &id, now());

        assert!(admission.is_admitted(), "{:?}", admission.diagnostics());
        assert_eq!(admission.state(), LaunchState::SessionEstablished);
        assert_eq!(admission.redirect(), RedirectTarget::Welcome);
        let session = admission.session().unwrap();
        assert!(!session.roles.is_empty());
        assert_eq!(session.capability, Capability::Learner);
        assert_eq!(session.consumer_key, KEY);
        assert_eq!(store.get(&id, now()).unwrap().as_ref(), Some(session));
    }

    #[test]
    fn test_should_admit_instructor_with_grade_return() {
        let (orchestrator, _) = orchestrator();
        let mut body = base_params("Instructor");
        body.push((
            "lis_outcome_service_url".to_owned(),
            "https://lms.example/outcomes".to_owned(),
        ));
        body.push(("lis_result_sourcedid".to_owned(), "rs-1".to_owned()));

        let admission = orchestrator.admit_at(signed_input(body), &SessionId::generate(), now());

        let session = admission.session().unwrap();
        assert_eq!(session.capability, Capability::Instructor);
        assert!(session.can_return_grades());
    }

    #[test]
    fn test_should_admit_instructor_without_outcome_url() {
        let (orchestrator, _) = orchestrator();
        let mut body = base_params("Instructor");
        body.push(("lis_result_sourcedid".to_owned(), "rs-1".to_owned()));

        let admission = orchestrator.admit_at(signed_input(body), &SessionId::generate(), now());

        assert!(admission.is_admitted());
        assert!(!admission.session().unwrap().can_return_grades());
    }

    #[test]
    fn test_should_reject_wrong_signature_method_without_verifying() {
        let provider = Arc::new(CountingProvider::default());
        let (orchestrator, store) = orchestrator_with(provider.clone());
        let mut body = base_params("Learner");
        body.retain(|(k, _)| k != "oauth_signature_method");
        body.push(("oauth_signature_method".to_owned(), "RSA-SHA1".to_owned()));

        let admission = orchestrator.admit_at(signed_input(body), &SessionId::generate(), now());

        assert_eq!(kinds(&admission), vec![ErrorKind::InvalidParameterValue]);
        assert_eq!(
            admission,
            Admission::Rejected {
                failed_at: LaunchState::Received,
                errors: vec![LaunchError::InvalidParameterValue {
                    name: "oauth_signature_method".to_owned(),
                    value: "RSA-SHA1".to_owned(),
                }],
            }
        );
        assert_eq!(provider.lookups.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_should_report_all_validation_findings_together() {
        let (orchestrator, _) = orchestrator();
        let input = LaunchInput::new("GET", URL).with_param("user_id", "u");

        let admission = orchestrator.admit_at(input, &SessionId::generate(), now());

        assert_eq!(admission.redirect(), RedirectTarget::Error);
        assert_eq!(admission.errors().len(), 11);
        assert_eq!(admission.diagnostics()[0].kind, ErrorKind::InvalidParameterValue);
    }

    #[test]
    fn test_should_reject_tampered_launch() {
        let (orchestrator, store) = orchestrator();
        let mut input = signed_input(base_params("Learner"));
        for (k, v) in &mut input.body {
            if k == "roles" {
                *v = "Instructor".to_owned();
            }
        }

        let admission = orchestrator.admit_at(input, &SessionId::generate(), now());

        assert_eq!(kinds(&admission), vec![ErrorKind::SignatureMismatch]);
        assert!(matches!(
            admission,
            Admission::Rejected {
                failed_at: LaunchState::ParamsChecked,
                ..
            }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_should_reject_unknown_consumer() {
        let (orchestrator, _) = orchestrator_with(Arc::new(StaticCredentialProvider::new(vec![])));

        let admission =
            orchestrator.admit_at(signed_input(base_params("Learner")), &SessionId::generate(), now());

        assert_eq!(kinds(&admission), vec![ErrorKind::CredentialNotFound]);
    }

    #[test]
    fn test_should_report_malformed_header_as_parsing_failure() {
        let (orchestrator, _) = orchestrator();
        let input =
            signed_input(base_params("Learner")).with_authorization("OAuth oauth_nonce=unquoted");

        let admission = orchestrator.admit_at(input, &SessionId::generate(), now());

        assert_eq!(kinds(&admission), vec![ErrorKind::OAuthParsingFailure]);
    }

    #[test]
    fn test_should_accept_oauth_parameters_from_header() {
        let (orchestrator, _) = orchestrator();
        let signed = signed_input(base_params("Learner"));
        let (oauth, body): (Vec<_>, Vec<_>) = signed
            .body
            .into_iter()
            .partition(|(k, _)| k.starts_with("oauth_"));
        let header = oauth
            .iter()
            .map(|(k, v)| {
                format!(
                    "{k}=\"{}\"",
                    ltigate_auth::canonical::percent_encode(v)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut input = LaunchInput::new("POST", URL).with_authorization(format!("OAuth {header}"));
        input.body = body;

        let admission = orchestrator.admit_at(input, &SessionId::generate(), now());
        assert!(admission.is_admitted(), "{:?}", admission.diagnostics());
    }

    #[test]
    fn test_should_let_header_override_body_on_collision() {
        let (orchestrator, _) = orchestrator();
        let signed = signed_input(base_params("Learner"));
        let signature = signed
            .body
            .iter()
            .find(|(k, _)| k == "oauth_signature")
            .map(|(_, v)| v.clone())
            .unwrap();

        // The body carries a forged signature; the header carries the real one.
        let mut input = LaunchInput::new("POST", URL).with_authorization(format!(
            "OAuth oauth_signature=\"{}\"",
            ltigate_auth::canonical::percent_encode(&signature)
        ));
        input.body = signed
            .body
            .into_iter()
            .map(|(k, v)| {
                if k == "oauth_signature" {
                    (k, "forged".to_owned())
                } else {
                    (k, v)
                }
            })
            .collect();

        let admission = orchestrator.admit_at(input, &SessionId::generate(), now());
        assert!(admission.is_admitted(), "{:?}", admission.diagnostics());
    }

    #[test]
    fn test_should_reject_launch_without_known_role() {
        let (orchestrator, store) = orchestrator();

        let admission = orchestrator.admit_at(
            signed_input(base_params("Mentor, urn:custom:role")),
            &SessionId::generate(),
            now(),
        );

        assert_eq!(
            admission,
            Admission::Rejected {
                failed_at: LaunchState::RoleResolved,
                errors: vec![LaunchError::MissingRole("Mentor, urn:custom:role".to_owned())],
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_should_reject_when_store_write_fails() {
        let orchestrator = LaunchOrchestrator::new(
            Arc::new(StaticCredentialProvider::new(vec![(
                KEY.to_owned(),
                SECRET.to_owned(),
            )])),
            Arc::new(FailingStore),
            Duration::hours(1),
        );

        let admission =
            orchestrator.admit_at(signed_input(base_params("Learner")), &SessionId::generate(), now());

        assert_eq!(kinds(&admission), vec![ErrorKind::SessionStoreFailure]);
        assert!(admission.session().is_none());
    }

    #[test]
    fn test_should_replace_session_on_relaunch() {
        let (orchestrator, store) = orchestrator();
        let id = SessionId::generate();

        let first = orchestrator.admit_at(signed_input(base_params("Instructor")), &id, now());
        assert!(first.is_admitted());

        let mut body = base_params("Learner");
        for (k, v) in &mut body {
            if k == "user_id" {
                *v = "someoneElse".to_owned();
            }
        }
        let second = orchestrator.admit_at(signed_input(body), &id, now());
        assert!(second.is_admitted());

        let stored = store.get(&id, now()).unwrap().unwrap();
        assert_eq!(stored.user_id, "someoneElse");
        assert_eq!(stored.capability, Capability::Learner);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_should_revoke_previous_session_when_relaunch_is_rejected() {
        let (orchestrator, store) = orchestrator();
        let id = SessionId::generate();

        assert!(
            orchestrator
                .admit_at(signed_input(base_params("Instructor")), &id, now())
                .is_admitted()
        );

        let mut tampered = signed_input(base_params("Learner"));
        for (k, v) in &mut tampered.body {
            if k == "user_id" {
                *v = "someoneElse".to_owned();
            }
        }
        let rejected = orchestrator.admit_at(tampered, &id, now());
        assert_eq!(kinds(&rejected), vec![ErrorKind::SignatureMismatch]);

        assert!(store.get(&id, now()).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_should_leave_other_sessions_alone_on_rejection() {
        let (orchestrator, store) = orchestrator();
        let admitted = SessionId::generate();
        assert!(
            orchestrator
                .admit_at(signed_input(base_params("Learner")), &admitted, now())
                .is_admitted()
        );

        let rejected =
            orchestrator.admit_at(LaunchInput::new("POST", URL), &SessionId::generate(), now());
        assert!(!rejected.is_admitted());

        assert!(store.get(&admitted, now()).unwrap().is_some());
    }

    #[test]
    fn test_should_lead_findings_with_header_parse_failure() {
        let (orchestrator, _) = orchestrator();
        let (oauth, lti): (Vec<_>, Vec<_>) = signed_input(base_params("Learner"))
            .body
            .into_iter()
            .partition(|(k, _)| k.starts_with("oauth_"));
        let header = oauth
            .iter()
            .map(|(k, v)| {
                if k == "oauth_nonce" {
                    format!("{k}={v}")
                } else {
                    format!(
                        "{k}=\"{}\"",
                        ltigate_auth::canonical::percent_encode(v)
                    )
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut input = LaunchInput::new("POST", URL).with_authorization(format!("OAuth {header}"));
        input.body = lti;

        let admission = orchestrator.admit_at(input, &SessionId::generate(), now());

        let kinds = kinds(&admission);
        assert_eq!(kinds[0], ErrorKind::OAuthParsingFailure);
        assert!(kinds[1..].iter().all(|k| *k == ErrorKind::MissingParameter));
        assert!(matches!(
            admission,
            Admission::Rejected {
                failed_at: LaunchState::Received,
                ..
            }
        ));
    }

    #[test]
    fn test_should_walk_states_forward_only() {
        let mut state = LaunchState::Received;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                LaunchState::Received,
                LaunchState::ParamsChecked,
                LaunchState::SignatureChecked,
                LaunchState::RoleResolved,
                LaunchState::SessionEstablished,
            ]
        );
        assert_eq!(LaunchState::Rejected.next(), None);
    }
}
