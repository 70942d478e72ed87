//! LTI 1.0 launch admission for LtiGate.
//!
//! A tool consumer hands a user off to the tool by posting a signed
//! `basic-lti-launch-request` form. This crate decides whether to admit it:
//!
//! 1. [`validate`] checks that every protocol-mandated field is present and
//!    carries the expected literal value, collecting every finding.
//! 2. The OAuth 1.0a signature is verified with `ltigate-auth`.
//! 3. [`roles`] normalizes the `roles` claim into a set of role URNs.
//! 4. [`session`] decides the admitted capability and builds the session.
//! 5. [`orchestrator`] sequences the stages and hands the session to a
//!    [`store::SessionStore`].
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ltigate_auth::StaticCredentialProvider;
//! use ltigate_core::SessionId;
//! use ltigate_launch::{InMemorySessionStore, LaunchInput, LaunchOrchestrator};
//!
//! let orchestrator = LaunchOrchestrator::new(
//!     Arc::new(StaticCredentialProvider::new(vec![("key".to_owned(), "secret".to_owned())])),
//!     Arc::new(InMemorySessionStore::new()),
//!     chrono::Duration::hours(1),
//! );
//!
//! let input = LaunchInput::new("POST", "https://tool.example/launch");
//! let admission = orchestrator.admit(input, &SessionId::generate());
//! assert!(!admission.is_admitted());
//! ```

pub mod error;
pub mod orchestrator;
pub mod request;
pub mod roles;
pub mod session;
pub mod store;
pub mod validate;

pub use error::{Diagnostic, ErrorKind, LaunchError};
pub use orchestrator::{Admission, LaunchInput, LaunchOrchestrator, LaunchState, RedirectTarget};
pub use request::LaunchRequest;
pub use roles::{Role, RoleSet};
pub use session::{Capability, LaunchSession, OutcomeService, establish_session};
pub use store::{InMemorySessionStore, SessionStore, StoreError};
pub use validate::validate;
