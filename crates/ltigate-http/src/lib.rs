//! HTTP transport for LtiGate.
//!
//! This crate puts the launch pipeline behind hyper:
//!
//! - **Launch**: decodes the form post, rebuilds the signed URL, runs the
//!   orchestrator, and redirects to the welcome or error page
//! - **Session**: serves the session bound to the request cookie as JSON
//! - **Health**: a liveness probe for the server binary and load balancers

pub mod request;
pub mod response;
pub mod service;

pub use response::LaunchResponseBody;
pub use service::{HEALTH_PATH, LaunchHttpConfig, LaunchHttpService, SESSION_PATH};
