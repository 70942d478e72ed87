//! Core types, configuration, and errors for LtiGate.
//!
//! This crate provides the building blocks shared by the launch pipeline, the
//! HTTP transport, and the server binary: environment-driven configuration,
//! the session identifier type, and the infrastructure error type.

mod config;
mod error;
mod types;

pub use config::{LtiGateConfig, parse_consumers};
pub use error::{LtiGateError, LtiGateResult};
pub use types::SessionId;
