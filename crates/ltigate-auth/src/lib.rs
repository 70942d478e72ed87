//! OAuth 1.0a request signature verification for LtiGate.
//!
//! LTI 1.0 launches are authenticated with single-legged OAuth 1.0a: the tool
//! consumer signs the launch form with `HMAC-SHA1` using a shared secret, and
//! the tool provider recomputes the signature and compares it.
//!
//! ```text
//! BaseString = METHOD "&" enc(NormalizedUrl) "&" enc(NormalizedParameters)
//! Signature  = Base64(HMAC-SHA1(enc(ConsumerSecret) "&", BaseString))
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use ltigate_auth::{OAuthRequest, StaticCredentialProvider, sign, verify_oauth1};
//! use ltigate_auth::credentials::ConsumerSecret;
//!
//! let provider = StaticCredentialProvider::new(vec![("key".to_owned(), "secret".to_owned())]);
//!
//! let mut params = BTreeMap::new();
//! params.insert("oauth_consumer_key".to_owned(), "key".to_owned());
//! params.insert("oauth_signature_method".to_owned(), "HMAC-SHA1".to_owned());
//! params.insert("user_id".to_owned(), "42".to_owned());
//!
//! let request = OAuthRequest::new("POST", "https://tool.example/launch", &params);
//! let signature = sign(&request, &ConsumerSecret::new("secret")).unwrap();
//! params.insert("oauth_signature".to_owned(), signature);
//!
//! let request = OAuthRequest::new("POST", "https://tool.example/launch", &params);
//! assert!(verify_oauth1(&request, &provider).is_ok());
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Percent-encoding, URL normalization, and base string construction
//! - [`credentials`] - Consumer secret lookup trait and in-memory implementation
//! - [`error`] - Authentication error types
//! - [`header`] - `Authorization: OAuth ...` header parsing and parameter merging
//! - [`signature`] - HMAC-SHA1 signing and verification

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod header;
pub mod signature;

pub use credentials::{ConsumerSecret, CredentialProvider, StaticCredentialProvider};
pub use error::AuthError;
pub use header::{OAuthHeader, merge_parameters};
pub use signature::{AuthResult, OAuthRequest, sign, verify_oauth1};
