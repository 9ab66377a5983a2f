//! # ltigate-auth
//!
//! OAuth 1.0a message authentication and launch validation for the ltigate
//! tool provider.
//!
//! This crate provides:
//! - [`SignatureVerifier`] - signature base string construction and
//!   HMAC-SHA1 verification with constant-time comparison
//! - [`NonceStore`] - replay protection keyed by (consumer key, nonce),
//!   with an in-memory implementation
//! - [`ConsumerStore`] - lookup of registered consumer credentials,
//!   with an in-memory implementation
//! - [`LaunchValidator`] - the orchestrator running signature, replay and
//!   parameter checks in order and invoking the [`LaunchHandler`] completion
//!   hook on success
//!
//! ## Pipeline
//!
//! ```text
//! HTTP layer -> LaunchValidator::validate
//!            -> consumer lookup -> signature -> replay -> parameters
//!            -> LaunchHandler::execute -> bool -> HTTP layer
//! ```
//!
//! Any stage failure short-circuits with a
//! [`ProblemReport`](ltigate_core::ProblemReport) returned unchanged.

pub mod consumer;
pub mod error;
pub mod nonce;
pub mod signature;
pub mod validator;

pub use consumer::{ConsumerCredential, ConsumerStore, InMemoryConsumerStore};
pub use error::{StoreError, StoreResult};
pub use nonce::{InMemoryNonceStore, NonceCheck, NonceStore, NonceWindow};
pub use signature::SignatureVerifier;
pub use validator::{BoxError, LaunchHandler, LaunchValidator, ValidatorConfig};
