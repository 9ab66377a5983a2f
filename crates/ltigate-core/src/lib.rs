//! # ltigate-core
//!
//! Core types for validating LTI 1.x launch requests from a tool consumer
//! (the LMS initiating a launch).
//!
//! This crate provides:
//! - The immutable [`LaunchRequest`] model (method, base URL, ordered
//!   multi-valued parameters from query string, form body and the
//!   `Authorization: OAuth` header)
//! - The [`ParameterValidator`] for presence/format/consistency checks of
//!   LTI launch parameters
//! - The typed [`LaunchContext`] produced once every validation stage passes
//! - The [`ProblemReport`] diagnostic value used as the error side of the
//!   whole validation pipeline
//!
//! ## Modules
//!
//! - [`context`] - Validated launch context and the LTI role vocabulary
//! - [`params`] - LTI parameter names and the parameter validator
//! - [`problem`] - Problem codes and structured diagnostic reports
//! - [`request`] - The inbound launch request model and OAuth header parsing

pub mod context;
pub mod params;
pub mod problem;
pub mod request;

pub use context::{LaunchContext, LaunchPresentation, LisPerson, LtiRole};
pub use params::ParameterValidator;
pub use problem::{Diagnostics, ProblemCode, ProblemReport};
pub use request::LaunchRequest;

/// Type alias for results of launch validation stages.
///
/// Every stage of the pipeline returns its failure as a [`ProblemReport`]
/// value rather than raising; the report propagates to the HTTP layer
/// unchanged so operators see the original diagnostic fields.
pub type LaunchResult<T> = Result<T, ProblemReport>;
