//! # ltigate-server
//!
//! HTTP glue for the ltigate tool provider: the `POST /launch` endpoint,
//! TOML/environment configuration, and tracing setup.
//!
//! The HTTP layer owns two decisions the validation core leaves open: how a
//! problem report maps to a response status, and what a successful launch
//! returns. Everything else is delegated to
//! [`LaunchValidator`](ltigate_auth::LaunchValidator).

pub mod config;
pub mod hooks;
pub mod http;
pub mod observability;

pub use config::{ConfigError, ConsumerEntry, HttpConfig, ServerConfig, ValidationConfig, load_config};
pub use hooks::LoggingLaunchHandler;
pub use http::{AppState, router, status_for};
