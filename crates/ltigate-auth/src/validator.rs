//! Launch validation orchestration.
//!
//! [`LaunchValidator`] runs the pipeline stages in order - consumer lookup,
//! signature verification, replay check, parameter validation - short-
//! circuiting on the first failure, then invokes the completion hook with
//! the validated [`LaunchContext`]. The first failing stage's problem report
//! is returned unchanged so operators see the original diagnostic fields.
//!
//! The orchestrator is the boundary past which raw faults must not leak:
//! hook errors and panics are converted into `completion_error` reports,
//! and store failures or timeouts into `store_unavailable`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use ltigate_core::context::LaunchContext;
use ltigate_core::params::{OAUTH_CONSUMER_KEY, OAUTH_NONCE, OAUTH_TIMESTAMP, ParameterValidator};
use ltigate_core::problem::{ProblemCode, ProblemReport};
use ltigate_core::request::LaunchRequest;
use ltigate_core::LaunchResult;

use crate::consumer::ConsumerStore;
use crate::error::{StoreError, StoreResult};
use crate::nonce::{NonceCheck, NonceStore, NonceWindow};
use crate::signature::SignatureVerifier;

/// Boxed error type for completion hook failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The collaborator invoked once a launch is fully validated.
///
/// This is a capability, not a class hierarchy: any value implementing the
/// single method can complete launches. Returning `Ok(false)` signals that
/// downstream processing declined the launch; returning an error (or
/// panicking) is contained by the orchestrator.
#[async_trait]
pub trait LaunchHandler: Send + Sync {
    /// Processes a validated launch.
    ///
    /// # Errors
    ///
    /// Any error is converted into a `completion_error` problem report; it
    /// never propagates past the validator.
    async fn execute(&self, context: &LaunchContext) -> Result<bool, BoxError>;
}

/// Tunable parameters of the validation pipeline.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Replay window for timestamp and nonce checks.
    pub nonce_window: NonceWindow,

    /// Budget for each storage collaborator call. A store that does not
    /// answer in time fails the validation with `store_unavailable` rather
    /// than hanging the request.
    pub store_timeout: Duration,
}

impl ValidatorConfig {
    /// Sets the replay window.
    #[must_use]
    pub fn with_nonce_window(mut self, window: NonceWindow) -> Self {
        self.nonce_window = window;
        self
    }

    /// Sets the storage call budget.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            nonce_window: NonceWindow::default(),
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Orchestrates the launch validation pipeline.
///
/// ```text
/// Received -> SignatureChecked -> ReplayChecked -> ParametersChecked
///          -> CompletionInvoked -> Accepted | Rejected
/// ```
///
/// A validator is cheap to share across requests: the nonce store is the
/// only shared mutable state and carries its own synchronization.
pub struct LaunchValidator {
    consumers: Arc<dyn ConsumerStore>,
    nonces: Arc<dyn NonceStore>,
    handler: Arc<dyn LaunchHandler>,
    verifier: SignatureVerifier,
    parameters: ParameterValidator,
    config: ValidatorConfig,
}

impl LaunchValidator {
    /// Creates a validator with the default configuration.
    pub fn new(
        consumers: Arc<dyn ConsumerStore>,
        nonces: Arc<dyn NonceStore>,
        handler: Arc<dyn LaunchHandler>,
    ) -> Self {
        Self {
            consumers,
            nonces,
            handler,
            verifier: SignatureVerifier::new(),
            parameters: ParameterValidator::new(),
            config: ValidatorConfig::default(),
        }
    }

    /// Replaces the pipeline configuration.
    #[must_use]
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates one inbound launch request end to end.
    ///
    /// On success the completion hook has accepted the launch and the
    /// validated context is returned. On failure the problem report of the
    /// first failing stage is returned unchanged.
    pub async fn validate(&self, request: &LaunchRequest) -> LaunchResult<LaunchContext> {
        let consumer_key = request.first_nonempty(OAUTH_CONSUMER_KEY).ok_or_else(|| {
            ProblemReport::new(ProblemCode::ParameterMissing(OAUTH_CONSUMER_KEY.to_string()))
                .with_url(request.url())
        })?;

        // Consumer lookup happens before any cryptographic work; a disabled
        // consumer is indistinguishable from an unregistered key.
        let credential = self
            .guarded(self.consumers.get_credential(consumer_key))
            .await
            .map_err(|err| self.store_report(request, &err))?
            .filter(|credential| credential.enabled)
            .ok_or_else(|| {
                tracing::debug!(consumer_key, "launch from unknown or disabled consumer");
                ProblemReport::new(ProblemCode::ConsumerUnknown).with_url(request.url())
            })?;

        self.verifier.verify(request, credential.secret())?;
        self.check_replay(request, consumer_key).await?;
        let context = self.parameters.validate(request)?;
        self.complete(consumer_key, context).await
    }

    /// Sweeps expired nonce entries.
    ///
    /// Intended for an optional periodic background task; foreground
    /// validations never depend on it.
    pub async fn sweep_nonces(&self) -> StoreResult<u64> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.nonces.cleanup_expired(now).await
    }

    async fn check_replay(&self, request: &LaunchRequest, consumer_key: &str) -> LaunchResult<()> {
        // Presence was enforced by the signature stage; parse failures are
        // timestamp refusals, not missing parameters.
        let raw_timestamp = request.first_nonempty(OAUTH_TIMESTAMP).unwrap_or_default();
        let Ok(timestamp) = raw_timestamp.parse::<i64>() else {
            return Err(ProblemReport::new(ProblemCode::TimestampRefused)
                .with_message(format!("oauth_timestamp '{raw_timestamp}' is not a number"))
                .with_url(request.url()));
        };
        let nonce = request.first_nonempty(OAUTH_NONCE).unwrap_or_default();

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let outcome = self
            .guarded(self.nonces.check_and_record(
                consumer_key,
                nonce,
                timestamp,
                now,
                self.config.nonce_window,
            ))
            .await
            .map_err(|err| self.store_report(request, &err))?;

        match outcome {
            NonceCheck::Fresh => Ok(()),
            NonceCheck::TimestampRefused => {
                tracing::debug!(consumer_key, timestamp, now, "timestamp outside window");
                Err(ProblemReport::new(ProblemCode::TimestampRefused).with_url(request.url()))
            }
            NonceCheck::Replayed => {
                tracing::warn!(consumer_key, nonce, "nonce replay detected");
                Err(ProblemReport::new(ProblemCode::NonceUsed).with_url(request.url()))
            }
        }
    }

    async fn complete(
        &self,
        consumer_key: &str,
        context: LaunchContext,
    ) -> LaunchResult<LaunchContext> {
        // The hook runs in its own task so a panic surfaces as a join error
        // instead of unwinding through the validator.
        let handler = Arc::clone(&self.handler);
        let hook_context = context.clone();
        let joined =
            tokio::spawn(async move { handler.execute(&hook_context).await }).await;

        // Completion failures are application-level: the reports carry no
        // OAuth-specific fields.
        match joined {
            Ok(Ok(true)) => {
                tracing::info!(
                    consumer_key,
                    resource_link_id = %context.resource_link_id,
                    "launch accepted"
                );
                Ok(context)
            }
            Ok(Ok(false)) => {
                tracing::debug!(consumer_key, "completion hook declined launch");
                Err(ProblemReport::new(ProblemCode::CompletionRejected))
            }
            Ok(Err(cause)) => {
                tracing::warn!(consumer_key, error = %cause, "completion hook failed");
                Err(ProblemReport::new(ProblemCode::CompletionError)
                    .with_cause(cause.to_string()))
            }
            Err(join_error) => {
                tracing::error!(consumer_key, %join_error, "completion hook panicked");
                Err(ProblemReport::new(ProblemCode::CompletionError)
                    .with_cause(join_error.to_string()))
            }
        }
    }

    async fn guarded<T>(
        &self,
        operation: impl Future<Output = StoreResult<T>> + Send,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.config.store_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::timeout(
                self.config.store_timeout.as_millis() as u64
            )),
        }
    }

    fn store_report(&self, request: &LaunchRequest, err: &StoreError) -> ProblemReport {
        tracing::error!(error = %err, "storage collaborator unavailable");
        ProblemReport::new(ProblemCode::StoreUnavailable)
            .with_cause(err.to_string())
            .with_url(request.url())
    }
}
