//! Reference completion hooks.
//!
//! Deployments embed their own [`LaunchHandler`] to create sessions, render
//! the tool, or hand off to an application framework. The handler shipped
//! here logs the validated context and accepts, which is enough to smoke
//! test consumer configuration end to end.

use async_trait::async_trait;

use ltigate_auth::{BoxError, LaunchHandler};
use ltigate_core::LaunchContext;

/// Completion hook that logs the launch and accepts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLaunchHandler;

#[async_trait]
impl LaunchHandler for LoggingLaunchHandler {
    async fn execute(&self, context: &LaunchContext) -> Result<bool, BoxError> {
        tracing::info!(
            consumer_key = %context.consumer_key,
            user_id = context.user_id.as_deref().unwrap_or("<anonymous>"),
            resource_link_id = %context.resource_link_id,
            roles = ?context.roles,
            "validated launch received"
        );
        Ok(true)
    }
}
