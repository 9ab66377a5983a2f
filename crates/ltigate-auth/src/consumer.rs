//! Consumer credential lookup.
//!
//! The consumer store owns the registered tool consumers and their shared
//! secrets; the validator only borrows a credential for the duration of one
//! validation call. Persistence backends implement [`ConsumerStore`]; this
//! crate ships the in-memory reference implementation.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreResult;

/// Credentials and settings of one registered tool consumer.
///
/// The shared secret is never logged and never included in diagnostics;
/// the `Debug` impl redacts it.
#[derive(Clone)]
pub struct ConsumerCredential {
    key: String,
    secret: String,
    /// Display name of the consumer, for operator-facing output.
    pub name: Option<String>,
    /// Disabled consumers fail validation exactly like unregistered ones.
    pub enabled: bool,
}

impl ConsumerCredential {
    /// Creates an enabled credential.
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            name: None,
            enabled: true,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The consumer key, unique per tool consumer.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The shared secret. Use only for signature computation; never log it.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for ConsumerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredential")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Storage trait for registered consumer credentials.
///
/// Lookups are read-only from the validator's perspective; implementations
/// own their own concurrency discipline and may block, so callers guard
/// invocations with a timeout.
#[async_trait]
pub trait ConsumerStore: Send + Sync {
    /// Looks up a credential by consumer key.
    ///
    /// Returns `None` for unregistered keys. Disabled consumers are still
    /// returned; the validator treats them as unknown so the distinction is
    /// not disclosed to the consumer.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_credential(&self, consumer_key: &str) -> StoreResult<Option<ConsumerCredential>>;
}

/// In-memory consumer store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryConsumerStore {
    consumers: DashMap<String, ConsumerCredential>,
}

impl InMemoryConsumerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a consumer.
    pub fn register(&self, credential: ConsumerCredential) {
        self.consumers.insert(credential.key().to_string(), credential);
    }

    /// Removes a consumer by key.
    pub fn remove(&self, consumer_key: &str) {
        self.consumers.remove(consumer_key);
    }
}

#[async_trait]
impl ConsumerStore for InMemoryConsumerStore {
    async fn get_credential(&self, consumer_key: &str) -> StoreResult<Option<ConsumerCredential>> {
        Ok(self.consumers.get(consumer_key).map(|c| c.clone()))
    }
}
