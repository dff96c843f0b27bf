//! Secret provider contract.
//!
//! Concrete backends (Vault, AWS Secrets Manager, GCP Secret Manager, ...)
//! live outside this crate; they only need to implement [`Provider`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// Fetches a secret value by key from an external system.
///
/// Any error, and any empty string, counts as a failed attempt. The loader
/// awaits fetches one at a time; dropping the `load` future cancels the
/// fetch in flight.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot produce a value for `key`.
    async fn fetch(&self, key: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    async fn fetch(&self, key: &str) -> anyhow::Result<String> {
        (**self).fetch(key).await
    }
}

/// Provider backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    secrets: HashMap<String, String>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret, replacing any previous value for `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for StaticProvider
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            secrets: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl Provider for StaticProvider {
    async fn fetch(&self, key: &str) -> anyhow::Result<String> {
        self.secrets
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("secret {key:?} not found"))
    }
}
