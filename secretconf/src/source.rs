//! Places a field's raw text can be fetched from.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Cause, Origin};
use crate::loader::{EnvLookup, Loader};
use crate::provider::Provider;
use crate::tag::Directive;

/// Identifier used when neither the tag nor the loader names a backend.
const UNNAMED_BACKEND: &str = "(default)";

/// A single fetchable origin for a field value.
#[async_trait]
pub(crate) trait Source: Send + Sync {
    fn origin(&self) -> Origin;

    fn identifier(&self) -> &str;

    async fn fetch(&self) -> Result<String, Cause>;
}

/// Reads one environment variable.
pub(crate) struct EnvSource<'a> {
    key: String,
    lookup: &'a EnvLookup,
}

#[async_trait]
impl Source for EnvSource<'_> {
    fn origin(&self) -> Origin {
        Origin::Env
    }

    fn identifier(&self) -> &str {
        &self.key
    }

    async fn fetch(&self) -> Result<String, Cause> {
        (self.lookup)(&self.key).ok_or(Cause::NotSet)
    }
}

/// Reads the file named by a `<KEY>_FILE` environment variable.
///
/// Used for Kubernetes/Docker mounted secrets; surrounding whitespace is
/// trimmed from the file contents.
pub(crate) struct EnvFileSource<'a> {
    key: String,
    lookup: &'a EnvLookup,
}

#[async_trait]
impl Source for EnvFileSource<'_> {
    fn origin(&self) -> Origin {
        Origin::Env
    }

    fn identifier(&self) -> &str {
        &self.key
    }

    async fn fetch(&self) -> Result<String, Cause> {
        let path = (self.lookup)(&self.key).ok_or(Cause::NotSet)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents.trim().to_string()),
            Err(source) => Err(Cause::FileRead { path, source }),
        }
    }
}

/// Fetches from a registered provider backend.
pub(crate) struct ProviderSource<'a> {
    identifier: String,
    key: String,
    provider: Option<&'a dyn Provider>,
    timeout: Option<Duration>,
}

#[async_trait]
impl Source for ProviderSource<'_> {
    fn origin(&self) -> Origin {
        Origin::Provider
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn fetch(&self) -> Result<String, Cause> {
        let provider = self.provider.ok_or(Cause::ProviderNotRegistered)?;
        let value = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, provider.fetch(&self.key))
                .await
                .map_err(|_| Cause::Timeout(limit))?,
            None => provider.fetch(&self.key).await,
        }
        .map_err(Cause::Provider)?;

        if value.is_empty() {
            return Err(Cause::EmptySecret);
        }
        Ok(value)
    }
}

impl Loader {
    /// Sources for a directive in precedence order: environment first, then
    /// the `<KEY>_FILE` indirection when enabled, then the provider.
    pub(crate) fn sources_for<'a>(&'a self, directive: &Directive) -> Vec<Box<dyn Source + 'a>> {
        let mut sources: Vec<Box<dyn Source + 'a>> = Vec::new();
        if let Some(key) = &directive.env {
            sources.push(Box::new(EnvSource {
                key: key.clone(),
                lookup: &self.env_lookup,
            }));
            if self.env_file_fallback {
                sources.push(Box::new(EnvFileSource {
                    key: format!("{key}_FILE"),
                    lookup: &self.env_lookup,
                }));
            }
        }
        if let Some(key) = &directive.provider {
            sources.push(Box::new(self.provider_source(directive.backend.as_deref(), key)));
        }
        sources
    }

    fn provider_source<'a>(&'a self, backend: Option<&str>, key: &str) -> ProviderSource<'a> {
        let backend = backend
            .map(str::to_lowercase)
            .or_else(|| self.default_backend.clone());
        let provider = backend
            .as_deref()
            .and_then(|name| self.providers.get(name))
            .map(|provider| provider.as_ref());
        let key = self.qualify_key(key);

        ProviderSource {
            identifier: format!("{}:{key}", backend.as_deref().unwrap_or(UNNAMED_BACKEND)),
            key,
            provider,
            timeout: self.fetch_timeout,
        }
    }

    fn qualify_key(&self, key: &str) -> String {
        let prefix = self.key_prefix.as_ref().map(|f| f()).unwrap_or_default();
        let suffix = self.key_suffix.as_ref().map(|f| f()).unwrap_or_default();
        format!("{prefix}{key}{suffix}")
    }
}
