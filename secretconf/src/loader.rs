//! The loader and the struct walker it drives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::attempt::Collector;
use crate::decode::{DecodeError, Decoder, Decoders, Shape, Value};
use crate::error::{Attempt, Cause, ErrorGroup, FieldError, Origin};
use crate::provider::Provider;
use crate::tag::{self, Directive};

/// Backend used by `provider:` tags without a `backend:` until changed.
pub const DEFAULT_BACKEND: &str = "aws";

/// Environment variable lookup function.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Produces a prefix or suffix for provider keys at lookup time.
pub type KeyAffix = Arc<dyn Fn() -> String + Send + Sync>;

/// A record whose `#[conf(...)]` fields can be populated by a [`Loader`].
///
/// Implemented by `#[derive(Configurable)]`; the generated `visit` hands
/// every annotated field to the [`Walker`] in declaration order.
#[async_trait]
pub trait Configurable: Send {
    async fn visit(&mut self, walker: &mut Walker<'_>);
}

/// Populates [`Configurable`] records from the environment and providers.
///
/// The loader is immutable once built and may be shared between tasks.
pub struct Loader {
    pub(crate) env_lookup: EnvLookup,
    pub(crate) providers: HashMap<String, Arc<dyn Provider>>,
    pub(crate) default_backend: Option<String>,
    pub(crate) decoders: Decoders,
    pub(crate) default_format: Option<String>,
    pub(crate) key_prefix: Option<KeyAffix>,
    pub(crate) key_suffix: Option<KeyAffix>,
    pub(crate) env_file_fallback: bool,
    pub(crate) fetch_timeout: Option<Duration>,
}

impl Loader {
    /// A loader reading the process environment, with the built-in decoders,
    /// `json` as the default format, [`DEFAULT_BACKEND`] as the default
    /// backend and no providers.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::default()
    }

    /// Populate `target`.
    ///
    /// Every annotated field is attempted, even after others fail.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorGroup`] with one [`FieldError`] per field that could
    /// not be resolved. Fields that did resolve keep their new values.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(config = std::any::type_name::<T>())
    )]
    pub async fn load<T: Configurable>(&self, target: &mut T) -> Result<(), ErrorGroup> {
        let mut walker = Walker::new(self);
        target.visit(&mut walker).await;
        let group = walker.group;
        tracing::debug!(failures = group.len(), "configuration load finished");
        if group.has_failures() {
            Err(group)
        } else {
            Ok(())
        }
    }

    /// Build `T::default()` and populate it.
    ///
    /// # Errors
    ///
    /// Same as [`Loader::load`].
    pub async fn load_default<T: Configurable + Default>(&self) -> Result<T, ErrorGroup> {
        let mut target = T::default();
        self.load(&mut target).await?;
        Ok(target)
    }

    /// Format to use for a field: the tag's, else the default format for
    /// composite shapes, else none (plain text decoding).
    fn format_for<'a>(&'a self, directive: &'a Directive, shape: Shape) -> Option<&'a str> {
        directive.format.as_deref().or_else(|| {
            if shape.is_composite() {
                self.default_format.as_deref()
            } else {
                None
            }
        })
    }

    fn decode<T: Value>(&self, format: Option<&str>, raw: &str) -> Result<T, DecodeError> {
        match format {
            Some(name) => self.decoders.decode(name, raw),
            None => T::decode_text(raw),
        }
    }

    fn decode_record<T: DeserializeOwned>(
        &self,
        format: Option<&str>,
        raw: &str,
    ) -> Result<T, DecodeError> {
        match format {
            Some(name) => self.decoders.decode_record(name, raw),
            None => crate::decode::from_json(raw),
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<_> = self.providers.keys().collect();
        providers.sort();
        f.debug_struct("Loader")
            .field("providers", &providers)
            .field("default_backend", &self.default_backend)
            .field("decoders", &self.decoders)
            .field("default_format", &self.default_format)
            .field("env_file_fallback", &self.env_file_fallback)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Loader`]. Names (backends, formats) are case-insensitive;
/// empty names are ignored.
pub struct LoaderBuilder {
    loader: Loader,
}

impl Default for LoaderBuilder {
    fn default() -> Self {
        Self {
            loader: Loader {
                env_lookup: Arc::new(|name: &str| std::env::var(name).ok()),
                providers: HashMap::new(),
                default_backend: Some(DEFAULT_BACKEND.to_string()),
                decoders: Decoders::default(),
                default_format: Some("json".to_string()),
                key_prefix: None,
                key_suffix: None,
                env_file_fallback: false,
                fetch_timeout: None,
            },
        }
    }
}

impl LoaderBuilder {
    /// Register a provider under a backend name referenced by `backend:`.
    pub fn provider(mut self, name: &str, provider: impl Provider + 'static) -> Self {
        if !name.is_empty() {
            self.loader
                .providers
                .insert(name.to_lowercase(), Arc::new(provider));
        }
        self
    }

    /// Backend used by tags that have a `provider:` key but no `backend:`.
    /// An empty name clears it.
    pub fn default_backend(mut self, name: &str) -> Self {
        self.loader.default_backend = (!name.is_empty()).then(|| name.to_lowercase());
        self
    }

    /// Replace the process environment lookup, e.g. for tests or sandboxing.
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.loader.env_lookup = Arc::new(lookup);
        self
    }

    /// Register (or override) a decoder referenced by `format:`.
    pub fn decoder(mut self, name: &str, decoder: Decoder) -> Self {
        self.loader.decoders.register(name, decoder);
        self
    }

    /// Format used for composite fields whose tag has no `format:`.
    pub fn default_format(mut self, name: &str) -> Self {
        self.loader.default_format = (!name.is_empty()).then(|| name.to_lowercase());
        self
    }

    /// Prepend the result of `prefix` to every provider key.
    pub fn provider_prefix<F>(mut self, prefix: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.loader.key_prefix = Some(Arc::new(prefix));
        self
    }

    /// Append the result of `suffix` to every provider key.
    pub fn provider_suffix<F>(mut self, suffix: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.loader.key_suffix = Some(Arc::new(suffix));
        self
    }

    /// Also try `<KEY>_FILE` after `<KEY>`, reading the named file.
    pub fn env_file_fallback(mut self, enabled: bool) -> Self {
        self.loader.env_file_fallback = enabled;
        self
    }

    /// Bound every provider fetch. Requires a Tokio runtime with the time
    /// driver enabled.
    pub fn fetch_timeout(mut self, limit: Duration) -> Self {
        self.loader.fetch_timeout = Some(limit);
        self
    }

    pub fn build(self) -> Loader {
        self.loader
    }
}

/// Walks a record's annotated fields on behalf of a [`Loader`].
///
/// Handed to [`Configurable::visit`]; derived code calls [`Walker::field`],
/// [`Walker::nested`] or [`Walker::nested_option`] for each annotated field.
pub struct Walker<'a> {
    loader: &'a Loader,
    prefix: String,
    group: ErrorGroup,
}

impl<'a> Walker<'a> {
    fn new(loader: &'a Loader) -> Self {
        Self {
            loader,
            prefix: String::new(),
            group: ErrorGroup::default(),
        }
    }

    /// Resolve a plain field.
    pub async fn field<T: Value>(&mut self, name: &str, tag: &str, slot: &mut T) {
        let path = self.path_for(name);
        let Some(directive) = self.directive(&path, tag) else {
            return;
        };
        let loader = self.loader;
        let format = loader.format_for(&directive, T::shape());
        let decode = |raw: &str| loader.decode::<T>(format, raw).map_err(Cause::from);

        let resolved = self.resolve(path, &directive, decode).await;
        match resolved {
            Ok(value) => *slot = value,
            Err(field) => self.group.push(field),
        }
    }

    /// Resolve a nested record, then walk its own annotated fields.
    pub async fn nested<T>(&mut self, name: &str, tag: &str, slot: &mut T)
    where
        T: Configurable + DeserializeOwned,
    {
        let path = self.path_for(name);
        let Some(value) = self.resolve_record::<T>(&path, tag).await else {
            return;
        };
        *slot = value;
        self.descend(path, slot).await;
    }

    /// Resolve an optional nested record, allocating it on success.
    pub async fn nested_option<T>(&mut self, name: &str, tag: &str, slot: &mut Option<T>)
    where
        T: Configurable + DeserializeOwned,
    {
        let path = self.path_for(name);
        let Some(value) = self.resolve_record::<T>(&path, tag).await else {
            return;
        };
        let record = slot.insert(value);
        self.descend(path, record).await;
    }

    async fn resolve_record<T: DeserializeOwned + Send>(&mut self, path: &str, tag: &str) -> Option<T> {
        let directive = self.directive(path, tag)?;
        let loader = self.loader;
        let format = loader.format_for(&directive, Shape::Record);
        let decode = |raw: &str| loader.decode_record::<T>(format, raw).map_err(Cause::from);

        let resolved = self.resolve(path.to_string(), &directive, decode).await;
        match resolved {
            Ok(value) => Some(value),
            Err(field) => {
                self.group.push(field);
                None
            }
        }
    }

    async fn descend<T: Configurable>(&mut self, path: String, record: &mut T) {
        let parent = std::mem::replace(&mut self.prefix, path);
        record.visit(self).await;
        self.prefix = parent;
    }

    fn path_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.prefix)
        }
    }

    /// Parse and validate a tag; failures are recorded against the field.
    fn directive(&mut self, path: &str, tag: &str) -> Option<Directive> {
        let cause = match tag::parse(tag) {
            Ok(directive) if directive.has_source() => return Some(directive),
            Ok(_) => Cause::NoSource,
            Err(err) => Cause::Tag(err),
        };
        self.group
            .push(FieldError::single(path, Attempt::new(Origin::Tag, "", cause)));
        None
    }

    /// Try the directive's sources in order, then its default.
    async fn resolve<T, F>(
        &self,
        path: String,
        directive: &Directive,
        decode: F,
    ) -> Result<T, FieldError>
    where
        T: Send,
        F: Fn(&str) -> Result<T, Cause> + Send + Sync,
    {
        let mut collector = Collector::new(path);
        for source in self.loader.sources_for(directive) {
            if let Some(value) = collector.try_source(source.as_ref(), &decode).await {
                return Ok(value);
            }
        }
        if let Some(default) = &directive.default {
            if let Some(value) = collector.try_default(default, &decode) {
                return Ok(value);
            }
        }
        Err(collector.finish())
    }
}
