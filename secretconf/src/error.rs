//! Error types for configuration loading
//!
//! A load never stops at the first bad field. Every failed fetch or decode is
//! recorded as an [`Attempt`]; the attempts of one field form a
//! [`FieldError`], and all field errors of one load form an [`ErrorGroup`].

use std::fmt;
use std::time::Duration;

use crate::decode::DecodeError;
use crate::tag::TagError;

/// Where a failed attempt originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Environment variable lookup (including `<KEY>_FILE` indirection).
    Env,
    /// Provider backend fetch.
    Provider,
    /// Text was fetched but could not be decoded.
    Decoder,
    /// The field's tag was malformed or named no source.
    Tag,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Env => "env",
            Origin::Provider => "provider",
            Origin::Decoder => "decoder",
            Origin::Tag => "tag",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum Cause {
    /// The environment variable is not set.
    #[error("not set")]
    NotSet,

    /// Failed to read the file named by a `<KEY>_FILE` variable.
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path taken from the `<KEY>_FILE` variable
        path: String,
        source: std::io::Error,
    },

    /// The tag's backend (or the default backend) has no registered provider.
    #[error("provider not registered")]
    ProviderNotRegistered,

    /// The provider returned an error.
    #[error("{0:#}")]
    Provider(anyhow::Error),

    /// The provider returned an empty string.
    #[error("empty secret")]
    EmptySecret,

    /// The provider did not answer within the configured fetch timeout.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Tag(#[from] TagError),

    /// The tag parsed but names no env key, provider key or default.
    #[error("tag must specify env, provider, or default")]
    NoSource,

    /// A field finished resolution without a single recorded attempt.
    #[error("no env or provider attempts recorded")]
    NoAttempts,
}

/// One failed fetch or decode while resolving a field.
#[derive(Debug)]
pub struct Attempt {
    pub origin: Origin,
    /// Environment variable name, `backend:key` for providers, `default`
    /// for the default value, empty for tag failures.
    pub identifier: String,
    pub cause: Cause,
}

impl Attempt {
    pub fn new(origin: Origin, identifier: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self {
            origin,
            identifier: identifier.into(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.identifier.is_empty() {
            write!(f, "{}: {}", self.origin, self.cause)
        } else {
            write!(f, "{} ({}): {}", self.origin, self.identifier, self.cause)
        }
    }
}

impl std::error::Error for Attempt {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Every failed attempt for one field, in the order they were made.
#[derive(Debug)]
pub struct FieldError {
    /// Dot-joined field names from the root record, e.g. `database.creds.username`.
    pub path: String,
    pub attempts: Vec<Attempt>,
}

impl FieldError {
    /// A field error with a single attempt.
    pub fn single(path: impl Into<String>, attempt: Attempt) -> Self {
        Self {
            path: path.into(),
            attempts: vec![attempt],
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.path)?;
        for (i, attempt) in self.attempts.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{attempt}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

/// All fields that could not be resolved during one load, in visiting order.
#[derive(Debug, Default)]
pub struct ErrorGroup {
    fields: Vec<FieldError>,
}

impl ErrorGroup {
    /// Field errors in the order fields were visited.
    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<FieldError> {
        self.fields
    }

    /// Reports whether any field failed.
    pub fn has_failures(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up the error recorded for a field path.
    pub fn field(&self, path: &str) -> Option<&FieldError> {
        self.fields.iter().find(|field| field.path == path)
    }

    /// Add a field error; field errors without attempts are dropped.
    pub(crate) fn push(&mut self, field: FieldError) {
        if field.attempts.is_empty() {
            return;
        }
        self.fields.push(field);
    }
}

impl fmt::Display for ErrorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return Ok(());
        }
        f.write_str("secretconf: configuration errors: ")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorGroup {}

impl IntoIterator for ErrorGroup {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_display() {
        let env = Attempt::new(Origin::Env, "API_KEY", Cause::NotSet);
        assert_eq!(env.to_string(), "env (API_KEY): not set");

        let tag = Attempt::new(Origin::Tag, "", Cause::NoSource);
        assert_eq!(tag.to_string(), "tag: tag must specify env, provider, or default");
    }

    #[test]
    fn test_provider_cause_shows_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("vault: read secret");
        let attempt = Attempt::new(Origin::Provider, "vault:db", Cause::Provider(err));
        assert_eq!(
            attempt.to_string(),
            "provider (vault:db): vault: read secret: connection refused"
        );
    }

    #[test]
    fn test_group_display_lists_every_attempt() {
        let mut group = ErrorGroup::default();
        group.push(FieldError {
            path: "token".to_string(),
            attempts: vec![
                Attempt::new(Origin::Env, "TOKEN", Cause::NotSet),
                Attempt::new(Origin::Provider, "vault:token", Cause::EmptySecret),
            ],
        });
        group.push(FieldError::single(
            "api.port",
            Attempt::new(Origin::Tag, "", TagError::EmptyKey),
        ));

        assert_eq!(
            group.to_string(),
            "secretconf: configuration errors: token: env (TOKEN): not set; \
             provider (vault:token): empty secret; api.port: tag: empty tag key"
        );
        assert!(group.has_failures());
        assert_eq!(group.len(), 2);
        assert_eq!(group.field("api.port").unwrap().attempts.len(), 1);
    }

    #[test]
    fn test_group_drops_empty_field_errors() {
        let mut group = ErrorGroup::default();
        group.push(FieldError {
            path: "unused".to_string(),
            attempts: Vec::new(),
        });

        assert!(!group.has_failures());
        assert!(group.is_empty());
        assert_eq!(group.to_string(), "");
    }

    #[test]
    fn test_attempt_source_is_cause() {
        use std::error::Error;

        let attempt = Attempt::new(Origin::Env, "X", Cause::NotSet);
        assert_eq!(attempt.source().unwrap().to_string(), "not set");
    }
}
