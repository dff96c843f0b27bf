//! Per-field bookkeeping of failed fetch and decode attempts.

use crate::error::{Attempt, Cause, FieldError, Origin};
use crate::source::Source;

/// Identifier of attempts made with a tag's `default:` value.
const DEFAULT_IDENTIFIER: &str = "default";

/// Runs a field's sources in order and remembers why each one failed.
pub(crate) struct Collector {
    path: String,
    attempts: Vec<Attempt>,
}

impl Collector {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            attempts: Vec::new(),
        }
    }

    /// Fetch from `source` and decode the text with `decode`.
    ///
    /// Returns the decoded value on success. A failed fetch is recorded under
    /// the source's origin; a failed decode is recorded under
    /// [`Origin::Decoder`] with the source's identifier.
    pub(crate) async fn try_source<T, F>(&mut self, source: &dyn Source, decode: &F) -> Option<T>
    where
        F: Fn(&str) -> Result<T, Cause> + Sync,
    {
        let raw = match source.fetch().await {
            Ok(raw) => raw,
            Err(cause) => {
                self.fail(source.origin(), source.identifier(), cause);
                return None;
            }
        };
        match decode(&raw) {
            Ok(value) => {
                tracing::debug!(
                    field = %self.path,
                    origin = %source.origin(),
                    identifier = source.identifier(),
                    "field resolved"
                );
                Some(value)
            }
            Err(cause) => {
                self.fail(Origin::Decoder, source.identifier(), cause);
                None
            }
        }
    }

    /// Decode the tag's default after every source failed. A failure is
    /// recorded under [`Origin::Decoder`] with the identifier `default`.
    pub(crate) fn try_default<T, F>(&mut self, default: &str, decode: &F) -> Option<T>
    where
        F: Fn(&str) -> Result<T, Cause>,
    {
        match decode(default) {
            Ok(value) => {
                tracing::debug!(
                    field = %self.path,
                    origin = "default",
                    identifier = DEFAULT_IDENTIFIER,
                    "field resolved"
                );
                Some(value)
            }
            Err(cause) => {
                self.fail(Origin::Decoder, DEFAULT_IDENTIFIER, cause);
                None
            }
        }
    }

    pub(crate) fn fail(&mut self, origin: Origin, identifier: &str, cause: impl Into<Cause>) {
        let attempt = Attempt::new(origin, identifier, cause);
        tracing::debug!(field = %self.path, error = %attempt, "attempt failed");
        self.attempts.push(attempt);
    }

    /// Finish the field. A field that never recorded an attempt still reports
    /// one so it cannot vanish from the error group.
    pub(crate) fn finish(mut self) -> FieldError {
        if self.attempts.is_empty() {
            self.fail(Origin::Tag, "", Cause::NoAttempts);
        }
        FieldError {
            path: self.path,
            attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodeError, Value};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Fixed {
        origin: Origin,
        identifier: &'static str,
        value: Option<&'static str>,
    }

    #[async_trait]
    impl Source for Fixed {
        fn origin(&self) -> Origin {
            self.origin
        }

        fn identifier(&self) -> &str {
            self.identifier
        }

        async fn fetch(&self) -> Result<String, Cause> {
            self.value.map(str::to_string).ok_or(Cause::NotSet)
        }
    }

    fn decode_u32(raw: &str) -> Result<u32, Cause> {
        u32::decode_text(raw).map_err(Cause::from)
    }

    #[tokio::test]
    async fn test_success_records_nothing() {
        let mut collector = Collector::new("port");
        let source = Fixed {
            origin: Origin::Env,
            identifier: "PORT",
            value: Some("8080"),
        };

        assert_eq!(collector.try_source(&source, &decode_u32).await, Some(8080));
        assert!(collector.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_and_decode_failures_are_recorded() {
        let mut collector = Collector::new("port");
        let env = Fixed {
            origin: Origin::Env,
            identifier: "PORT",
            value: None,
        };
        let provider = Fixed {
            origin: Origin::Provider,
            identifier: "vault:port",
            value: Some("eighty"),
        };

        assert_eq!(collector.try_source(&env, &decode_u32).await, None);
        assert_eq!(collector.try_source(&provider, &decode_u32).await, None);

        let field = collector.finish();
        assert_eq!(field.path, "port");
        assert_eq!(field.attempts.len(), 2);
        assert_eq!(field.attempts[0].origin, Origin::Env);
        assert_eq!(field.attempts[0].identifier, "PORT");
        assert_eq!(field.attempts[1].origin, Origin::Decoder);
        assert_eq!(field.attempts[1].identifier, "vault:port");
        assert!(matches!(
            field.attempts[1].cause,
            Cause::Decode(DecodeError::Int(_))
        ));
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_default_resolution_is_logged() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut collector = Collector::new("port");
        let value = tracing::subscriber::with_default(subscriber, || {
            collector.try_default("8080", &decode_u32)
        });

        assert_eq!(value, Some(8080));
        assert!(collector.attempts.is_empty());
        let logs = capture.text();
        assert!(logs.contains("field resolved"), "{logs}");
        assert!(logs.contains(r#"identifier="default""#), "{logs}");
    }

    #[test]
    fn test_bad_default_is_a_decoder_attempt() {
        let mut collector = Collector::new("port");

        assert_eq!(collector.try_default("eighty", &decode_u32), None);

        let field = collector.finish();
        assert_eq!(field.attempts.len(), 1);
        assert_eq!(field.attempts[0].origin, Origin::Decoder);
        assert_eq!(field.attempts[0].identifier, "default");
    }

    #[test]
    fn test_finish_without_attempts_synthesizes_one() {
        let field = Collector::new("orphan").finish();

        assert_eq!(field.attempts.len(), 1);
        assert_eq!(field.attempts[0].origin, Origin::Tag);
        assert!(field.attempts[0].identifier.is_empty());
        assert_eq!(
            field.attempts[0].cause.to_string(),
            "no env or provider attempts recorded"
        );
    }
}
