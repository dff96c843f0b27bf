//! Parsing of `#[conf("...")]` tag text into a [`Directive`].
//!
//! A tag is a whitespace-separated list of `key:value` tokens. Keys are
//! case-insensitive; values are either bare (ending at the next whitespace)
//! or quoted with `"` or `'`, in which case they may contain whitespace and
//! backslash-escaped characters.
//!
//! ```text
//! env:DATABASE_URL provider:prod/db-url backend:vault default:'postgres://localhost'
//! ```

/// Where and how a single field should be loaded.
///
/// `default` distinguishes "no default" (`None`) from an empty default
/// (`Some("")`), which is a valid value for string fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive {
    /// Environment variable consulted first.
    pub env: Option<String>,
    /// Key passed to the provider backend.
    pub provider: Option<String>,
    /// Registered provider name; falls back to the loader's default backend.
    pub backend: Option<String>,
    /// Decoder name, always lower-case.
    pub format: Option<String>,
    /// Text decoded when every source fails.
    pub default: Option<String>,
}

impl Directive {
    /// Returns `true` when the directive names at least one place a value can
    /// come from.
    pub fn has_source(&self) -> bool {
        self.env.is_some() || self.provider.is_some() || self.default.is_some()
    }

    fn assign(&mut self, key: &str, value: String) -> Result<(), TagError> {
        match key {
            "env" => self.env = non_empty(value),
            "provider" => self.provider = non_empty(value),
            "backend" => self.backend = non_empty(value),
            "format" => self.format = non_empty(value.to_lowercase()),
            "default" => self.default = Some(value),
            other => return Err(TagError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Malformed tag text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// A `:` with nothing in front of it.
    #[error("empty tag key")]
    EmptyKey,

    /// A key other than `env`, `provider`, `backend`, `format` or `default`.
    #[error("unknown tag key {0:?}")]
    UnknownKey(String),

    /// A token that never reached a `:`, so its text is attached to no key.
    #[error("token {0:?} is not a key:value pair")]
    DanglingToken(String),

    /// A key followed by `:` and then nothing.
    #[error("key {0:?} missing value")]
    MissingValue(String),

    /// A quoted value with no closing quote.
    #[error("unterminated quoted value for key {0:?}")]
    UnterminatedQuote(String),
}

#[derive(Clone, Copy)]
enum State {
    Key,
    PreValue,
    Bare,
    Quoted(char),
}

/// Parse tag text into a [`Directive`].
///
/// Empty input yields an empty directive; rejecting a directive without any
/// source is left to the caller, which knows whether the attribute existed.
pub fn parse(raw: &str) -> Result<Directive, TagError> {
    let mut directive = Directive::default();
    let mut state = State::Key;
    let mut key = String::new();
    let mut value = String::new();
    let mut escape = false;

    for c in raw.chars() {
        match state {
            State::Key => {
                if c == ':' {
                    let name = key.trim().to_lowercase();
                    if name.is_empty() {
                        return Err(TagError::EmptyKey);
                    }
                    key = name;
                    state = State::PreValue;
                } else if c.is_whitespace() {
                    if !key.is_empty() {
                        return Err(TagError::DanglingToken(key));
                    }
                } else {
                    key.push(c);
                }
            }
            State::PreValue => {
                if c == '"' || c == '\'' {
                    state = State::Quoted(c);
                } else if !c.is_whitespace() {
                    value.push(c);
                    state = State::Bare;
                }
            }
            State::Bare => {
                if c.is_whitespace() {
                    directive.assign(&key, std::mem::take(&mut value))?;
                    key.clear();
                    state = State::Key;
                } else {
                    value.push(c);
                }
            }
            State::Quoted(quote) => {
                if escape {
                    value.push(c);
                    escape = false;
                } else if c == '\\' {
                    escape = true;
                } else if c == quote {
                    directive.assign(&key, std::mem::take(&mut value))?;
                    key.clear();
                    state = State::Key;
                } else {
                    value.push(c);
                }
            }
        }
    }

    match state {
        State::Key if !key.is_empty() => Err(TagError::DanglingToken(key)),
        State::Key => Ok(directive),
        State::PreValue => Err(TagError::MissingValue(key)),
        State::Bare => {
            directive.assign(&key, value)?;
            Ok(directive)
        }
        State::Quoted(_) => Err(TagError::UnterminatedQuote(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_keys() {
        let directive = parse(
            r#"env:DATABASE_URL provider:db-url backend:vault format:JSON default:"fallback value""#,
        )
        .unwrap();

        assert_eq!(directive.env.as_deref(), Some("DATABASE_URL"));
        assert_eq!(directive.provider.as_deref(), Some("db-url"));
        assert_eq!(directive.backend.as_deref(), Some("vault"));
        assert_eq!(directive.format.as_deref(), Some("json"));
        assert_eq!(directive.default.as_deref(), Some("fallback value"));
    }

    #[test]
    fn test_parse_single_quoted_default_with_leading_space() {
        let directive = parse("default:   'my name is dave'").unwrap();
        assert_eq!(directive.default.as_deref(), Some("my name is dave"));
        assert!(directive.has_source());
    }

    #[test]
    fn test_parse_escaped_quote() {
        let directive = parse(r#"default:"say \"hi\"""#).unwrap();
        assert_eq!(directive.default.as_deref(), Some(r#"say "hi""#));
    }

    #[test]
    fn test_parse_empty_default_is_kept() {
        let directive = parse(r#"default:"""#).unwrap();
        assert_eq!(directive.default.as_deref(), Some(""));
    }

    #[test]
    fn test_parse_keys_are_case_insensitive() {
        let directive = parse("ENV:FOO Provider:bar").unwrap();
        assert_eq!(directive.env.as_deref(), Some("FOO"));
        assert_eq!(directive.provider.as_deref(), Some("bar"));
    }

    #[test]
    fn test_parse_empty_input() {
        let directive = parse("").unwrap();
        assert_eq!(directive, Directive::default());
        assert!(!directive.has_source());

        assert_eq!(parse("   ").unwrap(), Directive::default());
    }

    #[test]
    fn test_parse_unknown_key() {
        assert_eq!(
            parse("env:FOO foo:bar"),
            Err(TagError::UnknownKey("foo".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_key() {
        assert_eq!(parse(":value"), Err(TagError::EmptyKey));
    }

    #[test]
    fn test_parse_token_without_colon() {
        assert_eq!(
            parse("envFOO"),
            Err(TagError::DanglingToken("envFOO".to_string()))
        );
        assert_eq!(
            parse("env FOO:bar"),
            Err(TagError::DanglingToken("env".to_string()))
        );
    }

    #[test]
    fn test_parse_missing_value() {
        assert_eq!(
            parse("env:FOO provider:"),
            Err(TagError::MissingValue("provider".to_string()))
        );
    }

    #[test]
    fn test_parse_unterminated_quote() {
        assert_eq!(
            parse("default:'open"),
            Err(TagError::UnterminatedQuote("default".to_string()))
        );
    }
}
