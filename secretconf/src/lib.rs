//! Configuration loading from environment variables and secret providers
//!
//! `secretconf` populates configuration structs field by field. Each field
//! carries a `#[conf("...")]` tag naming where its value may come from: an
//! environment variable, a key in an external secret provider (Vault, AWS
//! Secrets Manager, GCP Secret Manager, ...), and a default. The environment
//! always wins over the provider; the default is used only when every source
//! failed.
//!
//! Loading never stops at the first bad field. All failures are collected
//! into an [`ErrorGroup`] listing every source that was tried for every field,
//! so the caller can decide whether a partial configuration is acceptable.
//!
//! # Features
//!
//! - **Declarative**: `#[derive(Configurable)]` plus a tag per field
//! - **Pluggable providers**: any type implementing [`Provider`]
//! - **Formats**: plain text, `json`, `xml`, or custom decoders
//! - **Nested records**: a field decoded from a JSON/XML blob can have its
//!   own tagged fields resolved afterwards
//! - **Full diagnostics**: every failed attempt is reported, not just the last
//!
//! # Example
//!
//! ```rust
//! use secretconf::{Configurable, Loader, StaticProvider};
//! use std::time::Duration;
//!
//! #[derive(Debug, Default, Configurable)]
//! struct Config {
//!     #[conf("env:DATABASE_URL provider:prod/database-url")]
//!     database_url: String,
//!
//!     #[conf("env:REQUEST_TIMEOUT default:30s")]
//!     timeout: Duration,
//!
//!     // Not managed by the loader
//!     started: bool,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let loader = Loader::builder()
//!     .env_lookup(|_| None)
//!     .provider("vault", StaticProvider::new().with("prod/database-url", "postgres://vault"))
//!     .default_backend("vault")
//!     .build();
//!
//! let config: Config = loader.load_default().await.unwrap();
//! assert_eq!(config.database_url, "postgres://vault");
//! assert_eq!(config.timeout, Duration::from_secs(30));
//! # }
//! ```
//!
//! # Tags
//!
//! A tag is a space-separated list of `key:value` pairs. Values containing
//! spaces can be quoted with `"` or `'`.
//!
//! | Key        | Meaning                                                   |
//! |------------|-----------------------------------------------------------|
//! | `env`      | Environment variable, tried first                         |
//! | `provider` | Key looked up in the provider backend                     |
//! | `backend`  | Registered provider name (else the loader's default)      |
//! | `format`   | Decoder name: `json`, `xml`, `text`, or a custom one      |
//! | `default`  | Text decoded when every source failed                     |
//!
//! A field without a `#[conf]` attribute is left alone. A field with an
//! empty or malformed tag is reported in the [`ErrorGroup`] without
//! affecting the other fields.
//!
//! ## `#[conf("...", nested)]`
//!
//! Marks a field whose type is itself `Configurable` (and `Deserialize`).
//! After the field is decoded, its own tagged fields are resolved, so a
//! value embedded in the blob can be overridden by its own source.
//! `Option<T>` nested fields are allocated when they resolve.
//!
//! ```rust
//! # use secretconf::{Configurable, Loader};
//! #[derive(Debug, Default, serde::Deserialize, Configurable)]
//! struct Api {
//!     base_url: String,
//!     #[serde(default)]
//!     #[conf("env:API_TOKEN")]
//!     token: String,
//! }
//!
//! #[derive(Debug, Default, Configurable)]
//! struct Config {
//!     #[conf("env:API_JSON", nested)]
//!     api: Api,
//! }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! # let loader = Loader::builder()
//! #     .env_lookup(|key| match key {
//! #         "API_JSON" => Some(r#"{"base_url":"https://api.example","token":"embedded"}"#.into()),
//! #         "API_TOKEN" => Some("secret-token".into()),
//! #         _ => None,
//! #     })
//! #     .build();
//! # let config: Config = loader.load_default().await.unwrap();
//! # assert_eq!(config.api.token, "secret-token");
//! # }
//! ```
//!
//! # Decoding
//!
//! Without a `format:`, scalars are parsed from text (`bool` accepts only
//! `true`/`false`, integers are base 10 and range-checked, [`Duration`] uses
//! `5s`/`10m`/`1h 30m`, `Vec<u8>` takes the raw bytes). Maps, sequences and
//! nested records use the loader's default format, `json` unless changed
//! with [`LoaderBuilder::default_format`].
//!
//! Only structs with named fields can derive `Configurable`:
//!
//! ```compile_fail
//! #[derive(secretconf::Configurable)]
//! struct Config(String);
//! ```
//!
//! ```compile_fail
//! #[derive(secretconf::Configurable)]
//! enum Config { A, B }
//! ```
//!
//! Field types must implement [`Value`]:
//!
//! ```compile_fail
//! struct Opaque;
//!
//! #[derive(secretconf::Configurable)]
//! struct Config {
//!     #[conf("env:OPAQUE")]
//!     opaque: Opaque,
//! }
//! ```
//!
//! [`Duration`]: std::time::Duration

mod attempt;
pub mod decode;
mod error;
mod loader;
mod provider;
mod source;
pub mod tag;

pub use decode::{DecodeError, Decoder, Decoders, Shape, TargetType, Value};
pub use error::{Attempt, Cause, ErrorGroup, FieldError, Origin};
pub use loader::{
    Configurable, EnvLookup, KeyAffix, Loader, LoaderBuilder, Walker, DEFAULT_BACKEND,
};
pub use provider::{Provider, StaticProvider};
pub use secretconf_derive::Configurable;
pub use tag::{Directive, TagError};

// Re-export for macro-generated code
#[doc(hidden)]
pub mod __private {
    pub use async_trait::async_trait;
}
