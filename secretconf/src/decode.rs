//! Conversion of fetched text into typed field values.
//!
//! Every managed field type implements [`Value`], which describes its
//! [`Shape`] and how to decode it from plain text. Structured formats
//! (`json`, `xml`, custom decoders) go through serde, so every [`Value`] is
//! also [`DeserializeOwned`].
//!
//! # Format resolution
//!
//! 1. The tag's `format:` wins when present.
//! 2. Otherwise composite shapes (maps, sequences, records) use the loader's
//!    default format (`json` unless configured).
//! 3. Otherwise the value is decoded from text by [`Value::decode_text`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

/// Kind of a decode target, used to pick a decoding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `true` / `false`.
    Bool,
    /// Signed integer of the given bit width.
    Int { bits: u32 },
    /// Unsigned integer of the given bit width.
    Uint { bits: u32 },
    /// Floating point number of the given bit width.
    Float { bits: u32 },
    /// Elapsed time written as `5s`, `10m`, `1h 30m`.
    Duration,
    /// Raw bytes taken verbatim from the text.
    Bytes,
    /// Text taken verbatim.
    String,
    /// A type that decodes itself from text (`FromStr`).
    Text,
    /// Maps, sequences, arrays, dynamic documents.
    Composite,
    /// A nested configuration record.
    Record,
}

impl Shape {
    /// Whether fields of this shape pick up the default structured format
    /// when the tag names none.
    pub fn is_composite(self) -> bool {
        matches!(self, Shape::Composite | Shape::Record)
    }
}

/// Description of a decode target handed to custom decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetType {
    /// Fully qualified Rust type name.
    pub name: &'static str,
    /// Decoding shape of the type.
    pub shape: Shape,
}

impl TargetType {
    /// Describe a [`Value`] type.
    pub fn of<T: Value>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            shape: T::shape(),
        }
    }

    /// Describe a nested configuration record.
    pub fn record<T>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            shape: Shape::Record,
        }
    }
}

/// Failure to turn text into a value.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("parse bool: {0}")]
    Bool(#[from] std::str::ParseBoolError),

    #[error("parse int: {0}")]
    Int(#[from] std::num::ParseIntError),

    #[error("parse float: {0}")]
    Float(#[from] std::num::ParseFloatError),

    /// The number is finite in the text but overflows the target width.
    #[error("parse float: {0:?} out of range")]
    FloatRange(String),

    #[error("parse duration: {0}")]
    Duration(#[from] humantime::DurationError),

    #[error("json decode: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml decode: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("text decode: {0}")]
    Text(String),

    /// A registered custom decoder rejected the text.
    #[error("{decoder} decode: {error:#}")]
    Custom {
        decoder: String,
        error: anyhow::Error,
    },

    /// The tag (or the default format) names a decoder that is not registered.
    #[error("unknown format {0:?}")]
    UnknownFormat(String),
}

/// User-supplied conversion from text to an intermediate JSON document,
/// which is then deserialized into the target type.
pub type DecodeFn =
    dyn Fn(&str, &TargetType) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static;

/// A registered decoder.
#[derive(Clone)]
pub enum Decoder {
    /// `serde_json`.
    Json,
    /// `quick-xml`; the root element name is not checked.
    Xml,
    /// [`Value::decode_text`]; composite targets fall back to JSON.
    Text,
    /// A custom decoder producing a JSON document.
    Custom(Arc<DecodeFn>),
}

impl Decoder {
    /// Wrap a function as a custom decoder.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &TargetType) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Deserialize `raw` into `T` with a structured decoder.
    ///
    /// `name` is the registry name the decoder was found under and is only
    /// used to label custom decoder failures.
    pub fn deserialize<T: DeserializeOwned>(
        &self,
        name: &str,
        raw: &str,
        target: &TargetType,
    ) -> Result<T, DecodeError> {
        match self {
            Decoder::Json | Decoder::Text => Ok(serde_json::from_str(raw)?),
            Decoder::Xml => Ok(quick_xml::de::from_str(raw)?),
            Decoder::Custom(f) => {
                let document = f(raw, target).map_err(|error| DecodeError::Custom {
                    decoder: name.to_string(),
                    error,
                })?;
                Ok(serde_json::from_value(document)?)
            }
        }
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoder::Json => f.write_str("Json"),
            Decoder::Xml => f.write_str("Xml"),
            Decoder::Text => f.write_str("Text"),
            Decoder::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Decoders keyed by lower-case format name.
#[derive(Debug, Clone)]
pub struct Decoders {
    by_name: HashMap<String, Decoder>,
}

impl Default for Decoders {
    fn default() -> Self {
        let by_name = [
            ("json", Decoder::Json),
            ("xml", Decoder::Xml),
            ("text", Decoder::Text),
        ]
        .into_iter()
        .map(|(name, decoder)| (name.to_string(), decoder))
        .collect();
        Self { by_name }
    }
}

impl Decoders {
    /// Register or replace a decoder. Empty names are ignored.
    pub fn register(&mut self, name: &str, decoder: Decoder) {
        if name.is_empty() {
            return;
        }
        self.by_name.insert(name.to_lowercase(), decoder);
    }

    pub fn get(&self, name: &str) -> Option<&Decoder> {
        self.by_name.get(&name.to_lowercase())
    }

    /// Decode `raw` into a [`Value`] using the named format.
    pub fn decode<T: Value>(&self, name: &str, raw: &str) -> Result<T, DecodeError> {
        match self.get(name) {
            None => Err(DecodeError::UnknownFormat(name.to_string())),
            Some(Decoder::Text) => T::decode_text(raw),
            Some(decoder) => decoder.deserialize(name, raw, &TargetType::of::<T>()),
        }
    }

    /// Decode `raw` into a nested configuration record using the named format.
    pub fn decode_record<T: DeserializeOwned>(
        &self,
        name: &str,
        raw: &str,
    ) -> Result<T, DecodeError> {
        match self.get(name) {
            None => Err(DecodeError::UnknownFormat(name.to_string())),
            Some(decoder) => decoder.deserialize(name, raw, &TargetType::record::<T>()),
        }
    }
}

/// A type a managed field can hold.
///
/// Implemented for primitives, `String`, [`Duration`], byte vectors,
/// collections, `Option<T>` and common `FromStr` types. Use
/// [`text_value!`](crate::text_value) or [`json_value!`](crate::json_value)
/// to opt in other types.
pub trait Value: DeserializeOwned + Send + 'static {
    /// Decoding shape of the type.
    fn shape() -> Shape;

    /// Decode from plain text (no structured format selected).
    fn decode_text(raw: &str) -> Result<Self, DecodeError>;
}

impl Value for String {
    fn shape() -> Shape {
        Shape::String
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        Ok(raw.to_string())
    }
}

impl Value for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        Ok(raw.parse()?)
    }
}

macro_rules! impl_number {
    ($shape:ident: $($ty:ty),*) => {
        $(
            impl Value for $ty {
                fn shape() -> Shape {
                    Shape::$shape { bits: <$ty>::BITS }
                }

                fn decode_text(raw: &str) -> Result<Self, DecodeError> {
                    Ok(raw.parse()?)
                }
            }
        )*
    };
}

impl_number!(Int: i8, i16, i32, i64, i128, isize);
impl_number!(Uint: u8, u16, u32, u64, u128, usize);

/// Whether the text spells out an infinity rather than overflowing to one.
fn is_explicit_infinity(raw: &str) -> bool {
    let unsigned = raw.trim_start_matches(['+', '-']);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

macro_rules! impl_float {
    ($($ty:ty => $bits:literal),*) => {
        $(
            impl Value for $ty {
                fn shape() -> Shape {
                    Shape::Float { bits: $bits }
                }

                fn decode_text(raw: &str) -> Result<Self, DecodeError> {
                    let value: $ty = raw.parse()?;
                    if value.is_infinite() && !is_explicit_infinity(raw) {
                        return Err(DecodeError::FloatRange(raw.to_string()));
                    }
                    Ok(value)
                }
            }
        )*
    };
}

impl_float!(f32 => 32, f64 => 64);

impl Value for Duration {
    fn shape() -> Shape {
        Shape::Duration
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        Ok(humantime::parse_duration(raw)?)
    }
}

impl<T: Value> Value for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        T::decode_text(raw).map(Some)
    }
}

/// `Vec<u8>` takes the text's bytes verbatim; every other element type is a
/// JSON array.
impl<T: DeserializeOwned + Send + 'static> Value for Vec<T> {
    fn shape() -> Shape {
        if is_bytes::<T>() {
            Shape::Bytes
        } else {
            Shape::Composite
        }
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        let bytes: Box<dyn std::any::Any> = Box::new(raw.as_bytes().to_vec());
        match bytes.downcast::<Vec<T>>() {
            Ok(bytes) => Ok(*bytes),
            Err(_) => from_json(raw),
        }
    }
}

fn is_bytes<T: 'static>() -> bool {
    std::any::TypeId::of::<T>() == std::any::TypeId::of::<u8>()
}

impl<T, const N: usize> Value for [T; N]
where
    [T; N]: DeserializeOwned,
    T: Send + 'static,
{
    fn shape() -> Shape {
        Shape::Composite
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        from_json(raw)
    }
}

impl<K, V, S> Value for HashMap<K, V, S>
where
    K: DeserializeOwned + Eq + Hash + Send + 'static,
    V: DeserializeOwned + Send + 'static,
    S: std::hash::BuildHasher + Default + Send + 'static,
{
    fn shape() -> Shape {
        Shape::Composite
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        from_json(raw)
    }
}

impl<K, V> Value for BTreeMap<K, V>
where
    K: DeserializeOwned + Ord + Send + 'static,
    V: DeserializeOwned + Send + 'static,
{
    fn shape() -> Shape {
        Shape::Composite
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        from_json(raw)
    }
}

impl Value for serde_json::Value {
    fn shape() -> Shape {
        Shape::Composite
    }

    fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        from_json(raw)
    }
}

#[doc(hidden)]
pub fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    Ok(serde_json::from_str(raw)?)
}

#[doc(hidden)]
pub fn from_text<T>(raw: &str) -> Result<T, DecodeError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e: T::Err| DecodeError::Text(e.to_string()))
}

/// Implement [`Value`] for types that decode themselves from text via
/// `FromStr`.
///
/// ```rust
/// use std::str::FromStr;
///
/// #[derive(Debug, PartialEq, serde::Deserialize)]
/// enum Level { Low, High }
///
/// impl FromStr for Level {
///     type Err = String;
///     fn from_str(s: &str) -> Result<Self, Self::Err> {
///         match s {
///             "low" => Ok(Level::Low),
///             "high" => Ok(Level::High),
///             other => Err(format!("unknown level {other}")),
///         }
///     }
/// }
///
/// secretconf::text_value!(Level);
///
/// use secretconf::Value;
/// assert_eq!(Level::decode_text("high").unwrap(), Level::High);
/// ```
#[macro_export]
macro_rules! text_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Value for $ty {
                fn shape() -> $crate::Shape {
                    $crate::Shape::Text
                }

                fn decode_text(raw: &str) -> ::std::result::Result<Self, $crate::DecodeError> {
                    $crate::decode::from_text(raw)
                }
            }
        )+
    };
}

/// Implement [`Value`] for `Deserialize` types that decode themselves from a
/// JSON document even when no format is given.
///
/// ```rust
/// #[derive(Debug, PartialEq, serde::Deserialize)]
/// struct Endpoint {
///     host: String,
///     port: u16,
/// }
///
/// secretconf::json_value!(Endpoint);
///
/// use secretconf::{Shape, Value};
/// assert_eq!(Endpoint::shape(), Shape::Composite);
/// assert_eq!(
///     Endpoint::decode_text(r#"{"host":"db","port":5432}"#).unwrap(),
///     Endpoint { host: "db".into(), port: 5432 },
/// );
/// ```
#[macro_export]
macro_rules! json_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Value for $ty {
                fn shape() -> $crate::Shape {
                    $crate::Shape::Composite
                }

                fn decode_text(raw: &str) -> ::std::result::Result<Self, $crate::DecodeError> {
                    $crate::decode::from_json(raw)
                }
            }
        )+
    };
}

text_value!(
    char,
    std::path::PathBuf,
    std::net::IpAddr,
    std::net::Ipv4Addr,
    std::net::Ipv6Addr,
    std::net::SocketAddr,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn round_trip<T>(value: T, encoded: &str)
    where
        T: Value + PartialEq + fmt::Debug,
    {
        assert_eq!(T::decode_text(encoded).unwrap(), value, "decoding {encoded:?}");
    }

    #[test]
    fn test_decode_primitives() {
        round_trip(true, "true");
        round_trip(false, "false");
        round_trip(-8i8, "-8");
        round_trip(i16::MIN, &i16::MIN.to_string());
        round_trip(42i32, "42");
        round_trip(i64::MAX, &i64::MAX.to_string());
        round_trip(i128::MIN, &i128::MIN.to_string());
        round_trip(-3isize, "-3");
        round_trip(255u8, "255");
        round_trip(u16::MAX, &u16::MAX.to_string());
        round_trip(7u32, "7");
        round_trip(u64::MAX, &u64::MAX.to_string());
        round_trip(u128::MAX, &u128::MAX.to_string());
        round_trip(usize::MAX, &usize::MAX.to_string());
        round_trip(1.5f32, "1.5");
        round_trip(2.5f64, &2.5f64.to_string());
        round_trip("hello world".to_string(), "hello world");
        round_trip(b"abc".to_vec(), "abc");
    }

    #[test]
    fn test_decode_duration() {
        round_trip(Duration::from_secs(5), "5s");
        round_trip(Duration::from_secs(600), "10m");

        let value = Duration::from_millis(5_400_250);
        round_trip(value, &humantime::format_duration(value).to_string());
    }

    #[test]
    fn test_decode_respects_bit_width() {
        assert!(matches!(u8::decode_text("256"), Err(DecodeError::Int(_))));
        assert!(matches!(i8::decode_text("-129"), Err(DecodeError::Int(_))));
        assert!(matches!(u32::decode_text("-1"), Err(DecodeError::Int(_))));
        assert!(matches!(u16::decode_text("65536"), Err(DecodeError::Int(_))));
    }

    #[test]
    fn test_decode_float_overflow() {
        assert!(matches!(f32::decode_text("1e39"), Err(DecodeError::FloatRange(_))));
        assert!(matches!(f32::decode_text("-3.5e38"), Err(DecodeError::FloatRange(_))));
        assert!(matches!(f64::decode_text("1e309"), Err(DecodeError::FloatRange(_))));
        round_trip(3.0e38f32, "3.0e38");
        round_trip(1e39f64, "1e39");

        assert_eq!(f32::decode_text("inf").unwrap(), f32::INFINITY);
        assert_eq!(f64::decode_text("-Infinity").unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_decode_bool_is_strict() {
        assert!(matches!(bool::decode_text("1"), Err(DecodeError::Bool(_))));
        assert!(matches!(bool::decode_text("yes"), Err(DecodeError::Bool(_))));
    }

    #[test]
    fn test_decode_bad_duration() {
        let err = Duration::decode_text("soon").unwrap_err();
        assert!(err.to_string().starts_with("parse duration:"));
    }

    #[test]
    fn test_shapes() {
        assert_eq!(<i16 as Value>::shape(), Shape::Int { bits: 16 });
        assert_eq!(<u64 as Value>::shape(), Shape::Uint { bits: 64 });
        assert_eq!(<f32 as Value>::shape(), Shape::Float { bits: 32 });
        assert_eq!(<Vec<u8> as Value>::shape(), Shape::Bytes);
        assert_eq!(<Vec<String> as Value>::shape(), Shape::Composite);
        assert_eq!(<Option<Duration> as Value>::shape(), Shape::Duration);
        assert_eq!(<std::net::IpAddr as Value>::shape(), Shape::Text);
        assert!(<HashMap<String, String> as Value>::shape().is_composite());
        assert!(!<Vec<u8> as Value>::shape().is_composite());
    }

    #[test]
    fn test_composite_text_falls_back_to_json() {
        let tags = Vec::<String>::decode_text(r#"["a","b"]"#).unwrap();
        assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);

        let map = BTreeMap::<String, u32>::decode_text(r#"{"x":1}"#).unwrap();
        assert_eq!(map.get("x"), Some(&1));

        let err = Vec::<String>::decode_text("a,b").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_from_str_types() {
        let addr = std::net::SocketAddr::decode_text("127.0.0.1:8080").unwrap();
        assert_eq!(addr.port(), 8080);

        let err = std::net::IpAddr::decode_text("not-an-ip").unwrap_err();
        assert!(err.to_string().starts_with("text decode:"));
    }

    #[test]
    fn test_json_value_types() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Limits {
            burst: u32,
        }

        crate::json_value!(Limits);

        assert_eq!(<Limits as Value>::shape(), Shape::Composite);
        assert_eq!(Limits::decode_text(r#"{"burst":8}"#).unwrap(), Limits { burst: 8 });
        assert!(matches!(Limits::decode_text("8"), Err(DecodeError::Json(_))));

        let limits: Limits = Decoders::default().decode("text", r#"{"burst":2}"#).unwrap();
        assert_eq!(limits.burst, 2);
    }

    #[test]
    fn test_decode_json_struct() {
        #[derive(Debug, Deserialize)]
        struct Payload {
            value: String,
        }

        let payload: Payload = Decoders::default()
            .decode_record("json", r#"{"value":"hello"}"#)
            .unwrap();
        assert_eq!(payload.value, "hello");
    }

    #[test]
    fn test_decode_xml_struct() {
        #[derive(Debug, Deserialize)]
        struct XmlConfig {
            value: String,
        }

        let config: XmlConfig = Decoders::default()
            .decode_record("XML", "<XmlConfig><value>hi</value></XmlConfig>")
            .unwrap();
        assert_eq!(config.value, "hi");
    }

    #[test]
    fn test_text_format_uses_plain_decoding() {
        let decoders = Decoders::default();
        let timeout: Duration = decoders.decode("text", "15s").unwrap();
        assert_eq!(timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_unknown_format() {
        let err = Decoders::default().decode::<String>("yaml", "a: b").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownFormat(ref name) if name == "yaml"));
    }

    #[test]
    fn test_custom_decoder_receives_target() {
        let mut decoders = Decoders::default();
        decoders.register(
            "KV",
            Decoder::custom(|raw, target| {
                assert_eq!(target.shape, Shape::Composite);
                let map = raw
                    .split(',')
                    .filter_map(|pair| pair.split_once('='))
                    .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
                    .collect::<serde_json::Map<_, _>>();
                Ok(serde_json::Value::Object(map))
            }),
        );

        let settings: HashMap<String, String> =
            decoders.decode("kv", "alpha=beta,gamma=delta").unwrap();
        assert_eq!(settings["alpha"], "beta");
        assert_eq!(settings["gamma"], "delta");
    }

    #[test]
    fn test_custom_decoder_error_is_labelled() {
        let mut decoders = Decoders::default();
        decoders.register("strict", Decoder::custom(|_, _| anyhow::bail!("nope")));

        let err = decoders.decode::<u32>("strict", "1").unwrap_err();
        assert_eq!(err.to_string(), "strict decode: nope");
    }
}
