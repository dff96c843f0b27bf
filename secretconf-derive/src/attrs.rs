//! Attribute parsing for `#[conf(...)]` annotations.
//!
//! This module extracts the raw tag text and flags from struct fields during
//! macro expansion. The tag text itself is parsed at load time, so a
//! malformed tag is reported per field instead of failing the build.

use syn::parse::ParseStream;
use syn::{Field, Ident, LitStr, Meta, Token};

/// Parsed `#[conf(...)]` attribute from a struct field.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    /// Raw tag text.
    ///
    /// - `None`: no `#[conf]` attribute, the field is not managed
    /// - `Some("")`: `#[conf]` without arguments
    /// - `Some(text)`: `#[conf("text")]`
    pub tag: Option<String>,

    /// `nested` flag: the field is a record whose own fields are walked
    /// after it is assigned.
    pub nested: bool,
}

impl FieldAttrs {
    /// Extract and parse `#[conf(...)]` attributes from a struct field.
    pub fn from_field(field: &Field) -> syn::Result<Self> {
        let mut attrs = Self::default();

        for attr in &field.attrs {
            if !attr.path().is_ident("conf") {
                continue;
            }
            if attrs.tag.is_some() {
                return Err(syn::Error::new_spanned(
                    attr,
                    "duplicate conf attribute; combine the tag into one string",
                ));
            }

            match &attr.meta {
                // #[conf]
                Meta::Path(_) => attrs.tag = Some(String::new()),
                // #[conf("env:FOO", nested)]
                Meta::List(_) => attr.parse_args_with(|input: ParseStream| {
                    let tag: LitStr = input.parse()?;
                    attrs.tag = Some(tag.value());

                    while input.peek(Token![,]) {
                        input.parse::<Token![,]>()?;
                        if input.is_empty() {
                            break;
                        }
                        let flag: Ident = input.parse()?;
                        if flag == "nested" {
                            attrs.nested = true;
                        } else {
                            return Err(syn::Error::new(flag.span(), "unsupported conf flag"));
                        }
                    }
                    Ok(())
                })?,
                Meta::NameValue(_) => {
                    return Err(syn::Error::new_spanned(
                        attr,
                        r#"expected #[conf("...")] with the tag as a string literal"#,
                    ));
                }
            }
        }

        Ok(attrs)
    }
}
