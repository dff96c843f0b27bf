//! Derive macro implementation for secretconf

use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Type};

mod attrs;

use attrs::FieldAttrs;

/// Check whether a field type is `Option<T>`
fn is_option(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(seg) = type_path.path.segments.last() {
            return seg.ident == "Option"
                && matches!(seg.arguments, syn::PathArguments::AngleBracketed(_));
        }
    }
    false
}

/// `Configurable` derive macro
///
/// Implements `secretconf::Configurable`, which lets a `secretconf::Loader`
/// populate the struct.
///
/// # Supported Attributes
///
/// **Field-level**:
/// - `#[conf("env:KEY provider:key backend:name format:json default:value")]`:
///   tag describing where the field's value comes from
/// - `#[conf("...", nested)]`: the field is itself `Configurable` and
///   `Deserialize`; its own tagged fields are resolved after it is assigned
///
/// Fields without `#[conf]` are not touched.
///
/// # Example
///
/// See the `secretconf` crate documentation for usage examples.
#[proc_macro_derive(Configurable, attributes(conf))]
pub fn derive_configurable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Extract fields
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Configurable only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Configurable only supports structs",
            ));
        }
    };

    // Generate one walker call per annotated field, in declaration order
    let mut steps = Vec::new();
    for field in fields {
        let attrs = FieldAttrs::from_field(field)?;
        let Some(tag) = attrs.tag else {
            continue;
        };
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = field_ident.unraw().to_string();

        let step = if !attrs.nested {
            quote! {
                walker.field(#field_name, #tag, &mut self.#field_ident).await;
            }
        } else if is_option(&field.ty) {
            quote! {
                walker.nested_option(#field_name, #tag, &mut self.#field_ident).await;
            }
        } else {
            quote! {
                walker.nested(#field_name, #tag, &mut self.#field_ident).await;
            }
        };
        steps.push(step);
    }
    if steps.is_empty() {
        steps.push(quote! { let _ = walker; });
    }

    Ok(quote! {
        #[::secretconf::__private::async_trait]
        impl #impl_generics ::secretconf::Configurable for #struct_name #ty_generics #where_clause {
            async fn visit(&mut self, walker: &mut ::secretconf::Walker<'_>) {
                #(#steps)*
            }
        }
    })
}
