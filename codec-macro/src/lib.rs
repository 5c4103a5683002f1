use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Per-field options from `#[field(...)]`.
#[derive(Default)]
struct FieldOptions {
    /// No wire form; the field is rebuilt from `Default` and finalize.
    transient: bool,
    /// Convert through serde instead of `FieldValue`.
    serde: bool,
}

fn field_options(field: &syn::Field) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("field") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("transient") {
                options.transient = true;
                Ok(())
            } else if meta.path.is_ident("serde") {
                options.serde = true;
                Ok(())
            } else {
                Err(meta.error("expected `transient` or `serde`"))
            }
        })?;
    }
    if options.transient && options.serde {
        return Err(syn::Error::new_spanned(
            field,
            "a transient field has no wire form, `serde` does not apply",
        ));
    }
    Ok(options)
}

/// Derive the `Fields` schema trait for a struct with named fields.
///
/// Every field is declared in source order. Fields are converted through
/// `FieldValue` unless marked otherwise:
///
/// - `#[field(serde)]` converts through the type's serde implementation.
/// - `#[field(transient)]` marks a field with no wire form (a back-edge or
///   a resolved handle). It is never written and is rebuilt from
///   `Default`, so the type's `finalize` hook must restore it. Transient
///   fields must be excluded at registration.
///
/// Non-transient fields need `Default` so that excluded fields can be
/// filled in on decode.
///
/// ```ignore
/// #[derive(Fields, Clone, Debug, PartialEq)]
/// struct Entity {
///     name: String,
///     #[field(transient)]
///     map: Weak<MapData>,
/// }
/// ```
#[proc_macro_derive(Fields, attributes(field))]
pub fn derive_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input.ident,
                    "Fields can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input.ident, "Fields can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut declared = Vec::new();
    let mut transient = Vec::new();
    let mut writes = Vec::new();
    let mut reads = Vec::new();

    for field in named {
        let options = match field_options(field) {
            Ok(options) => options,
            Err(err) => return err.to_compile_error().into(),
        };
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_str = ident.to_string();
        declared.push(field_str.clone());

        if options.transient {
            transient.push(field_str);
            reads.push(quote! {
                #ident: ::core::default::Default::default()
            });
        } else if options.serde {
            writes.push(quote! {
                writer.write_serde(#field_str, &self.#ident)?;
            });
            reads.push(quote! {
                #ident: reader.read_serde(#field_str)?
            });
        } else {
            writes.push(quote! {
                writer.write(#field_str, &self.#ident)?;
            });
            reads.push(quote! {
                #ident: reader.read(#field_str)?
            });
        }
    }

    let expanded = quote! {
        impl #impl_generics ::tilepack_codec::Fields for #name #ty_generics #where_clause {
            const FIELDS: &'static [&'static str] = &[#(#declared),*];
            const TRANSIENT: &'static [&'static str] = &[#(#transient),*];

            fn write_fields(
                &self,
                writer: &mut ::tilepack_codec::FieldWriter<'_>,
            ) -> ::core::result::Result<(), ::tilepack_codec::EncodeError> {
                let _ = &writer;
                #(#writes)*
                ::core::result::Result::Ok(())
            }

            fn read_fields(
                reader: &mut ::tilepack_codec::FieldReader<'_>,
            ) -> ::core::result::Result<Self, ::tilepack_codec::DecodeError> {
                let _ = &reader;
                ::core::result::Result::Ok(Self {
                    #(#reads),*
                })
            }
        }
    };

    expanded.into()
}
