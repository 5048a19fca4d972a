use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Expr, ExprLit, Field, Fields, Lit, Meta, Visibility};

/// Derive macro for records that can be decoded from tagged sources.
///
/// Implements `structscan::Reflect` and `structscan::Record` for a struct
/// with named fields:
///
/// - `pub` fields are visible to the decoder and must implement `Reflect`.
/// - Other fields are never touched and must implement `Default`.
/// - `#[tag = "..."]` carries the field's raw metadata string, parsed when
///   the record is first introspected.
/// - `#[embedded]` marks a field as embedded.
///
/// The struct must also implement `Clone`, `Debug` and `PartialEq`.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Record)]
/// pub struct Config {
///     #[tag = r#"env:"HOME" map:"home""#]
///     pub home: String,
///
///     #[tag = r#"map:"db""#]
///     pub db: Option<Database>,
/// }
/// ```
#[proc_macro_derive(Record, attributes(tag, embedded))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    let name_str = name.to_string();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Record only supports structs")),
    };

    let mut raw_fields = Vec::new();
    let mut zero_inits = Vec::new();
    let mut slot_arms = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let field_name_str = field_name.to_string();
        let field_ty = &field.ty;
        let public = matches!(field.vis, Visibility::Public(_));
        let (tag, embedded) = field_attrs(field)?;

        let ty_fn = if public {
            quote! { <#field_ty as ::structscan::Reflect>::type_desc }
        } else {
            quote! { || ::structscan::TypeDesc::Opaque(::std::any::type_name::<#field_ty>()) }
        };

        raw_fields.push(quote! {
            ::structscan::RawField {
                name: #field_name_str,
                tag: #tag,
                public: #public,
                embedded: #embedded,
                ty: #ty_fn,
            }
        });

        if public {
            zero_inits.push(quote! {
                #field_name: <#field_ty as ::structscan::Reflect>::zero()
            });
            slot_arms.push(quote! {
                #index => ::std::option::Option::Some(&mut self.#field_name as &mut dyn ::structscan::Slot)
            });
        } else {
            zero_inits.push(quote! {
                #field_name: ::std::default::Default::default()
            });
        }
    }

    Ok(quote! {
        impl ::structscan::Reflect for #name {
            fn type_desc() -> ::structscan::TypeDesc {
                ::structscan::TypeDesc::Record(<#name as ::structscan::Record>::record_type())
            }

            fn zero() -> Self {
                #name {
                    #(#zero_inits,)*
                }
            }

            fn to_value(&self) -> ::structscan::Value {
                ::structscan::Value::Record(::std::boxed::Box::new(::std::clone::Clone::clone(self)))
            }

            fn from_value(value: ::structscan::Value) -> ::std::result::Result<Self, ::structscan::Value> {
                value.into_record::<#name>()
            }

            fn record_mut(
                &mut self,
                _allocate: bool,
            ) -> ::std::result::Result<&mut dyn ::structscan::DynRecord, ::structscan::TargetError> {
                ::std::result::Result::Ok(self as &mut dyn ::structscan::DynRecord)
            }
        }

        impl ::structscan::Record for #name {
            fn record_type() -> ::structscan::RecordType {
                fn raw_fields() -> ::std::vec::Vec<::structscan::RawField> {
                    ::std::vec![#(#raw_fields),*]
                }

                fn zero() -> ::std::boxed::Box<dyn ::structscan::DynRecord> {
                    ::std::boxed::Box::new(<#name as ::structscan::Reflect>::zero())
                }

                ::structscan::RecordType::of::<#name>(#name_str, raw_fields, zero)
            }

            fn field_mut(&mut self, index: usize) -> ::std::option::Option<&mut dyn ::structscan::Slot> {
                match index {
                    #(#slot_arms,)*
                    _ => ::std::option::Option::None,
                }
            }
        }
    })
}

/// Reads `#[tag = "..."]` and `#[embedded]` off a field.
fn field_attrs(field: &Field) -> Result<(String, bool), syn::Error> {
    let mut tag: Option<String> = None;
    let mut embedded = false;

    for attr in &field.attrs {
        if attr.path().is_ident("tag") {
            let Meta::NameValue(meta) = &attr.meta else {
                return Err(syn::Error::new_spanned(attr, "expected #[tag = \"...\"]"));
            };
            let Expr::Lit(ExprLit {
                lit: Lit::Str(value),
                ..
            }) = &meta.value
            else {
                return Err(syn::Error::new_spanned(
                    &meta.value,
                    "tag must be a string literal",
                ));
            };
            if tag.is_some() {
                return Err(syn::Error::new_spanned(attr, "duplicate #[tag] attribute"));
            }
            tag = Some(value.value());
        } else if attr.path().is_ident("embedded") {
            attr.meta.require_path_only()?;
            embedded = true;
        }
    }

    Ok((tag.unwrap_or_default(), embedded))
}
