//! Record derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::ParseStream;
use syn::{Data, DeriveInput, Fields, LitStr, Result, Token};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Embed {
    None,
    Flatten,
    Nested,
}

struct FieldAttr {
    tag: Option<LitStr>,
    embed: Embed,
}

fn parse_field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut out = FieldAttr {
        tag: None,
        embed: Embed::None,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("db") {
            continue;
        }
        attr.parse_args_with(|input: ParseStream| {
            while !input.is_empty() {
                if input.peek(LitStr) {
                    let lit: LitStr = input.parse()?;
                    if out.tag.is_some() {
                        return Err(syn::Error::new_spanned(lit, "duplicate db tag"));
                    }
                    out.tag = Some(lit);
                } else {
                    let ident: syn::Ident = input.parse()?;
                    let embed = match ident.to_string().as_str() {
                        "flatten" => Embed::Flatten,
                        "nested" => Embed::Nested,
                        _ => {
                            return Err(syn::Error::new_spanned(
                                ident,
                                "expected `flatten`, `nested` or a string tag",
                            ));
                        }
                    };
                    if out.embed != Embed::None {
                        return Err(syn::Error::new_spanned(
                            ident,
                            "`flatten` and `nested` are mutually exclusive",
                        ));
                    }
                    out.embed = embed;
                }
                if input.is_empty() {
                    break;
                }
                input.parse::<Token![,]>()?;
            }
            Ok(())
        })?;
    }

    Ok(out)
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let mut descs = Vec::with_capacity(fields.len());
    let mut arms = Vec::with_capacity(fields.len());

    for (index, field) in fields.iter().enumerate() {
        let ident = field.ident.as_ref().unwrap();
        let ident_str = ident.to_string();
        let ty = &field.ty;
        let attr = parse_field_attr(field)?;

        let skip = attr.tag.as_ref().is_some_and(|t| t.value() == "-");
        if skip && attr.embed != Embed::None {
            return Err(syn::Error::new_spanned(
                ident,
                "a skipped field cannot be flattened or nested",
            ));
        }

        let tag = match &attr.tag {
            Some(lit) => quote! { ::core::option::Option::Some(#lit) },
            None => quote! { ::core::option::Option::None },
        };
        let kind = match attr.embed {
            Embed::None => quote! { sqlbind::record::FieldKind::Scalar },
            Embed::Flatten => quote! {
                sqlbind::record::FieldKind::Flatten(<#ty as sqlbind::record::Record>::field_descs)
            },
            Embed::Nested => quote! {
                sqlbind::record::FieldKind::Nested(<#ty as sqlbind::record::Record>::field_descs)
            },
        };
        descs.push(quote! {
            sqlbind::record::FieldDesc { ident: #ident_str, tag: #tag, kind: #kind }
        });

        if skip {
            continue;
        }
        arms.push(match attr.embed {
            Embed::None => quote! {
                #index => ::core::option::Option::Some(sqlbind::record::FieldValue::Scalar(
                    sqlbind::value::ToValue::to_value(&self.#ident),
                )),
            },
            Embed::Flatten | Embed::Nested => quote! {
                #index => ::core::option::Option::Some(sqlbind::record::FieldValue::Record(&self.#ident)),
            },
        });
    }

    Ok(quote! {
        impl sqlbind::record::Record for #name {
            fn field_descs() -> &'static [sqlbind::record::FieldDesc] {
                const FIELDS: &[sqlbind::record::FieldDesc] = &[#(#descs),*];
                FIELDS
            }

            fn field(&self, index: usize) -> ::core::option::Option<sqlbind::record::FieldValue<'_>> {
                match index {
                    #(#arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl sqlbind::bind::BindSource for #name {
            fn bind_values(
                &self,
                names: &[::std::string::String],
                mode: sqlbind::bind::BindMode,
            ) -> sqlbind::error::BindResult<::std::vec::Vec<sqlbind::value::Value>> {
                sqlbind::bind::bind_record(self, names, mode)
            }
        }
    })
}
