//! Implementation of the `#[derive(Entity)]` macro.
//!
//! This macro generates implementations of `Entity`, `Record` and `Related`
//! plus field name constants for type-safe path building.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    spanned::Spanned, Data, DeriveInput, Error, Fields, GenericArgument, PathArguments, Result,
    Type,
};

use super::attrs::{parse_entity_attrs, parse_field_attrs, RelationKind};

/// Main implementation of the Entity derive macro.
pub fn entity_derive_impl(input: DeriveInput) -> Result<TokenStream> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Entity cannot be derived for generic structs",
        ));
    }

    // Ensure we have a struct with named fields
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new(
                    input.span(),
                    "Entity can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                "Entity can only be derived for structs",
            ))
        }
    };

    let entity_attrs = parse_entity_attrs(&input.attrs)?;
    let entity_name = entity_attrs
        .name
        .unwrap_or_else(|| struct_name.to_string());

    let mut descriptors: Vec<TokenStream> = Vec::new();
    let mut field_constants: Vec<TokenStream> = Vec::new();
    let mut get_arms: Vec<TokenStream> = Vec::new();
    let mut set_arms: Vec<TokenStream> = Vec::new();
    let mut related_names: Vec<String> = Vec::new();
    let mut related_mut_arms: Vec<TokenStream> = Vec::new();
    let mut retain_arms: Vec<TokenStream> = Vec::new();
    let mut key: Option<String> = None;

    for field in fields.iter() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "expected named field"))?;

        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let path_name = attrs.rename.unwrap_or_else(|| field_name.to_string());
        let ty = &field.ty;

        if attrs.key {
            if key.is_some() {
                return Err(Error::new(field.span(), "only one field can be the key"));
            }
            key = Some(path_name.clone());
        }

        let const_name = format_ident!("{}", to_screaming_snake_case(&path_name));
        field_constants.push(quote! {
            /// Field name constant for type-safe paths.
            pub const #const_name: &'static str = #path_name;
        });

        match attrs.relation.or_else(|| infer_relation(ty)) {
            None => {
                descriptors.push(quote! {
                    ::specula::FieldDescriptor::new(
                        #path_name,
                        <#ty as ::specula::FieldValue>::TYPE,
                        <#ty as ::specula::FieldValue>::NULLABLE,
                    )
                });
                get_arms.push(quote! {
                    #path_name => ::specula::Slot::Value(::specula::FieldValue::to_value(&self.#field_name)),
                });
                set_arms.push(quote! {
                    #path_name => self.#field_name = ::specula::FieldValue::from_value(value)?,
                });
            }
            Some(kind) => {
                if attrs.key {
                    return Err(Error::new(field.span(), "a relation cannot be the key"));
                }
                let target = entity_type(ty);
                let nullable = strip_wrapper(ty, "Option").is_some();
                let (field_type, slot) = match kind {
                    RelationKind::One => (
                        quote! { ::specula::FieldType::One(<#target as ::specula::Entity>::entity_schema) },
                        quote! {
                            ::specula::Slot::One(
                                ::specula::Related::records(&self.#field_name).into_iter().next()
                            )
                        },
                    ),
                    RelationKind::Many => (
                        quote! { ::specula::FieldType::Many(<#target as ::specula::Entity>::entity_schema) },
                        quote! { ::specula::Slot::Many(::specula::Related::records(&self.#field_name)) },
                    ),
                };
                descriptors.push(quote! {
                    ::specula::FieldDescriptor::new(#path_name, #field_type, #nullable)
                });
                get_arms.push(quote! { #path_name => #slot, });
                related_mut_arms.push(quote! {
                    #path_name => ::specula::Related::records_mut(&mut self.#field_name),
                });
                retain_arms.push(quote! {
                    #path_name => ::specula::Related::retain(&mut self.#field_name, keep),
                });
                related_names.push(path_name);
            }
        }
    }

    let key_tokens = match &key {
        Some(k) => quote! { ::core::option::Option::Some(#k) },
        None => quote! { ::core::option::Option::None },
    };

    let relation_set_arm = if related_names.is_empty() {
        quote! {}
    } else {
        quote! {
            #(#related_names)|* => {
                return ::core::result::Result::Err(::specula::SpecError::InvalidOperatorForType {
                    op: "set",
                    value_type: "relation",
                })
            }
        }
    };

    let expanded = quote! {
        impl #struct_name {
            #(#field_constants)*
        }

        impl ::specula::Entity for #struct_name {
            fn entity_schema() -> &'static ::specula::EntitySchema {
                static SCHEMA: ::specula::EntitySchema = ::specula::EntitySchema {
                    name: #entity_name,
                    fields: &[#(#descriptors),*],
                    key: #key_tokens,
                };
                &SCHEMA
            }
        }

        impl ::specula::Record for #struct_name {
            fn schema(&self) -> &'static ::specula::EntitySchema {
                <Self as ::specula::Entity>::entity_schema()
            }

            fn get(&self, field: &str) -> ::specula::Slot<'_> {
                match field {
                    #(#get_arms)*
                    _ => ::specula::Slot::Missing,
                }
            }

            #[allow(unreachable_code, unused_variables)]
            fn set(&mut self, field: &str, value: ::specula::Value) -> ::specula::Result<()> {
                match field {
                    #(#set_arms)*
                    #relation_set_arm
                    other => {
                        return ::core::result::Result::Err(::specula::SpecError::PathResolution {
                            entity: #entity_name,
                            path: other.to_string(),
                            segment: other.to_string(),
                        })
                    }
                }
                ::core::result::Result::Ok(())
            }

            fn related_mut(&mut self, field: &str) -> ::std::vec::Vec<&mut dyn ::specula::Record> {
                match field {
                    #(#related_mut_arms)*
                    _ => ::std::vec::Vec::new(),
                }
            }

            fn retain_related(
                &mut self,
                field: &str,
                keep: &dyn Fn(&dyn ::specula::Record) -> bool,
            ) {
                match field {
                    #(#retain_arms)*
                    _ => {
                        let _ = keep;
                    }
                }
            }
        }

        impl ::specula::Related for #struct_name {
            fn records(&self) -> ::std::vec::Vec<&dyn ::specula::Record> {
                ::std::vec![self as &dyn ::specula::Record]
            }

            fn records_mut(&mut self) -> ::std::vec::Vec<&mut dyn ::specula::Record> {
                ::std::vec![self as &mut dyn ::specula::Record]
            }

            fn retain(&mut self, _keep: &dyn Fn(&dyn ::specula::Record) -> bool) {}
        }
    };

    Ok(expanded)
}

/// Infers a relation from the field type: `Vec<_>` is a collection and
/// `Box<_>` (optionally inside `Option`) is a single entity.
fn infer_relation(ty: &Type) -> Option<RelationKind> {
    let ty = strip_wrapper(ty, "Option").unwrap_or(ty);
    if strip_wrapper(ty, "Vec").is_some() {
        Some(RelationKind::Many)
    } else if strip_wrapper(ty, "Box").is_some() {
        Some(RelationKind::One)
    } else {
        None
    }
}

/// The entity type inside any `Option`, `Box` and `Vec` wrappers.
fn entity_type(ty: &Type) -> &Type {
    ["Option", "Box", "Vec"]
        .iter()
        .find_map(|wrapper| strip_wrapper(ty, wrapper))
        .map_or(ty, entity_type)
}

/// Returns `T` if `ty` is `wrapper<T>`.
fn strip_wrapper<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Convert a string to SCREAMING_SNAKE_CASE.
fn to_screaming_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_was_lower = false;

    for c in s.chars() {
        if c.is_uppercase() {
            if prev_was_lower {
                result.push('_');
            }
            result.push(c);
            prev_was_lower = false;
        } else if c == '_' || c == '-' {
            result.push('_');
            prev_was_lower = false;
        } else {
            result.push(c.to_ascii_uppercase());
            prev_was_lower = true;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(src: &str) -> Type {
        syn::parse_str(src).unwrap()
    }

    #[test]
    fn test_screaming_snake_case() {
        assert_eq!(to_screaming_snake_case("name"), "NAME");
        assert_eq!(to_screaming_snake_case("born_on"), "BORN_ON");
        assert_eq!(to_screaming_snake_case("FullName"), "FULL_NAME");
        assert_eq!(to_screaming_snake_case("Id"), "ID");
    }

    #[test]
    fn test_infer_relation() {
        assert_eq!(infer_relation(&ty("Vec<Person>")), Some(RelationKind::Many));
        assert_eq!(infer_relation(&ty("Box<Country>")), Some(RelationKind::One));
        assert_eq!(
            infer_relation(&ty("Option<Box<Country>>")),
            Some(RelationKind::One)
        );
        assert_eq!(infer_relation(&ty("Option<String>")), None);
        assert_eq!(infer_relation(&ty("i32")), None);
    }

    #[test]
    fn test_entity_type() {
        let target = |src: &str| {
            let t = ty(src);
            let inner = entity_type(&t);
            quote!(#inner).to_string()
        };
        assert_eq!(target("Option<Box<Country>>"), "Country");
        assert_eq!(target("Vec<Country>"), "Country");
        assert_eq!(target("Country"), "Country");
    }

    #[test]
    fn test_rejects_generics() {
        let input: DeriveInput = syn::parse_str("struct Wrapper<T> { inner: T }").unwrap();
        let err = entity_derive_impl(input).unwrap_err();
        assert!(err.to_string().contains("generic"));
    }

    #[test]
    fn test_rejects_two_keys() {
        let input: DeriveInput = syn::parse_str(
            "struct Pair { #[entity(key)] a: i32, #[entity(key)] b: i32 }",
        )
        .unwrap();
        assert!(entity_derive_impl(input).is_err());
    }

    #[test]
    fn test_rejects_enums() {
        let input: DeriveInput = syn::parse_str("enum Kind { A, B }").unwrap();
        assert!(entity_derive_impl(input).is_err());
    }

    #[test]
    fn test_expands_schema() {
        let input: DeriveInput = syn::parse_str(
            r#"#[entity(name = "Author")]
            struct Writer {
                #[entity(key)]
                id: u32,
                #[entity(rename = "FullName")]
                name: String,
                books: Vec<Book>,
                #[entity(skip)]
                cache: Vec<u8>,
            }"#,
        )
        .unwrap();
        let out = entity_derive_impl(input).unwrap().to_string();
        assert!(out.contains("\"Author\""));
        assert!(out.contains("FULL_NAME"));
        assert!(out.contains("Many"));
        assert!(!out.contains("cache"));
    }
}
