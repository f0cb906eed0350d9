//! Attribute parsing for the Entity derive macro.
//!
//! Struct-level `#[entity(name = "...")]` and field-level
//! `#[entity(key, one, many, skip, rename = "...")]` attributes.

use proc_macro2::Span;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Attribute, Error, Lit, Meta, Result, Token,
};

/// How a field relates to other entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Single related entity: `#[entity(one)]`
    One,
    /// Related entity collection: `#[entity(many)]`
    Many,
}

/// Struct-level attributes from `#[entity(...)]`.
#[derive(Debug, Clone, Default)]
pub struct EntityAttr {
    /// Entity name reported in schemas and errors (default: struct name).
    pub name: Option<String>,
}

impl Parse for EntityAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = EntityAttr::default();

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => {
                    attr.name = Some(string_value(&nv.value, "name")?);
                }
                _ => {
                    return Err(Error::new(
                        meta.span(),
                        "unknown entity attribute. Expected: name = \"...\"",
                    ));
                }
            }
        }

        Ok(attr)
    }
}

/// Field-level attributes from `#[entity(...)]`.
#[derive(Debug, Clone)]
pub struct FieldAttr {
    /// Field is the primary key.
    pub key: bool,
    /// Explicit relation kind; inferred from the field type when absent.
    pub relation: Option<RelationKind>,
    /// Leave the field out of the schema.
    pub skip: bool,
    /// Custom field name for paths (default: field name).
    pub rename: Option<String>,
    /// The span for error reporting.
    pub span: Span,
}

impl Default for FieldAttr {
    fn default() -> Self {
        FieldAttr {
            key: false,
            relation: None,
            skip: false,
            rename: None,
            span: Span::call_site(),
        }
    }
}

impl Parse for FieldAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = FieldAttr {
            span: input.span(),
            ..FieldAttr::default()
        };

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                Meta::Path(p) if p.is_ident("key") => attr.key = true,
                Meta::Path(p) if p.is_ident("skip") => attr.skip = true,
                Meta::Path(p) if p.is_ident("one") => {
                    set_relation(&mut attr, RelationKind::One, p.span())?
                }
                Meta::Path(p) if p.is_ident("many") => {
                    set_relation(&mut attr, RelationKind::Many, p.span())?
                }
                Meta::NameValue(nv) if nv.path.is_ident("rename") => {
                    attr.rename = Some(string_value(&nv.value, "rename")?);
                }
                _ => {
                    return Err(Error::new(
                        meta.span(),
                        "unknown entity attribute. Expected: key, one, many, skip, or rename = \"...\"",
                    ));
                }
            }
        }

        if attr.skip && (attr.key || attr.relation.is_some()) {
            return Err(Error::new(
                attr.span,
                "skip cannot be combined with key, one or many",
            ));
        }
        if attr.key && attr.relation.is_some() {
            return Err(Error::new(attr.span, "a relation cannot be the key"));
        }

        Ok(attr)
    }
}

fn set_relation(attr: &mut FieldAttr, kind: RelationKind, span: Span) -> Result<()> {
    if attr.relation.is_some_and(|existing| existing != kind) {
        return Err(Error::new(span, "one and many are mutually exclusive"));
    }
    attr.relation = Some(kind);
    Ok(())
}

fn string_value(expr: &syn::Expr, what: &str) -> Result<String> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        other => Err(Error::new(
            other.span(),
            format!("{} must be a string literal", what),
        )),
    }
}

/// Extract the struct-level `#[entity(...)]` attribute.
pub fn parse_entity_attrs(attrs: &[Attribute]) -> Result<EntityAttr> {
    for attr in attrs {
        if attr.path().is_ident("entity") {
            return attr.parse_args::<EntityAttr>();
        }
    }
    Ok(EntityAttr::default())
}

/// Extract `#[entity(...)]` attributes from a field's attributes.
pub fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttr> {
    for attr in attrs {
        if attr.path().is_ident("entity") {
            return attr.parse_args::<FieldAttr>();
        }
    }
    Ok(FieldAttr::default())
}
