//! Proc macros for Specula.
//!
//! # Derive Macros
//!
//! - [`Entity`] - Generate the entity schema and field accessors used by
//!   property paths, predicates and updates
//!
//! The generated code refers to items through `::specula`, so the macro is
//! meant to be used through the re-export in the `specula` crate.

mod entity;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `Entity`, `Record` and `Related` for a struct with named fields.
///
/// Scalar fields must implement `specula::FieldValue` (strings, chars,
/// booleans, integers, floats, chrono dates and date-times, and `Option` of
/// any of these). Relation fields hold other entities.
///
/// # Struct Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `name = "..."` | Entity name in schemas and errors (default: struct name) |
///
/// # Field Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `key` | Primary key used by key lookups |
/// | `one` | Single related entity (inferred for `Box<T>` and `Option<Box<T>>`) |
/// | `many` | Related entity collection (inferred for `Vec<T>`) |
/// | `skip` | Leave the field out of the schema |
/// | `rename = "..."` | Use a custom name in paths |
///
/// A relation to an unboxed entity, such as `Option<Address>`, needs an
/// explicit `#[entity(one)]`.
///
/// # Generated Code
///
/// 1. Field name constants (e.g., `Order::TOTAL`, `Order::CUSTOMER`)
/// 2. `Entity::entity_schema()` returning a static schema
/// 3. `Record` accessors for reading, writing and pruning fields
/// 4. `Related` for the struct itself, so it can be held directly or in an
///    `Option` by other entities
///
/// # Example
///
/// ```ignore
/// use specula::{Entity, PropertyPath};
///
/// #[derive(Entity)]
/// struct Customer {
///     #[entity(key)]
///     id: u64,
///     name: String,
/// }
///
/// #[derive(Entity)]
/// #[entity(name = "Order")]
/// struct PurchaseOrder {
///     #[entity(key)]
///     id: u64,
///     total: f64,
///     customer: Option<Box<Customer>>,
///     #[entity(skip)]
///     dirty: bool,
/// }
///
/// let path = PropertyPath::parse::<PurchaseOrder>("customer.name")?;
/// assert_eq!(PurchaseOrder::TOTAL, "total");
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn entity_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::entity_derive_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
