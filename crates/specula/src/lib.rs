//! Specula - declarative specifications for querying and updating entities.
//!
//! Specula lets a caller describe *what* to fetch or update without writing
//! predicate code by hand, and lets filters be driven from plain strings such
//! as HTTP query parameters. It provides:
//!
//! - Property paths resolved once against static entity schemas and cached
//! - Predicate trees with AND, OR and NOT combinators
//! - A `"<token>:<operand>"` condition language parsed into typed predicates
//! - Partial-update actions built from typed models or JSON maps
//! - A [`Specification`] aggregate and an evaluator that applies it to any
//!   [`Queryable`] host, plus an in-memory host in [`memory`]
//!
//! # Quick Start
//!
//! ```rust
//! use specula::memory::MemorySource;
//! use specula::{apply, ConditionParser, Entity, Specification};
//!
//! #[derive(Debug, Clone, Entity)]
//! struct Task {
//!     #[entity(key)]
//!     id: u32,
//!     name: String,
//!     priority: i32,
//!     archived: bool,
//! }
//!
//! let tasks = vec![
//!     Task { id: 1, name: "Write docs".into(), priority: 3, archived: false },
//!     Task { id: 2, name: "Fix bug".into(), priority: 5, archived: false },
//!     Task { id: 3, name: "Old task".into(), priority: 1, archived: true },
//! ];
//!
//! let parser = ConditionParser::new();
//! let spec = Specification::<Task>::new()
//!     .filter(parser.parse("priority", "gte:3", None).unwrap())
//!     .filter(parser.parse("archived", "eq:false", None).unwrap())
//!     .order_by_descending("priority")
//!     .unwrap();
//!
//! let results = apply(MemorySource::new(&tasks), &spec).fetch().unwrap();
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[0].name, "Fix bug");
//! ```
//!
//! # Evaluation Order
//!
//! [`apply`] translates a specification into host calls in a fixed order:
//!
//! ```text
//! no_tracking? -> includes -> (find_by_key | filter -> project -> order) -> split_query?
//! ```
//!
//! A primary key short-circuits the pipeline after the includes: criteria,
//! projection and ordering are ignored and at most one entity is returned.
//!
//! # Condition Tokens
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `eq`, `ne`, `lt`, `lte`, `gt`, `gte` | Comparison with the coerced operand |
//! | `eqci`, `like`, `likeci` | String equality ignoring case, containment |
//! | `range` | `lower,upper`, inclusive |
//! | `in`, `nin`, `inci`, `ninci` | Set membership |
//! | `inlike`, `ninlike`, `inlikeci`, `ninlikeci` | Any of several substrings |
//!
//! # Logging
//!
//! Specula emits [`tracing`] events: `debug` for path resolution and
//! evaluation steps, `trace` for condition parsing, and `warn` when an update
//! value is kept un-coerced. No subscriber is installed.

mod coerce;
mod config;
mod error;
mod evaluator;
pub mod memory;
mod op;
mod ordering;
mod parse;
mod path;
mod predicate;
mod schema;
mod specification;
mod update;
mod value;

#[cfg(test)]
mod testing;

// Re-export public API
pub use coerce::{coerce_str, coerce_value, parse_date, parse_datetime};
pub use config::{CoercionPolicy, EngineConfig};
pub use error::{Result, SpecError};
pub use evaluator::{apply, apply_cancellable, CancelSignal, Queryable};
pub use op::Op;
pub use ordering::{compare_by_keys, compare_values, Dir, OrderKey};
pub use parse::{parse, split_condition, ConditionParser, Token};
pub use path::{PathCache, PropertyPath};
pub use predicate::{Combine, Node, Predicate};
pub use schema::{
    Entity, EntitySchema, FieldDescriptor, FieldType, FieldValue, Record, Related, Slot,
};
pub use specification::{
    Include, Projection, QueryFlags, Row, Specification, SpecificationRequest,
};
pub use update::{flatten, Setter, UpdateAction, UpdateBuilder};
pub use value::{Number, Value};

/// Derives [`Entity`], [`Record`] and [`Related`] for a struct.
///
/// See the `specula-macros` crate for the supported attributes.
pub use specula_macros::Entity;
