//! Implementation of the `#[derive(Entity)]` macro.
//!
//! Generates the static schema and the field accessors the Specula engine
//! needs from struct annotations.

mod attrs;
mod derive;

pub use derive::entity_derive_impl;
