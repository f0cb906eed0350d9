//! Entity schemas and the traits that expose entity fields to the engine.
//!
//! The [`Entity`] and [`Record`] traits are normally implemented with
//! `#[derive(Entity)]`, but can also be written by hand.
//!
//! # Manual Implementation
//!
//! ```
//! use specula::{Entity, EntitySchema, FieldDescriptor, FieldValue, Record, Result, Slot, SpecError, Value};
//!
//! struct Tag {
//!     label: String,
//! }
//!
//! impl Entity for Tag {
//!     fn entity_schema() -> &'static EntitySchema {
//!         static SCHEMA: EntitySchema = EntitySchema {
//!             name: "Tag",
//!             fields: &[FieldDescriptor::new("Label", <String as FieldValue>::TYPE, false)],
//!             key: None,
//!         };
//!         &SCHEMA
//!     }
//! }
//!
//! impl Record for Tag {
//!     fn schema(&self) -> &'static EntitySchema {
//!         Self::entity_schema()
//!     }
//!
//!     fn get(&self, field: &str) -> Slot<'_> {
//!         match field {
//!             "Label" => Slot::Value(self.label.to_value()),
//!             _ => Slot::Missing,
//!         }
//!     }
//!
//!     fn set(&mut self, field: &str, value: Value) -> Result<()> {
//!         match field {
//!             "Label" => {
//!                 self.label = FieldValue::from_value(value)?;
//!                 Ok(())
//!             }
//!             other => Err(SpecError::PathResolution {
//!                 entity: "Tag",
//!                 path: other.to_string(),
//!                 segment: other.to_string(),
//!             }),
//!         }
//!     }
//! }
//!
//! let tag = Tag { label: "red".into() };
//! assert_eq!(tag.get("Label").into_value(), Value::from("red"));
//! ```

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, SpecError};
use crate::value::{Number, Value};

/// Declared type of an entity field.
///
/// Relation variants carry a function returning the related entity's schema,
/// which keeps schemas of mutually-referencing entities free of cycles.
#[derive(Clone, Copy)]
pub enum FieldType {
    String,
    Char,
    Bool,
    /// Signed integer of any width.
    Int,
    /// Unsigned integer of any width.
    UInt,
    Float,
    Date,
    DateTime,
    /// A single related entity.
    One(fn() -> &'static EntitySchema),
    /// A collection of related entities.
    Many(fn() -> &'static EntitySchema),
}

impl FieldType {
    /// Returns the display name of this type.
    pub fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Char => "char",
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::UInt => "uint",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::One(_) => "relation",
            FieldType::Many(_) => "collection",
        }
    }

    /// Returns `true` for string fields.
    pub fn is_string(self) -> bool {
        matches!(self, FieldType::String)
    }

    /// Returns `true` for numeric fields.
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Int | FieldType::UInt | FieldType::Float)
    }

    /// Returns `true` for date and date-time fields.
    pub fn is_temporal(self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime)
    }

    /// Returns `true` for relation fields.
    pub fn is_relation(self) -> bool {
        matches!(self, FieldType::One(_) | FieldType::Many(_))
    }

    /// Schema of the related entity, for relation fields.
    pub fn target(self) -> Option<&'static EntitySchema> {
        match self {
            FieldType::One(schema) | FieldType::Many(schema) => Some(schema()),
            _ => None,
        }
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldType::One(a), FieldType::One(b)) | (FieldType::Many(a), FieldType::Many(b)) => {
                std::ptr::eq(a(), b())
            }
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for FieldType {}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::One(schema) => write!(f, "One({})", schema().name),
            FieldType::Many(schema) => write!(f, "Many({})", schema().name),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// A single declared field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Canonical field name used in paths.
    pub name: &'static str,
    /// Declared type, with any `Option` wrapper removed.
    pub ty: FieldType,
    /// Whether the field is declared as `Option<_>`.
    pub nullable: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, ty: FieldType, nullable: bool) -> Self {
        FieldDescriptor { name, ty, nullable }
    }
}

/// Static description of an entity type.
#[derive(Debug)]
pub struct EntitySchema {
    /// Entity name, used in error messages.
    pub name: &'static str,
    /// Declared fields in declaration order.
    pub fields: &'static [FieldDescriptor],
    /// Name of the primary key field, if any.
    pub key: Option<&'static str>,
}

impl EntitySchema {
    /// Looks up a field by name.
    ///
    /// An exact match wins; otherwise the first case-insensitive match is
    /// returned, so `"name"` resolves to a field declared as `"Name"`.
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    /// Descriptor of the primary key field.
    pub fn key_field(&self) -> Option<&'static FieldDescriptor> {
        self.key.and_then(|key| self.field(key))
    }
}

/// The content of a field read from a [`Record`].
pub enum Slot<'a> {
    /// Scalar field value.
    Value(Value),
    /// Single related entity, `None` when unset.
    One(Option<&'a dyn Record>),
    /// Related entity collection.
    Many(Vec<&'a dyn Record>),
    /// No such field.
    Missing,
}

impl<'a> Slot<'a> {
    /// Converts a scalar slot into its value; anything else reads as `Null`.
    pub fn into_value(self) -> Value {
        match self {
            Slot::Value(v) => v,
            _ => Value::Null,
        }
    }

    /// Related records reachable through this slot.
    pub fn into_records(self) -> Vec<&'a dyn Record> {
        match self {
            Slot::One(one) => one.into_iter().collect(),
            Slot::Many(many) => many,
            _ => Vec::new(),
        }
    }
}

/// Object-safe access to an entity's fields.
///
/// Field names passed to these methods are canonical descriptor names; path
/// resolution normalizes user input before it reaches a record.
pub trait Record {
    /// Schema of the concrete entity type.
    fn schema(&self) -> &'static EntitySchema;

    /// Reads a field.
    fn get(&self, field: &str) -> Slot<'_>;

    /// Writes a scalar field.
    fn set(&mut self, field: &str, value: Value) -> Result<()>;

    /// Mutable access to related records of a relation field.
    fn related_mut(&mut self, _field: &str) -> Vec<&mut dyn Record> {
        Vec::new()
    }

    /// Drops related records for which `keep` returns `false`.
    ///
    /// Optional single relations are cleared; required ones are left as-is.
    fn retain_related(&mut self, _field: &str, _keep: &dyn Fn(&dyn Record) -> bool) {}
}

/// A concrete entity type with a static schema.
pub trait Entity: Record + Sized + 'static {
    /// Schema shared by all instances of this type.
    fn entity_schema() -> &'static EntitySchema;
}

/// Rust types that can back a scalar entity field.
pub trait FieldValue: Sized {
    /// Declared field type.
    const TYPE: FieldType;
    /// Whether the type admits `Null`.
    const NULLABLE: bool = false;

    /// Converts the field into a [`Value`].
    fn to_value(&self) -> Value;

    /// Converts a [`Value`] back into the field type.
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: FieldType, value: &Value) -> Result<T> {
    Err(SpecError::TypeMismatch {
        expected: expected.name(),
        actual: value.kind_name(),
    })
}

impl FieldValue for String {
    const TYPE: FieldType = FieldType::String;

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            Value::Char(c) => Ok(c.to_string()),
            other => mismatch(Self::TYPE, &other),
        }
    }
}

impl FieldValue for char {
    const TYPE: FieldType = FieldType::Char;

    fn to_value(&self) -> Value {
        Value::Char(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Char(c) => Ok(c),
            Value::String(ref s) if s.chars().count() == 1 => {
                s.chars().next().ok_or_else(|| SpecError::TypeMismatch {
                    expected: "char",
                    actual: "string",
                })
            }
            other => mismatch(Self::TYPE, &other),
        }
    }
}

impl FieldValue for bool {
    const TYPE: FieldType = FieldType::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => mismatch(Self::TYPE, &other),
        }
    }
}

macro_rules! int_field_value {
    ($ty_kind:ident, $widen:ident: $($t:ty),*) => {
        $(
            impl FieldValue for $t {
                const TYPE: FieldType = FieldType::$ty_kind;

                fn to_value(&self) -> Value {
                    Value::Number(Number::from(*self))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Number(n) => n
                            .$widen()
                            .and_then(|n| <$t>::try_from(n).ok())
                            .ok_or_else(|| SpecError::Coercion {
                                value: n.to_string(),
                                target: stringify!($t),
                            }),
                        other => mismatch(Self::TYPE, &other),
                    }
                }
            }
        )*
    };
}

int_field_value!(Int, to_i64: i8, i16, i32, i64, isize);
int_field_value!(UInt, to_u64: u8, u16, u32, u64, usize);

impl FieldValue for f64 {
    const TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> Value {
        Value::Number(Number::F64(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Number(n) => Ok(n.to_f64()),
            other => mismatch(Self::TYPE, &other),
        }
    }
}

impl FieldValue for f32 {
    const TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> Value {
        Value::Number(Number::F64(f64::from(*self)))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Number(n) => Ok(n.to_f64() as f32),
            other => mismatch(Self::TYPE, &other),
        }
    }
}

impl FieldValue for NaiveDate {
    const TYPE: FieldType = FieldType::Date;

    fn to_value(&self) -> Value {
        Value::Date(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(d),
            Value::DateTime(dt) => Ok(dt.date()),
            other => mismatch(Self::TYPE, &other),
        }
    }
}

impl FieldValue for NaiveDateTime {
    const TYPE: FieldType = FieldType::DateTime;

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0).ok_or(SpecError::InvalidDate {
                value: d.to_string(),
            }),
            other => mismatch(Self::TYPE, &other),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const TYPE: FieldType = T::TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Containers that hold related entities.
///
/// Implemented for `Box<E>`, `Vec<E>` and `Option<R>` of any related
/// container; `#[derive(Entity)]` also implements it for the entity itself so
/// that `Option<E>` works.
pub trait Related {
    /// Related records, in container order.
    fn records(&self) -> Vec<&dyn Record>;

    /// Mutable related records, in container order.
    fn records_mut(&mut self) -> Vec<&mut dyn Record>;

    /// Drops related records rejected by `keep`, where the container allows it.
    fn retain(&mut self, keep: &dyn Fn(&dyn Record) -> bool);
}

impl<T: Entity> Related for Box<T> {
    fn records(&self) -> Vec<&dyn Record> {
        vec![&**self as &dyn Record]
    }

    fn records_mut(&mut self) -> Vec<&mut dyn Record> {
        vec![&mut **self as &mut dyn Record]
    }

    fn retain(&mut self, _keep: &dyn Fn(&dyn Record) -> bool) {}
}

impl<T: Entity> Related for Vec<T> {
    fn records(&self) -> Vec<&dyn Record> {
        self.iter().map(|r| r as &dyn Record).collect()
    }

    fn records_mut(&mut self) -> Vec<&mut dyn Record> {
        self.iter_mut().map(|r| r as &mut dyn Record).collect()
    }

    fn retain(&mut self, keep: &dyn Fn(&dyn Record) -> bool) {
        Vec::retain(self, |item| keep(item));
    }
}

impl<R: Related> Related for Option<R> {
    fn records(&self) -> Vec<&dyn Record> {
        self.as_ref().map(Related::records).unwrap_or_default()
    }

    fn records_mut(&mut self) -> Vec<&mut dyn Record> {
        self.as_mut().map(Related::records_mut).unwrap_or_default()
    }

    fn retain(&mut self, keep: &dyn Fn(&dyn Record) -> bool) {
        let rejected = self
            .as_ref()
            .is_some_and(|inner| inner.records().into_iter().any(|r| !keep(r)));
        if rejected {
            *self = None;
        }
    }
}
