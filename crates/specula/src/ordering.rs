//! Ordering types for result sorting.
//!
//! Provides [`Dir`] for sort direction and [`OrderKey`] for path-based
//! ordering. In a list of keys the first is the primary sort; each following
//! key only breaks ties left by the ones before it.

use std::cmp::Ordering;

use crate::error::Result;
use crate::path::PropertyPath;
use crate::schema::{Entity, Record};
use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl Dir {
    /// Returns `true` if this is ascending order.
    pub fn is_asc(self) -> bool {
        matches!(self, Dir::Asc)
    }

    /// Returns `true` if this is descending order.
    pub fn is_desc(self) -> bool {
        matches!(self, Dir::Desc)
    }

    /// Applies this direction to an ordering.
    ///
    /// For `Asc`, returns the ordering unchanged.
    /// For `Desc`, reverses the ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    /// Returns the display name of this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single sort key: a resolved path and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    /// The path to sort by.
    pub path: PropertyPath,
    /// The sort direction.
    pub dir: Dir,
}

impl OrderKey {
    /// Creates an ordering on an already-resolved path.
    pub fn new(path: PropertyPath, dir: Dir) -> Self {
        OrderKey { path, dir }
    }

    /// Resolves `path` on `E` and orders ascending.
    pub fn asc<E: Entity>(path: &str) -> Result<Self> {
        Ok(OrderKey::new(PropertyPath::parse::<E>(path)?, Dir::Asc))
    }

    /// Resolves `path` on `E` and orders descending.
    pub fn desc<E: Entity>(path: &str) -> Result<Self> {
        Ok(OrderKey::new(PropertyPath::parse::<E>(path)?, Dir::Desc))
    }

    /// Returns `true` if this key sorts descending.
    pub fn is_descending(&self) -> bool {
        self.dir.is_desc()
    }

    /// Compares two records by this key.
    ///
    /// Paths crossing a collection compare by the first value reached.
    pub fn compare(&self, a: &dyn Record, b: &dyn Record) -> Ordering {
        let val_a = self.path.read_first(a);
        let val_b = self.path.read_first(b);
        self.dir.apply(compare_values(&val_a, &val_b))
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.path, self.dir)
    }
}

/// Compares two values for sorting.
///
/// This is a total order, safe to hand to `sort_by`. `Null` sorts after every
/// other value in ascending order. NaN sorts by [`f64::total_cmp`], so a
/// positive NaN lands after every other number. Values of different kinds
/// sort by kind: bools, then chars, numbers, strings, and dates.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .compare(*y)
            .unwrap_or_else(|| x.to_f64().total_cmp(&y.to_f64())),
        _ if kind_rank(a) == kind_rank(b) => a.compare(b).unwrap_or(Ordering::Equal),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Char(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        // Dates compare against date-times at midnight
        Value::Date(_) | Value::DateTime(_) => 4,
        Value::Null => 5,
    }
}

/// Compares two records using a list of keys.
///
/// Uses the first key as the primary sort, the second to break ties, etc.
/// If all keys compare equal, returns `Equal`.
pub fn compare_by_keys(a: &dyn Record, b: &dyn Record, keys: &[OrderKey]) -> Ordering {
    keys.iter()
        .map(|key| key.compare(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}
