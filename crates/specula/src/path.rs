//! Dotted property paths resolved against entity schemas.
//!
//! A [`PropertyPath`] is the resolved form of a string like `"Country.Name"`:
//! an ordered list of field descriptors rooted at an entity type. Resolution
//! happens once; the result is cached process-wide in [`PathCache`] and shared
//! by every predicate, order key and setter that uses it.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{Result, SpecError};
use crate::schema::{Entity, EntitySchema, FieldDescriptor, FieldType, Record, Slot};
use crate::value::Value;

/// A resolved field path.
#[derive(Clone)]
pub struct PropertyPath {
    root: &'static EntitySchema,
    segments: Arc<[&'static FieldDescriptor]>,
    text: Arc<str>,
}

impl PropertyPath {
    /// Resolves `path` against `E`, using the global cache.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let path = PropertyPath::parse::<City>("Country.Name")?;
    /// assert_eq!(path.as_str(), "Country.Name");
    /// ```
    pub fn parse<E: Entity>(path: &str) -> Result<Self> {
        PathCache::global().resolve::<E>(path)
    }

    /// Resolves `path` against a schema without caching.
    ///
    /// Fails with [`SpecError::PathResolution`] on the first segment that is
    /// not a field of the entity reached so far.
    pub fn resolve(root: &'static EntitySchema, path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut current = root;

        for (i, raw) in path.split('.').enumerate() {
            let name = raw.trim();
            let field = current
                .field(name)
                .ok_or_else(|| SpecError::PathResolution {
                    entity: current.name,
                    path: path.to_string(),
                    segment: name.to_string(),
                })?;

            segments.push(field);

            match field.ty.target() {
                Some(next) => current = next,
                // Scalars end the path; anything after them is unresolvable
                None => {
                    if let Some(rest) = path.split('.').nth(i + 1) {
                        return Err(SpecError::PathResolution {
                            entity: current.name,
                            path: path.to_string(),
                            segment: rest.trim().to_string(),
                        });
                    }
                }
            }
        }

        let text = segments
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(".");

        Ok(PropertyPath {
            root,
            segments: segments.into(),
            text: text.into(),
        })
    }

    /// Canonical dotted form, using declared field names.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Entity the path is rooted at.
    pub fn root(&self) -> &'static EntitySchema {
        self.root
    }

    /// Field descriptors from root to leaf.
    pub fn segments(&self) -> &[&'static FieldDescriptor] {
        &self.segments
    }

    /// The final field of the path.
    pub fn leaf(&self) -> &'static FieldDescriptor {
        self.segments[self.segments.len() - 1]
    }

    /// Declared type of the leaf field.
    pub fn field_type(&self) -> FieldType {
        self.leaf().ty
    }

    /// Whether any segment is a collection, so reads may fan out.
    pub fn crosses_collection(&self) -> bool {
        self.segments[..self.segments.len() - 1]
            .iter()
            .any(|f| matches!(f.ty, FieldType::Many(_)))
    }

    /// Reads every value the path reaches from `record`.
    ///
    /// An unset single relation along the way yields one `Null`; collections
    /// yield one value per element, so an empty collection yields nothing.
    pub fn read(&self, record: &dyn Record) -> Vec<Value> {
        let mut out = Vec::new();
        collect_values(record, &self.segments, &mut out);
        out
    }

    /// Reads the first value reached, or `Null`.
    pub fn read_first(&self, record: &dyn Record) -> Value {
        self.read(record).into_iter().next().unwrap_or(Value::Null)
    }

    /// Related records reached by a relation path.
    pub fn records<'a>(&self, record: &'a dyn Record) -> Vec<&'a dyn Record> {
        let mut out = Vec::new();
        collect_records(record, &self.segments, &mut out);
        out
    }

    /// Writes `value` to the leaf field of `record`.
    ///
    /// Intermediate segments must be single relations that are set.
    pub fn write(&self, record: &mut dyn Record, value: Value) -> Result<()> {
        match self.segments.split_last() {
            Some((leaf, prefix)) => write_at(record, prefix, leaf.name, value),
            None => Err(SpecError::PathResolution {
                entity: self.root.name,
                path: String::new(),
                segment: String::new(),
            }),
        }
    }

    /// Checks that [`write`](Self::write) can reach the leaf field of
    /// `record`, without writing anything.
    ///
    /// Fails with the same error `write` would return for a collection or
    /// an unset relation along the way.
    pub fn check_reachable(&self, record: &dyn Record) -> Result<()> {
        let Some((_, prefix)) = self.segments.split_last() else {
            return Err(SpecError::PathResolution {
                entity: self.root.name,
                path: String::new(),
                segment: String::new(),
            });
        };

        let mut current = record;
        for field in prefix {
            if matches!(field.ty, FieldType::Many(_)) {
                return Err(SpecError::InvalidOperatorForType {
                    op: "set",
                    value_type: "collection",
                });
            }
            current = current
                .get(field.name)
                .into_records()
                .into_iter()
                .next()
                .ok_or(SpecError::TypeMismatch {
                    expected: "relation",
                    actual: "null",
                })?;
        }
        Ok(())
    }

    /// Removes related records rejected by `keep` from the relation at the
    /// leaf of this path, for every parent the path reaches.
    pub fn retain(&self, record: &mut dyn Record, keep: &dyn Fn(&dyn Record) -> bool) {
        if let Some((leaf, prefix)) = self.segments.split_last() {
            retain_at(record, prefix, leaf.name, keep);
        }
    }
}

fn collect_values(record: &dyn Record, segments: &[&'static FieldDescriptor], out: &mut Vec<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    match record.get(head.name) {
        slot if rest.is_empty() => out.push(slot.into_value()),
        Slot::One(None) => out.push(Value::Null),
        Slot::One(Some(child)) => collect_values(child, rest, out),
        Slot::Many(children) => {
            for child in children {
                collect_values(child, rest, out);
            }
        }
        _ => out.push(Value::Null),
    }
}

fn collect_records<'a>(
    record: &'a dyn Record,
    segments: &[&'static FieldDescriptor],
    out: &mut Vec<&'a dyn Record>,
) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(record);
        return;
    };

    for child in record.get(head.name).into_records() {
        collect_records(child, rest, out);
    }
}

fn write_at(
    record: &mut dyn Record,
    prefix: &[&'static FieldDescriptor],
    leaf: &str,
    value: Value,
) -> Result<()> {
    let Some((head, rest)) = prefix.split_first() else {
        return record.set(leaf, value);
    };

    if matches!(head.ty, FieldType::Many(_)) {
        return Err(SpecError::InvalidOperatorForType {
            op: "set",
            value_type: "collection",
        });
    }

    let child = record
        .related_mut(head.name)
        .into_iter()
        .next()
        .ok_or(SpecError::TypeMismatch {
            expected: "relation",
            actual: "null",
        })?;
    write_at(child, rest, leaf, value)
}

fn retain_at(
    record: &mut dyn Record,
    prefix: &[&'static FieldDescriptor],
    leaf: &str,
    keep: &dyn Fn(&dyn Record) -> bool,
) {
    match prefix.split_first() {
        None => record.retain_related(leaf, keep),
        Some((head, rest)) => {
            for child in record.related_mut(head.name) {
                retain_at(child, rest, leaf, keep);
            }
        }
    }
}

impl PartialEq for PropertyPath {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.root, other.root) && self.text == other.text
    }
}

impl Eq for PropertyPath {}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.root.name, self.text)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

static GLOBAL: Lazy<PathCache> = Lazy::new(PathCache::new);

/// Cache of resolved paths keyed by entity type and path string.
///
/// Concurrent population is first-writer-wins: two threads resolving the
/// same key may both do the work, but only one result is kept, and both are
/// equivalent.
#[derive(Default)]
pub struct PathCache {
    entries: RwLock<HashMap<(TypeId, String), PropertyPath>>,
}

impl PathCache {
    /// Creates an empty cache with its own lifecycle.
    pub fn new() -> Self {
        PathCache::default()
    }

    /// The process-wide cache used by [`PropertyPath::parse`].
    pub fn global() -> &'static PathCache {
        &GLOBAL
    }

    /// Resolves `path` against `E`, reusing a cached result if present.
    pub fn resolve<E: Entity>(&self, path: &str) -> Result<PropertyPath> {
        let key = (TypeId::of::<E>(), path.to_string());

        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(hit.clone());
        }

        let resolved = PropertyPath::resolve(E::entity_schema(), path)?;
        debug!(entity = E::entity_schema().name, path, "resolved property path");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.entry(key).or_insert(resolved).clone())
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all cached paths.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
