//! Partial-update actions.
//!
//! An [`UpdateAction`] is an ordered list of [`Setter`]s, each assigning one
//! value to one field path. [`UpdateBuilder`] produces actions from two kinds
//! of input:
//!
//! - **Typed**: a list of resolved paths and a populated model; each setter
//!   takes the value the model holds at that path.
//! - **Path/value map**: a JSON object keyed by dotted paths. Nested objects
//!   are flattened first, so `{"Country": {"Name": "X"}}` sets `Country.Name`.
//!
//! Values are coerced to each path's declared field type. With the default
//! [`CoercionPolicy::Degrade`] a value that cannot be coerced is kept as-is
//! and a warning is logged; [`CoercionPolicy::Strict`] fails instead.

use std::fmt;
use std::marker::PhantomData;

use serde_json::Map;
use tracing::{debug, warn};

use crate::coerce::coerce_value;
use crate::config::{CoercionPolicy, EngineConfig};
use crate::error::{Result, SpecError};
use crate::path::PropertyPath;
use crate::schema::{Entity, Record};
use crate::value::Value;

/// Assignment of one value to one field path.
#[derive(Debug, Clone, PartialEq)]
pub struct Setter {
    pub path: PropertyPath,
    pub value: Value,
}

impl Setter {
    /// Writes the value into `record`.
    pub fn apply(&self, record: &mut dyn Record) -> Result<()> {
        self.path.write(record, self.value.clone())
    }
}

impl fmt::Display for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.path, self.value)
    }
}

/// Ordered setters for entities of type `E`.
pub struct UpdateAction<E> {
    setters: Vec<Setter>,
    _entity: PhantomData<fn(&mut E)>,
}

impl<E> UpdateAction<E> {
    /// Creates an empty action.
    pub fn new() -> Self {
        UpdateAction {
            setters: Vec::new(),
            _entity: PhantomData,
        }
    }

    pub fn setters(&self) -> &[Setter] {
        &self.setters
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }

    fn push(&mut self, setter: Setter) {
        self.setters.push(setter);
    }
}

impl<E: Entity> UpdateAction<E> {
    /// Adds a setter, coercing `value` to the field type.
    ///
    /// Fails on unknown paths and on values that cannot be coerced.
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Result<Self> {
        let path = PropertyPath::parse::<E>(path)?;
        check_writable(&path)?;
        let value = coerce_value(value.into(), path.leaf(), &EngineConfig::default())?;
        self.push(Setter { path, value });
        Ok(self)
    }

    /// Checks that every setter can reach its field on `entity`.
    pub fn check(&self, entity: &E) -> Result<()> {
        self.setters
            .iter()
            .try_for_each(|setter| setter.path.check_reachable(entity))
    }

    /// Applies every setter to `entity`, in order.
    ///
    /// All paths are checked first, so on `Err` the entity is unchanged. A
    /// value that does not fit its field, such as one kept un-coerced under
    /// [`CoercionPolicy::Degrade`], is skipped with a warning and the
    /// remaining setters still apply.
    pub fn apply_to(&self, entity: &mut E) -> Result<()> {
        self.check(entity)?;
        for setter in &self.setters {
            if let Err(err) = setter.apply(entity) {
                warn!(
                    entity = E::entity_schema().name,
                    path = %setter.path,
                    value = %setter.value,
                    error = %err,
                    "skipping update value that does not fit the field"
                );
            }
        }
        Ok(())
    }
}

impl<E> Default for UpdateAction<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for UpdateAction<E> {
    fn clone(&self) -> Self {
        UpdateAction {
            setters: self.setters.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> PartialEq for UpdateAction<E> {
    fn eq(&self, other: &Self) -> bool {
        self.setters == other.setters
    }
}

impl<E> fmt::Debug for UpdateAction<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UpdateAction").field(&self.setters).finish()
    }
}

impl<E> fmt::Display for UpdateAction<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set ")?;
        for (i, setter) in self.setters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{setter}")?;
        }
        Ok(())
    }
}

fn check_writable(path: &PropertyPath) -> Result<()> {
    let ty = path.field_type();
    if ty.is_relation() {
        return Err(SpecError::InvalidOperatorForType {
            op: "set",
            value_type: ty.name(),
        });
    }
    if path.crosses_collection() {
        return Err(SpecError::InvalidOperatorForType {
            op: "set",
            value_type: "collection",
        });
    }
    Ok(())
}

/// Flattens nested JSON objects into dotted keys.
///
/// Keys of child objects are prefixed with `parent.` recursively until a
/// non-object value is reached. Output follows the map's iteration order.
pub fn flatten(map: &Map<String, serde_json::Value>) -> Vec<(String, serde_json::Value)> {
    let mut out = Vec::new();
    flatten_into(map, None, &mut out);
    out
}

fn flatten_into(
    map: &Map<String, serde_json::Value>,
    prefix: Option<&str>,
    out: &mut Vec<(String, serde_json::Value)>,
) {
    for (key, value) in map {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            serde_json::Value::Object(child) => flatten_into(child, Some(&key), out),
            other => out.push((key, other.clone())),
        }
    }
}

/// Builds [`UpdateAction`]s from typed models or path/value maps.
#[derive(Debug, Clone, Default)]
pub struct UpdateBuilder {
    config: EngineConfig,
}

impl UpdateBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        UpdateBuilder::default()
    }

    /// Creates a builder with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        UpdateBuilder { config }
    }

    /// Builds setters for `selectors` from the values held by `model`.
    ///
    /// The declared type of each selector drives coercion, so `None` in an
    /// `Option` field becomes an explicit null assignment. A `Null` read for
    /// a non-nullable field can only come from an unset relation along the
    /// path; such selectors are skipped with a warning.
    pub fn from_model<E: Entity>(
        &self,
        selectors: &[PropertyPath],
        model: &E,
    ) -> Result<UpdateAction<E>> {
        let mut action = UpdateAction::new();

        for path in selectors {
            if !std::ptr::eq(path.root(), E::entity_schema()) {
                return Err(SpecError::EntityMismatch {
                    expected: E::entity_schema().name,
                    actual: path.root().name,
                });
            }
            check_writable(path)?;

            let field = path.leaf();
            let value = path.read_first(model);
            if value.is_null() && !field.nullable {
                warn!(%path, "skipping update of non-nullable field read as null");
                continue;
            }

            let value = self.coerce(path, value)?;
            action.push(Setter {
                path: path.clone(),
                value,
            });
        }

        debug!(entity = E::entity_schema().name, setters = action.len(), "built update from model");
        Ok(action)
    }

    /// Builds setters from a JSON object of dotted paths (or nested objects).
    ///
    /// Unknown paths always fail. Array values cannot be assigned to scalar
    /// fields; they fail under [`CoercionPolicy::Strict`] and are skipped
    /// with a warning otherwise.
    pub fn from_map<E: Entity>(
        &self,
        map: &Map<String, serde_json::Value>,
    ) -> Result<UpdateAction<E>> {
        let mut action = UpdateAction::new();

        for (key, json) in flatten(map) {
            let path = PropertyPath::parse::<E>(&key)?;
            check_writable(&path)?;

            let raw = match Value::from_json(&json) {
                Ok(raw) => raw,
                Err(err) if self.config.coercion_policy == CoercionPolicy::Degrade => {
                    warn!(%path, error = %err, "skipping update value that is not a scalar");
                    continue;
                }
                Err(err) => return Err(err),
            };

            let value = self.coerce(&path, raw)?;
            action.push(Setter { path, value });
        }

        debug!(entity = E::entity_schema().name, setters = action.len(), "built update from map");
        Ok(action)
    }

    /// Builds setters from a JSON value, which must be an object.
    pub fn from_json<E: Entity>(&self, json: &serde_json::Value) -> Result<UpdateAction<E>> {
        match json {
            serde_json::Value::Object(map) => self.from_map(map),
            other => Err(SpecError::Coercion {
                value: other.to_string(),
                target: "object",
            }),
        }
    }

    fn coerce(&self, path: &PropertyPath, raw: Value) -> Result<Value> {
        match coerce_value(raw.clone(), path.leaf(), &self.config) {
            Ok(value) => Ok(value),
            Err(err) => match self.config.coercion_policy {
                CoercionPolicy::Strict => Err(err),
                CoercionPolicy::Degrade => {
                    warn!(
                        %path,
                        value = %raw,
                        target = path.field_type().name(),
                        error = %err,
                        "update value kept un-coerced"
                    );
                    Ok(raw)
                }
            },
        }
    }
}
