//! The [`Specification`] aggregate.
//!
//! A specification bundles everything a caller wants from one query or
//! update against entities of type `E`: criteria, relation includes, sort
//! keys, a projection, update setters and execution flags. It is built
//! fluently and handed to [`apply`](crate::apply).
//!
//! # Example
//!
//! ```ignore
//! let spec = Specification::<Country>::new()
//!     .filter(Predicate::gte("Population", 1_000_000u64)?)
//!     .include_filtered("People", Predicate::<Person>::gte("Age", 18)?)?
//!     .order_by_descending("Population")?
//!     .then_by("Name")?
//!     .no_tracking(true);
//! ```

use std::fmt;

use crate::error::{Result, SpecError};
use crate::ordering::{Dir, OrderKey};
use crate::path::PropertyPath;
use crate::predicate::{Combine, Node, Predicate};
use crate::schema::{Entity, FieldType, Record};
use crate::update::{UpdateAction, UpdateBuilder};
use crate::value::Value;

/// Execution flags requested from the host collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueryFlags {
    /// Read without change tracking.
    pub no_tracking: bool,
    /// Load collection includes with separate queries.
    pub split_query: bool,
}

impl QueryFlags {
    pub const NONE: QueryFlags = QueryFlags {
        no_tracking: false,
        split_query: false,
    };
}

/// A relation to load alongside the root entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    /// Path ending at a relation field.
    pub path: PropertyPath,
    /// Only related entities matching this tree are loaded.
    pub filter: Option<Node>,
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{} where {}", self.path, filter),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Ordered `(alias, path)` selections shaping the result rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    fields: Vec<(String, PropertyPath)>,
}

impl Projection {
    pub fn new() -> Self {
        Projection::default()
    }

    pub fn fields(&self) -> &[(String, PropertyPath)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn push(&mut self, alias: String, path: PropertyPath) {
        match self.fields.iter_mut().find(|(a, _)| *a == alias) {
            Some(existing) => existing.1 = path,
            None => self.fields.push((alias, path)),
        }
    }

    /// Reads one row from `record`.
    ///
    /// Paths crossing a collection yield the first value reached.
    pub fn project(&self, record: &dyn Record) -> Row {
        Row {
            columns: self
                .fields
                .iter()
                .map(|(alias, path)| (alias.clone(), path.read_first(record)))
                .collect(),
        }
    }
}

/// A projected result row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Value of the column named `alias`.
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, v)| v)
    }
}

/// Declarative bundle of query and update intents for entity type `E`.
pub struct Specification<E> {
    criteria: Option<Predicate<E>>,
    primary_key: Option<Value>,
    includes: Vec<Include>,
    order: Vec<OrderKey>,
    order_asc: Option<PropertyPath>,
    order_desc: Option<PropertyPath>,
    projection: Option<Projection>,
    update: Option<UpdateAction<E>>,
    update_properties: Vec<PropertyPath>,
    flags: QueryFlags,
}

impl<E> Specification<E> {
    /// An empty specification: no criteria, no includes, no ordering.
    pub fn new() -> Self {
        Specification {
            criteria: None,
            primary_key: None,
            includes: Vec::new(),
            order: Vec::new(),
            order_asc: None,
            order_desc: None,
            projection: None,
            update: None,
            update_properties: Vec::new(),
            flags: QueryFlags::NONE,
        }
    }

    /// Criteria joining `predicates` with `combine`.
    pub fn with_criteria<I>(predicates: I, combine: Combine, flags: QueryFlags) -> Self
    where
        I: IntoIterator<Item = Predicate<E>>,
    {
        let mut spec = Self::new();
        spec.criteria = Some(Predicate::combine_all(predicates, combine));
        spec.flags = flags;
        spec
    }

    /// Direct lookup by primary key. Criteria, ordering and projection are
    /// ignored when a key is set.
    pub fn by_key(key: impl Into<Value>, flags: QueryFlags) -> Self {
        let mut spec = Self::new();
        spec.primary_key = Some(key.into());
        spec.flags = flags;
        spec
    }

    pub fn criteria(&self) -> Option<&Predicate<E>> {
        self.criteria.as_ref()
    }

    pub fn primary_key(&self) -> Option<&Value> {
        self.primary_key.as_ref()
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    pub fn update(&self) -> Option<&UpdateAction<E>> {
        self.update.as_ref()
    }

    pub fn update_properties(&self) -> &[PropertyPath] {
        &self.update_properties
    }

    pub fn flags(&self) -> QueryFlags {
        self.flags
    }

    pub fn is_no_tracking(&self) -> bool {
        self.flags.no_tracking
    }

    pub fn is_split_query(&self) -> bool {
        self.flags.split_query
    }

    /// Effective sort keys.
    ///
    /// The explicit key list wins. Without it, the single legacy slot is
    /// used, preferring ascending when both directions were set.
    pub fn order_keys(&self) -> Vec<OrderKey> {
        if !self.order.is_empty() {
            return self.order.clone();
        }
        match (&self.order_asc, &self.order_desc) {
            (Some(path), _) => vec![OrderKey::new(path.clone(), Dir::Asc)],
            (None, Some(path)) => vec![OrderKey::new(path.clone(), Dir::Desc)],
            (None, None) => Vec::new(),
        }
    }

    /// ANDs `predicate` into the criteria.
    pub fn filter(mut self, predicate: Predicate<E>) -> Self {
        self.criteria = Some(match self.criteria.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Replaces the criteria.
    pub fn set_criteria(&mut self, predicate: Predicate<E>) {
        self.criteria = Some(predicate);
    }

    /// Switches to a key lookup.
    pub fn set_primary_key(&mut self, key: impl Into<Value>) {
        self.primary_key = Some(key.into());
    }

    pub fn no_tracking(mut self, on: bool) -> Self {
        self.flags.no_tracking = on;
        self
    }

    pub fn split_query(mut self, on: bool) -> Self {
        self.flags.split_query = on;
        self
    }

    /// Sets the update action.
    pub fn set_update(mut self, action: UpdateAction<E>) -> Self {
        self.update = Some(action);
        self
    }
}

impl<E: Entity> Specification<E> {
    /// Loads the relation at `path`.
    pub fn include(mut self, path: &str) -> Result<Self> {
        let path = relation_path::<E>(path)?;
        self.includes.push(Include { path, filter: None });
        Ok(self)
    }

    /// Loads the relation at `path`, keeping only related `C` entities that
    /// match `filter`.
    ///
    /// Only collections and optional single relations can drop what the
    /// filter rejects; a required single relation fails with
    /// [`SpecError::InvalidOperatorForType`]. Fails with
    /// [`SpecError::EntityMismatch`] if the relation does not lead to `C`.
    pub fn include_filtered<C: Entity>(mut self, path: &str, filter: Predicate<C>) -> Result<Self> {
        let path = relation_path::<E>(path)?;
        if !matches!(path.field_type(), FieldType::Many(_)) && !path.leaf().nullable {
            return Err(SpecError::InvalidOperatorForType {
                op: "include",
                value_type: "required relation",
            });
        }
        let target = path.field_type().target();
        if !target.is_some_and(|t| std::ptr::eq(t, C::entity_schema())) {
            return Err(SpecError::EntityMismatch {
                expected: C::entity_schema().name,
                actual: target.map_or("none", |t| t.name),
            });
        }
        self.includes.push(Include {
            path,
            filter: Some(filter.into_node()),
        });
        Ok(self)
    }

    /// Extends the most recent include one level further, e.g. `People`
    /// followed by `then_include("Country")` loads `People.Country`.
    ///
    /// Without a previous include this is [`include`](Self::include).
    pub fn then_include(self, path: &str) -> Result<Self> {
        let full = match self.includes.last() {
            Some(last) => format!("{}.{}", last.path, path),
            None => path.to_string(),
        };
        self.include(&full)
    }

    /// Starts a new ascending sort, discarding earlier keys.
    pub fn order_by(mut self, path: &str) -> Result<Self> {
        self.order = vec![OrderKey::asc::<E>(path)?];
        Ok(self)
    }

    /// Starts a new descending sort, discarding earlier keys.
    pub fn order_by_descending(mut self, path: &str) -> Result<Self> {
        self.order = vec![OrderKey::desc::<E>(path)?];
        Ok(self)
    }

    /// Adds an ascending tie-break key.
    pub fn then_by(mut self, path: &str) -> Result<Self> {
        self.order.push(OrderKey::asc::<E>(path)?);
        Ok(self)
    }

    /// Adds a descending tie-break key.
    pub fn then_by_descending(mut self, path: &str) -> Result<Self> {
        self.order.push(OrderKey::desc::<E>(path)?);
        Ok(self)
    }

    /// Sets the legacy single ascending sort field.
    pub fn set_order_by(&mut self, path: &str) -> Result<()> {
        self.order_asc = Some(PropertyPath::parse::<E>(path)?);
        Ok(())
    }

    /// Sets the legacy single descending sort field.
    pub fn set_order_by_descending(&mut self, path: &str) -> Result<()> {
        self.order_desc = Some(PropertyPath::parse::<E>(path)?);
        Ok(())
    }

    /// Adds a projected column. Reusing an alias replaces its path.
    pub fn select(mut self, alias: &str, path: &str) -> Result<Self> {
        let path = PropertyPath::parse::<E>(path)?;
        if path.field_type().is_relation() {
            return Err(SpecError::InvalidOperatorForType {
                op: "select",
                value_type: path.field_type().name(),
            });
        }
        self.projection
            .get_or_insert_with(Projection::new)
            .push(alias.to_string(), path);
        Ok(self)
    }

    /// Adds fields to update from a model later, see
    /// [`UpdateBuilder::from_model`](crate::UpdateBuilder::from_model).
    pub fn update_property(mut self, path: &str) -> Result<Self> {
        self.update_properties.push(PropertyPath::parse::<E>(path)?);
        Ok(self)
    }

    /// Sets the update action to the values `model` holds at the selected
    /// update properties.
    pub fn update_from(self, model: &E, builder: &UpdateBuilder) -> Result<Self> {
        let action = builder.from_model(&self.update_properties, model)?;
        Ok(self.set_update(action))
    }
}

fn relation_path<E: Entity>(path: &str) -> Result<PropertyPath> {
    let path = PropertyPath::parse::<E>(path)?;
    let ty = path.field_type();
    if !ty.is_relation() {
        return Err(SpecError::InvalidOperatorForType {
            op: "include",
            value_type: ty.name(),
        });
    }
    Ok(path)
}

impl<E> Default for Specification<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Specification<E> {
    fn clone(&self) -> Self {
        Specification {
            criteria: self.criteria.clone(),
            primary_key: self.primary_key.clone(),
            includes: self.includes.clone(),
            order: self.order.clone(),
            order_asc: self.order_asc.clone(),
            order_desc: self.order_desc.clone(),
            projection: self.projection.clone(),
            update: self.update.clone(),
            update_properties: self.update_properties.clone(),
            flags: self.flags,
        }
    }
}

impl<E> fmt::Debug for Specification<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("criteria", &self.criteria)
            .field("primary_key", &self.primary_key)
            .field("includes", &self.includes)
            .field("order", &self.order)
            .field("order_asc", &self.order_asc)
            .field("order_desc", &self.order_desc)
            .field("projection", &self.projection)
            .field("update", &self.update)
            .field("update_properties", &self.update_properties)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Request types that describe a query, e.g. deserialized HTTP parameters.
///
/// ```ignore
/// struct PeopleQuery { name: Option<String>, age: Option<String> }
///
/// impl SpecificationRequest<Person> for PeopleQuery {
///     fn specification(&self, flags: QueryFlags) -> Result<Specification<Person>> {
///         let parser = ConditionParser::new();
///         let mut criteria = Vec::new();
///         if let Some(name) = &self.name {
///             criteria.push(parser.parse("Name", name, None)?);
///         }
///         if let Some(age) = &self.age {
///             criteria.push(parser.parse("Age", age, None)?);
///         }
///         Ok(Specification::with_criteria(criteria, Combine::And, flags))
///     }
/// }
/// ```
pub trait SpecificationRequest<E: Entity> {
    /// Builds the specification this request describes.
    fn specification(&self, flags: QueryFlags) -> Result<Specification<E>>;
}
