//! In-memory [`Queryable`] host.
//!
//! [`MemorySource`] records the operations applied to it and runs them over
//! a slice only when [`fetch`](MemorySource::fetch) is called. It is useful
//! for tests and for small reference data sets.
//!
//! ```ignore
//! let spec = Specification::<Person>::new()
//!     .filter(Predicate::gte("Age", 18)?)
//!     .order_by("Name")?;
//! let adults = apply(MemorySource::new(&people), &spec).fetch()?;
//! ```

use tracing::debug;

use crate::error::{Result, SpecError};
use crate::evaluator::{CancelSignal, Queryable};
use crate::ordering::{compare_by_keys, OrderKey};
use crate::predicate::{Node, Predicate};
use crate::schema::{Entity, Record};
use crate::specification::{Include, Projection, Row, Specification};
use crate::value::Value;

/// Lazy query over a slice of entities.
pub struct MemorySource<'a, E> {
    items: &'a [E],
    filter: Option<Node>,
    key: Option<Value>,
    includes: Vec<Include>,
    projection: Option<Projection>,
    order: Vec<OrderKey>,
    no_tracking: bool,
    split_query: bool,
    cancel: Option<CancelSignal>,
}

impl<'a, E: Entity + Clone> MemorySource<'a, E> {
    /// Creates an unrestricted query over `items`.
    pub fn new(items: &'a [E]) -> Self {
        MemorySource {
            items,
            filter: None,
            key: None,
            includes: Vec::new(),
            projection: None,
            order: Vec::new(),
            no_tracking: false,
            split_query: false,
            cancel: None,
        }
    }

    pub fn is_no_tracking(&self) -> bool {
        self.no_tracking
    }

    pub fn is_split_query(&self) -> bool {
        self.split_query
    }

    pub fn order_keys(&self) -> &[OrderKey] {
        &self.order
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    /// Runs the query, returning matching entities.
    ///
    /// Related entities excluded by an include's sub-filter are removed from
    /// each result.
    pub fn fetch(&self) -> Result<Vec<E>> {
        self.check_cancelled()?;

        let mut out: Vec<E> = match &self.key {
            Some(key) => self.find(key)?.into_iter().cloned().collect(),
            None => self
                .items
                .iter()
                .filter(|item| self.filter.as_ref().map_or(true, |f| f.evaluate(*item)))
                .cloned()
                .collect(),
        };

        self.check_cancelled()?;

        if self.key.is_none() && !self.order.is_empty() {
            out.sort_by(|a, b| compare_by_keys(a, b, &self.order));
        }

        for include in &self.includes {
            if let Some(filter) = &include.filter {
                for item in &mut out {
                    include.path.retain(item, &|related: &dyn Record| filter.evaluate(related));
                }
            }
        }

        debug!(
            entity = E::entity_schema().name,
            scanned = self.items.len(),
            returned = out.len(),
            "fetched from memory"
        );
        Ok(out)
    }

    /// Runs the query and projects each result.
    ///
    /// Without a projection every scalar field becomes a column.
    pub fn fetch_rows(&self) -> Result<Vec<Row>> {
        let items = self.fetch()?;
        Ok(items
            .iter()
            .map(|item| match &self.projection {
                Some(projection) if self.key.is_none() => projection.project(item),
                _ => scalar_row(item),
            })
            .collect())
    }

    fn find(&self, key: &Value) -> Result<Option<&'a E>> {
        let schema = E::entity_schema();
        let field = schema.key_field().ok_or_else(|| SpecError::PathResolution {
            entity: schema.name,
            path: "<key>".to_string(),
            segment: schema.key.unwrap_or_default().to_string(),
        })?;
        Ok(self
            .items
            .iter()
            .find(|item| item.get(field.name).into_value().loose_eq(key)))
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(signal) if signal.is_cancelled() => Err(SpecError::Cancelled),
            _ => Ok(()),
        }
    }
}

fn scalar_row(record: &dyn Record) -> Row {
    Row {
        columns: record
            .schema()
            .fields
            .iter()
            .filter(|f| !f.ty.is_relation())
            .map(|f| (f.name.to_string(), record.get(f.name).into_value()))
            .collect(),
    }
}

impl<'a, E: Entity + Clone> Queryable<E> for MemorySource<'a, E> {
    fn filter(mut self, predicate: &Predicate<E>) -> Self {
        let node = predicate.node().clone();
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(node),
            None => node,
        });
        self
    }

    fn include(mut self, include: &Include) -> Self {
        self.includes.push(include.clone());
        self
    }

    fn project(mut self, projection: &Projection) -> Self {
        self.projection = Some(projection.clone());
        self
    }

    fn order_by(mut self, key: &OrderKey) -> Self {
        self.order = vec![key.clone()];
        self
    }

    fn then_by(mut self, key: &OrderKey) -> Self {
        self.order.push(key.clone());
        self
    }

    fn no_tracking(mut self) -> Self {
        self.no_tracking = true;
        self
    }

    fn split_query(mut self) -> Self {
        self.split_query = true;
        self
    }

    fn find_by_key(mut self, key: &Value) -> Self {
        self.key = Some(key.clone());
        self
    }

    fn with_cancellation(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }
}

/// Applies the update action of `spec` to every entity it selects.
///
/// Entities are selected by primary key when one is set, else by the
/// criteria. Returns the number of entities updated; a specification
/// without an update action updates nothing.
///
/// Every selected entity is checked before any is written, so an error
/// leaves `items` unchanged.
pub fn execute_update<E: Entity>(items: &mut [E], spec: &Specification<E>) -> Result<usize> {
    let Some(action) = spec.update() else {
        return Ok(0);
    };

    let schema = E::entity_schema();
    let key_field = match spec.primary_key() {
        Some(_) => Some(schema.key_field().ok_or_else(|| SpecError::PathResolution {
            entity: schema.name,
            path: "<key>".to_string(),
            segment: schema.key.unwrap_or_default().to_string(),
        })?),
        None => None,
    };

    let mut selected = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let hit = match (spec.primary_key(), key_field) {
            (Some(key), Some(field)) => item.get(field.name).into_value().loose_eq(key),
            _ => spec.criteria().map_or(true, |c| c.matches(item)),
        };
        if hit {
            action.check(item)?;
            selected.push(index);
            if key_field.is_some() {
                break;
            }
        }
    }

    // Every selected item was checked, so no write below can fail
    for &index in &selected {
        action.apply_to(&mut items[index])?;
    }
    let updated = selected.len();

    debug!(entity = schema.name, updated, "executed update in memory");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::apply;
    use crate::specification::QueryFlags;
    use crate::testing::{Country, Person};
    use crate::update::UpdateAction;

    fn people() -> Vec<Person> {
        vec![
            Person::new("Cid", 30).with_id(1),
            Person::new("Ann", 25).with_id(2),
            Person::new("Bob", 30).with_id(3),
            Person::new("Dee", 17).with_id(4),
        ]
    }

    fn names(items: &[Person]) -> Vec<&str> {
        items.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn nothing_runs_until_fetch() {
        let items = people();
        let spec = Specification::<Person>::new().filter(Predicate::gte("Age", 18).unwrap());
        let query = apply(MemorySource::new(&items), &spec);
        assert_eq!(names(&query.fetch().unwrap()), vec!["Cid", "Ann", "Bob"]);
    }

    #[test]
    fn sorts_by_keys() {
        let items = people();
        let spec = Specification::<Person>::new()
            .order_by_descending("Age")
            .unwrap()
            .then_by("Name")
            .unwrap();
        let out = apply(MemorySource::new(&items), &spec).fetch().unwrap();
        assert_eq!(names(&out), vec!["Bob", "Cid", "Ann", "Dee"]);
    }

    #[test]
    fn key_lookup() {
        let items = people();
        let spec = Specification::<Person>::by_key(3, QueryFlags::NONE)
            .filter(Predicate::eq("Name", "nobody").unwrap());
        assert_eq!(names(&apply(MemorySource::new(&items), &spec).fetch().unwrap()), vec!["Bob"]);

        let spec = Specification::<Person>::by_key(99, QueryFlags::NONE);
        assert!(apply(MemorySource::new(&items), &spec).fetch().unwrap().is_empty());
    }

    #[test]
    fn include_filter_prunes_related() {
        let countries = vec![Country::new("Norway").with_people(vec![
            Person::new("Ann", 30),
            Person::new("Kid", 5),
        ])];
        let spec = Specification::<Country>::new()
            .include_filtered("People", Predicate::<Person>::gte("Age", 18).unwrap())
            .unwrap();
        let out = apply(MemorySource::new(&countries), &spec).fetch().unwrap();
        assert_eq!(names(&out[0].people), vec!["Ann"]);
        assert_eq!(countries[0].people.len(), 2);
    }

    #[test]
    fn rows_follow_projection() {
        let items = people();
        let spec = Specification::<Person>::new()
            .select("who", "Name")
            .unwrap()
            .order_by("Age")
            .unwrap();
        let rows = apply(MemorySource::new(&items), &spec).fetch_rows().unwrap();
        assert_eq!(rows[0].get("who"), Some(&Value::from("Dee")));
        assert_eq!(rows[0].columns.len(), 1);

        let rows = MemorySource::new(&items).fetch_rows().unwrap();
        assert_eq!(rows[0].get("Name"), Some(&Value::from("Cid")));
        assert!(rows[0].get("Country").is_none());
    }

    #[test]
    fn cancelled_fetch_fails() {
        let items = people();
        let signal = CancelSignal::new();
        let query = crate::evaluator::apply_cancellable(
            MemorySource::new(&items),
            &Specification::<Person>::new(),
            Some(signal.clone()),
        );
        assert!(query.fetch().is_ok());
        signal.cancel();
        assert_eq!(query.fetch().unwrap_err(), SpecError::Cancelled);
    }

    #[test]
    fn flags_are_recorded() {
        let items = people();
        let spec = Specification::<Person>::new().no_tracking(true).split_query(true);
        let query = apply(MemorySource::new(&items), &spec);
        assert!(query.is_no_tracking());
        assert!(query.is_split_query());
    }

    #[test]
    fn updates_selected_items() {
        let mut items = people();
        let spec = Specification::<Person>::new()
            .filter(Predicate::eq("Age", 30).unwrap())
            .set_update(UpdateAction::<Person>::new().set("Nickname", "thirty").unwrap());
        assert_eq!(execute_update(&mut items, &spec).unwrap(), 2);
        assert_eq!(items[0].nickname.as_deref(), Some("thirty"));
        assert_eq!(items[1].nickname, None);

        let spec = Specification::<Person>::by_key(2, QueryFlags::NONE)
            .set_update(UpdateAction::<Person>::new().set("Age", 26).unwrap());
        assert_eq!(execute_update(&mut items, &spec).unwrap(), 1);
        assert_eq!(items[1].age, 26);

        assert_eq!(execute_update(&mut items, &Specification::new()).unwrap(), 0);
    }

    #[test]
    fn failed_update_writes_no_item() {
        let mut items = people();
        items[0] = items[0].clone().with_country(Country::new("Norway"));
        let spec = Specification::<Person>::new()
            .filter(Predicate::eq("Age", 30).unwrap())
            .set_update(
                UpdateAction::<Person>::new()
                    .set("Nickname", "thirty")
                    .unwrap()
                    .set("Country.Name", "Sweden")
                    .unwrap(),
            );

        assert!(execute_update(&mut items, &spec).is_err());
        assert_eq!(items[0].nickname, None);
        assert_eq!(items[0].country.as_ref().unwrap().name, "Norway");
        assert_eq!(items[2].nickname, None);
    }
}
