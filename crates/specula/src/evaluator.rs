//! Applying a [`Specification`] to a queryable collection.
//!
//! The evaluator never executes anything. It translates a specification into
//! calls on a host-supplied [`Queryable`], in a fixed order, and returns the
//! still-lazy result for the caller to materialize.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::ordering::OrderKey;
use crate::predicate::Predicate;
use crate::schema::Entity;
use crate::specification::{Include, Projection, Specification};
use crate::value::Value;

/// A lazily-evaluated data source for entities of type `E`.
///
/// Every method returns the refined query; none of them should execute it.
pub trait Queryable<E: Entity>: Sized {
    /// Restricts results to entities matching `predicate`.
    fn filter(self, predicate: &Predicate<E>) -> Self;

    /// Loads a relation, applying the include's sub-filter at the source.
    fn include(self, include: &Include) -> Self;

    /// Shapes results into projected rows.
    fn project(self, projection: &Projection) -> Self;

    /// Sets the primary sort key, replacing any previous ordering.
    fn order_by(self, key: &OrderKey) -> Self;

    /// Adds a tie-break key after the existing ordering.
    fn then_by(self, key: &OrderKey) -> Self;

    /// Requests reads without change tracking.
    fn no_tracking(self) -> Self;

    /// Requests one query per collection include.
    fn split_query(self) -> Self;

    /// Looks up at most one entity by primary key.
    fn find_by_key(self, key: &Value) -> Self;

    /// Attaches a cancellation signal for materialization.
    fn with_cancellation(self, _signal: CancelSignal) -> Self {
        self
    }
}

/// Cooperative cancellation flag shared with the host.
///
/// The evaluator only forwards it; hosts check it while materializing.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        CancelSignal::default()
    }

    /// Requests cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Applies `spec` to `source`.
///
/// Steps, in order:
/// 1. untracked reads if requested
/// 2. includes, in declaration order
/// 3. a key lookup if a primary key is set; nothing else is applied after it
/// 4. otherwise the criteria as a filter
/// 5. the projection
/// 6. the sort keys, the first as primary and the rest as tie-breaks
/// 7. split-query mode if requested
pub fn apply<E, Q>(source: Q, spec: &Specification<E>) -> Q
where
    E: Entity,
    Q: Queryable<E>,
{
    apply_cancellable(source, spec, None)
}

/// Like [`apply`], forwarding `cancel` to the host first.
pub fn apply_cancellable<E, Q>(source: Q, spec: &Specification<E>, cancel: Option<CancelSignal>) -> Q
where
    E: Entity,
    Q: Queryable<E>,
{
    let entity = E::entity_schema().name;
    let mut query = source;

    if let Some(signal) = cancel {
        query = query.with_cancellation(signal);
    }

    if spec.is_no_tracking() {
        query = query.no_tracking();
    }

    for include in spec.includes() {
        debug!(entity, %include, "applying include");
        query = query.include(include);
    }

    if let Some(key) = spec.primary_key() {
        debug!(entity, %key, "applying key lookup");
        return query.find_by_key(key);
    }

    if let Some(criteria) = spec.criteria() {
        debug!(entity, %criteria, "applying criteria");
        query = query.filter(criteria);
    }

    if let Some(projection) = spec.projection() {
        query = query.project(projection);
    }

    for (i, key) in spec.order_keys().iter().enumerate() {
        debug!(entity, %key, primary = i == 0, "applying order key");
        query = if i == 0 {
            query.order_by(key)
        } else {
            query.then_by(key)
        };
    }

    if spec.is_split_query() {
        query = query.split_query();
    }

    query
}
