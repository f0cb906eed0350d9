//! Predicate trees and their combinators.
//!
//! A [`Predicate`] is a tree of [`Node`]s typed against one entity. Leaves
//! compare the value(s) a [`PropertyPath`] reaches with a literal; inner nodes
//! combine children with AND, OR and NOT. Trees are interpreted directly
//! against a record, so no compilation step is involved.
//!
//! # The `True` sentinel
//!
//! [`Predicate::always`] stands for "unconstrained". It is the identity for
//! both [`Predicate::and`] and [`Predicate::or`], so folding a list from it
//! yields the plain combination of the list:
//!
//! ```
//! # use specula::{Combine, Predicate, Entity};
//! # fn demo<E: Entity>(a: Predicate<E>, b: Predicate<E>) {
//! let all = Predicate::combine_all([a.clone(), b.clone()], Combine::Or);
//! assert_eq!(all, a.or(b));
//! # }
//! ```
//!
//! Note that this makes `always().or(x)` equal to `x`, not to `always()`.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, Not};

use crate::coerce::coerce_value;
use crate::config::EngineConfig;
use crate::error::{Result, SpecError};
use crate::op::Op;
use crate::path::PropertyPath;
use crate::schema::{Entity, Record};
use crate::value::Value;

/// How a list of predicates is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Combine {
    /// All predicates must hold.
    #[default]
    And,
    /// At least one predicate must hold.
    Or,
}

/// Untyped predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Constant result. `Constant(true)` is the unconstrained sentinel.
    Constant(bool),
    /// Compares every value reached by `path` with `value`.
    Compare {
        path: PropertyPath,
        op: Op,
        value: Value,
    },
    /// Set membership. With `ignore_case`, `values` are stored lowercased.
    In {
        path: PropertyPath,
        values: Vec<Value>,
        ignore_case: bool,
    },
    /// Conjunction of children.
    And(Vec<Node>),
    /// Disjunction of children.
    Or(Vec<Node>),
    /// Negation.
    Not(Box<Node>),
}

impl Node {
    /// The unconstrained sentinel.
    pub const TRUE: Node = Node::Constant(true);
    /// The predicate no record satisfies.
    pub const FALSE: Node = Node::Constant(false);

    /// Returns `true` for the unconstrained sentinel.
    pub fn is_true(&self) -> bool {
        matches!(self, Node::Constant(true))
    }

    /// AND with sentinel elimination and flattening.
    pub fn and(self, other: Node) -> Node {
        match (self, other) {
            (Node::Constant(true), other) | (other, Node::Constant(true)) => other,
            (Node::And(mut left), Node::And(right)) => {
                left.extend(right);
                Node::And(left)
            }
            (Node::And(mut left), right) => {
                left.push(right);
                Node::And(left)
            }
            (left, Node::And(mut right)) => {
                right.insert(0, left);
                Node::And(right)
            }
            (left, right) => Node::And(vec![left, right]),
        }
    }

    /// OR with sentinel elimination and flattening.
    ///
    /// `Constant(true)` is treated as the identity here as well.
    pub fn or(self, other: Node) -> Node {
        match (self, other) {
            (Node::Constant(true), other) | (other, Node::Constant(true)) => other,
            (Node::Or(mut left), Node::Or(right)) => {
                left.extend(right);
                Node::Or(left)
            }
            (Node::Or(mut left), right) => {
                left.push(right);
                Node::Or(left)
            }
            (left, Node::Or(mut right)) => {
                right.insert(0, left);
                Node::Or(right)
            }
            (left, right) => Node::Or(vec![left, right]),
        }
    }

    /// Negation. Constants flip and double negation cancels.
    pub fn negate(self) -> Node {
        match self {
            Node::Constant(b) => Node::Constant(!b),
            Node::Not(inner) => *inner,
            other => Node::Not(Box::new(other)),
        }
    }

    /// Joins `nodes` with `combine`; an empty list yields `TRUE`.
    pub fn combine_all<I>(nodes: I, combine: Combine) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        nodes.into_iter().fold(Node::TRUE, |acc, node| match combine {
            Combine::And => acc.and(node),
            Combine::Or => acc.or(node),
        })
    }

    /// Evaluates the tree against a record.
    ///
    /// Leaves over paths that cross a collection hold when any reached value
    /// satisfies them.
    pub fn evaluate(&self, record: &dyn Record) -> bool {
        match self {
            Node::Constant(b) => *b,
            Node::Compare { path, op, value } => {
                path.read(record).iter().any(|actual| op.eval(actual, value))
            }
            Node::In {
                path,
                values,
                ignore_case,
            } => path.read(record).iter().any(|actual| {
                let actual = if *ignore_case {
                    actual.fold_case()
                } else {
                    actual.clone()
                };
                values.iter().any(|v| actual.loose_eq(v))
            }),
            Node::And(children) => children.iter().all(|c| c.evaluate(record)),
            Node::Or(children) => children.iter().any(|c| c.evaluate(record)),
            Node::Not(inner) => !inner.evaluate(record),
        }
    }

    /// Builds a validated comparison leaf.
    ///
    /// The literal is coerced to the declared type of the path's leaf. `Null`
    /// is accepted for `Eq` and `Ne` on any path, since any path through an
    /// optional relation can read as `Null`.
    pub(crate) fn comparison(
        path: PropertyPath,
        op: Op,
        value: Value,
        config: &EngineConfig,
    ) -> Result<Node> {
        let ty = path.field_type();
        if !op.supports(ty) {
            return Err(SpecError::InvalidOperatorForType {
                op: op.as_str(),
                value_type: ty.name(),
            });
        }

        let value = match value {
            Value::Null if matches!(op, Op::Eq | Op::Ne) => Value::Null,
            other => coerce_value(other, path.leaf(), config)?,
        };

        Ok(Node::Compare { path, op, value })
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Node], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {sep} ")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Constant(b) => write!(f, "{b}"),
            Node::Compare { path, op, value } => write!(f, "{path} {op} {value}"),
            Node::In {
                path,
                values,
                ignore_case,
            } => {
                let op = if *ignore_case { "inci" } else { "in" };
                write!(f, "{path} {op} [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Node::And(children) => write_joined(f, children, "and"),
            Node::Or(children) => write_joined(f, children, "or"),
            Node::Not(inner) => write!(f, "not {inner}"),
        }
    }
}

/// A predicate over entities of type `E`.
pub struct Predicate<E> {
    node: Node,
    _entity: PhantomData<fn(&E) -> bool>,
}

impl<E> Predicate<E> {
    pub(crate) fn from_node(node: Node) -> Self {
        Predicate {
            node,
            _entity: PhantomData,
        }
    }

    /// The unconstrained predicate.
    pub fn always() -> Self {
        Self::from_node(Node::TRUE)
    }

    /// The predicate no entity satisfies.
    pub fn never() -> Self {
        Self::from_node(Node::FALSE)
    }

    /// Returns `true` if this is the unconstrained sentinel.
    pub fn is_always(&self) -> bool {
        self.node.is_true()
    }

    /// The underlying tree.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Consumes the predicate, returning the underlying tree.
    pub fn into_node(self) -> Node {
        self.node
    }

    /// Both predicates must hold.
    pub fn and(self, other: Predicate<E>) -> Self {
        Self::from_node(self.node.and(other.node))
    }

    /// Either predicate must hold. See the module docs for the sentinel rule.
    pub fn or(self, other: Predicate<E>) -> Self {
        Self::from_node(self.node.or(other.node))
    }

    /// Logical negation.
    pub fn negate(self) -> Self {
        Self::from_node(self.node.negate())
    }

    /// Joins all predicates with `combine`; an empty list is unconstrained.
    pub fn combine_all<I>(predicates: I, combine: Combine) -> Self
    where
        I: IntoIterator<Item = Predicate<E>>,
    {
        Self::from_node(Node::combine_all(
            predicates.into_iter().map(Predicate::into_node),
            combine,
        ))
    }

    /// The first predicate AND NOT each following one.
    pub fn combine_with_not<I>(predicates: I) -> Self
    where
        I: IntoIterator<Item = Predicate<E>>,
    {
        let mut iter = predicates.into_iter();
        let Some(first) = iter.next() else {
            return Self::always();
        };
        iter.fold(first, |acc, p| acc.and(p.negate()))
    }

    /// `predicate` when `condition` holds, unconstrained otherwise.
    pub fn when(condition: bool, predicate: Predicate<E>) -> Self {
        if condition {
            predicate
        } else {
            Self::always()
        }
    }

    /// Evaluates against any record; the caller vouches for its type.
    pub fn matches_record(&self, record: &dyn Record) -> bool {
        self.node.evaluate(record)
    }
}

impl<E: Entity> Predicate<E> {
    /// Builds a comparison on `path`, coercing `value` to the field type.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let adults = Predicate::<Person>::compare("Age", Op::Gte, 18)?;
    /// ```
    pub fn compare(path: &str, op: Op, value: impl Into<Value>) -> Result<Self> {
        let path = PropertyPath::parse::<E>(path)?;
        Node::comparison(path, op, value.into(), &EngineConfig::default()).map(Self::from_node)
    }

    pub fn eq(path: &str, value: impl Into<Value>) -> Result<Self> {
        Self::compare(path, Op::Eq, value)
    }

    pub fn ne(path: &str, value: impl Into<Value>) -> Result<Self> {
        Self::compare(path, Op::Ne, value)
    }

    pub fn gt(path: &str, value: impl Into<Value>) -> Result<Self> {
        Self::compare(path, Op::Gt, value)
    }

    pub fn gte(path: &str, value: impl Into<Value>) -> Result<Self> {
        Self::compare(path, Op::Gte, value)
    }

    pub fn lt(path: &str, value: impl Into<Value>) -> Result<Self> {
        Self::compare(path, Op::Lt, value)
    }

    pub fn lte(path: &str, value: impl Into<Value>) -> Result<Self> {
        Self::compare(path, Op::Lte, value)
    }

    /// Membership in `values`, each coerced to the field type.
    pub fn is_in<I, V>(path: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let path = PropertyPath::parse::<E>(path)?;
        let config = EngineConfig::default();
        let mut coerced: Vec<Value> = Vec::new();
        for value in values {
            let value = coerce_value(value.into(), path.leaf(), &config)?;
            if !coerced.contains(&value) {
                coerced.push(value);
            }
        }
        Ok(Self::from_node(Node::In {
            path,
            values: coerced,
            ignore_case: false,
        }))
    }

    /// Evaluates the predicate against an entity.
    pub fn matches(&self, entity: &E) -> bool {
        self.node.evaluate(entity)
    }
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<E> PartialEq for Predicate<E> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.node).finish()
    }
}

impl<E> fmt::Display for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}

impl<E> Default for Predicate<E> {
    fn default() -> Self {
        Self::always()
    }
}

impl<E> Not for Predicate<E> {
    type Output = Predicate<E>;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

impl<E> BitAnd for Predicate<E> {
    type Output = Predicate<E>;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl<E> BitOr for Predicate<E> {
    type Output = Predicate<E>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Country, Person};

    fn ann() -> Person {
        Person::new("Ann", 30).with_country(Country::new("Norway"))
    }

    // =========================================================================
    // Sentinel rules
    // =========================================================================

    #[test]
    fn true_is_identity_for_and() {
        let p = Predicate::<Person>::gt("Age", 18).unwrap();
        assert_eq!(Predicate::always().and(p.clone()), p);
        assert_eq!(p.clone().and(Predicate::always()), p);
    }

    #[test]
    fn true_is_identity_for_or() {
        let p = Predicate::<Person>::gt("Age", 40).unwrap();
        let combined = Predicate::always().or(p.clone());
        assert_eq!(combined, p);
        assert!(!combined.matches(&ann()));
    }

    #[test]
    fn not_flips_constants() {
        assert_eq!(Predicate::<Person>::always().negate(), Predicate::never());
        assert_eq!(Predicate::<Person>::never().negate(), Predicate::always());
    }

    #[test]
    fn double_negation_cancels() {
        let p = Predicate::<Person>::eq("Name", "Ann").unwrap();
        assert_eq!(!!p.clone(), p);
    }

    #[test]
    fn combine_all_empty_is_true() {
        let and = Predicate::<Person>::combine_all([], Combine::And);
        let or = Predicate::<Person>::combine_all([], Combine::Or);
        assert!(and.is_always());
        assert!(or.is_always());
        assert!(and.matches(&ann()));
    }

    #[test]
    fn combine_with_not() {
        let adults = Predicate::<Person>::gte("Age", 18).unwrap();
        let bobs = Predicate::<Person>::eq("Name", "Bob").unwrap();
        let p = Predicate::combine_with_not([adults, bobs]);

        assert!(p.matches(&ann()));
        assert!(!p.matches(&Person::new("Bob", 30)));
        assert!(!p.matches(&Person::new("Cid", 10)));
        assert!(Predicate::<Person>::combine_with_not([]).is_always());
    }

    #[test]
    fn when_skips_unmet_condition() {
        let p = Predicate::<Person>::eq("Name", "Zed").unwrap();
        assert!(Predicate::when(false, p.clone()).is_always());
        assert_eq!(Predicate::when(true, p.clone()), p);
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    #[test]
    fn nested_path_comparison() {
        let p = Predicate::<Person>::eq("Country.Name", "Norway").unwrap();
        assert!(p.matches(&ann()));
        assert!(!p.matches(&Person::new("Bob", 20)));
    }

    #[test]
    fn missing_relation_reads_null() {
        let is_null = Predicate::<Person>::eq("Country.Name", Value::Null).unwrap();
        assert!(is_null.matches(&Person::new("Bob", 20)));
        assert!(!is_null.matches(&ann()));

        let longer = Predicate::<Person>::gt("Country.Name", "A").unwrap();
        assert!(!longer.matches(&Person::new("Bob", 20)));
    }

    #[test]
    fn collection_paths_match_any() {
        let country = Country::new("Norway")
            .with_people(vec![Person::new("Ann", 30), Person::new("Bob", 40)]);
        assert!(Predicate::<Country>::eq("People.Name", "Bob")
            .unwrap()
            .matches(&country));
        assert!(!Predicate::<Country>::gt("People.Age", 50)
            .unwrap()
            .matches(&country));
        assert!(!Predicate::<Country>::eq("People.Name", "Bob")
            .unwrap()
            .matches(&Country::new("Empty")));
    }

    #[test]
    fn is_in_dedups_and_matches() {
        let p = Predicate::<Person>::is_in("Age", [30, 40, 30]).unwrap();
        match p.node() {
            Node::In { values, .. } => assert_eq!(values.len(), 2),
            other => panic!("expected In, got {other:?}"),
        }
        assert!(p.matches(&ann()));
        assert!(!p.matches(&Person::new("Bob", 20)));
    }

    #[test]
    fn operator_overloads() {
        let a = Predicate::<Person>::gte("Age", 18).unwrap();
        let b = Predicate::<Person>::eq("Name", "Ann").unwrap();
        assert_eq!(a.clone() & b.clone(), a.clone().and(b.clone()));
        assert_eq!(a.clone() | b.clone(), a.or(b));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn rejects_string_ops_on_numbers() {
        let err = Predicate::<Person>::compare("Age", Op::Contains, "3").unwrap_err();
        assert_eq!(
            err,
            SpecError::InvalidOperatorForType {
                op: "like",
                value_type: "int"
            }
        );
    }

    #[test]
    fn rejects_ordering_on_bool() {
        assert!(Predicate::<Person>::gt("Active", true).is_err());
    }

    #[test]
    fn coerces_literal_to_field_type() {
        let p = Predicate::<Person>::eq("Age", "30").unwrap();
        assert!(p.matches(&ann()));
        assert!(Predicate::<Person>::eq("Age", "thirty").is_err());
    }

    #[test]
    fn display_is_readable() {
        let p = Predicate::<Person>::gte("Age", 18)
            .unwrap()
            .and(Predicate::eq("Name", "Ann").unwrap().negate());
        assert_eq!(p.to_string(), "(Age gte 18 and not Name eq \"Ann\")");
    }
}
