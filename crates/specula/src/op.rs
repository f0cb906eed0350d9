//! Comparison operators for predicate leaves.
//!
//! The [`Op`] enum defines the comparisons a predicate can perform on a
//! single field value. Not all operators are valid for all field types.

use std::cmp::Ordering;

use crate::schema::FieldType;
use crate::value::Value;

/// Comparison operator for a predicate leaf.
///
/// Operators are grouped by the types they support:
/// - **Universal**: `Eq`, `Ne` - work on all scalar types
/// - **Ordering**: `Gt`, `Gte`, `Lt`, `Lte` - everything except booleans
/// - **String**: `EqIgnoreCase`, `Contains`, `ContainsIgnoreCase`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // Universal operators
    /// Equal. `Null` equals only `Null`.
    Eq,
    /// Not equal.
    Ne,

    // Ordering operators
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,

    // String operators
    /// Equal after lowercasing both sides.
    EqIgnoreCase,
    /// String contains substring.
    Contains,
    /// String contains substring, ignoring case.
    ContainsIgnoreCase,
}

impl Op {
    /// Returns `true` for `Gt`, `Gte`, `Lt` and `Lte`.
    pub fn is_ordering_op(self) -> bool {
        matches!(self, Op::Gt | Op::Gte | Op::Lt | Op::Lte)
    }

    /// Returns `true` if this operator only applies to strings.
    pub fn is_string_op(self) -> bool {
        matches!(self, Op::EqIgnoreCase | Op::Contains | Op::ContainsIgnoreCase)
    }

    /// Returns `true` if this operator can be applied to a field of type `ty`.
    pub fn supports(self, ty: FieldType) -> bool {
        match ty {
            FieldType::One(_) | FieldType::Many(_) => false,
            FieldType::String => true,
            FieldType::Bool => !self.is_ordering_op() && !self.is_string_op(),
            _ => !self.is_string_op(),
        }
    }

    /// Evaluates a comparison given an ordering result.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Op::Eq | Op::EqIgnoreCase => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Gt => ordering == Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            Op::Lt => ordering == Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
            _ => false, // Not an ordering-based operator
        }
    }

    /// Applies the operator to a field value and a literal.
    ///
    /// Ordering operators are false whenever the values are not comparable,
    /// including when either side is `Null`.
    pub fn eval(self, actual: &Value, expected: &Value) -> bool {
        match self {
            Op::Eq => actual.loose_eq(expected),
            Op::Ne => !actual.loose_eq(expected),
            Op::EqIgnoreCase => actual.fold_case().loose_eq(&expected.fold_case()),
            Op::Contains => match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(e)) => a.contains(e),
                _ => false,
            },
            Op::ContainsIgnoreCase => match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(e)) => a.to_lowercase().contains(&e.to_lowercase()),
                _ => false,
            },
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => actual
                .compare(expected)
                .is_some_and(|ordering| self.eval_ordering(ordering)),
        }
    }

    /// Returns the display name of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::EqIgnoreCase => "eqci",
            Op::Contains => "like",
            Op::ContainsIgnoreCase => "likeci",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_type_checks() {
        assert!(Op::Eq.supports(FieldType::String));
        assert!(Op::Eq.supports(FieldType::Bool));
        assert!(Op::Gt.supports(FieldType::Int));
        assert!(Op::Gt.supports(FieldType::Date));
        assert!(!Op::Gt.supports(FieldType::Bool));
        assert!(!Op::Contains.supports(FieldType::Int));
        assert!(!Op::EqIgnoreCase.supports(FieldType::Char));
        assert!(Op::ContainsIgnoreCase.supports(FieldType::String));
    }

    #[test]
    fn op_eval_ordering() {
        // Equal
        assert!(Op::Eq.eval_ordering(Ordering::Equal));
        assert!(!Op::Eq.eval_ordering(Ordering::Less));

        // Not equal
        assert!(!Op::Ne.eval_ordering(Ordering::Equal));
        assert!(Op::Ne.eval_ordering(Ordering::Greater));

        // Greater than / or equal
        assert!(Op::Gt.eval_ordering(Ordering::Greater));
        assert!(!Op::Gt.eval_ordering(Ordering::Equal));
        assert!(Op::Gte.eval_ordering(Ordering::Equal));
        assert!(!Op::Gte.eval_ordering(Ordering::Less));

        // Less than / or equal
        assert!(Op::Lt.eval_ordering(Ordering::Less));
        assert!(!Op::Lt.eval_ordering(Ordering::Equal));
        assert!(Op::Lte.eval_ordering(Ordering::Equal));
        assert!(!Op::Lte.eval_ordering(Ordering::Greater));

        // Substring ops never match on ordering alone
        assert!(!Op::Contains.eval_ordering(Ordering::Equal));
    }

    #[test]
    fn eval_against_null() {
        assert!(Op::Eq.eval(&Value::Null, &Value::Null));
        assert!(Op::Ne.eval(&Value::Null, &Value::from(3)));
        assert!(!Op::Gt.eval(&Value::Null, &Value::from(3)));
        assert!(!Op::Lte.eval(&Value::Null, &Value::from(3)));
        assert!(!Op::Contains.eval(&Value::Null, &Value::from("a")));
    }

    #[test]
    fn eval_strings() {
        let name = Value::from("Oslo");
        assert!(Op::Contains.eval(&name, &Value::from("sl")));
        assert!(!Op::Contains.eval(&name, &Value::from("SL")));
        assert!(Op::ContainsIgnoreCase.eval(&name, &Value::from("SL")));
        assert!(Op::EqIgnoreCase.eval(&name, &Value::from("OSLO")));
        assert!(!Op::Eq.eval(&name, &Value::from("OSLO")));
    }

    #[test]
    fn op_display() {
        assert_eq!(Op::Eq.to_string(), "eq");
        assert_eq!(Op::ContainsIgnoreCase.to_string(), "likeci");
        assert_eq!(Op::Lte.to_string(), "lte");
    }
}
