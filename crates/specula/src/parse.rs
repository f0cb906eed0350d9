//! The condition mini-language.
//!
//! Filter values such as HTTP query parameters are written as
//! `"<token>:<operand>"` and turned into typed predicates by
//! [`ConditionParser`]:
//!
//! | token | meaning |
//! |-------|---------|
//! | `lt`, `lte`, `gt`, `gte`, `eq`, `ne` | single comparison |
//! | `eqci` | case-insensitive string equality |
//! | `like`, `likeci` | substring containment |
//! | `range` | `lower,upper`, both bounds inclusive |
//! | `in`, `nin` | membership / non-membership |
//! | `inci`, `ninci` | case-insensitive string membership |
//! | `inlike`, `ninlike` | any / none of several substrings |
//! | `inlikeci`, `ninlikeci` | case-insensitive variant of the above |
//!
//! Tokens are case-insensitive. The operand is everything after the first
//! `:`, so date-times such as `gte:2024-01-01T10:00` are kept whole.
//!
//! # Example
//!
//! ```ignore
//! let parser = ConditionParser::new();
//! let teens = parser.parse::<Person>("Age", "range:13,19", None)?;
//! let named = parser.parse::<Person>("Name", "inci:ann,bob", None)?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::coerce::coerce_str;
use crate::config::EngineConfig;
use crate::error::{Result, SpecError};
use crate::op::Op;
use crate::path::PropertyPath;
use crate::predicate::{Node, Predicate};
use crate::schema::{Entity, FieldType};
use crate::value::Value;

static CONDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^([A-Za-z]+):(.*)$").expect("condition pattern is a valid regex")
});

/// Operator token of the condition language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
    EqCi,
    Like,
    LikeCi,
    Range,
    In,
    Nin,
    InCi,
    NinCi,
    InLike,
    NinLike,
    InLikeCi,
    NinLikeCi,
}

impl Token {
    /// Every token, in documentation order.
    pub const ALL: [Token; 18] = [
        Token::Lt,
        Token::Lte,
        Token::Gt,
        Token::Gte,
        Token::Eq,
        Token::Ne,
        Token::EqCi,
        Token::Like,
        Token::LikeCi,
        Token::Range,
        Token::In,
        Token::Nin,
        Token::InCi,
        Token::NinCi,
        Token::InLike,
        Token::NinLike,
        Token::InLikeCi,
        Token::NinLikeCi,
    ];

    /// Looks up a token, ignoring case.
    pub fn parse(token: &str) -> Option<Token> {
        let lower = token.to_ascii_lowercase();
        Token::ALL.into_iter().find(|t| t.as_str() == lower)
    }

    /// Returns the wire spelling of this token.
    pub fn as_str(self) -> &'static str {
        match self {
            Token::Lt => "lt",
            Token::Lte => "lte",
            Token::Gt => "gt",
            Token::Gte => "gte",
            Token::Eq => "eq",
            Token::Ne => "ne",
            Token::EqCi => "eqci",
            Token::Like => "like",
            Token::LikeCi => "likeci",
            Token::Range => "range",
            Token::In => "in",
            Token::Nin => "nin",
            Token::InCi => "inci",
            Token::NinCi => "ninci",
            Token::InLike => "inlike",
            Token::NinLike => "ninlike",
            Token::InLikeCi => "inlikeci",
            Token::NinLikeCi => "ninlikeci",
        }
    }

    /// Returns `true` if the token only applies to string fields.
    pub fn is_string_only(self) -> bool {
        matches!(
            self,
            Token::EqCi
                | Token::Like
                | Token::LikeCi
                | Token::InCi
                | Token::NinCi
                | Token::InLike
                | Token::NinLike
                | Token::InLikeCi
                | Token::NinLikeCi
        )
    }

    /// Returns `true` if the token can be applied to a field of type `ty`.
    pub fn supports(self, ty: FieldType) -> bool {
        match ty {
            FieldType::One(_) | FieldType::Many(_) => false,
            FieldType::String => true,
            FieldType::Bool => matches!(self, Token::Eq | Token::Ne | Token::In | Token::Nin),
            _ => !self.is_string_only(),
        }
    }

    fn comparison_op(self) -> Option<Op> {
        match self {
            Token::Lt => Some(Op::Lt),
            Token::Lte => Some(Op::Lte),
            Token::Gt => Some(Op::Gt),
            Token::Gte => Some(Op::Gte),
            Token::Eq => Some(Op::Eq),
            Token::Ne => Some(Op::Ne),
            Token::EqCi => Some(Op::EqIgnoreCase),
            Token::Like => Some(Op::Contains),
            Token::LikeCi => Some(Op::ContainsIgnoreCase),
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Splits `"<token>:<operand>"`; `None` if `raw` is not in that form.
pub fn split_condition(raw: &str) -> Option<(&str, &str)> {
    let caps = CONDITION.captures(raw)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Turns condition strings into predicates.
#[derive(Debug, Clone, Default)]
pub struct ConditionParser {
    config: EngineConfig,
}

impl ConditionParser {
    /// Creates a parser with the default configuration.
    pub fn new() -> Self {
        ConditionParser::default()
    }

    /// Creates a parser with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        ConditionParser { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses `raw` as a condition on `path`.
    ///
    /// - A value not in `"<token>:<operand>"` form is `fallback` when given,
    ///   otherwise an equality with the value coerced to the field type.
    /// - An unknown token is `fallback`, or [`SpecError::UnsupportedOperator`].
    /// - A string-only token on another field type is `fallback`, or
    ///   [`SpecError::InvalidOperatorForType`].
    pub fn parse<E: Entity>(
        &self,
        path: &str,
        raw: &str,
        fallback: Option<Predicate<E>>,
    ) -> Result<Predicate<E>> {
        let path = PropertyPath::parse::<E>(path)?;

        let Some((token_str, operand)) = split_condition(raw) else {
            return match fallback {
                Some(fallback) => Ok(fallback),
                None => self.literal(path, Op::Eq, raw),
            };
        };

        let Some(token) = Token::parse(token_str) else {
            trace!(token = token_str, %path, "unknown condition token");
            return fallback.ok_or_else(|| SpecError::UnsupportedOperator {
                token: token_str.to_string(),
                raw: raw.to_string(),
            });
        };

        let ty = path.field_type();
        if !token.supports(ty) {
            return fallback.ok_or(SpecError::InvalidOperatorForType {
                op: token.as_str(),
                value_type: ty.name(),
            });
        }

        trace!(token = token.as_str(), %path, operand, "parsing condition");
        self.build(path, token, operand).map(Predicate::from_node)
    }

    /// Parses `raw` as a condition, or compares with `default_op` when `raw`
    /// is a plain value.
    ///
    /// ```ignore
    /// // "42" alone means "at least 42" here; "lt:42" still works
    /// let p = parser.parse_or::<Person>("Age", "42", Op::Gte)?;
    /// ```
    pub fn parse_or<E: Entity>(&self, path: &str, raw: &str, default_op: Op) -> Result<Predicate<E>> {
        if split_condition(raw).is_some() {
            return self.parse(path, raw, None);
        }
        let path = PropertyPath::parse::<E>(path)?;
        self.literal(path, default_op, raw)
    }

    fn literal<E>(&self, path: PropertyPath, op: Op, raw: &str) -> Result<Predicate<E>> {
        let value = coerce_str(raw, path.leaf(), &self.config)?;
        Node::comparison(path, op, value, &self.config).map(Predicate::from_node)
    }

    fn build(&self, path: PropertyPath, token: Token, operand: &str) -> Result<Node> {
        if let Some(op) = token.comparison_op() {
            let value = self.coerce(&path, operand)?;
            return Node::comparison(path, op, value, &self.config);
        }

        match token {
            Token::Range => {
                let bounds = self.items(&path, operand, false);
                let [lower, upper] = bounds.as_slice() else {
                    return Err(SpecError::MalformedOperand {
                        token: "range",
                        reason: format!("expected 2 bounds, got {}", bounds.len()),
                    });
                };
                let lower = self.coerce(&path, lower)?;
                let upper = self.coerce(&path, upper)?;
                Ok(Node::comparison(path.clone(), Op::Gte, lower, &self.config)?
                    .and(Node::comparison(path, Op::Lte, upper, &self.config)?))
            }
            Token::In | Token::Nin => {
                let mut values = Vec::new();
                for item in self.items(&path, operand, false) {
                    push_unique(&mut values, self.coerce(&path, item)?);
                }
                let node = Node::In {
                    path,
                    values,
                    ignore_case: false,
                };
                Ok(negate_if(token == Token::Nin, node))
            }
            Token::InCi | Token::NinCi => {
                let mut values = Vec::new();
                for item in self.items(&path, operand, false) {
                    push_unique(&mut values, Value::String(item.to_lowercase()));
                }
                let node = Node::In {
                    path,
                    values,
                    ignore_case: true,
                };
                Ok(negate_if(token == Token::NinCi, node))
            }
            Token::InLike | Token::NinLike | Token::InLikeCi | Token::NinLikeCi => {
                let ignore_case = matches!(token, Token::InLikeCi | Token::NinLikeCi);
                let op = if ignore_case {
                    Op::ContainsIgnoreCase
                } else {
                    Op::Contains
                };

                let mut needles = Vec::new();
                for item in self.items(&path, operand, true) {
                    let item = if ignore_case {
                        item.to_lowercase()
                    } else {
                        item.to_string()
                    };
                    push_unique(&mut needles, Value::String(item));
                }

                // An empty list of substrings matches nothing
                let node = needles.into_iter().fold(Node::FALSE, |acc, needle| {
                    let leaf = Node::Compare {
                        path: path.clone(),
                        op,
                        value: needle,
                    };
                    match acc {
                        Node::Constant(false) => leaf,
                        acc => acc.or(leaf),
                    }
                });
                Ok(negate_if(
                    matches!(token, Token::NinLike | Token::NinLikeCi),
                    node,
                ))
            }
            _ => Err(SpecError::UnsupportedOperator {
                token: token.as_str().to_string(),
                raw: operand.to_string(),
            }),
        }
    }

    fn coerce(&self, path: &PropertyPath, raw: &str) -> Result<Value> {
        coerce_str(raw, path.leaf(), &self.config)
    }

    /// Splits a list operand. Items are trimmed for non-string targets, and
    /// empty items are dropped unless the target is a string compared whole.
    fn items<'a>(&self, path: &PropertyPath, operand: &'a str, substrings: bool) -> Vec<&'a str> {
        let is_string = path.field_type().is_string();
        operand
            .split(self.config.list_separator)
            .map(|item| if is_string { item } else { item.trim() })
            .filter(|item| (is_string && !substrings) || !item.is_empty())
            .collect()
    }
}

fn push_unique(values: &mut Vec<Value>, value: Value) {
    if !values.contains(&value) {
        values.push(value);
    }
}

fn negate_if(negate: bool, node: Node) -> Node {
    if negate {
        node.negate()
    } else {
        node
    }
}

/// Parses a condition with the default configuration.
///
/// See [`ConditionParser::parse`].
pub fn parse<E: Entity>(path: &str, raw: &str, fallback: Option<Predicate<E>>) -> Result<Predicate<E>> {
    ConditionParser::new().parse(path, raw, fallback)
}
