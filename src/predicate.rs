//! Predicate algebra over rows.
//!
//! An [`Expression`] is a flat sequence of predicates, nested groups and
//! logical tokens, evaluated as a left fold starting from `true` with the
//! operator `and`. A token changes the operator for every following term
//! until the next token; it is not reset after one use. So
//! `[a, "or", b, c]` means `(true and a) or b or c`, and
//! `[a, "or", b, "and", c]` means `(a or b) and c`. Rules are written
//! against exactly this fold; do not replace it with precedence parsing.

use crate::{ConfigError, Row, Value, column_type};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(alias = "==")]
    #[serde(rename = "eq")]
    Eq,
    #[serde(alias = "!=")]
    #[serde(rename = "ne")]
    Ne,
    #[serde(alias = "<")]
    #[serde(rename = "lt")]
    Lt,
    #[serde(alias = "<=")]
    #[serde(rename = "le")]
    Le,
    #[serde(alias = ">")]
    #[serde(rename = "gt")]
    Gt,
    #[serde(alias = ">=")]
    #[serde(rename = "ge")]
    Ge,
}

impl Comparator {
    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        // NaN never equals itself, so equality against NaN means "is NaN"
        if rhs.is_nan() {
            match self {
                Comparator::Eq => return lhs.is_nan(),
                Comparator::Ne => return !lhs.is_nan(),
                _ => {}
            }
        }
        let Some(ordering) = lhs.compare(rhs) else {
            // incomparable kinds or a NaN operand: only "not equal" holds
            return self == Comparator::Ne;
        };
        match self {
            Comparator::Eq => ordering == Ordering::Equal,
            Comparator::Ne => ordering != Ordering::Equal,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Le => ordering != Ordering::Greater,
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl std::str::FromStr for LogicalOp {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "and" => Ok(LogicalOp::And),
            "or" => Ok(LogicalOp::Or),
            _ => Err(ConfigError::UnknownToken(s.to_string())),
        }
    }
}

/// Atomic comparison of one row field against a constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub comparator: Comparator,
    pub value: Value,
}

impl Predicate {
    pub fn new<V: Into<Value>>(field: &str, comparator: Comparator, value: V) -> Predicate {
        Predicate {
            field: field.to_string(),
            comparator,
            value: value.into(),
        }
    }

    /// False when the field is absent; never panics.
    pub fn check(&self, row: &Row) -> bool {
        match row.get(&self.field) {
            Some(lhs) => self.comparator.apply(lhs, &self.value),
            None => false,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.comparator, self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Predicate(Predicate),
    Group(Expression),
    Op(LogicalOp),
}

impl From<Predicate> for Term {
    fn from(predicate: Predicate) -> Self {
        Term::Predicate(predicate)
    }
}

impl From<Expression> for Term {
    fn from(expression: Expression) -> Self {
        Term::Group(expression)
    }
}

impl From<LogicalOp> for Term {
    fn from(op: LogicalOp) -> Self {
        Term::Op(op)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub terms: Vec<Term>,
}

impl Expression {
    pub fn new(terms: Vec<Term>) -> Expression {
        Expression { terms }
    }

    pub fn check(&self, row: &Row) -> bool {
        let mut result = true;
        let mut op = LogicalOp::And;
        for term in &self.terms {
            let value = match term {
                Term::Predicate(predicate) => predicate.check(row),
                Term::Group(group) => group.check(row),
                Term::Op(next) => {
                    op = *next;
                    continue;
                }
            };
            result = match op {
                LogicalOp::And => result && value,
                LogicalOp::Or => result || value,
            };
        }
        result
    }

    /// Every field any predicate in the expression reads.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = vec![];
        for term in &self.terms {
            match term {
                Term::Predicate(predicate) => fields.push(predicate.field.as_str()),
                Term::Group(group) => fields.extend(group.fields()),
                Term::Op(_) => {}
            }
        }
        fields
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match term {
                Term::Predicate(predicate) => write!(f, "{predicate}")?,
                Term::Group(group) => write!(f, "{group}")?,
                Term::Op(LogicalOp::And) => f.write_str("and")?,
                Term::Op(LogicalOp::Or) => f.write_str("or")?,
            }
        }
        f.write_str("]")
    }
}

/// Declarative form of a term, as written in a rules file:
/// a token string, a `{ field, cmp, value }` table or a nested array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TermConfig {
    Token(String),
    Predicate {
        field: String,
        cmp: Comparator,
        value: Value,
    },
    Group(Vec<TermConfig>),
}

impl TermConfig {
    fn compile(&self) -> Result<Term, ConfigError> {
        match self {
            TermConfig::Token(token) => Ok(Term::Op(token.parse()?)),
            TermConfig::Predicate { field, cmp, value } => {
                if column_type(field).is_none() {
                    return Err(ConfigError::UnknownField(field.clone()));
                }
                Ok(Term::Predicate(Predicate {
                    field: field.clone(),
                    comparator: *cmp,
                    value: value.clone(),
                }))
            }
            TermConfig::Group(terms) => Ok(Term::Group(compile(terms)?)),
        }
    }
}

/// Turn declarative terms into an expression, rejecting unknown tokens and
/// fields up front so that checking rows cannot fail.
pub fn compile(terms: &[TermConfig]) -> Result<Expression, ConfigError> {
    terms
        .iter()
        .map(TermConfig::compile)
        .collect::<Result<Vec<_>, _>>()
        .map(Expression::new)
}
