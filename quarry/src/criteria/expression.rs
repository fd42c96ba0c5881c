use crate::common::{Document, Value};
use std::fmt::{Display, Formatter};

/// An operand of a [Predicate].
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A (possibly dotted) property path of the root entity
    Property(String),
    /// A value fixed when the criteria was built
    Literal(Value),
    /// A named parameter supplied per invocation
    Parameter(String),
}

impl Expression {
    pub fn property(path: &str) -> Self {
        Expression::Property(path.to_string())
    }

    pub fn literal<T: Into<Value>>(value: T) -> Self {
        Expression::Literal(value.into())
    }

    pub fn parameter(name: &str) -> Self {
        Expression::Parameter(name.to_string())
    }

    pub fn as_property(&self) -> Option<&str> {
        match self {
            Expression::Property(path) => Some(path),
            _ => None,
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Property(path) => write!(f, "{}", path),
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Parameter(name) => write!(f, ":{}", name),
        }
    }
}

/// Anything usable as the right-hand side of a comparison.
///
/// Plain values become literals; expressions pass through unchanged.
pub trait IntoExpression {
    fn into_expression(self) -> Expression;
}

impl IntoExpression for Expression {
    fn into_expression(self) -> Expression {
        self
    }
}

macro_rules! literal_expression {
    ($($ty:ty),*) => {
        $(
            impl IntoExpression for $ty {
                fn into_expression(self) -> Expression {
                    Expression::Literal(Value::from(self))
                }
            }
        )*
    };
}

literal_expression!(bool, i32, i64, u32, u64, usize, f64, String, &str, Value, Document);

/// A boolean condition over the root entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equal(Expression, Expression),
    NotEqual(Expression, Expression),
    GreaterThan(Expression, Expression),
    GreaterThanOrEqual(Expression, Expression),
    LessThan(Expression, Expression),
    LessThanOrEqual(Expression, Expression),
    Between(Expression, Expression, Expression),
    /// SQL `LIKE` with `%` and `_` wildcards
    Like(Expression, Expression),
    IsNull(Expression),
    IsNotNull(Expression),
    In(Expression, Vec<Expression>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut predicates) => {
                predicates.push(other);
                Predicate::And(predicates)
            }
            this => Predicate::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut predicates) => {
                predicates.push(other);
                Predicate::Or(predicates)
            }
            this => Predicate::Or(vec![this, other]),
        }
    }

    pub fn not(self) -> Predicate {
        match self {
            Predicate::Not(inner) => *inner,
            this => Predicate::Not(Box::new(this)),
        }
    }

    /// Visits every expression of this predicate, depth first.
    pub fn expressions(&self) -> Vec<&Expression> {
        let mut expressions = Vec::new();
        self.collect_expressions(&mut expressions);
        expressions
    }

    fn collect_expressions<'a>(&'a self, out: &mut Vec<&'a Expression>) {
        match self {
            Predicate::Equal(a, b)
            | Predicate::NotEqual(a, b)
            | Predicate::GreaterThan(a, b)
            | Predicate::GreaterThanOrEqual(a, b)
            | Predicate::LessThan(a, b)
            | Predicate::LessThanOrEqual(a, b)
            | Predicate::Like(a, b) => {
                out.push(a);
                out.push(b);
            }
            Predicate::Between(a, low, high) => {
                out.push(a);
                out.push(low);
                out.push(high);
            }
            Predicate::IsNull(a) | Predicate::IsNotNull(a) => out.push(a),
            Predicate::In(a, values) => {
                out.push(a);
                out.extend(values.iter());
            }
            Predicate::And(predicates) | Predicate::Or(predicates) => {
                predicates.iter().for_each(|p| p.collect_expressions(out))
            }
            Predicate::Not(inner) => inner.collect_expressions(out),
        }
    }
}

/// Conjunction where `None` means "no constraint".
pub fn and_optional(left: Option<Predicate>, right: Option<Predicate>) -> Option<Predicate> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l.and(r)),
        (l, None) => l,
        (None, r) => r,
    }
}

/// Disjunction where a missing side is ignored.
pub fn or_optional(left: Option<Predicate>, right: Option<Predicate>) -> Option<Predicate> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l.or(r)),
        (l, None) => l,
        (None, r) => r,
    }
}
