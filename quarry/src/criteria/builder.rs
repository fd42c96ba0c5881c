use crate::common::Value;
use crate::criteria::{Expression, IntoExpression, Predicate};
use crate::model::{Order, PersistentEntity, SortOrder};

/// The entity a criteria query ranges over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    entity: PersistentEntity,
}

impl Root {
    pub fn new(entity: PersistentEntity) -> Self {
        Root { entity }
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    /// Reference to a property (dotted for embedded values).
    pub fn get(&self, property: &str) -> Expression {
        Expression::property(property)
    }

    pub fn id(&self) -> Expression {
        Expression::property(self.entity.id_property())
    }
}

/// Factory for predicates, literals and orderings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriteriaBuilder;

impl CriteriaBuilder {
    pub fn new() -> Self {
        CriteriaBuilder
    }

    pub fn literal<T: Into<Value>>(&self, value: T) -> Expression {
        Expression::literal(value)
    }

    pub fn parameter(&self, name: &str) -> Expression {
        Expression::parameter(name)
    }

    pub fn equal(&self, x: Expression, y: impl IntoExpression) -> Predicate {
        Predicate::Equal(x, y.into_expression())
    }

    pub fn not_equal(&self, x: Expression, y: impl IntoExpression) -> Predicate {
        Predicate::NotEqual(x, y.into_expression())
    }

    pub fn greater_than(&self, x: Expression, y: impl IntoExpression) -> Predicate {
        Predicate::GreaterThan(x, y.into_expression())
    }

    pub fn greater_than_or_equal(&self, x: Expression, y: impl IntoExpression) -> Predicate {
        Predicate::GreaterThanOrEqual(x, y.into_expression())
    }

    pub fn less_than(&self, x: Expression, y: impl IntoExpression) -> Predicate {
        Predicate::LessThan(x, y.into_expression())
    }

    pub fn less_than_or_equal(&self, x: Expression, y: impl IntoExpression) -> Predicate {
        Predicate::LessThanOrEqual(x, y.into_expression())
    }

    pub fn between(&self, x: Expression, low: impl IntoExpression, high: impl IntoExpression) -> Predicate {
        Predicate::Between(x, low.into_expression(), high.into_expression())
    }

    pub fn like(&self, x: Expression, pattern: impl IntoExpression) -> Predicate {
        Predicate::Like(x, pattern.into_expression())
    }

    pub fn is_null(&self, x: Expression) -> Predicate {
        Predicate::IsNull(x)
    }

    pub fn is_not_null(&self, x: Expression) -> Predicate {
        Predicate::IsNotNull(x)
    }

    pub fn is_in<T: IntoExpression>(&self, x: Expression, values: impl IntoIterator<Item = T>) -> Predicate {
        Predicate::In(x, values.into_iter().map(IntoExpression::into_expression).collect())
    }

    pub fn is_true(&self, x: Expression) -> Predicate {
        Predicate::Equal(x, Expression::literal(true))
    }

    pub fn is_false(&self, x: Expression) -> Predicate {
        Predicate::Equal(x, Expression::literal(false))
    }

    /// Conjunction of `predicates`; a single predicate is returned as is.
    pub fn and(&self, predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut predicates: Vec<Predicate> = predicates.into_iter().collect();
        if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            Predicate::And(predicates)
        }
    }

    pub fn or(&self, predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut predicates: Vec<Predicate> = predicates.into_iter().collect();
        if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            Predicate::Or(predicates)
        }
    }

    pub fn not(&self, predicate: Predicate) -> Predicate {
        predicate.not()
    }

    pub fn asc(&self, x: Expression) -> Order {
        self.order(x, SortOrder::Ascending)
    }

    pub fn desc(&self, x: Expression) -> Order {
        self.order(x, SortOrder::Descending)
    }

    fn order(&self, x: Expression, direction: SortOrder) -> Order {
        match x.as_property() {
            Some(property) => Order::new(property, direction, false),
            None => Order::new(&x.to_string(), direction, false),
        }
    }
}
