use crate::criteria::{Expression, Predicate};
use crate::model::{PersistentEntity, Sort};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Update,
    Delete,
}

/// What a select query returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Projection {
    #[default]
    Entity,
    Count,
    /// Number of distinct values of the listed properties
    CountDistinct(Vec<String>),
    Exists,
    Property(String),
    /// A DTO made of the listed properties
    Properties(Vec<String>),
}

/// Structured form of a query.
///
/// Produced by the criteria API or by method metadata, rendered to text by a
/// [QueryBuilder](crate::criteria::QueryBuilder) and evaluated directly by
/// backends that do not speak a query language.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    entity: PersistentEntity,
    kind: QueryKind,
    projection: Projection,
    predicate: Option<Predicate>,
    sort: Sort,
    distinct: bool,
    assignments: IndexMap<String, Expression>,
}

impl Projection {
    /// The projection that counts what `self` would return.
    pub(crate) fn counting(&self, distinct: bool) -> Projection {
        match (self, distinct) {
            (Projection::Property(property), true) => Projection::CountDistinct(vec![property.clone()]),
            (Projection::Properties(properties), true) => Projection::CountDistinct(properties.clone()),
            _ => Projection::Count,
        }
    }
}

impl QueryModel {
    fn new(entity: PersistentEntity, kind: QueryKind, projection: Projection) -> Self {
        QueryModel {
            entity,
            kind,
            projection,
            predicate: None,
            sort: Sort::unsorted(),
            distinct: false,
            assignments: IndexMap::new(),
        }
    }

    pub fn select(entity: PersistentEntity) -> Self {
        QueryModel::new(entity, QueryKind::Select, Projection::Entity)
    }

    pub fn count(entity: PersistentEntity) -> Self {
        QueryModel::new(entity, QueryKind::Select, Projection::Count)
    }

    pub fn exists(entity: PersistentEntity) -> Self {
        QueryModel::new(entity, QueryKind::Select, Projection::Exists)
    }

    pub fn update(entity: PersistentEntity) -> Self {
        QueryModel::new(entity, QueryKind::Update, Projection::Entity)
    }

    pub fn delete(entity: PersistentEntity) -> Self {
        QueryModel::new(entity, QueryKind::Delete, Projection::Entity)
    }

    pub fn with_predicate(mut self, predicate: Option<Predicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn with_assignment(mut self, property: &str, value: Expression) -> Self {
        self.assignments.insert(property.to_string(), value);
        self
    }

    /// The count query over the same rows: same predicate, no ordering.
    /// Distinct property projections count their distinct values.
    pub fn to_count(&self) -> QueryModel {
        let projection = self.projection.counting(self.distinct);
        let distinct = self.distinct && projection == Projection::Count;
        QueryModel {
            entity: self.entity.clone(),
            kind: QueryKind::Select,
            projection,
            predicate: self.predicate.clone(),
            sort: Sort::unsorted(),
            distinct,
            assignments: IndexMap::new(),
        }
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn assignments(&self) -> &IndexMap<String, Expression> {
        &self.assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Order;

    #[test]
    fn count_drops_ordering_and_keeps_predicate() {
        let predicate = Predicate::IsNotNull(Expression::property("name"));
        let model = QueryModel::select(PersistentEntity::new("Person", "id"))
            .with_predicate(Some(predicate.clone()))
            .with_sort(Sort::of(Order::asc("name")));
        let count = model.to_count();
        assert_eq!(count.projection(), &Projection::Count);
        assert_eq!(count.predicate(), Some(&predicate));
        assert!(!count.sort().is_sorted());
    }

    #[test]
    fn count_of_distinct_property_counts_its_values() {
        let model = QueryModel::select(PersistentEntity::new("Person", "id"))
            .with_projection(Projection::Property("city".to_string()))
            .with_distinct(true);
        let count = model.to_count();
        assert_eq!(count.projection(), &Projection::CountDistinct(vec!["city".to_string()]));
        assert!(!count.is_distinct());

        let rows = QueryModel::select(PersistentEntity::new("Person", "id")).with_distinct(true);
        assert_eq!(rows.to_count().projection(), &Projection::Count);
    }

    #[test]
    fn update_collects_assignments() {
        let model = QueryModel::update(PersistentEntity::new("Person", "id"))
            .with_assignment("age", Expression::literal(3))
            .with_assignment("name", Expression::parameter("name"));
        assert_eq!(model.kind(), QueryKind::Update);
        assert_eq!(model.assignments().len(), 2);
    }
}
