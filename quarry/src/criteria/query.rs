use crate::criteria::{and_optional, Expression, IntoExpression, Predicate, Projection, QueryModel};
use crate::model::{Order, PersistentEntity, Sort};

/// A select query under construction.
#[derive(Debug, Clone)]
pub struct CriteriaQuery {
    entity: PersistentEntity,
    projection: Projection,
    predicate: Option<Predicate>,
    sort: Sort,
    distinct: bool,
}

impl CriteriaQuery {
    pub fn new(entity: PersistentEntity) -> Self {
        CriteriaQuery {
            entity,
            projection: Projection::Entity,
            predicate: None,
            sort: Sort::unsorted(),
            distinct: false,
        }
    }

    /// Counts what the current selection returns.
    pub fn select_count(&mut self) -> &mut Self {
        self.projection = self.projection.counting(self.distinct);
        if self.projection != Projection::Count {
            self.distinct = false;
        }
        self
    }

    pub fn select_exists(&mut self) -> &mut Self {
        self.projection = Projection::Exists;
        self
    }

    pub fn select_property(&mut self, property: &str) -> &mut Self {
        self.projection = Projection::Property(property.to_string());
        self
    }

    pub fn select_properties(&mut self, properties: &[&str]) -> &mut Self {
        self.projection = Projection::Properties(properties.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Replaces the restriction. `None` removes it.
    pub fn where_(&mut self, predicate: Option<Predicate>) -> &mut Self {
        self.predicate = predicate;
        self
    }

    /// Adds `predicate` to the current restriction.
    pub fn and_where(&mut self, predicate: Option<Predicate>) -> &mut Self {
        self.predicate = and_optional(self.predicate.take(), predicate);
        self
    }

    pub fn order_by(&mut self, orders: Vec<Order>) -> &mut Self {
        self.sort = Sort::by(orders);
        self
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn to_model(&self) -> QueryModel {
        QueryModel::select(self.entity.clone())
            .with_projection(self.projection.clone())
            .with_predicate(self.predicate.clone())
            .with_sort(self.sort.clone())
            .with_distinct(self.distinct)
    }
}

/// A bulk update under construction.
#[derive(Debug, Clone)]
pub struct CriteriaUpdate {
    entity: PersistentEntity,
    assignments: Vec<(String, Expression)>,
    predicate: Option<Predicate>,
}

impl CriteriaUpdate {
    pub fn new(entity: PersistentEntity) -> Self {
        CriteriaUpdate {
            entity,
            assignments: Vec::new(),
            predicate: None,
        }
    }

    pub fn set(&mut self, property: &str, value: impl IntoExpression) -> &mut Self {
        self.assignments.push((property.to_string(), value.into_expression()));
        self
    }

    pub fn where_(&mut self, predicate: Option<Predicate>) -> &mut Self {
        self.predicate = predicate;
        self
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    pub fn has_assignments(&self) -> bool {
        !self.assignments.is_empty()
    }

    pub fn to_model(&self) -> QueryModel {
        self.assignments
            .iter()
            .fold(QueryModel::update(self.entity.clone()), |model, (property, value)| {
                model.with_assignment(property, value.clone())
            })
            .with_predicate(self.predicate.clone())
    }
}

/// A bulk delete under construction.
#[derive(Debug, Clone)]
pub struct CriteriaDelete {
    entity: PersistentEntity,
    predicate: Option<Predicate>,
}

impl CriteriaDelete {
    pub fn new(entity: PersistentEntity) -> Self {
        CriteriaDelete {
            entity,
            predicate: None,
        }
    }

    pub fn where_(&mut self, predicate: Option<Predicate>) -> &mut Self {
        self.predicate = predicate;
        self
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    pub fn to_model(&self) -> QueryModel {
        QueryModel::delete(self.entity.clone()).with_predicate(self.predicate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::QueryKind;

    fn person() -> PersistentEntity {
        PersistentEntity::new("Person", "id")
    }

    #[test]
    fn select_model() {
        let mut query = CriteriaQuery::new(person());
        query
            .where_(Some(Predicate::IsNotNull(Expression::property("name"))))
            .order_by(vec![Order::asc("name")])
            .distinct(true);
        let model = query.to_model();
        assert_eq!(model.kind(), QueryKind::Select);
        assert!(model.is_distinct());
        assert!(model.sort().is_sorted());
        assert!(model.predicate().is_some());
    }

    #[test]
    fn and_where_combines_with_existing() {
        let mut query = CriteriaQuery::new(person());
        query.and_where(None);
        assert!(query.predicate().is_none());
        query.and_where(Some(Predicate::IsNull(Expression::property("a"))));
        query.and_where(Some(Predicate::IsNull(Expression::property("b"))));
        assert!(matches!(query.predicate(), Some(Predicate::And(_))));
    }

    #[test]
    fn update_and_delete_models() {
        let mut update = CriteriaUpdate::new(person());
        update.set("age", 30).where_(None);
        let model = update.to_model();
        assert_eq!(model.kind(), QueryKind::Update);
        assert_eq!(model.assignments().get("age"), Some(&Expression::literal(30)));

        let delete = CriteriaDelete::new(person()).to_model();
        assert_eq!(delete.kind(), QueryKind::Delete);
        assert!(delete.predicate().is_none());
    }
}
