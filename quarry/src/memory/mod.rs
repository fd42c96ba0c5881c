//! Reference in-memory backend.

mod evaluator;
mod operations;

pub use operations::*;

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::common::{Document, PropagatedContext};
    use crate::criteria::{JpqlQueryBuilder, QueryBuilder, QueryModel};
    use crate::doc;
    use crate::memory::InMemoryRepositoryOperations;
    use crate::model::{BatchOperation, Pageable, PersistentEntity, PreparedQuery, ResultType, StoredQuery};
    use crate::operations::RepositoryOperations;
    use indexmap::IndexMap;
    use std::sync::Arc;

    pub(crate) fn person() -> PersistentEntity {
        PersistentEntity::new("Person", "id")
    }

    pub(crate) fn people() -> Vec<Document> {
        vec![
            doc! { "name": "Ada", "age": 36, "city": "London" },
            doc! { "name": "Alan", "age": 41, "city": "London" },
            doc! { "name": "Grace", "age": 85, "city": "New York" },
            doc! { "name": "Edsger", "age": 72, "city": "Austin" },
            doc! { "name": "Barbara", "age": 36, "city": "Boston" },
        ]
    }

    pub(crate) fn seeded() -> Arc<InMemoryRepositoryOperations> {
        let ops = Arc::new(InMemoryRepositoryOperations::new());
        ops.persist_all(&BatchOperation::new(person(), people(), PropagatedContext::empty()))
            .unwrap();
        ops.reset_statements();
        ops
    }

    pub(crate) fn prepared(model: QueryModel, result_type: ResultType, pageable: Pageable) -> PreparedQuery {
        let rendered = JpqlQueryBuilder.build_query(&model).unwrap();
        let values: IndexMap<_, _> = rendered
            .bindings()
            .iter()
            .filter_map(|b| b.constant_value().map(|v| (b.name().to_string(), v.clone())))
            .collect();
        let stored = StoredQuery::new("test", model.entity().clone(), rendered.query(), result_type)
            .with_bindings(rendered.bindings().to_vec())
            .with_model(Arc::new(model));
        PreparedQuery::new(Arc::new(stored), values, pageable, PropagatedContext::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::common::{PropagatedContext, Value, ValueType};
    use crate::criteria::{CriteriaBuilder, Expression, QueryModel};
    use crate::errors::ErrorKind;
    use crate::model::{BatchOperation, EntityOperation, Order, Pageable, PagedQuery, ResultType, Sort, StoredQuery};
    use crate::operations::RepositoryOperations;
    use crate::{doc, val};
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn londoners() -> QueryModel {
        QueryModel::select(person())
            .with_predicate(Some(CriteriaBuilder.equal(Expression::property("city"), "London")))
    }

    #[test]
    fn persist_generates_ids() {
        let ops = seeded();
        assert_eq!(ops.size(&person()), 5);
        let found = ops.find_by_id(&person(), &val!(1u64)).unwrap();
        assert_eq!(found.and_then(|v| v.as_document().map(|d| d.get("name"))), Some(val!("Ada")));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let ops = seeded();
        let op = EntityOperation::new(person(), doc! { "id": 1, "name": "Copy" }, PropagatedContext::empty());
        let err = ops.persist(&op).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Backend);
    }

    #[test]
    fn find_all_filters_and_counts_statements() {
        let ops = seeded();
        let rows = ops.find_all(&prepared(londoners(), ResultType::Entity, Pageable::unpaged())).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(ops.statement_count(), 1);
        assert!(ops.statements()[0].contains("WHERE (person_.city = :p1)"));
    }

    #[test]
    fn find_one_returns_none_when_nothing_matches() {
        let ops = seeded();
        let model = QueryModel::select(person())
            .with_predicate(Some(CriteriaBuilder.equal(Expression::property("name"), "Nobody")));
        assert!(ops.find_one(&prepared(model, ResultType::Entity, Pageable::unpaged())).unwrap().is_none());
    }

    #[test]
    fn count_and_exists_models() {
        let ops = seeded();
        let count = ops
            .find_one(&prepared(londoners().to_count(), ResultType::Value(ValueType::I64), Pageable::unpaged()))
            .unwrap();
        assert_eq!(count, Some(val!(2u64)));
        assert!(ops.exists(&prepared(londoners(), ResultType::Entity, Pageable::unpaged())).unwrap());
    }

    #[test]
    fn paged_find_all_sorts_and_limits() {
        let ops = seeded();
        let pageable = Pageable::from_sorted(1, 2, Sort::of(Order::asc("age"))).unwrap();
        let rows = ops.find_all_paged(&PagedQuery::new(person(), pageable, PropagatedContext::empty())).unwrap();
        let ages: Vec<Value> = rows.iter().filter_map(|r| r.as_document().map(|d| d.get("age"))).collect();
        assert_eq!(ages, vec![val!(41), val!(72)]);
    }

    #[test]
    fn find_page_counts_only_when_paged() {
        let ops = seeded();
        let unpaged = ops.find_page(&PagedQuery::new(person(), Pageable::unpaged(), PropagatedContext::empty())).unwrap();
        assert_eq!(unpaged.total_size(), 5);
        assert_eq!(ops.statement_count(), 1);

        ops.reset_statements();
        let paged = ops
            .find_page(&PagedQuery::new(person(), Pageable::from(0, 2).unwrap(), PropagatedContext::empty()))
            .unwrap();
        assert_eq!(paged.content().len(), 2);
        assert_eq!(paged.total_size(), 5);
        assert_eq!(ops.statement_count(), 2);
    }

    #[test]
    fn execute_update_applies_assignments() {
        let ops = seeded();
        let model = QueryModel::update(person())
            .with_assignment("city", Expression::literal("Cambridge"))
            .with_predicate(londoners().predicate().cloned());
        let updated = ops.execute_update(&prepared(model, ResultType::Entity, Pageable::unpaged())).unwrap();
        assert_eq!(updated, Some(2));
        let rest = ops.find_all(&prepared(londoners(), ResultType::Entity, Pageable::unpaged())).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn execute_delete_removes_matches() {
        let ops = seeded();
        let model = QueryModel::delete(person()).with_predicate(londoners().predicate().cloned());
        let deleted = ops.execute_delete(&prepared(model, ResultType::Entity, Pageable::unpaged())).unwrap();
        assert_eq!(deleted, Some(2));
        assert_eq!(ops.size(&person()), 3);
    }

    #[test]
    fn update_requires_existing_row() {
        let ops = seeded();
        let op = EntityOperation::new(person(), doc! { "id": 99, "name": "Ghost" }, PropagatedContext::empty());
        assert_eq!(ops.update(&op).unwrap_err().kind(), &ErrorKind::Backend);

        let op = EntityOperation::new(person(), doc! { "id": 1u64, "name": "Ada L." }, PropagatedContext::empty());
        assert_eq!(ops.update(&op).unwrap().get("name"), val!("Ada L."));
    }

    #[test]
    fn raw_queries_are_unsupported() {
        let ops = seeded();
        let stored = StoredQuery::new("raw", person(), "SELECT * FROM person", ResultType::Entity);
        let query = crate::model::PreparedQuery::new(
            Arc::new(stored),
            IndexMap::new(),
            Pageable::unpaged(),
            PropagatedContext::empty(),
        );
        assert_eq!(ops.find_all(&query).unwrap_err().kind(), &ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn wrong_statement_kind_is_rejected() {
        let ops = seeded();
        let query = prepared(londoners(), ResultType::Entity, Pageable::unpaged());
        assert_eq!(ops.execute_delete(&query).unwrap_err().kind(), &ErrorKind::IllegalArgument);
    }

    #[test]
    fn failed_batch_insert_writes_nothing() {
        let ops = seeded();
        let batch = BatchOperation::new(
            person(),
            vec![doc! { "name": "Hedy", "city": "Vienna" }, doc! { "id": 1u64, "name": "Clash" }],
            PropagatedContext::empty(),
        );
        assert_eq!(ops.persist_all(&batch).unwrap_err().kind(), &ErrorKind::Backend);
        assert_eq!(ops.size(&person()), 5);

        let twins = BatchOperation::new(
            person(),
            vec![doc! { "id": 40u64, "name": "Twin" }, doc! { "id": 40u64, "name": "Twin" }],
            PropagatedContext::empty(),
        );
        assert!(ops.persist_all(&twins).is_err());
        assert_eq!(ops.size(&person()), 5);
    }

    #[test]
    fn failed_batch_update_changes_nothing() {
        let ops = seeded();
        let batch = BatchOperation::new(
            person(),
            vec![doc! { "id": 1u64, "name": "Ada L." }, doc! { "id": 99u64, "name": "Ghost" }],
            PropagatedContext::empty(),
        );
        assert_eq!(ops.update_all(&batch).unwrap_err().kind(), &ErrorKind::Backend);

        let ada = ops.find_by_id(&person(), &val!(1u64)).unwrap().unwrap();
        assert_eq!(ada.as_document().map(|d| d.get("name")), Some(val!("Ada")));
    }

    #[test]
    fn statement_log_keeps_most_recent() {
        let ops = seeded();
        let query = PagedQuery::new(person(), Pageable::unpaged(), PropagatedContext::empty());
        for _ in 0..STATEMENT_LOG_CAPACITY + 10 {
            ops.count(&query).unwrap();
        }
        ops.persist(&EntityOperation::new(person(), doc! { "name": "Hedy" }, PropagatedContext::empty()))
            .unwrap();

        assert_eq!(ops.statement_count(), STATEMENT_LOG_CAPACITY + 11);
        let statements = ops.statements();
        assert_eq!(statements.len(), STATEMENT_LOG_CAPACITY);
        assert_eq!(statements.last().map(String::as_str), Some("INSERT INTO Person"));
    }
}
