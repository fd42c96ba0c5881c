use crate::common::{Value, ValueType};
use crate::criteria::{Projection, QueryKind, QueryModel};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::metadata::{Argument, MethodInvocationContext};
use crate::model::{
    OperationType, PagedQuery, Pageable, PersistentEntity, PreparedQuery, QueryParameterBinding, ResultType,
    StoredQuery,
};
use indexmap::IndexMap;
use std::sync::Arc;

/// Builds the [StoredQuery] of a repository method from its metadata.
///
/// Resolution only composes what the metadata already holds; no query text is
/// generated here.
pub trait StoredQueryResolver: Send + Sync {
    fn resolve_query(
        &self,
        context: &MethodInvocationContext,
        entity: &PersistentEntity,
        result_type: ResultType,
    ) -> DataResult<StoredQuery>;

    fn resolve_count_query(
        &self,
        context: &MethodInvocationContext,
        entity: &PersistentEntity,
    ) -> DataResult<StoredQuery>;
}

/// Binds the arguments of one call to a [StoredQuery].
pub trait PreparedQueryResolver: Send + Sync {
    fn resolve_query(
        &self,
        context: &MethodInvocationContext,
        stored: Arc<StoredQuery>,
        pageable: Pageable,
    ) -> DataResult<PreparedQuery>;
}

/// Builds the request of a query-less method.
pub trait PagedQueryResolver: Send + Sync {
    fn resolve_query(
        &self,
        context: &MethodInvocationContext,
        entity: &PersistentEntity,
        pageable: Pageable,
    ) -> DataResult<PagedQuery>;
}

/// Resolves queries from [crate::metadata::ExecutableMethod] metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQueryResolver;

impl DefaultQueryResolver {
    pub fn new() -> Self {
        DefaultQueryResolver
    }
}

fn operation_type(query: &str, model: Option<&Arc<QueryModel>>) -> OperationType {
    match model {
        Some(model) => match (model.kind(), model.projection()) {
            (QueryKind::Update, _) => OperationType::Update,
            (QueryKind::Delete, _) => OperationType::Delete,
            (QueryKind::Select, Projection::Count | Projection::CountDistinct(_)) => OperationType::Count,
            (QueryKind::Select, Projection::Exists) => OperationType::Exists,
            _ => OperationType::Query,
        },
        None => {
            let keyword = query.split_whitespace().next().unwrap_or_default().to_ascii_uppercase();
            match keyword.as_str() {
                "UPDATE" => OperationType::Update,
                "DELETE" => OperationType::Delete,
                _ => OperationType::Query,
            }
        }
    }
}

fn missing_query(context: &MethodInvocationContext, what: &str) -> DataError {
    log::error!("No {} present in method {}", what, context.method());
    DataError::new(
        &format!("No {} present in method {}", what, context.method()),
        ErrorKind::IllegalState,
    )
}

impl StoredQueryResolver for DefaultQueryResolver {
    fn resolve_query(
        &self,
        context: &MethodInvocationContext,
        entity: &PersistentEntity,
        result_type: ResultType,
    ) -> DataResult<StoredQuery> {
        let method = context.method();
        let query = method.query().ok_or_else(|| missing_query(context, "query"))?;
        let model = method.query_model();

        let mut stored = StoredQuery::new(method.name(), entity.clone(), query, result_type)
            .with_operation_type(operation_type(query, model))
            .with_bindings(method.bindings().to_vec());
        if let Some(model) = model {
            stored = stored.with_model(model.clone());
        }
        Ok(stored)
    }

    fn resolve_count_query(
        &self,
        context: &MethodInvocationContext,
        entity: &PersistentEntity,
    ) -> DataResult<StoredQuery> {
        let method = context.method();
        let query = method.count_query().ok_or_else(|| missing_query(context, "count query"))?;

        let mut stored = StoredQuery::new(method.name(), entity.clone(), query, ResultType::Value(ValueType::I64))
            .count()
            .with_bindings(method.count_bindings().to_vec());
        if let Some(model) = method.count_model() {
            stored = stored.with_model(model.clone());
        }
        Ok(stored)
    }
}

fn bind(context: &MethodInvocationContext, binding: &QueryParameterBinding) -> DataResult<Value> {
    if let Some(constant) = binding.constant_value() {
        return Ok(constant.clone());
    }

    let index = binding.argument_index().ok_or_else(|| {
        log::error!("Parameter :{} of {} is not bound to an argument", binding.name(), context.method());
        DataError::new(
            &format!("Parameter :{} of {} is not bound to an argument", binding.name(), context.method()),
            ErrorKind::IllegalState,
        )
    })?;

    let value = match context.argument(index) {
        Some(Argument::Value(value)) => value,
        Some(other) => {
            log::error!(
                "Parameter :{} of {} is bound to a {} argument",
                binding.name(),
                context.method(),
                other.kind_name()
            );
            return Err(DataError::new(
                &format!(
                    "Parameter :{} of {} is bound to a {} argument",
                    binding.name(),
                    context.method(),
                    other.kind_name()
                ),
                ErrorKind::IllegalState,
            ));
        }
        None => {
            log::error!(
                "Parameter :{} of {} is bound to missing argument {}",
                binding.name(),
                context.method(),
                index
            );
            return Err(DataError::new(
                &format!(
                    "Parameter :{} of {} is bound to missing argument {}",
                    binding.name(),
                    context.method(),
                    index
                ),
                ErrorKind::IllegalState,
            ));
        }
    };

    match binding.property_path() {
        None => Ok(value.clone()),
        Some(path) => match value.as_document() {
            Some(document) => Ok(document.get(path)),
            None => {
                log::error!("Argument {} of {} is not an entity", index, context.method());
                Err(DataError::new(
                    &format!(
                        "Argument {} of {} is a {}, not an entity with property '{}'",
                        index,
                        context.method(),
                        value.type_name(),
                        path
                    ),
                    ErrorKind::IllegalArgument,
                ))
            }
        },
    }
}

impl PreparedQueryResolver for DefaultQueryResolver {
    fn resolve_query(
        &self,
        context: &MethodInvocationContext,
        stored: Arc<StoredQuery>,
        pageable: Pageable,
    ) -> DataResult<PreparedQuery> {
        let values = stored
            .bindings()
            .iter()
            .map(|binding| Ok((binding.name().to_string(), bind(context, binding)?)))
            .collect::<DataResult<IndexMap<_, _>>>()?;
        Ok(PreparedQuery::new(stored, values, pageable, context.context().clone()))
    }
}

impl PagedQueryResolver for DefaultQueryResolver {
    fn resolve_query(
        &self,
        context: &MethodInvocationContext,
        entity: &PersistentEntity,
        pageable: Pageable,
    ) -> DataResult<PagedQuery> {
        Ok(PagedQuery::new(entity.clone(), pageable, context.context().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{CriteriaBuilder, Expression, JpqlQueryBuilder};
    use crate::metadata::{ExecutableMethod, ReturnType};
    use crate::{doc, val};

    fn person() -> PersistentEntity {
        PersistentEntity::new("Person", "id")
    }

    fn find_by_city() -> ExecutableMethod {
        let model = QueryModel::select(person()).with_predicate(Some(CriteriaBuilder.and(vec![
            CriteriaBuilder.equal(Expression::property("city"), Expression::parameter("city")),
            CriteriaBuilder.greater_than(Expression::property("age"), 30),
        ])));
        ExecutableMethod::builder("PersonRepository", "findByCity", person())
            .parameter("city", "String")
            .parameter("pageable", "Pageable")
            .returns(ReturnType::Page)
            .query_model(model)
            .build(&JpqlQueryBuilder)
            .unwrap()
    }

    #[test]
    fn stored_query_comes_from_metadata() {
        let context = MethodInvocationContext::new(find_by_city(), vec![]);
        let stored = StoredQueryResolver::resolve_query(&DefaultQueryResolver, &context, &person(), ResultType::Entity)
            .unwrap();
        assert_eq!(stored.name(), "findByCity");
        assert_eq!(stored.operation_type(), OperationType::Query);
        assert!(stored.model().is_some());
        assert!(!stored.is_count());

        let count = DefaultQueryResolver.resolve_count_query(&context, &person()).unwrap();
        assert!(count.is_count());
        assert!(count.query().starts_with("SELECT COUNT(person_)"));
    }

    #[test]
    fn missing_query_names_the_method() {
        let method = ExecutableMethod::builder("PersonRepository", "findSomething", person())
            .build(&JpqlQueryBuilder)
            .unwrap();
        let context = MethodInvocationContext::new(method, vec![]);
        let err = StoredQueryResolver::resolve_query(&DefaultQueryResolver, &context, &person(), ResultType::Entity)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IllegalState);
        assert!(err.message().contains("PersonRepository.findSomething"));
    }

    #[test]
    fn prepared_query_binds_arguments_and_constants() {
        let context = MethodInvocationContext::new(find_by_city(), vec![val!("London").into()]);
        let stored = StoredQueryResolver::resolve_query(&DefaultQueryResolver, &context, &person(), ResultType::Entity)
            .unwrap();
        let prepared =
            PreparedQueryResolver::resolve_query(&DefaultQueryResolver, &context, Arc::new(stored), Pageable::unpaged())
                .unwrap();
        assert_eq!(prepared.parameter("city"), Some(&val!("London")));
        assert_eq!(prepared.parameter("p1"), Some(&val!(30)));
    }

    #[test]
    fn missing_argument_is_illegal_state() {
        let context = MethodInvocationContext::new(find_by_city(), vec![]);
        let stored = StoredQueryResolver::resolve_query(&DefaultQueryResolver, &context, &person(), ResultType::Entity)
            .unwrap();
        let err =
            PreparedQueryResolver::resolve_query(&DefaultQueryResolver, &context, Arc::new(stored), Pageable::unpaged())
                .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IllegalState);
    }

    #[test]
    fn property_bindings_read_entity_arguments() {
        let stored = StoredQuery::new("update", person(), "UPDATE Person p SET p.age = :age WHERE p.id = :id", ResultType::Entity)
            .with_bindings(vec![
                QueryParameterBinding::property("age", 0, "age"),
                QueryParameterBinding::property("id", 0, "id"),
            ]);
        assert_eq!(stored.operation_type(), OperationType::Query);
        let method = ExecutableMethod::builder("PersonRepository", "update", person())
            .build(&JpqlQueryBuilder)
            .unwrap();
        let context = MethodInvocationContext::new(method, vec![Value::Document(doc! { "id": 4, "age": 50 }).into()]);
        let prepared =
            PreparedQueryResolver::resolve_query(&DefaultQueryResolver, &context, Arc::new(stored), Pageable::unpaged())
                .unwrap();
        assert_eq!(prepared.parameter("age"), Some(&val!(50)));
        assert_eq!(prepared.parameter("id"), Some(&val!(4)));
    }

    #[test]
    fn raw_update_queries_are_classified() {
        assert_eq!(operation_type("update Person p set p.age = 1", None), OperationType::Update);
        assert_eq!(operation_type("DELETE Person p", None), OperationType::Delete);
        assert_eq!(operation_type("SELECT p FROM Person p", None), OperationType::Query);
    }
}
