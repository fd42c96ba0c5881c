use crate::common::{ConversionService, Document, Value};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::intercept::{MethodResult, RepositoryBean, RepositoryMethodKey};
use crate::metadata::{MethodInvocationContext, ReturnType};
use crate::model::{PagedQuery, Pageable, PreparedQuery, ResultType, StoredQuery};
use crate::query::{DefaultQueryResolver, PagedQueryResolver, PreparedQueryResolver, StoredQueryResolver};
use dashmap::DashMap;
use std::sync::Arc;

/// Query resolution shared by the query-executing interceptors.
///
/// Stored queries are resolved once per repository method and cached; every
/// call then binds its own arguments into a fresh [PreparedQuery].
pub struct QuerySupport {
    stored_resolver: Arc<dyn StoredQueryResolver>,
    prepared_resolver: Arc<dyn PreparedQueryResolver>,
    paged_resolver: Arc<dyn PagedQueryResolver>,
    queries: DashMap<RepositoryMethodKey, Arc<StoredQuery>>,
    count_queries: DashMap<RepositoryMethodKey, Arc<StoredQuery>>,
}

impl Default for QuerySupport {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySupport {
    pub fn new() -> Self {
        QuerySupport::with_resolvers(
            Arc::new(DefaultQueryResolver),
            Arc::new(DefaultQueryResolver),
            Arc::new(DefaultQueryResolver),
        )
    }

    pub fn with_resolvers(
        stored_resolver: Arc<dyn StoredQueryResolver>,
        prepared_resolver: Arc<dyn PreparedQueryResolver>,
        paged_resolver: Arc<dyn PagedQueryResolver>,
    ) -> Self {
        QuerySupport {
            stored_resolver,
            prepared_resolver,
            paged_resolver,
            queries: DashMap::new(),
            count_queries: DashMap::new(),
        }
    }

    pub fn stored_query(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<Arc<StoredQuery>> {
        let key = bean.key(context.method());
        if let Some(stored) = self.queries.get(&key) {
            return Ok(stored.value().clone());
        }
        let entry = self.queries.entry(key).or_try_insert_with(|| {
            let method = context.method();
            let stored = self
                .stored_resolver
                .resolve_query(context, method.entity(), method.result_type()?)?;
            log::debug!("Resolved query of {}: {}", method, stored.query());
            Ok::<_, DataError>(Arc::new(stored))
        })?;
        Ok(entry.value().clone())
    }

    pub fn stored_count_query(
        &self,
        bean: &RepositoryBean,
        context: &MethodInvocationContext,
    ) -> DataResult<Arc<StoredQuery>> {
        let key = bean.key(context.method());
        if let Some(stored) = self.count_queries.get(&key) {
            return Ok(stored.value().clone());
        }
        let entry = self.count_queries.entry(key).or_try_insert_with(|| {
            let method = context.method();
            let stored = self.stored_resolver.resolve_count_query(context, method.entity())?;
            log::debug!("Resolved count query of {}: {}", method, stored.query());
            Ok::<_, DataError>(Arc::new(stored))
        })?;
        Ok(entry.value().clone())
    }

    /// The method's query bound to this call's arguments and pageable.
    pub fn prepared_query(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<PreparedQuery> {
        let stored = self.stored_query(bean, context)?;
        self.prepared_resolver.resolve_query(context, stored, context.pageable())
    }

    /// The method's count query bound to this call's arguments, unpaged.
    pub fn prepared_count_query(
        &self,
        bean: &RepositoryBean,
        context: &MethodInvocationContext,
    ) -> DataResult<PreparedQuery> {
        let stored = self.stored_count_query(bean, context)?;
        self.prepared_resolver.resolve_query(context, stored, Pageable::unpaged())
    }

    pub fn paged_query(&self, context: &MethodInvocationContext) -> DataResult<PagedQuery> {
        let method = context.method();
        self.paged_resolver.resolve_query(context, method.entity(), context.pageable())
    }

    pub fn cached_queries(&self) -> usize {
        self.queries.len() + self.count_queries.len()
    }
}

/// Whether the method carries a query of its own.
pub(crate) fn has_query(context: &MethodInvocationContext) -> bool {
    context.method().query().is_some()
}

/// Converts a scalar to the method's declared result type; entities pass
/// through unchanged.
pub(crate) fn convert(
    conversion_service: &ConversionService,
    context: &MethodInvocationContext,
    value: Value,
) -> DataResult<Value> {
    convert_to(conversion_service, context.method().result_type()?, value)
}

pub(crate) fn convert_to(conversion_service: &ConversionService, result_type: ResultType, value: Value) -> DataResult<Value> {
    match result_type {
        ResultType::Value(value_type) => conversion_service.convert(&value, value_type),
        _ => Ok(value),
    }
}

pub(crate) fn convert_all(
    conversion_service: &ConversionService,
    context: &MethodInvocationContext,
    values: Vec<Value>,
) -> DataResult<Vec<Value>> {
    values
        .into_iter()
        .map(|value| convert(conversion_service, context, value))
        .collect()
}

/// A row count in the method's declared result type, or unit for methods
/// returning nothing.
pub(crate) fn count_result(
    conversion_service: &ConversionService,
    context: &MethodInvocationContext,
    count: u64,
) -> DataResult<MethodResult> {
    if context.method().return_type() == ReturnType::Unit {
        return Ok(MethodResult::Unit);
    }
    convert(conversion_service, context, Value::U64(count)).map(MethodResult::Value)
}

/// A single result, absent when nothing matched.
pub(crate) fn single_result(
    conversion_service: &ConversionService,
    context: &MethodInvocationContext,
    value: Option<Value>,
) -> DataResult<MethodResult> {
    match value {
        Some(value) => convert(conversion_service, context, value).map(MethodResult::Value),
        None => Ok(MethodResult::Absent),
    }
}

fn argument_error(context: &MethodInvocationContext, index: usize, expected: &str) -> DataError {
    log::error!("Argument {} of {} must be {}", index, context.method(), expected);
    DataError::new(
        &format!("Argument {} of {} must be {}", index, context.method(), expected),
        ErrorKind::IllegalArgument,
    )
}

pub(crate) fn value_argument(context: &MethodInvocationContext, index: usize) -> DataResult<Value> {
    context
        .value(index)
        .cloned()
        .ok_or_else(|| argument_error(context, index, "a value"))
}

pub(crate) fn entity_argument(context: &MethodInvocationContext, index: usize) -> DataResult<Document> {
    context
        .value(index)
        .and_then(|value| value.as_document())
        .cloned()
        .ok_or_else(|| argument_error(context, index, "an entity"))
}

pub(crate) fn entities_argument(context: &MethodInvocationContext, index: usize) -> DataResult<Vec<Document>> {
    let values = context
        .value(index)
        .and_then(|value| value.as_array())
        .ok_or_else(|| argument_error(context, index, "a list of entities"))?;
    values
        .iter()
        .map(|value| {
            value
                .as_document()
                .cloned()
                .ok_or_else(|| argument_error(context, index, "a list of entities"))
        })
        .collect()
}
