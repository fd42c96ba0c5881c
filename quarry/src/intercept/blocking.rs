use crate::common::Value;
use crate::criteria::{QueryBuilder, QueryModel};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::intercept::support::{
    convert, convert_all, count_result, entities_argument, entity_argument, has_query, single_result, value_argument,
};
use crate::intercept::{DataInterceptor, InterceptorKind, MethodResult, QuerySupport, RepositoryBean};
use crate::metadata::MethodInvocationContext;
use crate::model::{
    BatchOperation, EntityOperation, OperationType, Page, Pageable, PreparedQuery, ResultType, Slice, StoredQuery,
};
use crate::operations::RepositoryOperations;
use indexmap::IndexMap;
use std::sync::Arc;

/// Reads a count produced by a count query.
pub(crate) fn count_of(value: Option<Value>) -> DataResult<u64> {
    match value {
        None => Ok(0),
        Some(value) => value
            .as_integer()
            .and_then(|count| u64::try_from(count).ok())
            .ok_or_else(|| {
                log::error!("Count query produced {}", value);
                DataError::new(
                    &format!("Count query produced a {} instead of a count", value.type_name()),
                    ErrorKind::Conversion,
                )
            }),
    }
}

pub(crate) fn missing_query(context: &MethodInvocationContext, kind: InterceptorKind) -> DataError {
    log::error!("{} requires a query but {} has none", kind, context.method());
    DataError::new(
        &format!("{} requires a query but {} has none", kind, context.method()),
        ErrorKind::IllegalState,
    )
}

/// Content plus total for a page; the total costs a second query only when
/// the request is paged.
fn query_page(
    operations: &dyn RepositoryOperations,
    support: &QuerySupport,
    bean: &RepositoryBean,
    context: &MethodInvocationContext,
) -> DataResult<Page<Value>> {
    let query = support.prepared_query(bean, context)?;
    let content = convert_all(operations.conversion_service(), context, operations.find_all(&query)?)?;
    let pageable = query.pageable().clone();
    if pageable.is_unpaged() {
        let total = content.len() as u64;
        return Ok(Page::new(content, pageable, total));
    }
    let count_query = support.prepared_count_query(bean, context)?;
    let total = count_of(operations.find_one(&count_query)?)?;
    Ok(Page::new(content, pageable, total))
}

/// Delete statement over every row of the method's entity.
pub(crate) fn delete_everything(
    query_builder: &dyn QueryBuilder,
    context: &MethodInvocationContext,
) -> DataResult<PreparedQuery> {
    let method = context.method();
    let model = QueryModel::delete(method.entity().clone());
    let (query, bindings) = query_builder.build_query(&model)?.into_parts();
    let stored = StoredQuery::new(method.name(), method.entity().clone(), &query, method.result_type()?)
        .with_operation_type(OperationType::Delete)
        .with_bindings(bindings)
        .with_model(Arc::new(model));
    Ok(PreparedQuery::new(
        Arc::new(stored),
        IndexMap::new(),
        Pageable::unpaged(),
        context.context().clone(),
    ))
}

operations_interceptor!(FindOneInterceptor, RepositoryOperations);

impl DataInterceptor for FindOneInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindOne
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = self.support.prepared_query(bean, context)?;
        let value = self.operations.find_one(&query)?;
        single_result(self.operations.conversion_service(), context, value)
    }
}

operations_interceptor!(FindOptionalInterceptor, RepositoryOperations);

impl DataInterceptor for FindOptionalInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindOptional
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = self.support.prepared_query(bean, context)?;
        let value = self.operations.find_one(&query)?;
        single_result(self.operations.conversion_service(), context, value)
    }
}

operations_interceptor!(FindByIdInterceptor, RepositoryOperations);

impl DataInterceptor for FindByIdInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindById
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let id = value_argument(context, 0)?;
        let value = self.operations.find_by_id(context.method().entity(), &id)?;
        single_result(self.operations.conversion_service(), context, value)
    }
}

operations_interceptor!(FindAllInterceptor, RepositoryOperations);

impl DataInterceptor for FindAllInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindAll
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let values = if has_query(context) {
            self.operations.find_all(&self.support.prepared_query(bean, context)?)?
        } else {
            self.operations.find_all_paged(&self.support.paged_query(context)?)?
        };
        convert_all(self.operations.conversion_service(), context, values).map(MethodResult::List)
    }
}

operations_interceptor!(FindPageInterceptor, RepositoryOperations);

impl DataInterceptor for FindPageInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindPage
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        if has_query(context) {
            return query_page(self.operations.as_ref(), &self.support, bean, context).map(MethodResult::Page);
        }
        let page = self.operations.find_page(&self.support.paged_query(context)?)?;
        let conversion_service = self.operations.conversion_service();
        page.try_map(|value| convert(conversion_service, context, value))
            .map(MethodResult::Page)
    }
}

operations_interceptor!(FindSliceInterceptor, RepositoryOperations);

impl DataInterceptor for FindSliceInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindSlice
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let pageable = context.pageable();
        let values = if has_query(context) {
            self.operations.find_all(&self.support.prepared_query(bean, context)?)?
        } else {
            self.operations.find_all_paged(&self.support.paged_query(context)?)?
        };
        let content = convert_all(self.operations.conversion_service(), context, values)?;
        Ok(MethodResult::Slice(Slice::new(content, pageable)))
    }
}

operations_interceptor!(FindStreamInterceptor, RepositoryOperations);

impl DataInterceptor for FindStreamInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindStream
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        if !has_query(context) {
            let values = self.operations.find_all_paged(&self.support.paged_query(context)?)?;
            return Ok(MethodResult::Stream(Box::new(values.into_iter())));
        }
        let stream = self.operations.find_stream(&self.support.prepared_query(bean, context)?)?;
        match context.method().result_type()? {
            ResultType::Value(_) => {
                let values = convert_all(self.operations.conversion_service(), context, stream.collect())?;
                Ok(MethodResult::Stream(Box::new(values.into_iter())))
            }
            _ => Ok(MethodResult::Stream(stream)),
        }
    }
}

operations_interceptor!(CountInterceptor, RepositoryOperations);

impl DataInterceptor for CountInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::Count
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let count = if has_query(context) {
            count_of(self.operations.find_one(&self.support.prepared_query(bean, context)?)?)?
        } else {
            self.operations.count(&self.support.paged_query(context)?)?
        };
        count_result(self.operations.conversion_service(), context, count)
    }
}

operations_interceptor!(ExistsInterceptor, RepositoryOperations);

impl DataInterceptor for ExistsInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::Exists
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        if !has_query(context) {
            return Err(missing_query(context, self.kind()));
        }
        let exists = self.operations.exists(&self.support.prepared_query(bean, context)?)?;
        Ok(MethodResult::Value(Value::Bool(exists)))
    }
}

operations_interceptor!(SaveInterceptor, RepositoryOperations);

impl DataInterceptor for SaveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::Save
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let operation = EntityOperation::new(
            context.method().entity().clone(),
            entity_argument(context, 0)?,
            context.context().clone(),
        );
        let saved = self.operations.persist(&operation)?;
        Ok(MethodResult::Value(Value::Document(saved)))
    }
}

operations_interceptor!(SaveAllInterceptor, RepositoryOperations);

impl DataInterceptor for SaveAllInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::SaveAll
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let operation = BatchOperation::new(
            context.method().entity().clone(),
            entities_argument(context, 0)?,
            context.context().clone(),
        );
        let saved = self.operations.persist_all(&operation)?;
        Ok(MethodResult::List(saved.into_iter().map(Value::Document).collect()))
    }
}

operations_interceptor!(UpdateInterceptor, RepositoryOperations);

impl DataInterceptor for UpdateInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::Update
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let operation = EntityOperation::new(
            context.method().entity().clone(),
            entity_argument(context, 0)?,
            context.context().clone(),
        );
        let updated = self.operations.update(&operation)?;
        Ok(MethodResult::Value(Value::Document(updated)))
    }
}

operations_interceptor!(UpdateAllInterceptor, RepositoryOperations);

impl DataInterceptor for UpdateAllInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::UpdateAll
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let operation = BatchOperation::new(
            context.method().entity().clone(),
            entities_argument(context, 0)?,
            context.context().clone(),
        );
        let updated = self.operations.update_all(&operation)?;
        Ok(MethodResult::List(updated.into_iter().map(Value::Document).collect()))
    }
}

operations_interceptor!(UpdateQueryInterceptor, RepositoryOperations);

impl DataInterceptor for UpdateQueryInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::UpdateQuery
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let updated = self.operations.execute_update(&self.support.prepared_query(bean, context)?)?;
        count_result(self.operations.conversion_service(), context, updated.unwrap_or(0))
    }
}

operations_interceptor!(DeleteInterceptor, RepositoryOperations);

impl DataInterceptor for DeleteInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::Delete
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let operation = EntityOperation::new(
            context.method().entity().clone(),
            entity_argument(context, 0)?,
            context.context().clone(),
        );
        let deleted = self.operations.delete(&operation)?;
        count_result(self.operations.conversion_service(), context, deleted)
    }
}

operations_interceptor!(
    /// Deletes the given entities, the rows matched by the method's query, or
    /// every row when the method has neither.
    DeleteAllInterceptor,
    RepositoryOperations
);

impl DataInterceptor for DeleteAllInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::DeleteAll
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let has_entities = context.value(0).map(|v| v.as_array().is_some()).unwrap_or(false);
        let deleted = if has_entities {
            let operation = BatchOperation::new(
                context.method().entity().clone(),
                entities_argument(context, 0)?,
                context.context().clone(),
            );
            self.operations.delete_all(&operation)?
        } else if has_query(context) {
            self.operations.execute_delete(&self.support.prepared_query(bean, context)?)?
        } else {
            self.operations
                .execute_delete(&delete_everything(self.operations.query_builder(), context)?)?
        };
        count_result(self.operations.conversion_service(), context, deleted.unwrap_or(0))
    }
}

operations_interceptor!(DeleteQueryInterceptor, RepositoryOperations);

impl DataInterceptor for DeleteQueryInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::DeleteQuery
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let deleted = self.operations.execute_delete(&self.support.prepared_query(bean, context)?)?;
        count_result(self.operations.conversion_service(), context, deleted.unwrap_or(0))
    }
}
