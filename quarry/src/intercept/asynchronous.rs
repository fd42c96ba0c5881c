use crate::common::{ConversionService, Value};
use crate::errors::DataResult;
use crate::intercept::blocking::{count_of, delete_everything, missing_query};
use crate::intercept::support::{convert_to, entities_argument, entity_argument, has_query, value_argument};
use crate::intercept::{DataInterceptor, InterceptorKind, MethodResult, RepositoryBean};
use crate::metadata::MethodInvocationContext;
use crate::model::{BatchOperation, EntityOperation, Page, ResultType};
use crate::operations::AsyncRepositoryOperations;
use futures::future::BoxFuture;
use futures::{FutureExt, TryFutureExt};

/// Converts the outcome of `future` into the method's declared result type.
fn completion<F>(
    future: BoxFuture<'static, DataResult<Value>>,
    conversion_service: ConversionService,
    result_type: ResultType,
    wrap: F,
) -> MethodResult
where
    F: FnOnce(Value) -> MethodResult + Send + 'static,
{
    MethodResult::CompletionStage(
        future
            .and_then(move |value| async move { convert_to(&conversion_service, result_type, value).map(wrap) })
            .boxed(),
    )
}

fn count_completion(
    future: BoxFuture<'static, DataResult<u64>>,
    conversion_service: ConversionService,
    result_type: ResultType,
) -> MethodResult {
    completion(future.map_ok(Value::U64).boxed(), conversion_service, result_type, MethodResult::Value)
}

operations_interceptor!(
    /// Completes with the single match, or fails with an empty result when
    /// nothing matched.
    FindOneAsyncInterceptor,
    AsyncRepositoryOperations
);

impl DataInterceptor for FindOneAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindOneAsync
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = self.support.prepared_query(bean, context)?;
        Ok(completion(
            self.operations.find_one(query),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
            MethodResult::Value,
        ))
    }
}

operations_interceptor!(FindByIdAsyncInterceptor, AsyncRepositoryOperations);

impl DataInterceptor for FindByIdAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindByIdAsync
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let id = value_argument(context, 0)?;
        Ok(completion(
            self.operations.find_by_id(context.method().entity().clone(), id),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
            MethodResult::Value,
        ))
    }
}

operations_interceptor!(FindAllAsyncInterceptor, AsyncRepositoryOperations);

impl DataInterceptor for FindAllAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindAllAsync
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let values = if has_query(context) {
            self.operations.find_all(self.support.prepared_query(bean, context)?)
        } else {
            self.operations.find_all_paged(self.support.paged_query(context)?)
        };
        let conversion_service = self.operations.conversion_service().clone();
        let result_type = context.method().result_type()?;
        Ok(MethodResult::CompletionStage(
            values
                .map(move |values| {
                    values?
                        .into_iter()
                        .map(|value| convert_to(&conversion_service, result_type, value))
                        .collect::<DataResult<Vec<_>>>()
                        .map(MethodResult::List)
                })
                .boxed(),
        ))
    }
}

operations_interceptor!(FindPageAsyncInterceptor, AsyncRepositoryOperations);

impl DataInterceptor for FindPageAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindPageAsync
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let conversion_service = self.operations.conversion_service().clone();
        let result_type = context.method().result_type()?;

        if !has_query(context) {
            let page = self.operations.find_page(self.support.paged_query(context)?);
            return Ok(MethodResult::CompletionStage(
                page.map(move |page| {
                    page?
                        .try_map(|value| convert_to(&conversion_service, result_type, value))
                        .map(MethodResult::Page)
                })
                .boxed(),
            ));
        }

        let query = self.support.prepared_query(bean, context)?;
        let pageable = query.pageable().clone();
        let count = if pageable.is_unpaged() {
            None
        } else {
            let count_query = self.support.prepared_count_query(bean, context)?;
            Some(self.operations.find_optional(count_query))
        };
        let content = self.operations.find_all(query);

        Ok(MethodResult::CompletionStage(
            async move {
                let content = content
                    .await?
                    .into_iter()
                    .map(|value| convert_to(&conversion_service, result_type, value))
                    .collect::<DataResult<Vec<_>>>()?;
                let total = match count {
                    Some(count) => count_of(count.await?)?,
                    None => content.len() as u64,
                };
                Ok(MethodResult::Page(Page::new(content, pageable, total)))
            }
            .boxed(),
        ))
    }
}

operations_interceptor!(CountAsyncInterceptor, AsyncRepositoryOperations);

impl DataInterceptor for CountAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::CountAsync
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let count = if has_query(context) {
            self.operations
                .find_optional(self.support.prepared_query(bean, context)?)
                .map(|value| count_of(value?))
                .boxed()
        } else {
            self.operations.count(self.support.paged_query(context)?)
        };
        Ok(count_completion(
            count,
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

operations_interceptor!(ExistsAsyncInterceptor, AsyncRepositoryOperations);

impl DataInterceptor for ExistsAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::ExistsAsync
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        if !has_query(context) {
            return Err(missing_query(context, self.kind()));
        }
        let exists = self.operations.exists(self.support.prepared_query(bean, context)?);
        Ok(MethodResult::CompletionStage(
            exists.map_ok(|exists| MethodResult::Value(Value::Bool(exists))).boxed(),
        ))
    }
}

operations_interceptor!(SaveAsyncInterceptor, AsyncRepositoryOperations);

impl DataInterceptor for SaveAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::SaveAsync
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let operation = EntityOperation::new(
            context.method().entity().clone(),
            entity_argument(context, 0)?,
            context.context().clone(),
        );
        Ok(MethodResult::CompletionStage(
            self.operations
                .persist(operation)
                .map_ok(|saved| MethodResult::Value(Value::Document(saved)))
                .boxed(),
        ))
    }
}

operations_interceptor!(UpdateQueryAsyncInterceptor, AsyncRepositoryOperations);

impl DataInterceptor for UpdateQueryAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::UpdateQueryAsync
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = self.support.prepared_query(bean, context)?;
        Ok(count_completion(
            self.operations.execute_update(query),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

operations_interceptor!(DeleteAllAsyncInterceptor, AsyncRepositoryOperations);

impl DataInterceptor for DeleteAllAsyncInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::DeleteAllAsync
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let has_entities = context.value(0).map(|v| v.as_array().is_some()).unwrap_or(false);
        let deleted = if has_entities {
            self.operations.delete_all(BatchOperation::new(
                context.method().entity().clone(),
                entities_argument(context, 0)?,
                context.context().clone(),
            ))
        } else if has_query(context) {
            self.operations.execute_delete(self.support.prepared_query(bean, context)?)
        } else {
            self.operations
                .execute_delete(delete_everything(self.operations.query_builder(), context)?)
        };
        Ok(count_completion(
            deleted,
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{SpawnExecutor, ValueType};
    use crate::criteria::JpqlQueryBuilder;
    use crate::intercept::support::fixtures::{bean, find_by_city, method};
    use crate::memory::fixtures::{person, seeded};
    use crate::memory::InMemoryRepositoryOperations;
    use crate::metadata::{Argument, ExecutableMethod, ReturnType};
    use crate::model::Pageable;
    use crate::operations::ExecutorAsyncOperations;
    use crate::{doc, val};
    use futures::executor::block_on;
    use std::sync::Arc;

    fn async_ops(ops: Arc<InMemoryRepositoryOperations>) -> Arc<dyn AsyncRepositoryOperations> {
        Arc::new(ExecutorAsyncOperations::new(ops, Arc::new(SpawnExecutor)))
    }

    fn complete(interceptor: &dyn DataInterceptor, method: ExecutableMethod, args: Vec<Argument>) -> DataResult<MethodResult> {
        let stage = interceptor
            .intercept(&bean(), &MethodInvocationContext::new(method, args))?
            .into_completion_stage()?;
        block_on(stage)
    }

    #[test]
    fn find_one_fails_with_empty_result_when_absent() {
        let interceptor = FindOneAsyncInterceptor::new(async_ops(seeded()));
        let method = find_by_city(InterceptorKind::FindOneAsync, ReturnType::CompletionStage);
        let err = complete(&interceptor, method.clone(), vec![val!("Paris").into()]).unwrap_err();
        assert!(err.is_empty_result());
        let found = complete(&interceptor, method, vec![val!("Austin").into()]).unwrap();
        assert_eq!(found.value().and_then(|v| v.as_document()).map(|d| d.get("name")), Some(val!("Edsger")));
    }

    #[test]
    fn find_all_completes_with_list() {
        let interceptor = FindAllAsyncInterceptor::new(async_ops(seeded()));
        let method = find_by_city(InterceptorKind::FindAllAsync, ReturnType::CompletionStage);
        let found = complete(&interceptor, method, vec![val!("London").into()]).unwrap();
        assert_eq!(found.into_list().unwrap().len(), 2);
    }

    #[test]
    fn page_counts_only_when_paged() {
        let ops = seeded();
        let interceptor = FindPageAsyncInterceptor::new(async_ops(ops.clone()));
        let method = find_by_city(InterceptorKind::FindPageAsync, ReturnType::CompletionStage);

        let page = complete(&interceptor, method.clone(), vec![val!("London").into(), Pageable::unpaged().into()])
            .unwrap()
            .into_page()
            .unwrap();
        assert_eq!(page.total_size(), 2);
        assert_eq!(ops.statement_count(), 1);

        ops.reset_statements();
        let page = complete(&interceptor, method, vec![val!("London").into(), Pageable::from(0, 1).unwrap().into()])
            .unwrap()
            .into_page()
            .unwrap();
        assert_eq!(page.content().len(), 1);
        assert_eq!(page.total_size(), 2);
        assert_eq!(ops.statement_count(), 2);
    }

    #[test]
    fn count_converts_to_declared_type() {
        let interceptor = CountAsyncInterceptor::new(async_ops(seeded()));
        let method = method("count", InterceptorKind::CountAsync, ReturnType::CompletionStage)
            .result_type(ResultType::Value(ValueType::I64))
            .build(&JpqlQueryBuilder)
            .unwrap();
        let count = complete(&interceptor, method, vec![]).unwrap();
        assert_eq!(count.value(), Some(&Value::I64(5)));
    }

    #[test]
    fn save_then_delete_everything() {
        let ops = seeded();
        let save = SaveAsyncInterceptor::new(async_ops(ops.clone()));
        let save_method = method("save", InterceptorKind::SaveAsync, ReturnType::CompletionStage)
            .parameter("entity", "Person")
            .build(&JpqlQueryBuilder)
            .unwrap();
        let saved = complete(&save, save_method, vec![val!(doc! { "name": "Linus", "city": "Portland" }).into()]).unwrap();
        assert!(saved.value().and_then(|v| v.as_document()).is_some());
        assert_eq!(ops.size(&person()), 6);

        let delete = DeleteAllAsyncInterceptor::new(async_ops(ops.clone()));
        let delete_method = method("deleteAll", InterceptorKind::DeleteAllAsync, ReturnType::CompletionStage)
            .build(&JpqlQueryBuilder)
            .unwrap();
        let deleted = complete(&delete, delete_method, vec![]).unwrap();
        assert_eq!(deleted.value(), Some(&Value::U64(6)));
        assert_eq!(ops.size(&person()), 0);
    }

    #[test]
    fn resolution_errors_are_raised_before_submission() {
        let ops = seeded();
        let interceptor = ExistsAsyncInterceptor::new(async_ops(ops.clone()));
        let method = method("exists", InterceptorKind::ExistsAsync, ReturnType::CompletionStage)
            .build(&JpqlQueryBuilder)
            .unwrap();
        let result = interceptor.intercept(&bean(), &MethodInvocationContext::new(method, vec![]));
        assert!(result.is_err());
        assert_eq!(ops.statement_count(), 0);
    }
}
