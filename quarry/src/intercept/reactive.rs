use crate::common::{ConversionService, Value};
use crate::errors::DataResult;
use crate::intercept::blocking::{count_of, delete_everything, missing_query};
use crate::intercept::support::{convert_to, entities_argument, entity_argument, has_query, value_argument};
use crate::intercept::{DataInterceptor, InterceptorKind, MethodResult, RepositoryBean};
use crate::metadata::MethodInvocationContext;
use crate::model::{BatchOperation, EntityOperation, Page, ResultType};
use crate::operations::ReactiveRepositoryOperations;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use futures::FutureExt;

/// Publisher emitting each value converted to the method's result type.
pub(crate) fn publisher(
    values: BoxStream<'static, DataResult<Value>>,
    conversion_service: ConversionService,
    result_type: ResultType,
) -> MethodResult {
    MethodResult::Publisher(
        values
            .map(move |value| convert_to(&conversion_service, result_type, value?).map(MethodResult::Value))
            .boxed(),
    )
}

pub(crate) fn count_publisher(
    counts: BoxStream<'static, DataResult<u64>>,
    conversion_service: ConversionService,
    result_type: ResultType,
) -> MethodResult {
    publisher(counts.map_ok(Value::U64).boxed(), conversion_service, result_type)
}

operations_interceptor!(
    /// Emits the single match, or the empty-result error when nothing matched.
    FindOneReactiveInterceptor,
    ReactiveRepositoryOperations
);

impl DataInterceptor for FindOneReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindOneReactive
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = self.support.prepared_query(bean, context)?;
        Ok(publisher(
            self.operations.find_one(query),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

operations_interceptor!(FindByIdReactiveInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for FindByIdReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindByIdReactive
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let id = value_argument(context, 0)?;
        Ok(publisher(
            self.operations.find_by_id(context.method().entity().clone(), id),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

operations_interceptor!(FindAllReactiveInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for FindAllReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindAllReactive
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let values = if has_query(context) {
            self.operations.find_all(self.support.prepared_query(bean, context)?)
        } else {
            self.operations.find_all_paged(self.support.paged_query(context)?)
        };
        Ok(publisher(
            values,
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

operations_interceptor!(
    /// Emits exactly one page. The count stream is only created for paged
    /// requests, since creating it already submits the query.
    FindPageReactiveInterceptor,
    ReactiveRepositoryOperations
);

impl DataInterceptor for FindPageReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindPageReactive
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let conversion_service = self.operations.conversion_service().clone();
        let result_type = context.method().result_type()?;

        if !has_query(context) {
            let pages = self.operations.find_page(self.support.paged_query(context)?);
            return Ok(MethodResult::Publisher(
                pages
                    .map(move |page| {
                        page?
                            .try_map(|value| convert_to(&conversion_service, result_type, value))
                            .map(MethodResult::Page)
                    })
                    .boxed(),
            ));
        }

        let query = self.support.prepared_query(bean, context)?;
        let pageable = query.pageable().clone();
        let counts = if pageable.is_unpaged() {
            None
        } else {
            let count_query = self.support.prepared_count_query(bean, context)?;
            Some(self.operations.find_one(count_query))
        };
        let content = self.operations.find_all(query);

        let page = async move {
            let content = content
                .and_then(|value| future::ready(convert_to(&conversion_service, result_type, value)))
                .try_collect::<Vec<_>>()
                .await?;
            let total = match counts {
                Some(mut counts) => count_of(counts.try_next().await?)?,
                None => content.len() as u64,
            };
            Ok(MethodResult::Page(Page::new(content, pageable, total)))
        };
        Ok(MethodResult::Publisher(stream::once(page.boxed()).boxed()))
    }
}

operations_interceptor!(CountReactiveInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for CountReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::CountReactive
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let counts = if has_query(context) {
            let mut rows = self.operations.find_one(self.support.prepared_query(bean, context)?);
            stream::once(async move { count_of(rows.try_next().await?) }.boxed()).boxed()
        } else {
            self.operations.count(self.support.paged_query(context)?)
        };
        Ok(count_publisher(
            counts,
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

operations_interceptor!(ExistsReactiveInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for ExistsReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::ExistsReactive
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        if !has_query(context) {
            return Err(missing_query(context, self.kind()));
        }
        let exists = self.operations.exists(self.support.prepared_query(bean, context)?);
        Ok(MethodResult::Publisher(
            exists.map_ok(|exists| MethodResult::Value(Value::Bool(exists))).boxed(),
        ))
    }
}

operations_interceptor!(SaveReactiveInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for SaveReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::SaveReactive
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let saved = match context.value(0) {
            Some(Value::Array(_)) => self.operations.persist_all(BatchOperation::new(
                context.method().entity().clone(),
                entities_argument(context, 0)?,
                context.context().clone(),
            )),
            _ => self.operations.persist(EntityOperation::new(
                context.method().entity().clone(),
                entity_argument(context, 0)?,
                context.context().clone(),
            )),
        };
        Ok(MethodResult::Publisher(
            saved.map_ok(|saved| MethodResult::Value(Value::Document(saved))).boxed(),
        ))
    }
}

operations_interceptor!(UpdateQueryReactiveInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for UpdateQueryReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::UpdateQueryReactive
    }

    fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = self.support.prepared_query(bean, context)?;
        Ok(count_publisher(
            self.operations.execute_update(query),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

operations_interceptor!(DeleteAllReactiveInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for DeleteAllReactiveInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::DeleteAllReactive
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
        Ok(count_publisher(
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
    use crate::operations::{ExecutorAsyncOperations, ExecutorReactiveOperations};
    use crate::{doc, val};
    use futures::executor::block_on;
    use std::sync::Arc;

    fn reactive_ops(ops: Arc<InMemoryRepositoryOperations>) -> Arc<dyn ReactiveRepositoryOperations> {
        Arc::new(ExecutorReactiveOperations::new(Arc::new(ExecutorAsyncOperations::new(
            ops,
            Arc::new(SpawnExecutor),
        ))))
    }

    fn emitted(
        interceptor: &dyn DataInterceptor,
        method: ExecutableMethod,
        args: Vec<Argument>,
    ) -> Vec<DataResult<MethodResult>> {
        let publisher = interceptor
            .intercept(&bean(), &MethodInvocationContext::new(method, args))
            .and_then(MethodResult::into_publisher)
            .unwrap();
        block_on(publisher.collect())
    }

    #[test]
    fn find_one_emits_empty_result_when_absent() {
        let interceptor = FindOneReactiveInterceptor::new(reactive_ops(seeded()));
        let method = find_by_city(InterceptorKind::FindOneReactive, ReturnType::Publisher);
        let absent = emitted(&interceptor, method.clone(), vec![val!("Paris").into()]);
        assert_eq!(absent.len(), 1);
        assert!(absent[0].as_ref().err().map(|e| e.is_empty_result()).unwrap_or(false));
        assert!(matches!(
            emitted(&interceptor, method, vec![val!("Boston").into()]).as_slice(),
            [Ok(_)]
        ));
    }

    #[test]
    fn find_all_emits_each_match() {
        let interceptor = FindAllReactiveInterceptor::new(reactive_ops(seeded()));
        let method = find_by_city(InterceptorKind::FindAllReactive, ReturnType::Publisher);
        let items = emitted(&interceptor, method, vec![val!("London").into()]);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.is_ok()));
    }

    #[test]
    fn page_counts_only_when_paged() {
        let ops = seeded();
        let interceptor = FindPageReactiveInterceptor::new(reactive_ops(ops.clone()));
        let method = find_by_city(InterceptorKind::FindPageReactive, ReturnType::Publisher);

        let pages = emitted(&interceptor, method.clone(), vec![val!("London").into(), Pageable::unpaged().into()]);
        assert_eq!(pages.len(), 1);
        assert_eq!(ops.statement_count(), 1);

        ops.reset_statements();
        let pages = emitted(&interceptor, method, vec![val!("London").into(), Pageable::from(1, 1).unwrap().into()]);
        let page = match pages.into_iter().next() {
            Some(Ok(result)) => result.into_page().unwrap(),
            other => panic!("expected a page, got {:?}", other),
        };
        assert_eq!(page.content().len(), 1);
        assert_eq!(page.total_size(), 2);
        assert_eq!(ops.statement_count(), 2);
    }

    #[test]
    fn count_emits_one_converted_value() {
        let interceptor = CountReactiveInterceptor::new(reactive_ops(seeded()));
        let method = method("count", InterceptorKind::CountReactive, ReturnType::Publisher)
            .result_type(ResultType::Value(ValueType::I32))
            .build(&JpqlQueryBuilder)
            .unwrap();
        let counts = emitted(&interceptor, method, vec![]);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].as_ref().ok().and_then(|c| c.value().cloned()), Some(Value::I32(5)));
    }

    #[test]
    fn save_list_emits_each_entity() {
        let ops = seeded();
        let interceptor = SaveReactiveInterceptor::new(reactive_ops(ops.clone()));
        let save = method("saveAll", InterceptorKind::SaveReactive, ReturnType::Publisher)
            .parameter("entities", "List<Person>")
            .build(&JpqlQueryBuilder)
            .unwrap();
        let entities = val!(vec![doc! { "name": "Ken" }, doc! { "name": "Dennis" }]);
        let saved = emitted(&interceptor, save, vec![entities.into()]);
        assert_eq!(saved.len(), 2);
        assert_eq!(ops.size(&person()), 7);
    }

    #[test]
    fn backend_errors_are_emitted() {
        let interceptor = UpdateQueryReactiveInterceptor::new(reactive_ops(seeded()));
        let method = find_by_city(InterceptorKind::UpdateQueryReactive, ReturnType::Publisher);
        let items = emitted(&interceptor, method, vec![val!("London").into()]);
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
