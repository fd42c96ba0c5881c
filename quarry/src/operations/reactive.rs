use crate::common::{ConversionService, Document, Value};
use crate::criteria::QueryBuilder;
use crate::errors::DataResult;
use crate::model::{BatchOperation, EntityOperation, Page, PagedQuery, PersistentEntity, PreparedQuery};
use crate::operations::AsyncRepositoryOperations;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::Arc;

/// Reactive capability set of one datasource.
///
/// Single-valued operations emit exactly one element. When nothing matched,
/// `find_one` and `find_by_id` emit the empty-result error.
pub trait ReactiveRepositoryOperations: Send + Sync {
    fn find_one(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<Value>>;

    fn find_by_id(&self, entity: PersistentEntity, id: Value) -> BoxStream<'static, DataResult<Value>>;

    fn find_all(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<Value>>;

    fn find_all_paged(&self, query: PagedQuery) -> BoxStream<'static, DataResult<Value>>;

    fn find_page(&self, query: PagedQuery) -> BoxStream<'static, DataResult<Page<Value>>>;

    fn exists(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<bool>>;

    fn count(&self, query: PagedQuery) -> BoxStream<'static, DataResult<u64>>;

    fn persist(&self, operation: EntityOperation) -> BoxStream<'static, DataResult<Document>>;

    fn persist_all(&self, operation: BatchOperation) -> BoxStream<'static, DataResult<Document>>;

    fn update(&self, operation: EntityOperation) -> BoxStream<'static, DataResult<Document>>;

    fn update_all(&self, operation: BatchOperation) -> BoxStream<'static, DataResult<Document>>;

    fn execute_update(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<u64>>;

    fn execute_delete(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<u64>>;

    fn delete(&self, operation: EntityOperation) -> BoxStream<'static, DataResult<u64>>;

    fn delete_all(&self, operation: BatchOperation) -> BoxStream<'static, DataResult<u64>>;

    fn conversion_service(&self) -> &ConversionService;

    fn query_builder(&self) -> &dyn QueryBuilder;
}

/// Presents [AsyncRepositoryOperations] as [ReactiveRepositoryOperations].
pub struct ExecutorReactiveOperations {
    operations: Arc<dyn AsyncRepositoryOperations>,
}

impl ExecutorReactiveOperations {
    pub fn new(operations: Arc<dyn AsyncRepositoryOperations>) -> Self {
        ExecutorReactiveOperations { operations }
    }

    pub fn async_operations(&self) -> &Arc<dyn AsyncRepositoryOperations> {
        &self.operations
    }
}

fn single<T: Send + 'static>(future: BoxFuture<'static, DataResult<T>>) -> BoxStream<'static, DataResult<T>> {
    stream::once(future).boxed()
}

fn flatten<T: Send + 'static>(future: BoxFuture<'static, DataResult<Vec<T>>>) -> BoxStream<'static, DataResult<T>> {
    stream::once(future)
        .flat_map(|result| match result {
            Ok(items) => stream::iter(items.into_iter().map(Ok)).boxed(),
            Err(err) => stream::once(future::ready(Err(err))).boxed(),
        })
        .boxed()
}

impl ReactiveRepositoryOperations for ExecutorReactiveOperations {
    fn find_one(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<Value>> {
        single(self.operations.find_one(query))
    }

    fn find_by_id(&self, entity: PersistentEntity, id: Value) -> BoxStream<'static, DataResult<Value>> {
        single(self.operations.find_by_id(entity, id))
    }

    fn find_all(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<Value>> {
        flatten(self.operations.find_all(query))
    }

    fn find_all_paged(&self, query: PagedQuery) -> BoxStream<'static, DataResult<Value>> {
        flatten(self.operations.find_all_paged(query))
    }

    fn find_page(&self, query: PagedQuery) -> BoxStream<'static, DataResult<Page<Value>>> {
        single(self.operations.find_page(query))
    }

    fn exists(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<bool>> {
        single(self.operations.exists(query))
    }

    fn count(&self, query: PagedQuery) -> BoxStream<'static, DataResult<u64>> {
        single(self.operations.count(query))
    }

    fn persist(&self, operation: EntityOperation) -> BoxStream<'static, DataResult<Document>> {
        single(self.operations.persist(operation))
    }

    fn persist_all(&self, operation: BatchOperation) -> BoxStream<'static, DataResult<Document>> {
        flatten(self.operations.persist_all(operation))
    }

    fn update(&self, operation: EntityOperation) -> BoxStream<'static, DataResult<Document>> {
        single(self.operations.update(operation))
    }

    fn update_all(&self, operation: BatchOperation) -> BoxStream<'static, DataResult<Document>> {
        flatten(self.operations.update_all(operation))
    }

    fn execute_update(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<u64>> {
        single(self.operations.execute_update(query))
    }

    fn execute_delete(&self, query: PreparedQuery) -> BoxStream<'static, DataResult<u64>> {
        single(self.operations.execute_delete(query))
    }

    fn delete(&self, operation: EntityOperation) -> BoxStream<'static, DataResult<u64>> {
        single(self.operations.delete(operation))
    }

    fn delete_all(&self, operation: BatchOperation) -> BoxStream<'static, DataResult<u64>> {
        single(self.operations.delete_all(operation))
    }

    fn conversion_service(&self) -> &ConversionService {
        self.operations.conversion_service()
    }

    fn query_builder(&self) -> &dyn QueryBuilder {
        self.operations.query_builder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SpawnExecutor;
    use crate::criteria::{CriteriaBuilder, Expression, QueryModel};
    use crate::memory::fixtures::{person, prepared, seeded};
    use crate::model::{Pageable, ResultType};
    use crate::operations::ExecutorAsyncOperations;
    use crate::common::PropagatedContext;
    use futures::executor::block_on;

    fn reactive_ops() -> ExecutorReactiveOperations {
        ExecutorReactiveOperations::new(Arc::new(ExecutorAsyncOperations::new(seeded(), Arc::new(SpawnExecutor))))
    }

    fn by_city(city: &str) -> PreparedQuery {
        let model = QueryModel::select(person())
            .with_predicate(Some(CriteriaBuilder.equal(Expression::property("city"), city)));
        prepared(model, ResultType::Entity, Pageable::unpaged())
    }

    #[test]
    fn find_one_emits_empty_result_when_absent() {
        let items: Vec<_> = block_on(reactive_ops().find_one(by_city("Paris")).collect());
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().err().map(|e| e.is_empty_result()).unwrap_or(false));
    }

    #[test]
    fn find_by_id_emits_empty_result_when_absent() {
        let items: Vec<_> = block_on(reactive_ops().find_by_id(person(), Value::U64(999)).collect());
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().err().map(|e| e.is_empty_result()).unwrap_or(false));

        let found: Vec<_> = block_on(reactive_ops().find_by_id(person(), Value::U64(1)).collect());
        assert!(matches!(found.as_slice(), [Ok(_)]));
    }

    #[test]
    fn find_all_emits_each_row() {
        let items: Vec<_> = block_on(reactive_ops().find_all(by_city("London")).collect());
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn errors_are_emitted_as_elements() {
        let items: Vec<_> = block_on(reactive_ops().execute_update(by_city("London")).collect());
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[test]
    fn count_is_single_element() {
        let query = PagedQuery::new(person(), Pageable::unpaged(), PropagatedContext::empty());
        let items: Vec<_> = block_on(reactive_ops().count(query).collect());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().ok(), Some(&5));
    }
}
