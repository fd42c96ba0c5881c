use crate::common::{ConversionService, Document, PropagatedContext, TaskExecutor, Value};
use crate::criteria::QueryBuilder;
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::model::{BatchOperation, EntityOperation, Page, PagedQuery, PersistentEntity, PreparedQuery};
use crate::operations::RepositoryOperations;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Asynchronous capability set of one datasource.
///
/// Operations that must produce exactly one value (`find_one`, `find_by_id`)
/// fail with the empty-result error when nothing matched.
pub trait AsyncRepositoryOperations: Send + Sync {
    fn find_one(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<Value>>;

    fn find_optional(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<Option<Value>>>;

    fn find_by_id(&self, entity: PersistentEntity, id: Value) -> BoxFuture<'static, DataResult<Value>>;

    fn find_all(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<Vec<Value>>>;

    fn find_all_paged(&self, query: PagedQuery) -> BoxFuture<'static, DataResult<Vec<Value>>>;

    fn find_page(&self, query: PagedQuery) -> BoxFuture<'static, DataResult<Page<Value>>>;

    fn exists(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<bool>>;

    fn count(&self, query: PagedQuery) -> BoxFuture<'static, DataResult<u64>>;

    fn persist(&self, operation: EntityOperation) -> BoxFuture<'static, DataResult<Document>>;

    fn persist_all(&self, operation: BatchOperation) -> BoxFuture<'static, DataResult<Vec<Document>>>;

    fn update(&self, operation: EntityOperation) -> BoxFuture<'static, DataResult<Document>>;

    fn update_all(&self, operation: BatchOperation) -> BoxFuture<'static, DataResult<Vec<Document>>>;

    /// Rows affected; zero when the backend does not report a count.
    fn execute_update(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<u64>>;

    fn execute_delete(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<u64>>;

    fn delete(&self, operation: EntityOperation) -> BoxFuture<'static, DataResult<u64>>;

    fn delete_all(&self, operation: BatchOperation) -> BoxFuture<'static, DataResult<u64>>;

    fn conversion_service(&self) -> &ConversionService;

    fn query_builder(&self) -> &dyn QueryBuilder;
}

/// Presents a blocking backend as [AsyncRepositoryOperations].
///
/// Every call is submitted to the executor as soon as it is made. The context
/// current at submission is installed on the worker thread for the duration of
/// the blocking call. Backend errors are delivered unchanged; a panic in the
/// backend completes the future with an `Internal` error.
pub struct ExecutorAsyncOperations {
    operations: Arc<dyn RepositoryOperations>,
    executor: Arc<dyn TaskExecutor>,
}

impl ExecutorAsyncOperations {
    pub fn new(operations: Arc<dyn RepositoryOperations>, executor: Arc<dyn TaskExecutor>) -> Self {
        ExecutorAsyncOperations {
            operations,
            executor,
        }
    }

    pub fn blocking(&self) -> &Arc<dyn RepositoryOperations> {
        &self.operations
    }

    fn submit<T, F>(&self, call: F) -> BoxFuture<'static, DataResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RepositoryOperations) -> DataResult<T> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let operations = self.operations.clone();
        let context = PropagatedContext::current();

        self.executor.execute(Box::new(move || {
            let _scope = context.scope();
            let result = catch_unwind(AssertUnwindSafe(|| call(operations.as_ref())))
                .unwrap_or_else(|panic| Err(panic_error(panic)));
            if sender.send(result).is_err() {
                log::debug!("Async repository call completed after its caller went away");
            }
        }));

        async move {
            receiver.await.unwrap_or_else(|_| {
                log::error!("Executor dropped a repository task before it completed");
                Err(DataError::new(
                    "Executor dropped a repository task before it completed",
                    ErrorKind::Internal,
                ))
            })
        }
        .boxed()
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> DataError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    log::error!("Repository call panicked: {}", message);
    DataError::new(&format!("Repository call panicked: {}", message), ErrorKind::Internal)
}

impl AsyncRepositoryOperations for ExecutorAsyncOperations {
    fn find_one(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<Value>> {
        self.submit(move |ops| ops.find_one(&query)?.ok_or_else(DataError::empty_result))
    }

    fn find_optional(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<Option<Value>>> {
        self.submit(move |ops| ops.find_one(&query))
    }

    fn find_by_id(&self, entity: PersistentEntity, id: Value) -> BoxFuture<'static, DataResult<Value>> {
        self.submit(move |ops| ops.find_by_id(&entity, &id)?.ok_or_else(DataError::empty_result))
    }

    fn find_all(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<Vec<Value>>> {
        self.submit(move |ops| ops.find_all(&query))
    }

    fn find_all_paged(&self, query: PagedQuery) -> BoxFuture<'static, DataResult<Vec<Value>>> {
        self.submit(move |ops| ops.find_all_paged(&query))
    }

    fn find_page(&self, query: PagedQuery) -> BoxFuture<'static, DataResult<Page<Value>>> {
        self.submit(move |ops| ops.find_page(&query))
    }

    fn exists(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<bool>> {
        self.submit(move |ops| ops.exists(&query))
    }

    fn count(&self, query: PagedQuery) -> BoxFuture<'static, DataResult<u64>> {
        self.submit(move |ops| ops.count(&query))
    }

    fn persist(&self, operation: EntityOperation) -> BoxFuture<'static, DataResult<Document>> {
        self.submit(move |ops| ops.persist(&operation))
    }

    fn persist_all(&self, operation: BatchOperation) -> BoxFuture<'static, DataResult<Vec<Document>>> {
        self.submit(move |ops| ops.persist_all(&operation))
    }

    fn update(&self, operation: EntityOperation) -> BoxFuture<'static, DataResult<Document>> {
        self.submit(move |ops| ops.update(&operation))
    }

    fn update_all(&self, operation: BatchOperation) -> BoxFuture<'static, DataResult<Vec<Document>>> {
        self.submit(move |ops| ops.update_all(&operation))
    }

    fn execute_update(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<u64>> {
        self.submit(move |ops| ops.execute_update(&query).map(|count| count.unwrap_or(0)))
    }

    fn execute_delete(&self, query: PreparedQuery) -> BoxFuture<'static, DataResult<u64>> {
        self.submit(move |ops| ops.execute_delete(&query).map(|count| count.unwrap_or(0)))
    }

    fn delete(&self, operation: EntityOperation) -> BoxFuture<'static, DataResult<u64>> {
        self.submit(move |ops| ops.delete(&operation))
    }

    fn delete_all(&self, operation: BatchOperation) -> BoxFuture<'static, DataResult<u64>> {
        self.submit(move |ops| ops.delete_all(&operation).map(|count| count.unwrap_or(0)))
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
    use crate::common::{SpawnExecutor, TransactionStatus};
    use crate::criteria::{CriteriaBuilder, Expression, QueryModel};
    use crate::memory::fixtures::{person, prepared, seeded};
    use crate::model::{Pageable, ResultType};
    use futures::executor::block_on;

    fn async_ops() -> ExecutorAsyncOperations {
        ExecutorAsyncOperations::new(seeded(), Arc::new(SpawnExecutor))
    }

    fn by_name(name: &str) -> PreparedQuery {
        let model = QueryModel::select(person())
            .with_predicate(Some(CriteriaBuilder.equal(Expression::property("name"), name)));
        prepared(model, ResultType::Entity, Pageable::unpaged())
    }

    #[test]
    fn find_one_completes_with_value() {
        let value = block_on(async_ops().find_one(by_name("Ada"))).unwrap();
        assert!(value.is_document());
    }

    #[test]
    fn absent_find_one_is_empty_result() {
        let err = block_on(async_ops().find_one(by_name("Nobody"))).unwrap_err();
        assert!(err.is_empty_result());
        assert_eq!(block_on(async_ops().find_optional(by_name("Nobody"))).unwrap(), None);
    }

    #[test]
    fn backend_errors_are_not_wrapped() {
        let ops = async_ops();
        let err = block_on(ops.execute_delete(by_name("Ada"))).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IllegalArgument);
        assert!(err.cause().is_none());
    }

    #[test]
    fn panics_become_internal_errors() {
        let ops = async_ops();
        let err = block_on(ops.submit::<(), _>(|_| panic!("backend exploded"))).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Internal);
        assert!(err.message().contains("backend exploded"));
    }

    #[test]
    fn worker_sees_submitting_context() {
        let ops = async_ops();
        let context = PropagatedContext::empty().plus(TransactionStatus::new(11, "tx", false));
        let future = {
            let _scope = context.scope();
            ops.submit(|_| Ok(PropagatedContext::current().transaction().map(|t| t.id)))
        };
        assert_eq!(block_on(future).unwrap(), Some(11));
    }

    #[test]
    fn counts_default_to_zero() {
        let ops = async_ops();
        let deleted = block_on(ops.execute_delete(prepared(
            QueryModel::delete(person()).with_predicate(Some(CriteriaBuilder.equal(Expression::property("name"), "Nobody"))),
            ResultType::Entity,
            Pageable::unpaged(),
        )))
        .unwrap();
        assert_eq!(deleted, 0);
    }
}
