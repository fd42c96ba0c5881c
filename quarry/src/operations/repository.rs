use crate::common::{ConversionService, Document, Value};
use crate::criteria::QueryBuilder;
use crate::errors::DataResult;
use crate::model::{BatchOperation, EntityOperation, Page, PagedQuery, PersistentEntity, PreparedQuery};

pub type ValueIter = Box<dyn Iterator<Item = Value> + Send>;

/// Blocking capability set of one datasource.
///
/// Entities travel as [Value::Document]s; scalar projections as the matching
/// scalar variant. Implementations are shared across threads and never mutated
/// by the interception layer.
pub trait RepositoryOperations: Send + Sync {
    /// First row of `query`, or `None` when nothing matched.
    fn find_one(&self, query: &PreparedQuery) -> DataResult<Option<Value>>;

    fn find_by_id(&self, entity: &PersistentEntity, id: &Value) -> DataResult<Option<Value>>;

    fn find_all(&self, query: &PreparedQuery) -> DataResult<Vec<Value>>;

    /// Every row of an entity, ordered and limited by the query's pageable.
    fn find_all_paged(&self, query: &PagedQuery) -> DataResult<Vec<Value>>;

    fn find_stream(&self, query: &PreparedQuery) -> DataResult<ValueIter>;

    fn find_page(&self, query: &PagedQuery) -> DataResult<Page<Value>>;

    fn exists(&self, query: &PreparedQuery) -> DataResult<bool>;

    /// Number of rows of an entity.
    fn count(&self, query: &PagedQuery) -> DataResult<u64>;

    fn persist(&self, operation: &EntityOperation) -> DataResult<Document>;

    fn persist_all(&self, operation: &BatchOperation) -> DataResult<Vec<Document>>;

    fn update(&self, operation: &EntityOperation) -> DataResult<Document>;

    fn update_all(&self, operation: &BatchOperation) -> DataResult<Vec<Document>>;

    /// Rows affected by a bulk update, when the backend reports it.
    fn execute_update(&self, query: &PreparedQuery) -> DataResult<Option<u64>>;

    fn execute_delete(&self, query: &PreparedQuery) -> DataResult<Option<u64>>;

    fn delete(&self, operation: &EntityOperation) -> DataResult<u64>;

    fn delete_all(&self, operation: &BatchOperation) -> DataResult<Option<u64>>;

    fn conversion_service(&self) -> &ConversionService;

    fn query_builder(&self) -> &dyn QueryBuilder;
}
