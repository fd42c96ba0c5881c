use crate::common::{ConversionService, Document, Value};
use crate::criteria::{JpqlQueryBuilder, Projection, QueryBuilder, QueryKind, QueryModel};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::memory::evaluator::{paginate, sort_documents, Evaluator};
use crate::model::{BatchOperation, EntityOperation, Page, PagedQuery, PersistentEntity, PreparedQuery};
use crate::operations::{RepositoryOperations, ValueIter};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of most recent statement texts kept by the in-memory backend.
pub const STATEMENT_LOG_CAPACITY: usize = 256;

/// A [RepositoryOperations] backend keeping every entity in memory.
///
/// Queries are executed from their [QueryModel]; the rendered text is only
/// recorded. Every executed statement is counted, so tests can observe how
/// many round trips a repository call costs. Only the last
/// [STATEMENT_LOG_CAPACITY] statement texts are retained.
pub struct InMemoryRepositoryOperations {
    tables: DashMap<String, IndexMap<Value, Document>>,
    sequence: AtomicU64,
    statement_count: AtomicUsize,
    statements: Mutex<VecDeque<String>>,
    conversion_service: ConversionService,
    query_builder: Arc<dyn QueryBuilder>,
}

impl Default for InMemoryRepositoryOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepositoryOperations {
    pub fn new() -> Self {
        InMemoryRepositoryOperations::with_query_builder(Arc::new(JpqlQueryBuilder))
    }

    pub fn with_query_builder(query_builder: Arc<dyn QueryBuilder>) -> Self {
        InMemoryRepositoryOperations {
            tables: DashMap::new(),
            sequence: AtomicU64::new(0),
            statement_count: AtomicUsize::new(0),
            statements: Mutex::new(VecDeque::with_capacity(STATEMENT_LOG_CAPACITY)),
            conversion_service: ConversionService::new(),
            query_builder,
        }
    }

    /// Number of statements executed since creation or the last reset.
    pub fn statement_count(&self) -> usize {
        self.statement_count.load(Ordering::SeqCst)
    }

    /// Text of the most recent statements, oldest first.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().iter().cloned().collect()
    }

    pub fn reset_statements(&self) {
        let mut statements = self.statements.lock();
        statements.clear();
        self.statement_count.store(0, Ordering::SeqCst);
    }

    /// Number of stored rows of `entity`.
    pub fn size(&self, entity: &PersistentEntity) -> usize {
        self.tables.get(entity.name()).map(|t| t.len()).unwrap_or(0)
    }

    fn record(&self, statement: String) {
        log::debug!("Executing: {}", statement);
        let mut statements = self.statements.lock();
        if statements.len() == STATEMENT_LOG_CAPACITY {
            statements.pop_front();
        }
        statements.push_back(statement);
        self.statement_count.fetch_add(1, Ordering::SeqCst);
    }

    fn rows(&self, entity: &PersistentEntity) -> Vec<Document> {
        self.tables
            .get(entity.name())
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    fn model<'q>(&self, query: &'q PreparedQuery, kind: QueryKind) -> DataResult<&'q Arc<QueryModel>> {
        let model = query.model().ok_or_else(|| {
            log::error!("In-memory backend cannot execute raw query {}", query.query());
            DataError::new(
                &format!("In-memory backend cannot execute raw query '{}'", query.query()),
                ErrorKind::UnsupportedOperation,
            )
        })?;
        if model.kind() != kind {
            log::error!("Query {} is not a {:?} statement", query.query(), kind);
            return Err(DataError::new(
                &format!("Query '{}' is not a {:?} statement", query.query(), kind),
                ErrorKind::IllegalArgument,
            ));
        }
        Ok(model)
    }

    fn select(&self, query: &PreparedQuery) -> DataResult<Vec<Value>> {
        let model = self.model(query, QueryKind::Select)?;
        self.record(format!("{}{}", query.query(), self.query_builder.build_pagination(query.pageable())));
        let rows = self.rows(model.entity());
        Evaluator::new(query.parameter_values()).select(model, query.pageable(), rows)
    }

    fn render(&self, model: &QueryModel) -> String {
        match self.query_builder.build_query(model) {
            Ok(result) => result.into_parts().0,
            Err(err) => format!("<unrenderable: {}>", err),
        }
    }

    fn next_id(&self) -> Value {
        Value::U64(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Inserts every document or none of them.
    fn insert(&self, entity: &PersistentEntity, documents: &[Document]) -> DataResult<Vec<Document>> {
        let mut table = self.tables.entry(entity.name().to_string()).or_default();
        let mut staged = IndexMap::with_capacity(documents.len());
        for document in documents {
            let mut document = document.clone();
            let id = match document.get(entity.id_property()) {
                Value::Null => {
                    let id = self.next_id();
                    document.put(entity.id_property(), id.clone())?;
                    id
                }
                id => id,
            };
            if table.contains_key(&id) || staged.contains_key(&id) {
                log::error!("Duplicate id {} for {}", id, entity);
                return Err(DataError::new(
                    &format!("Duplicate id {} for {}", id, entity),
                    ErrorKind::Backend,
                ));
            }
            staged.insert(id, document);
        }
        let inserted = staged.values().cloned().collect();
        table.extend(staged);
        Ok(inserted)
    }

    /// Replaces every document or none of them.
    fn replace(&self, entity: &PersistentEntity, documents: &[Document]) -> DataResult<Vec<Document>> {
        let mut table = self.tables.entry(entity.name().to_string()).or_default();
        if let Some(id) = documents
            .iter()
            .map(|document| document.get(entity.id_property()))
            .find(|id| !table.contains_key(id))
        {
            log::error!("No {} with id {} to update", entity, id);
            return Err(DataError::new(
                &format!("No {} with id {} to update", entity, id),
                ErrorKind::Backend,
            ));
        }
        for document in documents {
            table.insert(document.get(entity.id_property()), document.clone());
        }
        Ok(documents.to_vec())
    }

    fn single(entity: &PersistentEntity, mut documents: Vec<Document>) -> DataResult<Document> {
        documents.pop().ok_or_else(|| {
            DataError::new(&format!("No {} was written", entity), ErrorKind::Internal)
        })
    }

    fn remove(&self, entity: &PersistentEntity, id: &Value) -> u64 {
        match self.tables.get_mut(entity.name()) {
            Some(mut table) => table.shift_remove(id).map(|_| 1).unwrap_or(0),
            None => 0,
        }
    }
}

impl RepositoryOperations for InMemoryRepositoryOperations {
    fn find_one(&self, query: &PreparedQuery) -> DataResult<Option<Value>> {
        Ok(self.select(query)?.into_iter().next())
    }

    fn find_by_id(&self, entity: &PersistentEntity, id: &Value) -> DataResult<Option<Value>> {
        let alias = entity.alias();
        self.record(format!(
            "SELECT {} FROM {} {} WHERE ({}.{} = :id)",
            alias, entity.name(), alias, alias, entity.id_property()
        ));
        Ok(self
            .tables
            .get(entity.name())
            .and_then(|table| table.get(id).cloned())
            .map(Value::Document))
    }

    fn find_all(&self, query: &PreparedQuery) -> DataResult<Vec<Value>> {
        self.select(query)
    }

    fn find_all_paged(&self, query: &PagedQuery) -> DataResult<Vec<Value>> {
        let model = QueryModel::select(query.entity().clone()).with_sort(query.pageable().sort().clone());
        self.record(format!(
            "{}{}",
            self.render(&model),
            self.query_builder.build_pagination(query.pageable())
        ));
        let mut rows = self.rows(query.entity());
        sort_documents(&mut rows, query.pageable().sort());
        Ok(paginate(rows, query.pageable()).into_iter().map(Value::Document).collect())
    }

    fn find_stream(&self, query: &PreparedQuery) -> DataResult<ValueIter> {
        Ok(Box::new(self.select(query)?.into_iter()))
    }

    fn find_page(&self, query: &PagedQuery) -> DataResult<Page<Value>> {
        let content = self.find_all_paged(query)?;
        let total = if query.pageable().is_unpaged() {
            content.len() as u64
        } else {
            self.count(query)?
        };
        Ok(Page::new(content, query.pageable().clone(), total))
    }

    fn exists(&self, query: &PreparedQuery) -> DataResult<bool> {
        let rows = self.select(query)?;
        let projection = query.model().map(|m| m.projection().clone()).unwrap_or_default();
        Ok(match projection {
            Projection::Exists => rows.first().and_then(|v| v.as_bool().copied()).unwrap_or(false),
            Projection::Count | Projection::CountDistinct(_) => rows.first().and_then(|v| v.as_integer()).unwrap_or(0) > 0,
            _ => !rows.is_empty(),
        })
    }

    fn count(&self, query: &PagedQuery) -> DataResult<u64> {
        self.record(self.render(&QueryModel::count(query.entity().clone())));
        Ok(self.size(query.entity()) as u64)
    }

    fn persist(&self, operation: &EntityOperation) -> DataResult<Document> {
        self.record(format!("INSERT INTO {}", operation.entity()));
        let inserted = self.insert(operation.entity(), std::slice::from_ref(operation.document()))?;
        Self::single(operation.entity(), inserted)
    }

    fn persist_all(&self, operation: &BatchOperation) -> DataResult<Vec<Document>> {
        self.record(format!("INSERT INTO {} ({} rows)", operation.entity(), operation.len()));
        self.insert(operation.entity(), operation.documents())
    }

    fn update(&self, operation: &EntityOperation) -> DataResult<Document> {
        self.record(format!("UPDATE {}", operation.entity()));
        let replaced = self.replace(operation.entity(), std::slice::from_ref(operation.document()))?;
        Self::single(operation.entity(), replaced)
    }

    fn update_all(&self, operation: &BatchOperation) -> DataResult<Vec<Document>> {
        self.record(format!("UPDATE {} ({} rows)", operation.entity(), operation.len()));
        self.replace(operation.entity(), operation.documents())
    }

    fn execute_update(&self, query: &PreparedQuery) -> DataResult<Option<u64>> {
        let model = self.model(query, QueryKind::Update)?;
        self.record(query.query().to_string());
        let evaluator = Evaluator::new(query.parameter_values());

        let mut table = self.tables.entry(model.entity().name().to_string()).or_default();
        let mut updated = 0;
        for document in table.values_mut() {
            if !evaluator.matches(model.predicate(), document)? {
                continue;
            }
            let mut changed = document.clone();
            for (property, value) in model.assignments() {
                changed.put(property, evaluator.value(value, document)?)?;
            }
            *document = changed;
            updated += 1;
        }
        Ok(Some(updated))
    }

    fn execute_delete(&self, query: &PreparedQuery) -> DataResult<Option<u64>> {
        let model = self.model(query, QueryKind::Delete)?;
        self.record(query.query().to_string());
        let evaluator = Evaluator::new(query.parameter_values());

        let mut table = self.tables.entry(model.entity().name().to_string()).or_default();
        let mut doomed = Vec::new();
        for (id, document) in table.iter() {
            if evaluator.matches(model.predicate(), document)? {
                doomed.push(id.clone());
            }
        }
        for id in &doomed {
            table.shift_remove(id);
        }
        Ok(Some(doomed.len() as u64))
    }

    fn delete(&self, operation: &EntityOperation) -> DataResult<u64> {
        self.record(format!("DELETE {}", operation.entity()));
        Ok(self.remove(operation.entity(), &operation.id()))
    }

    fn delete_all(&self, operation: &BatchOperation) -> DataResult<Option<u64>> {
        self.record(format!("DELETE {} ({} rows)", operation.entity(), operation.len()));
        let entity = operation.entity();
        let removed = operation
            .documents()
            .iter()
            .map(|doc| self.remove(entity, &doc.get(entity.id_property())))
            .sum();
        Ok(Some(removed))
    }

    fn conversion_service(&self) -> &ConversionService {
        &self.conversion_service
    }

    fn query_builder(&self) -> &dyn QueryBuilder {
        self.query_builder.as_ref()
    }
}
