use crate::common::{PropagatedContext, Value, ValueType};
use crate::criteria::QueryModel;
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::model::{Pageable, PersistentEntity};
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// What a query produces per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultType {
    /// Whole entities
    #[default]
    Entity,
    /// A scalar of the given type: a count, a flag or a single property
    Value(ValueType),
    /// A projection of selected properties
    Dto,
}

impl Display for ResultType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultType::Entity => write!(f, "entity"),
            ResultType::Value(vt) => write!(f, "{}", vt),
            ResultType::Dto => write!(f, "dto"),
        }
    }
}

impl FromStr for ResultType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entity" => Ok(ResultType::Entity),
            "dto" => Ok(ResultType::Dto),
            other => ValueType::from_name(other).map(ResultType::Value).ok_or_else(|| {
                log::error!("Unknown result type {}", other);
                DataError::new(&format!("Unknown result type '{}'", other), ErrorKind::IllegalArgument)
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationType {
    #[default]
    Query,
    Count,
    Exists,
    Update,
    Delete,
}

/// Binds one named query parameter to its runtime source.
///
/// A binding reads either a method argument (optionally a property of an entity
/// argument) or a constant embedded when the query was built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParameterBinding {
    name: String,
    argument_index: Option<usize>,
    property: Option<String>,
    constant: Option<Value>,
}

impl QueryParameterBinding {
    /// A parameter with no source yet; processors assign one by name.
    pub fn named(name: &str) -> Self {
        QueryParameterBinding {
            name: name.to_string(),
            argument_index: None,
            property: None,
            constant: None,
        }
    }

    pub fn argument(name: &str, argument_index: usize) -> Self {
        QueryParameterBinding {
            argument_index: Some(argument_index),
            ..QueryParameterBinding::named(name)
        }
    }

    pub fn property(name: &str, argument_index: usize, property: &str) -> Self {
        QueryParameterBinding {
            argument_index: Some(argument_index),
            property: Some(property.to_string()),
            ..QueryParameterBinding::named(name)
        }
    }

    pub fn constant(name: &str, value: Value) -> Self {
        QueryParameterBinding {
            constant: Some(value),
            ..QueryParameterBinding::named(name)
        }
    }

    pub fn with_argument_index(mut self, argument_index: usize) -> Self {
        self.argument_index = Some(argument_index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argument_index(&self) -> Option<usize> {
        self.argument_index
    }

    pub fn property_path(&self) -> Option<&str> {
        self.property.as_deref()
    }

    pub fn constant_value(&self) -> Option<&Value> {
        self.constant.as_ref()
    }
}

/// A query resolved from a repository method's metadata.
///
/// Created once per repository method on first invocation and shared by every
/// later call.
#[derive(Debug, Clone)]
pub struct StoredQuery {
    name: String,
    entity: PersistentEntity,
    result_type: ResultType,
    query: String,
    is_count: bool,
    operation_type: OperationType,
    bindings: Vec<QueryParameterBinding>,
    model: Option<Arc<QueryModel>>,
}

impl StoredQuery {
    pub fn new(name: &str, entity: PersistentEntity, query: &str, result_type: ResultType) -> Self {
        StoredQuery {
            name: name.to_string(),
            entity,
            result_type,
            query: query.to_string(),
            is_count: false,
            operation_type: OperationType::Query,
            bindings: Vec::new(),
            model: None,
        }
    }

    pub fn count(mut self) -> Self {
        self.is_count = true;
        self.operation_type = OperationType::Count;
        self
    }

    pub fn with_operation_type(mut self, operation_type: OperationType) -> Self {
        self.is_count = operation_type == OperationType::Count;
        self.operation_type = operation_type;
        self
    }

    pub fn with_bindings(mut self, bindings: Vec<QueryParameterBinding>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_model(mut self, model: Arc<QueryModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Name of the repository method this query belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_count(&self) -> bool {
        self.is_count
    }

    pub fn is_dto(&self) -> bool {
        self.result_type == ResultType::Dto
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn bindings(&self) -> &[QueryParameterBinding] {
        &self.bindings
    }

    pub fn model(&self) -> Option<&Arc<QueryModel>> {
        self.model.as_ref()
    }
}

/// A [StoredQuery] bound to the values of one invocation.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    stored: Arc<StoredQuery>,
    parameter_values: IndexMap<String, Value>,
    pageable: Pageable,
    context: PropagatedContext,
}

impl PreparedQuery {
    pub fn new(
        stored: Arc<StoredQuery>,
        parameter_values: IndexMap<String, Value>,
        pageable: Pageable,
        context: PropagatedContext,
    ) -> Self {
        PreparedQuery {
            stored,
            parameter_values,
            pageable,
            context,
        }
    }

    pub fn stored(&self) -> &Arc<StoredQuery> {
        &self.stored
    }

    pub fn query(&self) -> &str {
        self.stored.query()
    }

    pub fn entity(&self) -> &PersistentEntity {
        self.stored.entity()
    }

    pub fn result_type(&self) -> ResultType {
        self.stored.result_type()
    }

    pub fn is_count(&self) -> bool {
        self.stored.is_count()
    }

    pub fn model(&self) -> Option<&Arc<QueryModel>> {
        self.stored.model()
    }

    pub fn parameter_values(&self) -> &IndexMap<String, Value> {
        &self.parameter_values
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameter_values.get(name)
    }

    pub fn pageable(&self) -> &Pageable {
        &self.pageable
    }

    pub fn context(&self) -> &PropagatedContext {
        &self.context
    }

    pub fn with_pageable(&self, pageable: Pageable) -> PreparedQuery {
        PreparedQuery {
            pageable,
            ..self.clone()
        }
    }
}

/// A query-less request over every row of an entity.
#[derive(Debug, Clone)]
pub struct PagedQuery {
    entity: PersistentEntity,
    pageable: Pageable,
    context: PropagatedContext,
}

impl PagedQuery {
    pub fn new(entity: PersistentEntity, pageable: Pageable, context: PropagatedContext) -> Self {
        PagedQuery {
            entity,
            pageable,
            context,
        }
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    pub fn pageable(&self) -> &Pageable {
        &self.pageable
    }

    pub fn context(&self) -> &PropagatedContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::val;

    #[test]
    fn result_type_parses_metadata_names() {
        assert_eq!("entity".parse::<ResultType>().unwrap(), ResultType::Entity);
        assert_eq!("dto".parse::<ResultType>().unwrap(), ResultType::Dto);
        assert_eq!("i64".parse::<ResultType>().unwrap(), ResultType::Value(ValueType::I64));
        assert!("map".parse::<ResultType>().is_err());
        assert_eq!(ResultType::Value(ValueType::I32).to_string(), "i32");
    }

    #[test]
    fn bindings_describe_their_source() {
        let binding = QueryParameterBinding::property("p1", 0, "name");
        assert_eq!(binding.argument_index(), Some(0));
        assert_eq!(binding.property_path(), Some("name"));
        let constant = QueryParameterBinding::constant("p2", val!(3));
        assert_eq!(constant.constant_value(), Some(&val!(3)));
        assert_eq!(QueryParameterBinding::named("age").with_argument_index(2).argument_index(), Some(2));
    }

    #[test]
    fn stored_query_flags() {
        let entity = PersistentEntity::new("Person", "id");
        let stored = StoredQuery::new("count", entity, "SELECT COUNT(person_) FROM Person person_", ResultType::Value(ValueType::I64)).count();
        assert!(stored.is_count());
        assert_eq!(stored.operation_type(), OperationType::Count);
        assert!(!stored.is_dto());
    }

    #[test]
    fn prepared_query_carries_values() {
        let entity = PersistentEntity::new("Person", "id");
        let stored = Arc::new(StoredQuery::new("findByName", entity, "q", ResultType::Entity));
        let mut values = IndexMap::new();
        values.insert("name".to_string(), val!("Ada"));
        let prepared = PreparedQuery::new(stored, values, Pageable::unpaged(), PropagatedContext::empty());
        assert_eq!(prepared.parameter("name"), Some(&val!("Ada")));
        assert_eq!(prepared.query(), "q");
        let paged = prepared.with_pageable(Pageable::from(1, 5).unwrap());
        assert_eq!(paged.pageable().offset(), 5);
        assert!(prepared.pageable().is_unpaged());
    }
}
