use crate::criteria::{QueryBuilder, QueryModel};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::intercept::InterceptorKind;
use crate::metadata::{
    AnnotationMetadata, COUNT_QUERY_MEMBER, DATA_METHOD, INTERCEPTOR_MEMBER, QUERY, REPOSITORY,
    RESULT_TYPE_MEMBER, VALUE_MEMBER,
};
use crate::model::{PersistentEntity, QueryParameterBinding, ResultType};
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, OnceLock};

/// Name and parameter types of a repository method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    name: String,
    parameter_types: Vec<String>,
}

impl MethodSignature {
    pub fn new(name: &str, parameter_types: &[&str]) -> Self {
        MethodSignature {
            name: name.to_string(),
            parameter_types: parameter_types.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }
}

impl Display for MethodSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_types.join(", "))
    }
}

/// Declared return type of a repository method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnType {
    Unit,
    /// Exactly one entity or scalar
    #[default]
    Single,
    Optional,
    List,
    Stream,
    Page,
    Slice,
    /// A reactive stream of results
    Publisher,
    /// A future completing with the result
    CompletionStage,
    /// A raw future the runtime cannot complete
    Future,
}

impl ReturnType {
    pub fn shape(&self) -> ReturnShape {
        match self {
            ReturnType::Publisher => ReturnShape::Publisher,
            ReturnType::CompletionStage => ReturnShape::CompletionStage,
            ReturnType::Future => ReturnShape::Unsupported,
            _ => ReturnShape::Synchronous,
        }
    }
}

/// How the advice delivers a method's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    Synchronous,
    Publisher,
    CompletionStage,
    Unsupported,
}

/// A parameter of a repository method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParameter {
    name: String,
    type_name: String,
}

impl MethodParameter {
    pub fn new(name: &str, type_name: &str) -> Self {
        MethodParameter {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// A repository method as seen by the runtime: its signature, declared return
/// type and the metadata generated for it.
///
/// Cloning is cheap; every clone shares the same method.
#[derive(Clone)]
pub struct ExecutableMethod {
    inner: Arc<ExecutableMethodInner>,
}

struct ExecutableMethodInner {
    repository: String,
    signature: MethodSignature,
    parameters: Vec<MethodParameter>,
    entity: PersistentEntity,
    return_type: ReturnType,
    nullable: bool,
    suspended: bool,
    metadata: AnnotationMetadata,
    query_model: Option<Arc<QueryModel>>,
    count_model: Option<Arc<QueryModel>>,
    bindings: Vec<QueryParameterBinding>,
    count_bindings: Vec<QueryParameterBinding>,
    shape: OnceLock<ReturnShape>,
}

impl ExecutableMethod {
    pub fn builder(repository: &str, name: &str, entity: PersistentEntity) -> ExecutableMethodBuilder {
        ExecutableMethodBuilder::new(repository, name, entity)
    }

    /// Name of the declaring repository.
    pub fn repository(&self) -> &str {
        &self.inner.repository
    }

    pub fn name(&self) -> &str {
        self.inner.signature.name()
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.inner.signature
    }

    pub fn parameters(&self) -> &[MethodParameter] {
        &self.inner.parameters
    }

    pub fn entity(&self) -> &PersistentEntity {
        &self.inner.entity
    }

    pub fn return_type(&self) -> ReturnType {
        self.inner.return_type
    }

    /// Whether the method may legitimately return nothing.
    pub fn is_nullable(&self) -> bool {
        self.inner.nullable || self.inner.return_type == ReturnType::Optional
    }

    /// Whether the method is a suspended function completing through a future.
    pub fn is_suspended(&self) -> bool {
        self.inner.suspended
    }

    pub fn annotation_metadata(&self) -> &AnnotationMetadata {
        &self.inner.metadata
    }

    pub fn string_value(&self, annotation: &str, member: &str) -> Option<&str> {
        self.inner.metadata.string_value(annotation, member)
    }

    pub fn interceptor_name(&self) -> Option<&str> {
        self.string_value(DATA_METHOD, INTERCEPTOR_MEMBER)
    }

    /// Datasource named on the method itself.
    pub fn datasource(&self) -> Option<&str> {
        self.string_value(REPOSITORY, VALUE_MEMBER)
    }

    pub fn query(&self) -> Option<&str> {
        self.string_value(QUERY, VALUE_MEMBER)
    }

    pub fn count_query(&self) -> Option<&str> {
        self.string_value(QUERY, COUNT_QUERY_MEMBER)
    }

    /// Result type override from the metadata; entities when absent.
    pub fn result_type(&self) -> DataResult<ResultType> {
        match self.string_value(DATA_METHOD, RESULT_TYPE_MEMBER) {
            Some(name) => name.parse(),
            None => Ok(ResultType::Entity),
        }
    }

    pub fn query_model(&self) -> Option<&Arc<QueryModel>> {
        self.inner.query_model.as_ref()
    }

    pub fn count_model(&self) -> Option<&Arc<QueryModel>> {
        self.inner.count_model.as_ref()
    }

    pub fn bindings(&self) -> &[QueryParameterBinding] {
        &self.inner.bindings
    }

    pub fn count_bindings(&self) -> &[QueryParameterBinding] {
        &self.inner.count_bindings
    }

    /// Return shape, computed on first use.
    pub fn shape(&self) -> ReturnShape {
        *self.inner.shape.get_or_init(|| {
            let shape = self.inner.return_type.shape();
            log::debug!("Method {} returns {:?}", self, shape);
            shape
        })
    }
}

impl Display for ExecutableMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.inner.repository, self.inner.signature)
    }
}

impl std::fmt::Debug for ExecutableMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableMethod")
            .field("method", &self.to_string())
            .field("return_type", &self.inner.return_type)
            .field("metadata", &self.inner.metadata)
            .finish()
    }
}

enum QuerySource {
    None,
    Raw(String),
    Model(QueryModel),
}

/// Produces the metadata of an [ExecutableMethod].
///
/// Queries given as a [QueryModel] are rendered through a [QueryBuilder];
/// their named parameters are matched to method parameters by name. Methods
/// returning a [ReturnType::Page] get a count query derived from the query
/// model unless one is given.
pub struct ExecutableMethodBuilder {
    repository: String,
    name: String,
    entity: PersistentEntity,
    parameters: Vec<MethodParameter>,
    return_type: ReturnType,
    nullable: bool,
    suspended: bool,
    metadata: AnnotationMetadata,
    query: QuerySource,
    count_query: QuerySource,
    bindings: IndexMap<String, QueryParameterBinding>,
}

impl ExecutableMethodBuilder {
    pub fn new(repository: &str, name: &str, entity: PersistentEntity) -> Self {
        ExecutableMethodBuilder {
            repository: repository.to_string(),
            name: name.to_string(),
            entity,
            parameters: Vec::new(),
            return_type: ReturnType::default(),
            nullable: false,
            suspended: false,
            metadata: AnnotationMetadata::new(),
            query: QuerySource::None,
            count_query: QuerySource::None,
            bindings: IndexMap::new(),
        }
    }

    pub fn parameter(mut self, name: &str, type_name: &str) -> Self {
        self.parameters.push(MethodParameter::new(name, type_name));
        self
    }

    pub fn returns(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn suspended(mut self, suspended: bool) -> Self {
        self.suspended = suspended;
        self
    }

    pub fn interceptor(self, kind: InterceptorKind) -> Self {
        self.annotate(DATA_METHOD, INTERCEPTOR_MEMBER, kind.name())
    }

    pub fn result_type(self, result_type: ResultType) -> Self {
        self.annotate(DATA_METHOD, RESULT_TYPE_MEMBER, &result_type.to_string())
    }

    pub fn datasource(self, name: &str) -> Self {
        self.annotate(REPOSITORY, VALUE_MEMBER, name)
    }

    /// Sets an arbitrary annotation member.
    pub fn annotate(mut self, annotation: &str, member: &str, value: &str) -> Self {
        self.metadata.put(annotation, member, value);
        self
    }

    pub fn query(mut self, query: &str) -> Self {
        self.query = QuerySource::Raw(query.to_string());
        self
    }

    pub fn count_query(mut self, query: &str) -> Self {
        self.count_query = QuerySource::Raw(query.to_string());
        self
    }

    pub fn query_model(mut self, model: QueryModel) -> Self {
        self.query = QuerySource::Model(model);
        self
    }

    pub fn count_model(mut self, model: QueryModel) -> Self {
        self.count_query = QuerySource::Model(model);
        self
    }

    /// Explicit binding; wins over the by-name match for the same parameter.
    pub fn binding(mut self, binding: QueryParameterBinding) -> Self {
        self.bindings.insert(binding.name().to_string(), binding);
        self
    }

    pub fn build(self, query_builder: &dyn QueryBuilder) -> DataResult<ExecutableMethod> {
        let signature = MethodSignature {
            name: self.name.clone(),
            parameter_types: self.parameters.iter().map(|p| p.type_name.clone()).collect(),
        };
        let mut metadata = self.metadata.clone();

        let count_source = match (&self.count_query, &self.query) {
            (QuerySource::None, QuerySource::Model(model)) if self.return_type == ReturnType::Page => {
                QuerySource::Model(model.to_count())
            }
            (QuerySource::Raw(query), _) => QuerySource::Raw(query.clone()),
            (QuerySource::Model(model), _) => QuerySource::Model(model.clone()),
            _ => QuerySource::None,
        };

        let (query_model, bindings) = self.render(&self.query, QUERY, VALUE_MEMBER, &mut metadata, query_builder)?;
        let (count_model, count_bindings) =
            self.render(&count_source, QUERY, COUNT_QUERY_MEMBER, &mut metadata, query_builder)?;

        Ok(ExecutableMethod {
            inner: Arc::new(ExecutableMethodInner {
                repository: self.repository,
                signature,
                parameters: self.parameters,
                entity: self.entity,
                return_type: self.return_type,
                nullable: self.nullable,
                suspended: self.suspended,
                metadata,
                query_model,
                count_model,
                bindings,
                count_bindings,
                shape: OnceLock::new(),
            }),
        })
    }

    fn render(
        &self,
        source: &QuerySource,
        annotation: &str,
        member: &str,
        metadata: &mut AnnotationMetadata,
        query_builder: &dyn QueryBuilder,
    ) -> DataResult<(Option<Arc<QueryModel>>, Vec<QueryParameterBinding>)> {
        match source {
            QuerySource::None => Ok((None, Vec::new())),
            QuerySource::Raw(query) => {
                metadata.put(annotation, member, query);
                Ok((None, self.bindings.values().cloned().collect()))
            }
            QuerySource::Model(model) => {
                let (query, rendered) = query_builder.build_query(model)?.into_parts();
                metadata.put(annotation, member, &query);
                let bindings = rendered
                    .into_iter()
                    .map(|binding| self.bind(binding))
                    .collect::<DataResult<Vec<_>>>()?;
                Ok((Some(Arc::new(model.clone())), bindings))
            }
        }
    }

    fn bind(&self, binding: QueryParameterBinding) -> DataResult<QueryParameterBinding> {
        if binding.constant_value().is_some() || binding.argument_index().is_some() {
            return Ok(binding);
        }
        if let Some(explicit) = self.bindings.get(binding.name()) {
            return Ok(explicit.clone());
        }
        match self.parameters.iter().position(|p| p.name == binding.name()) {
            Some(index) => Ok(binding.with_argument_index(index)),
            None => {
                log::error!(
                    "Query parameter :{} of {}.{} matches no method parameter",
                    binding.name(),
                    self.repository,
                    self.name
                );
                Err(DataError::new(
                    &format!(
                        "Query parameter :{} of {}.{} matches no method parameter",
                        binding.name(),
                        self.repository,
                        self.name
                    ),
                    ErrorKind::IllegalArgument,
                ))
            }
        }
    }
}
