use quarry::common::{Convertible, Document, PropagatedContext, SpawnExecutor, Value, ValueType};
use quarry::criteria::{CriteriaBuilder, Expression, JpqlQueryBuilder, QueryModel};
use quarry::doc;
use quarry::errors::{DataError, DataResult, ErrorKind};
use quarry::intercept::{InterceptorKind, MethodResult, RepositoryBean};
use quarry::memory::InMemoryRepositoryOperations;
use quarry::metadata::{Argument, ExecutableMethod, ExecutableMethodBuilder, MethodInvocationContext, ReturnType};
use quarry::model::{BatchOperation, DataEntity, PersistentEntity, ResultType};
use quarry::operations::{Backend, RepositoryOperations};
use quarry::runtime::{Quarry, QuarryBuilder};
use std::sync::Arc;

pub const REPOSITORY: &str = "PersonRepository";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: Option<u64>,
    pub name: String,
    pub age: i64,
    pub city: String,
}

impl Person {
    pub fn new(name: &str, age: i64, city: &str) -> Self {
        Person {
            id: None,
            name: name.to_string(),
            age,
            city: city.to_string(),
        }
    }
}

impl Convertible for Person {
    type Output = Person;

    fn to_value(&self) -> DataResult<Value> {
        let mut document = doc! {
            "name": (self.name.clone()),
            "age": (self.age),
            "city": (self.city.clone()),
        };
        if let Some(id) = self.id {
            document.put("id", id)?;
        }
        Ok(Value::Document(document))
    }

    fn from_value(value: &Value) -> DataResult<Self::Output> {
        let document = Document::from_value(value)?;
        let string = |key: &str| document.get(key).as_string().cloned().unwrap_or_default();
        Ok(Person {
            id: document.get("id").as_integer().map(|id| id as u64),
            name: string("name"),
            age: document.get("age").as_integer().map(|age| age as i64).unwrap_or_default(),
            city: string("city"),
        })
    }
}

impl DataEntity for Person {
    fn persistent_entity() -> PersistentEntity {
        PersistentEntity::new("Person", "id")
    }
}

/// Ten people in London, two in Paris.
pub fn people() -> Vec<Person> {
    let london = [
        ("Ada", 36),
        ("Alan", 41),
        ("Charles", 79),
        ("Dorothy", 84),
        ("Florence", 90),
        ("Isaac", 84),
        ("Jane", 41),
        ("Mary", 53),
        ("Rosalind", 37),
        ("Tim", 69),
    ];
    let mut people: Vec<Person> = london.iter().map(|(name, age)| Person::new(name, *age, "London")).collect();
    people.push(Person::new("Marie", 66, "Paris"));
    people.push(Person::new("Blaise", 39, "Paris"));
    people
}

/// An in-memory backend holding [people], with its statement log cleared.
pub fn create_backend() -> DataResult<Arc<InMemoryRepositoryOperations>> {
    let backend = Arc::new(InMemoryRepositoryOperations::new());
    let documents = people()
        .iter()
        .map(|person| person.to_value().and_then(|value| Document::from_value(&value)))
        .collect::<DataResult<Vec<_>>>()?;
    backend.persist_all(&BatchOperation::new(
        Person::persistent_entity(),
        documents,
        PropagatedContext::empty(),
    ))?;
    backend.reset_statements();
    Ok(backend)
}

/// A runtime over `backend` as the default datasource, running async work on
/// fresh threads.
pub fn builder(backend: Arc<InMemoryRepositoryOperations>) -> QuarryBuilder {
    Quarry::builder()
        .executor(Arc::new(SpawnExecutor))
        .datasource("default", Backend::Blocking(backend))
}

pub struct TestContext {
    quarry: Quarry,
    backend: Arc<InMemoryRepositoryOperations>,
}

impl TestContext {
    pub fn quarry(&self) -> &Quarry {
        &self.quarry
    }

    pub fn backend(&self) -> &Arc<InMemoryRepositoryOperations> {
        &self.backend
    }

    pub fn repository(&self) -> RepositoryBean {
        self.quarry.repository(REPOSITORY)
    }

    pub fn call(&self, bean: &RepositoryBean, method: &ExecutableMethod, arguments: Vec<Argument>) -> DataResult<MethodResult> {
        self.quarry
            .intercept(bean, &MethodInvocationContext::new(method.clone(), arguments))
    }
}

pub fn create_test_context() -> DataResult<TestContext> {
    let backend = create_backend()?;
    let quarry = builder(backend.clone()).build()?;
    Ok(TestContext { quarry, backend })
}

pub fn method(name: &str, kind: InterceptorKind, return_type: ReturnType) -> ExecutableMethodBuilder {
    ExecutableMethod::builder(REPOSITORY, name, Person::persistent_entity())
        .interceptor(kind)
        .returns(return_type)
}

pub fn by_city() -> QueryModel {
    QueryModel::select(Person::persistent_entity()).with_predicate(Some(
        CriteriaBuilder.equal(Expression::property("city"), Expression::parameter("city")),
    ))
}

/// `findByCity(city, pageable)` dispatched through `kind`.
pub fn find_by_city(kind: InterceptorKind, return_type: ReturnType) -> DataResult<ExecutableMethod> {
    method("findByCity", kind, return_type)
        .parameter("city", "String")
        .parameter("pageable", "Pageable")
        .query_model(by_city())
        .build(&JpqlQueryBuilder)
}

/// `countByCity(city)` returning a 64-bit count.
pub fn count_by_city(kind: InterceptorKind, return_type: ReturnType) -> DataResult<ExecutableMethod> {
    method("countByCity", kind, return_type)
        .parameter("city", "String")
        .result_type(ResultType::Value(ValueType::I64))
        .query_model(QueryModel::count(Person::persistent_entity()).with_predicate(by_city().predicate().cloned()))
        .build(&JpqlQueryBuilder)
}

/// A method over specification arguments, e.g. `findAll(spec, pageable)`.
pub fn specification_method(name: &str, kind: InterceptorKind, return_type: ReturnType) -> DataResult<ExecutableMethod> {
    method(name, kind, return_type)
        .parameter("spec", "Specification")
        .parameter("pageable", "Pageable")
        .build(&JpqlQueryBuilder)
}

pub fn city(name: &str) -> Argument {
    Argument::Value(Value::from(name))
}

/// Reads the people of a list-like result.
pub fn into_people(result: MethodResult) -> DataResult<Vec<Person>> {
    result.into_entities::<Person>()
}

/// Reads a count result.
pub fn into_count(result: MethodResult) -> DataResult<i64> {
    match result.into_optional()? {
        Some(Value::I64(count)) => Ok(count),
        other => Err(DataError::new(
            &format!("Expected a 64-bit count, got {:?}", other),
            ErrorKind::IllegalState,
        )),
    }
}
