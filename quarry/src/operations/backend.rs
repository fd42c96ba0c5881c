use crate::common::TaskExecutor;
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::operations::{
    AsyncRepositoryOperations, ExecutorAsyncOperations, ExecutorReactiveOperations,
    ReactiveRepositoryOperations, RepositoryOperations,
};
use dashmap::DashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, OnceLock};

/// The call shape an interceptor needs from its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blocking,
    Async,
    Reactive,
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Blocking => write!(f, "blocking"),
            Capability::Async => write!(f, "async"),
            Capability::Reactive => write!(f, "reactive"),
        }
    }
}

/// A datasource implementation, in the shape it natively supports.
#[derive(Clone)]
pub enum Backend {
    Blocking(Arc<dyn RepositoryOperations>),
    Async(Arc<dyn AsyncRepositoryOperations>),
    Reactive(Arc<dyn ReactiveRepositoryOperations>),
}

impl Backend {
    pub fn capability(&self) -> Capability {
        match self {
            Backend::Blocking(_) => Capability::Blocking,
            Backend::Async(_) => Capability::Async,
            Backend::Reactive(_) => Capability::Reactive,
        }
    }

    pub fn into_blocking(self) -> DataResult<Arc<dyn RepositoryOperations>> {
        match self {
            Backend::Blocking(ops) => Ok(ops),
            other => Err(capability_error(other.capability(), Capability::Blocking)),
        }
    }

    pub fn into_async(self) -> DataResult<Arc<dyn AsyncRepositoryOperations>> {
        match self {
            Backend::Async(ops) => Ok(ops),
            other => Err(capability_error(other.capability(), Capability::Async)),
        }
    }

    pub fn into_reactive(self) -> DataResult<Arc<dyn ReactiveRepositoryOperations>> {
        match self {
            Backend::Reactive(ops) => Ok(ops),
            other => Err(capability_error(other.capability(), Capability::Reactive)),
        }
    }
}

impl Debug for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Backend({})", self.capability())
    }
}

fn capability_error(actual: Capability, required: Capability) -> DataError {
    log::error!("Backend is {} but {} operations are required", actual, required);
    DataError::new(
        &format!("Backend is {} but {} operations are required", actual, required),
        ErrorKind::IllegalArgument,
    )
}

/// A registered datasource and its lazily created adapters.
///
/// A blocking backend can also be used asynchronously and reactively through
/// executor-backed wrappers. Each wrapper is created at most once per
/// datasource.
pub struct OperationsBean {
    name: String,
    backend: Backend,
    executor: Arc<dyn TaskExecutor>,
    async_operations: OnceLock<Arc<dyn AsyncRepositoryOperations>>,
    reactive_operations: OnceLock<Arc<dyn ReactiveRepositoryOperations>>,
}

impl OperationsBean {
    pub fn new(name: &str, backend: Backend, executor: Arc<dyn TaskExecutor>) -> Self {
        OperationsBean {
            name: name.to_string(),
            backend,
            executor,
            async_operations: OnceLock::new(),
            reactive_operations: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn supports(&self, capability: Capability) -> bool {
        matches!(
            (&self.backend, capability),
            (Backend::Blocking(_), _)
                | (Backend::Async(_), Capability::Async | Capability::Reactive)
                | (Backend::Reactive(_), Capability::Reactive)
        )
    }

    pub fn blocking(&self) -> DataResult<Arc<dyn RepositoryOperations>> {
        self.backend.clone().into_blocking()
    }

    pub fn async_operations(&self) -> DataResult<Arc<dyn AsyncRepositoryOperations>> {
        match &self.backend {
            Backend::Async(ops) => Ok(ops.clone()),
            Backend::Blocking(ops) => Ok(self
                .async_operations
                .get_or_init(|| {
                    log::debug!("Creating async operations for datasource {}", self.name);
                    Arc::new(ExecutorAsyncOperations::new(ops.clone(), self.executor.clone()))
                        as Arc<dyn AsyncRepositoryOperations>
                })
                .clone()),
            Backend::Reactive(_) => Err(capability_error(Capability::Reactive, Capability::Async)),
        }
    }

    pub fn reactive_operations(&self) -> DataResult<Arc<dyn ReactiveRepositoryOperations>> {
        if let Backend::Reactive(ops) = &self.backend {
            return Ok(ops.clone());
        }
        if let Some(ops) = self.reactive_operations.get() {
            return Ok(ops.clone());
        }
        let async_operations = self.async_operations()?;
        Ok(self
            .reactive_operations
            .get_or_init(|| {
                log::debug!("Creating reactive operations for datasource {}", self.name);
                Arc::new(ExecutorReactiveOperations::new(async_operations))
                    as Arc<dyn ReactiveRepositoryOperations>
            })
            .clone())
    }

    /// This datasource adapted to `capability`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` when the backend cannot be presented in that
    /// shape, e.g. a reactive-only backend used by a blocking interceptor.
    pub fn adapt(&self, capability: Capability) -> DataResult<Backend> {
        match capability {
            Capability::Blocking => self.blocking().map(Backend::Blocking),
            Capability::Async => self.async_operations().map(Backend::Async),
            Capability::Reactive => self.reactive_operations().map(Backend::Reactive),
        }
    }
}

/// Named datasources plus the name of the primary one.
pub struct DatasourceRegistry {
    datasources: DashMap<String, Arc<OperationsBean>>,
    primary: String,
    executor: Arc<dyn TaskExecutor>,
}

impl DatasourceRegistry {
    pub fn new(primary: &str, executor: Arc<dyn TaskExecutor>) -> Self {
        DatasourceRegistry {
            datasources: DashMap::new(),
            primary: primary.to_string(),
            executor,
        }
    }

    pub fn register(&self, name: &str, backend: Backend) -> Arc<OperationsBean> {
        let bean = Arc::new(OperationsBean::new(name, backend, self.executor.clone()));
        if self.datasources.insert(name.to_string(), bean.clone()).is_some() {
            log::warn!("Datasource {} was registered twice, keeping the latest", name);
        }
        bean
    }

    pub fn get(&self, name: &str) -> Option<Arc<OperationsBean>> {
        self.datasources.get(name).map(|entry| entry.value().clone())
    }

    pub fn primary_name(&self) -> &str {
        &self.primary
    }

    pub fn primary(&self) -> Option<Arc<OperationsBean>> {
        self.get(&self.primary)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.datasources.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.datasources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasources.is_empty()
    }
}
