use crate::errors::{DataError, DataResult, ErrorKind};
use crate::intercept::*;
use crate::operations::{Backend, Capability};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

type NoArgConstructor = dyn Fn() -> DataResult<Arc<dyn DataInterceptor>> + Send + Sync;
type OperationsConstructor = dyn Fn(Backend) -> DataResult<Arc<dyn DataInterceptor>> + Send + Sync;

/// How an interceptor is created.
///
/// Some interceptors need nothing; most need the datasource operations in the
/// shape named by their [Capability].
#[derive(Clone)]
pub enum InterceptorFactory {
    NoArg(Arc<NoArgConstructor>),
    WithOperations(Capability, Arc<OperationsConstructor>),
}

impl InterceptorFactory {
    pub fn no_arg<F>(constructor: F) -> Self
    where
        F: Fn() -> DataResult<Arc<dyn DataInterceptor>> + Send + Sync + 'static,
    {
        InterceptorFactory::NoArg(Arc::new(constructor))
    }

    pub fn with_operations<F>(capability: Capability, constructor: F) -> Self
    where
        F: Fn(Backend) -> DataResult<Arc<dyn DataInterceptor>> + Send + Sync + 'static,
    {
        InterceptorFactory::WithOperations(capability, Arc::new(constructor))
    }

    /// Capability required from the datasource, if any.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            InterceptorFactory::NoArg(_) => None,
            InterceptorFactory::WithOperations(capability, _) => Some(*capability),
        }
    }
}

/// Creates a built-in interceptor over an already adapted backend.
fn create_builtin(kind: InterceptorKind, backend: Backend) -> DataResult<Arc<dyn DataInterceptor>> {
    use InterceptorKind::*;

    let interceptor: Arc<dyn DataInterceptor> = match kind {
        FindOne => Arc::new(FindOneInterceptor::new(backend.into_blocking()?)),
        FindOptional => Arc::new(FindOptionalInterceptor::new(backend.into_blocking()?)),
        FindById => Arc::new(FindByIdInterceptor::new(backend.into_blocking()?)),
        FindAll => Arc::new(FindAllInterceptor::new(backend.into_blocking()?)),
        FindPage => Arc::new(FindPageInterceptor::new(backend.into_blocking()?)),
        FindSlice => Arc::new(FindSliceInterceptor::new(backend.into_blocking()?)),
        FindStream => Arc::new(FindStreamInterceptor::new(backend.into_blocking()?)),
        Count => Arc::new(CountInterceptor::new(backend.into_blocking()?)),
        Exists => Arc::new(ExistsInterceptor::new(backend.into_blocking()?)),
        Save => Arc::new(SaveInterceptor::new(backend.into_blocking()?)),
        SaveAll => Arc::new(SaveAllInterceptor::new(backend.into_blocking()?)),
        Update => Arc::new(UpdateInterceptor::new(backend.into_blocking()?)),
        UpdateAll => Arc::new(UpdateAllInterceptor::new(backend.into_blocking()?)),
        UpdateQuery => Arc::new(UpdateQueryInterceptor::new(backend.into_blocking()?)),
        Delete => Arc::new(DeleteInterceptor::new(backend.into_blocking()?)),
        DeleteAll => Arc::new(DeleteAllInterceptor::new(backend.into_blocking()?)),
        DeleteQuery => Arc::new(DeleteQueryInterceptor::new(backend.into_blocking()?)),
        FindOneSpecification => Arc::new(FindOneSpecificationInterceptor::new(backend.into_blocking()?)),
        FindAllSpecification => Arc::new(FindAllSpecificationInterceptor::new(backend.into_blocking()?)),
        FindPageSpecification => Arc::new(FindPageSpecificationInterceptor::new(backend.into_blocking()?)),
        CountSpecification => Arc::new(CountSpecificationInterceptor::new(backend.into_blocking()?)),
        ExistsSpecification => Arc::new(ExistsSpecificationInterceptor::new(backend.into_blocking()?)),
        DeleteAllSpecification => Arc::new(DeleteAllSpecificationInterceptor::new(backend.into_blocking()?)),
        UpdateAllSpecification => Arc::new(UpdateAllSpecificationInterceptor::new(backend.into_blocking()?)),

        FindOneAsync => Arc::new(FindOneAsyncInterceptor::new(backend.into_async()?)),
        FindByIdAsync => Arc::new(FindByIdAsyncInterceptor::new(backend.into_async()?)),
        FindAllAsync => Arc::new(FindAllAsyncInterceptor::new(backend.into_async()?)),
        FindPageAsync => Arc::new(FindPageAsyncInterceptor::new(backend.into_async()?)),
        CountAsync => Arc::new(CountAsyncInterceptor::new(backend.into_async()?)),
        ExistsAsync => Arc::new(ExistsAsyncInterceptor::new(backend.into_async()?)),
        SaveAsync => Arc::new(SaveAsyncInterceptor::new(backend.into_async()?)),
        UpdateQueryAsync => Arc::new(UpdateQueryAsyncInterceptor::new(backend.into_async()?)),
        DeleteAllAsync => Arc::new(DeleteAllAsyncInterceptor::new(backend.into_async()?)),

        FindOneReactive => Arc::new(FindOneReactiveInterceptor::new(backend.into_reactive()?)),
        FindByIdReactive => Arc::new(FindByIdReactiveInterceptor::new(backend.into_reactive()?)),
        FindAllReactive => Arc::new(FindAllReactiveInterceptor::new(backend.into_reactive()?)),
        FindPageReactive => Arc::new(FindPageReactiveInterceptor::new(backend.into_reactive()?)),
        CountReactive => Arc::new(CountReactiveInterceptor::new(backend.into_reactive()?)),
        ExistsReactive => Arc::new(ExistsReactiveInterceptor::new(backend.into_reactive()?)),
        SaveReactive => Arc::new(SaveReactiveInterceptor::new(backend.into_reactive()?)),
        UpdateQueryReactive => Arc::new(UpdateQueryReactiveInterceptor::new(backend.into_reactive()?)),
        DeleteAllReactive => Arc::new(DeleteAllReactiveInterceptor::new(backend.into_reactive()?)),
        FindOneReactiveSpecification => {
            Arc::new(FindOneReactiveSpecificationInterceptor::new(backend.into_reactive()?))
        }
        FindAllReactiveSpecification => {
            Arc::new(FindAllReactiveSpecificationInterceptor::new(backend.into_reactive()?))
        }
        FindPageReactiveSpecification => {
            Arc::new(FindPageReactiveSpecificationInterceptor::new(backend.into_reactive()?))
        }
        CountReactiveSpecification => Arc::new(CountReactiveSpecificationInterceptor::new(backend.into_reactive()?)),
        ExistsReactiveSpecification => {
            Arc::new(ExistsReactiveSpecificationInterceptor::new(backend.into_reactive()?))
        }
        DeleteAllReactiveSpecification => {
            Arc::new(DeleteAllReactiveSpecificationInterceptor::new(backend.into_reactive()?))
        }
        UpdateAllReactiveSpecification => {
            Arc::new(UpdateAllReactiveSpecificationInterceptor::new(backend.into_reactive()?))
        }
    };
    Ok(interceptor)
}

/// Interceptor factories by the name method metadata refers to them with.
///
/// Names are unique; registering a name again replaces its factory.
pub struct InterceptorRegistry {
    factories: RwLock<IndexMap<String, InterceptorFactory>>,
}

impl Default for InterceptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        InterceptorRegistry {
            factories: RwLock::new(IndexMap::new()),
        }
    }

    /// A registry holding every built-in interceptor.
    pub fn with_defaults() -> Self {
        let registry = InterceptorRegistry::new();
        for kind in InterceptorKind::ALL {
            registry.register_kind(*kind);
        }
        registry
    }

    pub fn register(&self, name: &str, factory: InterceptorFactory) {
        let mut factories = self.factories.write();
        if factories.insert(name.to_string(), factory).is_some() {
            log::debug!("Replaced interceptor factory {}", name);
        }
    }

    pub fn register_kind(&self, kind: InterceptorKind) {
        self.register(
            kind.name(),
            InterceptorFactory::with_operations(kind.capability(), move |backend| create_builtin(kind, backend)),
        );
    }

    pub fn get(&self, name: &str) -> Option<InterceptorFactory> {
        self.factories.read().get(name).cloned()
    }

    /// The factory for `name`, or a configuration error naming the method
    /// that asked for it.
    pub fn require(&self, name: &str, method: &str) -> DataResult<InterceptorFactory> {
        self.get(name).ok_or_else(|| {
            log::error!("No interceptor named {} is registered for {}", name, method);
            DataError::new(
                &format!("No interceptor named {} is registered for {}", name, method),
                ErrorKind::Configuration,
            )
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }
}
