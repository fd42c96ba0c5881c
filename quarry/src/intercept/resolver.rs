use crate::errors::{DataError, DataResult, ErrorKind};
use crate::intercept::{DataInterceptor, InjectionPoint, InterceptorFactory, InterceptorRegistry, RepositoryMethodKey};
use crate::metadata::MethodInvocationContext;
use crate::operations::{DatasourceRegistry, OperationsBean};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Finds, and on first use creates, the interceptor of a repository method.
///
/// Interceptors are cached per [RepositoryMethodKey]. Concurrent first calls
/// for the same key construct the interceptor exactly once; every caller gets
/// the same instance.
pub struct DataInterceptorResolver {
    registry: Arc<InterceptorRegistry>,
    datasources: Arc<DatasourceRegistry>,
    interceptors: DashMap<RepositoryMethodKey, Arc<dyn DataInterceptor>>,
    constructions: AtomicUsize,
}

impl DataInterceptorResolver {
    pub fn new(registry: Arc<InterceptorRegistry>, datasources: Arc<DatasourceRegistry>) -> Self {
        DataInterceptorResolver {
            registry,
            datasources,
            interceptors: DashMap::new(),
            constructions: AtomicUsize::new(0),
        }
    }

    pub fn resolve(
        &self,
        key: &RepositoryMethodKey,
        context: &MethodInvocationContext,
        injection_point: &InjectionPoint,
    ) -> DataResult<Arc<dyn DataInterceptor>> {
        if let Some(interceptor) = self.interceptors.get(key) {
            return Ok(interceptor.value().clone());
        }

        let entry = self
            .interceptors
            .entry(key.clone())
            .or_try_insert_with(|| self.create(context, injection_point))?;
        Ok(entry.value().clone())
    }

    fn create(
        &self,
        context: &MethodInvocationContext,
        injection_point: &InjectionPoint,
    ) -> DataResult<Arc<dyn DataInterceptor>> {
        let method = context.method();
        let name = method.interceptor_name().ok_or_else(|| {
            log::error!("{} has no interceptor metadata; was it generated?", method);
            DataError::new(
                &format!("{} has no interceptor metadata; repository metadata was never generated", method),
                ErrorKind::Configuration,
            )
        })?;
        let factory = self.registry.require(name, &method.to_string())?;

        let interceptor = match factory {
            InterceptorFactory::NoArg(create) => create(),
            InterceptorFactory::WithOperations(capability, create) => {
                let datasource = self.datasource(context, injection_point)?;
                let backend = datasource.adapt(capability)?;
                create(backend)
            }
        }
        .map_err(|cause| {
            log::error!("Failed to create {} for {}: {}", name, method, cause);
            DataError::new_with_cause(
                &format!("Failed to create {} for {}", name, method),
                ErrorKind::DataAccess,
                cause,
            )
        })?;

        self.constructions.fetch_add(1, Ordering::SeqCst);
        log::debug!("Created {} for {}", name, method);
        Ok(interceptor)
    }

    /// The datasource named on the method, else by the injection point, else
    /// the primary one.
    fn datasource(
        &self,
        context: &MethodInvocationContext,
        injection_point: &InjectionPoint,
    ) -> DataResult<Arc<OperationsBean>> {
        let method = context.method();
        let name = method
            .datasource()
            .or_else(|| injection_point.qualifier())
            .unwrap_or_else(|| self.datasources.primary_name());

        self.datasources.get(name).ok_or_else(|| {
            log::error!("No datasource {} is configured for {}", name, method);
            DataError::new(
                &format!("No backend is configured for datasource '{}' required by {}", name, method),
                ErrorKind::Configuration,
            )
        })
    }

    /// Number of interceptors created so far.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Number of cached interceptors.
    pub fn cached(&self) -> usize {
        self.interceptors.len()
    }

    pub fn registry(&self) -> &Arc<InterceptorRegistry> {
        &self.registry
    }

    pub fn datasources(&self) -> &Arc<DatasourceRegistry> {
        &self.datasources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SpawnExecutor;
    use crate::criteria::JpqlQueryBuilder;
    use crate::intercept::support::fixtures::{bean, find_by_city, method};
    use crate::intercept::{InterceptorKind, RepositoryBean};
    use crate::memory::InMemoryRepositoryOperations;
    use crate::metadata::{ExecutableMethod, ReturnType, DATA_METHOD, INTERCEPTOR_MEMBER};
    use crate::operations::Backend;
    use crate::val;
    use std::sync::Barrier;
    use std::thread;

    fn resolver() -> DataInterceptorResolver {
        let datasources = DatasourceRegistry::new("default", Arc::new(SpawnExecutor));
        datasources.register("default", Backend::Blocking(Arc::new(InMemoryRepositoryOperations::new())));
        DataInterceptorResolver::new(Arc::new(InterceptorRegistry::with_defaults()), Arc::new(datasources))
    }

    fn resolve(
        resolver: &DataInterceptorResolver,
        bean: &RepositoryBean,
        method: ExecutableMethod,
    ) -> DataResult<Arc<dyn DataInterceptor>> {
        let key = bean.key(&method);
        let context = MethodInvocationContext::new(method, vec![val!("London").into()]);
        resolver.resolve(&key, &context, bean.injection_point())
    }

    #[test]
    fn concurrent_first_calls_construct_once() {
        let resolver = Arc::new(resolver());
        let bean = Arc::new(bean());
        let method = find_by_city(InterceptorKind::FindAll, ReturnType::List);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (resolver, bean, method, barrier) = (resolver.clone(), bean.clone(), method.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    resolve(&resolver, &bean, method).map(|i| Arc::as_ptr(&i) as *const () as usize)
                })
            })
            .collect();
        let pointers: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();

        assert_eq!(resolver.constructions(), 1);
        assert_eq!(resolver.cached(), 1);
        assert!(pointers.iter().all(|p| *p == pointers[0]));
    }

    #[test]
    fn each_repository_instance_gets_its_own_interceptor() {
        let resolver = resolver();
        let method = find_by_city(InterceptorKind::FindAll, ReturnType::List);
        let first = resolve(&resolver, &bean(), method.clone()).unwrap();
        let second = resolve(&resolver, &bean(), method).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.constructions(), 2);
    }

    #[test]
    fn missing_metadata_is_configuration_error() {
        let resolver = resolver();
        let method = ExecutableMethod::builder("PersonRepository", "findAll", crate::memory::fixtures::person())
            .build(&JpqlQueryBuilder)
            .unwrap();
        let err = resolve(&resolver, &bean(), method).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::Configuration);
        assert!(err.message().contains("never generated"));
    }

    #[test]
    fn unknown_datasource_is_configuration_error() {
        let resolver = resolver();
        let qualified = RepositoryBean::new("PersonRepository", InjectionPoint::qualified("reporting"));
        let method = find_by_city(InterceptorKind::FindAll, ReturnType::List);
        let err = resolve(&resolver, &qualified, method).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::Configuration);
        assert!(err.message().contains("reporting"));
        assert!(err.message().contains("findByCity"));
    }

    #[test]
    fn method_datasource_wins_over_qualifier() {
        let resolver = resolver();
        let qualified = RepositoryBean::new("PersonRepository", InjectionPoint::qualified("reporting"));
        let method = method("findAll", InterceptorKind::FindAll, ReturnType::List)
            .datasource("default")
            .build(&JpqlQueryBuilder)
            .unwrap();
        assert!(resolve(&resolver, &qualified, method).is_ok());
    }

    #[test]
    fn incompatible_backend_is_illegal_argument() {
        let datasources = DatasourceRegistry::new("default", Arc::new(SpawnExecutor));
        let blocking = OperationsBean::new(
            "default",
            Backend::Blocking(Arc::new(InMemoryRepositoryOperations::new())),
            Arc::new(SpawnExecutor),
        );
        datasources.register("default", Backend::Reactive(blocking.reactive_operations().unwrap()));
        let resolver =
            DataInterceptorResolver::new(Arc::new(InterceptorRegistry::with_defaults()), Arc::new(datasources));
        let method = find_by_city(InterceptorKind::FindAll, ReturnType::List);
        let err = resolve(&resolver, &bean(), method).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::IllegalArgument);
    }

    #[test]
    fn factory_failures_are_wrapped() {
        let resolver = resolver();
        resolver.registry().register(
            "BrokenInterceptor",
            InterceptorFactory::no_arg(|| Err(DataError::new("boom", ErrorKind::Internal))),
        );
        let method = method("broken", InterceptorKind::FindAll, ReturnType::List)
            .annotate(DATA_METHOD, INTERCEPTOR_MEMBER, "BrokenInterceptor")
            .build(&JpqlQueryBuilder)
            .unwrap();
        let err = resolve(&resolver, &bean(), method).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::DataAccess);
        assert_eq!(err.cause().map(|c| c.message()), Some("boom"));
        assert_eq!(resolver.cached(), 0);
    }
}
