use crate::common::{thread_pool, TaskExecutor};
use crate::config::DataConfig;
use crate::errors::{DataError, DataResult};
use crate::intercept::{
    DataInterceptorResolver, DataIntroductionAdvice, InjectionPoint, InterceptorFactory, InterceptorRegistry,
    MethodResult, RepositoryBean,
};
use crate::metadata::MethodInvocationContext;
use crate::operations::{Backend, DatasourceRegistry};
use std::sync::Arc;

/// The assembled runtime: datasources, interceptors and the advice every
/// repository call goes through.
///
/// `Quarry` is cheap to clone; clones share the same caches.
///
/// # Examples
///
/// ```rust,ignore
/// let quarry = Quarry::builder()
///     .executor_pool_size(4)
///     .datasource("default", Backend::Blocking(Arc::new(InMemoryRepositoryOperations::new())))
///     .build()?;
///
/// let people = quarry.repository("PersonRepository");
/// let result = quarry.intercept(&people, &MethodInvocationContext::new(find_by_city, args))?;
/// ```
#[derive(Clone)]
pub struct Quarry {
    inner: Arc<QuarryInner>,
}

struct QuarryInner {
    config: DataConfig,
    datasources: Arc<DatasourceRegistry>,
    resolver: Arc<DataInterceptorResolver>,
    advice: DataIntroductionAdvice,
}

impl Quarry {
    pub fn builder() -> QuarryBuilder {
        QuarryBuilder::new()
    }

    /// A new repository instance using the datasource its methods name, or
    /// the primary one.
    pub fn repository(&self, name: &str) -> RepositoryBean {
        RepositoryBean::new(name, InjectionPoint::unqualified())
    }

    /// A new repository instance bound to the `datasource` qualifier.
    pub fn qualified_repository(&self, name: &str, datasource: &str) -> RepositoryBean {
        RepositoryBean::new(name, InjectionPoint::qualified(datasource))
    }

    pub fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        self.inner.advice.intercept(bean, context)
    }

    pub fn config(&self) -> &DataConfig {
        &self.inner.config
    }

    pub fn datasources(&self) -> &Arc<DatasourceRegistry> {
        &self.inner.datasources
    }

    pub fn resolver(&self) -> &Arc<DataInterceptorResolver> {
        &self.inner.resolver
    }
}

/// Builder for [Quarry].
///
/// The first configuration error is kept and returned from [QuarryBuilder::build].
#[derive(Default)]
pub struct QuarryBuilder {
    error: Option<DataError>,
    config: DataConfig,
    datasources: Vec<(String, Backend)>,
    interceptors: Vec<(String, InterceptorFactory)>,
    executor: Option<Arc<dyn TaskExecutor>>,
}

impl QuarryBuilder {
    pub fn new() -> Self {
        QuarryBuilder::default()
    }

    /// Name of the datasource used when neither the method nor the injection
    /// point names one.
    pub fn primary_datasource(mut self, name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_primary_datasource(name) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn executor_pool_size(mut self, size: usize) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_executor_pool_size(size) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn executor_thread_prefix(mut self, prefix: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_executor_thread_prefix(prefix) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Runs blocking backends' async calls on `executor` instead of a pool
    /// created from the configuration.
    pub fn executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn datasource(mut self, name: &str, backend: Backend) -> Self {
        self.datasources.push((name.to_string(), backend));
        self
    }

    /// Registers an interceptor in addition to, or replacing, the built-ins.
    pub fn interceptor(mut self, name: &str, factory: InterceptorFactory) -> Self {
        self.interceptors.push((name.to_string(), factory));
        self
    }

    pub fn build(self) -> DataResult<Quarry> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let config = self.config;
        let executor = match self.executor {
            Some(executor) => executor,
            None => {
                let pool = thread_pool(config.executor_pool_size(), &config.executor_thread_prefix())?;
                Arc::new(pool) as Arc<dyn TaskExecutor>
            }
        };

        let datasources = Arc::new(DatasourceRegistry::new(&config.primary_datasource(), executor));
        for (name, backend) in self.datasources {
            datasources.register(&name, backend);
        }
        if datasources.primary().is_none() {
            log::warn!(
                "Primary datasource {} is not registered; unqualified repositories will fail",
                datasources.primary_name()
            );
        }

        let registry = Arc::new(InterceptorRegistry::with_defaults());
        for (name, factory) in self.interceptors {
            registry.register(&name, factory);
        }

        let resolver = Arc::new(DataInterceptorResolver::new(registry, datasources.clone()));
        let advice = DataIntroductionAdvice::new(resolver.clone());
        log::debug!("Quarry runtime built with datasources {:?}", datasources.names());

        Ok(Quarry {
            inner: Arc::new(QuarryInner {
                config,
                datasources,
                resolver,
                advice,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SpawnExecutor;
    use crate::errors::ErrorKind;
    use crate::intercept::InterceptorKind;
    use crate::memory::fixtures::seeded;
    use crate::metadata::ReturnType;
    use crate::intercept::support::fixtures::find_by_city;
    use crate::val;

    #[test]
    fn invalid_settings_surface_at_build() {
        let err = Quarry::builder().executor_pool_size(0).build().err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::IllegalArgument);
    }

    #[test]
    fn builds_with_defaults() {
        let quarry = Quarry::builder()
            .executor_pool_size(2)
            .datasource("default", Backend::Blocking(seeded()))
            .build()
            .unwrap();
        assert_eq!(quarry.config().primary_datasource(), "default");
        assert_eq!(quarry.datasources().names(), vec!["default".to_string()]);
        assert_eq!(quarry.resolver().registry().len(), InterceptorKind::ALL.len());
    }

    #[test]
    fn repositories_are_distinct_instances() {
        let quarry = Quarry::builder()
            .executor(Arc::new(SpawnExecutor))
            .datasource("default", Backend::Blocking(seeded()))
            .build()
            .unwrap();
        let first = quarry.repository("PersonRepository");
        let second = quarry.repository("PersonRepository");
        assert_ne!(first.id(), second.id());

        let method = find_by_city(InterceptorKind::FindAll, ReturnType::List);
        let context = MethodInvocationContext::new(method, vec![val!("London").into()]);
        assert_eq!(quarry.intercept(&first, &context).unwrap().into_list().unwrap().len(), 2);
        quarry.intercept(&second, &context).unwrap();
        assert_eq!(quarry.resolver().cached(), 2);
    }

    #[test]
    fn qualified_repository_uses_its_datasource() {
        let reporting = seeded();
        let quarry = Quarry::builder()
            .executor(Arc::new(SpawnExecutor))
            .datasource("default", Backend::Blocking(seeded()))
            .datasource("reporting", Backend::Blocking(reporting.clone()))
            .build()
            .unwrap();
        let bean = quarry.qualified_repository("PersonRepository", "reporting");
        let method = find_by_city(InterceptorKind::FindAll, ReturnType::List);
        quarry
            .intercept(&bean, &MethodInvocationContext::new(method, vec![val!("London").into()]))
            .unwrap();
        assert_eq!(reporting.statement_count(), 1);
    }
}
