use crate::errors::{DataError, DataResult, ErrorKind};
use crate::intercept::{CompletionStage, DataInterceptorResolver, MethodResult, Publisher, RepositoryBean};
use crate::metadata::{MethodInvocationContext, ReturnShape};
use futures::future::{self, FutureExt};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Entry point of every repository call.
///
/// Resolves the method's interceptor, runs it with the invocation's context
/// installed and adapts its result to the method's declared return shape.
pub struct DataIntroductionAdvice {
    resolver: Arc<DataInterceptorResolver>,
}

impl DataIntroductionAdvice {
    pub fn new(resolver: Arc<DataInterceptorResolver>) -> Self {
        DataIntroductionAdvice { resolver }
    }

    pub fn resolver(&self) -> &Arc<DataInterceptorResolver> {
        &self.resolver
    }

    pub fn intercept(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let method = context.method();
        match method.shape() {
            ReturnShape::Synchronous => match self.run(bean, context) {
                Err(err) if err.is_empty_result() && method.is_nullable() => Ok(MethodResult::Absent),
                other => other,
            },
            ReturnShape::Publisher => {
                let publisher = match self.run(bean, context) {
                    Ok(result) => into_publisher(result),
                    Err(err) if err.is_empty_result() => stream::empty().boxed(),
                    Err(err) => stream::once(future::ready(Err(err))).boxed(),
                };
                let publisher = publisher
                    .take_while(|item| future::ready(!matches!(item, Err(err) if err.is_empty_result())))
                    .boxed();
                Ok(MethodResult::Publisher(
                    context.context().clone().propagate_stream(publisher).boxed(),
                ))
            }
            ReturnShape::CompletionStage => {
                let stage = match self.run(bean, context) {
                    Ok(result) => into_completion_stage(result),
                    Err(err) => future::ready(Err(err)).boxed(),
                };
                let absent_when_empty = method.is_suspended() && method.is_nullable();
                let stage = context
                    .context()
                    .clone()
                    .propagate(stage)
                    .map(move |result| match result {
                        Err(err) if err.is_empty_result() && absent_when_empty => Ok(MethodResult::Absent),
                        other => other,
                    });
                Ok(MethodResult::CompletionStage(stage.boxed()))
            }
            ReturnShape::Unsupported => {
                log::error!("{} returns {:?}, which repositories cannot implement", method, method.return_type());
                Err(DataError::new(
                    &format!("Unsupported return type {:?} of {}", method.return_type(), method),
                    ErrorKind::UnsupportedOperation,
                ))
            }
        }
    }

    /// Resolves and runs the interceptor with the call's context installed.
    fn run(&self, bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let _scope = context.context().scope();
        let key = bean.key(context.method());
        let interceptor = self.resolver.resolve(&key, context, bean.injection_point())?;
        interceptor.intercept(bean, context)
    }
}

fn into_publisher(result: MethodResult) -> Publisher {
    match result {
        MethodResult::Publisher(publisher) => publisher,
        MethodResult::CompletionStage(stage) => stream::once(stage).boxed(),
        MethodResult::Absent | MethodResult::Unit => stream::empty().boxed(),
        MethodResult::List(values) => stream::iter(values.into_iter().map(|v| Ok(MethodResult::Value(v)))).boxed(),
        MethodResult::Stream(values) => stream::iter(values.map(|v| Ok(MethodResult::Value(v)))).boxed(),
        single => stream::once(future::ready(Ok(single))).boxed(),
    }
}

fn into_completion_stage(result: MethodResult) -> CompletionStage {
    match result {
        MethodResult::CompletionStage(stage) => stage,
        MethodResult::Publisher(mut publisher) => async move {
            match publisher.next().await {
                Some(first) => first,
                None => Err(DataError::empty_result()),
            }
        }
        .boxed(),
        other => future::ready(Ok(other)).boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PropagatedContext, SpawnExecutor, TransactionStatus};
    use crate::criteria::JpqlQueryBuilder;
    use crate::intercept::support::fixtures::{bean, find_by_city, method};
    use crate::intercept::{
        DataInterceptor, InterceptorFactory, InterceptorKind, InterceptorRegistry,
    };
    use crate::memory::fixtures::seeded;
    use crate::metadata::{ExecutableMethod, ReturnType, DATA_METHOD, INTERCEPTOR_MEMBER};
    use crate::operations::{Backend, DatasourceRegistry};
    use crate::val;
    use futures::executor::block_on;

    struct CurrentTransaction;

    impl DataInterceptor for CurrentTransaction {
        fn kind(&self) -> InterceptorKind {
            InterceptorKind::FindOne
        }

        fn intercept(&self, _bean: &RepositoryBean, _context: &MethodInvocationContext) -> DataResult<MethodResult> {
            let seen = PropagatedContext::current().transaction().map(|t| t.id);
            Ok(MethodResult::Value(val!(seen.unwrap_or(0))))
        }
    }

    fn advice() -> DataIntroductionAdvice {
        let datasources = DatasourceRegistry::new("default", Arc::new(SpawnExecutor));
        datasources.register("default", Backend::Blocking(seeded()));
        let registry = InterceptorRegistry::with_defaults();
        registry.register(
            "CurrentTransactionInterceptor",
            InterceptorFactory::no_arg(|| Ok(Arc::new(CurrentTransaction) as Arc<dyn DataInterceptor>)),
        );
        DataIntroductionAdvice::new(Arc::new(DataInterceptorResolver::new(
            Arc::new(registry),
            Arc::new(datasources),
        )))
    }

    fn nullable_find_one(kind: InterceptorKind, return_type: ReturnType, suspended: bool) -> ExecutableMethod {
        method("findByCity", kind, return_type)
            .parameter("city", "String")
            .nullable(true)
            .suspended(suspended)
            .query_model(crate::intercept::support::fixtures::by_city())
            .build(&JpqlQueryBuilder)
            .unwrap()
    }

    #[test]
    fn synchronous_find_one_without_match_is_absent() {
        let advice = advice();
        let method = find_by_city(InterceptorKind::FindOne, ReturnType::Single);
        let result = advice
            .intercept(&bean(), &MethodInvocationContext::new(method, vec![val!("Paris").into()]))
            .unwrap();
        assert!(result.is_absent());
    }

    #[test]
    fn suspended_nullable_completion_stage_resolves_absent() {
        let advice = advice();
        let method = nullable_find_one(InterceptorKind::FindOneAsync, ReturnType::CompletionStage, true);
        let stage = advice
            .intercept(&bean(), &MethodInvocationContext::new(method, vec![val!("Paris").into()]))
            .and_then(MethodResult::into_completion_stage)
            .unwrap();
        assert!(block_on(stage).unwrap().is_absent());
    }

    #[test]
    fn non_suspended_completion_stage_keeps_empty_result() {
        let advice = advice();
        let method = find_by_city(InterceptorKind::FindOneAsync, ReturnType::CompletionStage);
        let stage = advice
            .intercept(&bean(), &MethodInvocationContext::new(method, vec![val!("Paris").into()]))
            .and_then(MethodResult::into_completion_stage)
            .unwrap();
        assert!(block_on(stage).unwrap_err().is_empty_result());
    }

    #[test]
    fn completion_stage_over_publisher_takes_first_element() {
        let advice = advice();
        let method = find_by_city(InterceptorKind::FindAllReactive, ReturnType::CompletionStage);
        let stage = advice
            .intercept(&bean(), &MethodInvocationContext::new(method.clone(), vec![val!("London").into()]))
            .and_then(MethodResult::into_completion_stage)
            .unwrap();
        assert!(block_on(stage).unwrap().value().is_some());

        let stage = advice
            .intercept(&bean(), &MethodInvocationContext::new(method, vec![val!("Paris").into()]))
            .and_then(MethodResult::into_completion_stage)
            .unwrap();
        assert!(block_on(stage).unwrap_err().is_empty_result());
    }

    #[test]
    fn publisher_errors_are_emitted_not_raised() {
        let advice = advice();
        let method = method("findEverything", InterceptorKind::FindAllReactive, ReturnType::Publisher)
            .annotate(DATA_METHOD, INTERCEPTOR_MEMBER, "FindEverythingInterceptor")
            .build(&JpqlQueryBuilder)
            .unwrap();
        let publisher = advice
            .intercept(&bean(), &MethodInvocationContext::new(method, vec![]))
            .and_then(MethodResult::into_publisher)
            .unwrap();
        let items: Vec<_> = block_on(publisher.collect());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().err().map(|e| e.kind().clone()), Some(ErrorKind::Configuration));
    }

    #[test]
    fn synchronous_errors_propagate() {
        let advice = advice();
        let method = method("findEverything", InterceptorKind::FindAll, ReturnType::List)
            .annotate(DATA_METHOD, INTERCEPTOR_MEMBER, "FindEverythingInterceptor")
            .build(&JpqlQueryBuilder)
            .unwrap();
        let err = advice
            .intercept(&bean(), &MethodInvocationContext::new(method, vec![]))
            .err()
            .unwrap();
        assert_eq!(err.kind(), &ErrorKind::Configuration);
    }

    #[test]
    fn raw_futures_are_unsupported() {
        let advice = advice();
        let method = find_by_city(InterceptorKind::FindOne, ReturnType::Future);
        let err = advice
            .intercept(&bean(), &MethodInvocationContext::new(method, vec![val!("London").into()]))
            .err()
            .unwrap();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn interceptor_runs_in_invocation_context() {
        let advice = advice();
        let method = method("current", InterceptorKind::FindOne, ReturnType::Single)
            .annotate(DATA_METHOD, INTERCEPTOR_MEMBER, "CurrentTransactionInterceptor")
            .build(&JpqlQueryBuilder)
            .unwrap();
        let context = MethodInvocationContext::new(method, vec![])
            .with_context(PropagatedContext::empty().plus(TransactionStatus::new(7, "tx", false)));
        let result = advice.intercept(&bean(), &context).unwrap();
        assert_eq!(result.value(), Some(&val!(7u64)));
        assert!(PropagatedContext::current().transaction().is_none());
    }
}
