use quarry::criteria::JpqlQueryBuilder;
use quarry::errors::ErrorKind;
use quarry::intercept::InterceptorKind;
use quarry::metadata::{ExecutableMethod, MethodInvocationContext, ReturnType, DATA_METHOD, INTERCEPTOR_MEMBER};
use quarry::model::DataEntity;
use quarry::operations::Backend;
use quarry_int_test::test_util::{
    builder, city, create_backend, create_test_context, find_by_city, into_people, Person, REPOSITORY,
};
use std::sync::{Arc, Barrier};
use std::thread;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_concurrent_first_calls_construct_one_interceptor() {
    let ctx = Arc::new(create_test_context().unwrap());
    let bean = Arc::new(ctx.repository());
    let method = find_by_city(InterceptorKind::FindAll, ReturnType::List).unwrap();
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let (ctx, bean, method, barrier) = (ctx.clone(), bean.clone(), method.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                let result = ctx.call(&bean, &method, vec![city("London")]).unwrap();
                into_people(result).unwrap().len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 10);
    }
    assert_eq!(ctx.quarry().resolver().constructions(), 1);
    assert_eq!(ctx.quarry().resolver().cached(), 1);
}

#[test]
fn test_interceptor_is_reused_across_calls() {
    let ctx = create_test_context().unwrap();
    let bean = ctx.repository();
    let method = find_by_city(InterceptorKind::FindAll, ReturnType::List).unwrap();

    for _ in 0..5 {
        ctx.call(&bean, &method, vec![city("Paris")]).unwrap();
    }
    assert_eq!(ctx.quarry().resolver().constructions(), 1);
    assert_eq!(ctx.backend().statement_count(), 5);
}

#[test]
fn test_each_repository_instance_has_its_own_interceptors() {
    let ctx = create_test_context().unwrap();
    let method = find_by_city(InterceptorKind::FindAll, ReturnType::List).unwrap();

    ctx.call(&ctx.repository(), &method, vec![city("London")]).unwrap();
    ctx.call(&ctx.repository(), &method, vec![city("London")]).unwrap();
    assert_eq!(ctx.quarry().resolver().constructions(), 2);
}

#[test]
fn test_method_without_metadata_fails_with_configuration_error() {
    let ctx = create_test_context().unwrap();
    let method = ExecutableMethod::builder(REPOSITORY, "findAll", Person::persistent_entity())
        .build(&JpqlQueryBuilder)
        .unwrap();

    let err = ctx.call(&ctx.repository(), &method, vec![]).err().unwrap();
    assert_eq!(err.kind(), &ErrorKind::Configuration);
    assert_eq!(ctx.quarry().resolver().cached(), 0);
}

#[test]
fn test_unregistered_interceptor_fails_with_configuration_error() {
    let ctx = create_test_context().unwrap();
    let method = quarry_int_test::test_util::method("findEverything", InterceptorKind::FindAll, ReturnType::List)
        .annotate(DATA_METHOD, INTERCEPTOR_MEMBER, "FindEverythingInterceptor")
        .build(&JpqlQueryBuilder)
        .unwrap();

    let err = ctx.call(&ctx.repository(), &method, vec![]).err().unwrap();
    assert_eq!(err.kind(), &ErrorKind::Configuration);
    assert!(err.message().contains("FindEverythingInterceptor"));
}

#[test]
fn test_qualified_repository_reads_its_own_datasource() {
    let reporting = create_backend().unwrap();
    let quarry = builder(create_backend().unwrap())
        .datasource("reporting", Backend::Blocking(reporting.clone()))
        .build()
        .unwrap();
    let method = find_by_city(InterceptorKind::FindAll, ReturnType::List).unwrap();

    let bean = quarry.qualified_repository(REPOSITORY, "reporting");
    let context = MethodInvocationContext::new(method, vec![city("Paris")]);
    let people = into_people(quarry.intercept(&bean, &context).unwrap()).unwrap();

    assert_eq!(people.len(), 2);
    assert_eq!(reporting.statement_count(), 1);
}

#[test]
fn test_unknown_datasource_names_datasource_and_method() {
    let ctx = create_test_context().unwrap();
    let bean = ctx.quarry().qualified_repository(REPOSITORY, "archive");
    let method = find_by_city(InterceptorKind::FindAll, ReturnType::List).unwrap();

    let err = ctx.call(&bean, &method, vec![city("London")]).err().unwrap();
    assert_eq!(err.kind(), &ErrorKind::Configuration);
    assert!(err.message().contains("archive"));
    assert!(err.message().contains("findByCity"));
}
