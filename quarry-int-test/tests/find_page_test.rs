use quarry::common::Convertible;
use quarry::intercept::InterceptorKind;
use quarry::metadata::{Argument, ReturnType};
use quarry::model::{Order, Pageable, Sort};
use quarry_int_test::test_util::{city, count_by_city, create_test_context, find_by_city, into_count, Person};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_unpaged_page_issues_one_query() {
    let ctx = create_test_context().unwrap();
    let method = find_by_city(InterceptorKind::FindPage, ReturnType::Page).unwrap();

    let page = ctx
        .call(&ctx.repository(), &method, vec![city("London"), Argument::Pageable(Pageable::unpaged())])
        .and_then(|result| result.into_page())
        .unwrap();

    assert_eq!(ctx.backend().statement_count(), 1);
    assert_eq!(page.content().len(), 10);
    assert_eq!(page.total_size(), page.content().len() as u64);
}

#[test]
fn test_paged_page_issues_query_and_count() {
    let ctx = create_test_context().unwrap();
    let method = find_by_city(InterceptorKind::FindPage, ReturnType::Page).unwrap();

    let page = ctx
        .call(
            &ctx.repository(),
            &method,
            vec![city("London"), Argument::Pageable(Pageable::from(0, 3).unwrap())],
        )
        .and_then(|result| result.into_page())
        .unwrap();

    assert_eq!(ctx.backend().statement_count(), 2);
    assert_eq!(page.total_size(), 10);
    assert_eq!(page.content().len(), 3);
    assert_eq!(page.total_pages(), 4);
    assert!(page.has_next());
}

#[test]
fn test_last_page_is_partial() {
    let ctx = create_test_context().unwrap();
    let method = find_by_city(InterceptorKind::FindPage, ReturnType::Page).unwrap();

    let page = ctx
        .call(
            &ctx.repository(),
            &method,
            vec![city("London"), Argument::Pageable(Pageable::from(3, 3).unwrap())],
        )
        .and_then(|result| result.into_page())
        .unwrap();

    assert_eq!(page.number(), 3);
    assert_eq!(page.content().len(), 1);
    assert!(!page.has_next());
}

#[test]
fn test_sorted_page_orders_content() {
    let ctx = create_test_context().unwrap();
    let method = find_by_city(InterceptorKind::FindPage, ReturnType::Page).unwrap();
    let pageable = Pageable::from_sorted(0, 4, Sort::by(vec![Order::desc("age"), Order::asc("name")])).unwrap();

    let page = ctx
        .call(&ctx.repository(), &method, vec![city("London"), Argument::Pageable(pageable)])
        .and_then(|result| result.into_page())
        .unwrap();
    let names: Vec<String> = page
        .content()
        .iter()
        .map(|value| Person::from_value(value).unwrap().name)
        .collect();

    assert_eq!(names, vec!["Florence", "Dorothy", "Isaac", "Charles"]);
    assert!(ctx.backend().statements()[0].ends_with("LIMIT 4 OFFSET 0"));
}

#[test]
fn test_slice_skips_count_query() {
    let ctx = create_test_context().unwrap();
    let method = find_by_city(InterceptorKind::FindSlice, ReturnType::Slice).unwrap();

    let slice = ctx
        .call(
            &ctx.repository(),
            &method,
            vec![city("London"), Argument::Pageable(Pageable::from(1, 4).unwrap())],
        )
        .and_then(|result| result.into_slice())
        .unwrap();

    assert_eq!(slice.content().len(), 4);
    assert_eq!(slice.number(), 1);
    assert_eq!(ctx.backend().statement_count(), 1);
}

#[test]
fn test_count_matches_page_total() {
    let ctx = create_test_context().unwrap();
    let count = count_by_city(InterceptorKind::Count, ReturnType::Single).unwrap();
    let total = into_count(ctx.call(&ctx.repository(), &count, vec![city("London")]).unwrap()).unwrap();

    let method = find_by_city(InterceptorKind::FindPage, ReturnType::Page).unwrap();
    let page = ctx
        .call(
            &ctx.repository(),
            &method,
            vec![city("London"), Argument::Pageable(Pageable::from(0, 5).unwrap())],
        )
        .and_then(|result| result.into_page())
        .unwrap();

    assert_eq!(total as u64, page.total_size());
}
