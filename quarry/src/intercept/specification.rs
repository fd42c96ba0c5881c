use crate::common::{Value, ValueType};
use crate::criteria::{CriteriaBuilder, CriteriaDelete, CriteriaQuery, CriteriaUpdate, QueryBuilder, QueryModel, Root};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::intercept::blocking::count_of;
use crate::intercept::reactive::{count_publisher, publisher};
use crate::intercept::support::{convert_all, convert_to, count_result, single_result};
use crate::intercept::{DataInterceptor, InterceptorKind, MethodResult, RepositoryBean};
use crate::metadata::{Argument, MethodInvocationContext};
use crate::model::{OperationType, Page, Pageable, PreparedQuery, ResultType, StoredQuery};
use crate::operations::{ReactiveRepositoryOperations, RepositoryOperations};
use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use indexmap::IndexMap;
use std::sync::Arc;

fn argument_state_error(context: &MethodInvocationContext, message: &str) -> DataError {
    log::error!("{}: {}", context.method(), message);
    DataError::new(&format!("{}: {}", context.method(), message), ErrorKind::IllegalState)
}

/// Pageable from the optional second argument.
fn trailing_pageable(context: &MethodInvocationContext) -> DataResult<Pageable> {
    if context.arguments().len() > 2 {
        return Err(argument_state_error(
            context,
            "specification methods take at most a specification and a pageable or sort",
        ));
    }
    match context.argument(1) {
        None => Ok(Pageable::unpaged()),
        Some(Argument::Pageable(pageable)) => Ok(pageable.clone()),
        Some(Argument::Sort(sort)) => Ok(Pageable::unpaged_sorted(sort.clone())),
        Some(other) => Err(argument_state_error(
            context,
            &format!("second argument must be a pageable or sort, not a {}", other.kind_name()),
        )),
    }
}

/// Select criteria built from a predicate or query specification in the first
/// argument.
fn criteria_query(context: &MethodInvocationContext) -> DataResult<(CriteriaQuery, Pageable)> {
    let pageable = trailing_pageable(context)?;
    let entity = context.method().entity().clone();
    let root = Root::new(entity.clone());
    let cb = CriteriaBuilder;
    let mut query = CriteriaQuery::new(entity);

    let predicate = match context.argument(0) {
        Some(Argument::PredicateSpecification(spec)) => spec.as_ref().and_then(|s| s.to_predicate(&root, &cb)),
        Some(Argument::QuerySpecification(spec)) => spec.as_ref().and_then(|s| s.to_predicate(&root, &mut query, &cb)),
        Some(other) => {
            return Err(argument_state_error(
                context,
                &format!("first argument must be a query specification, not a {}", other.kind_name()),
            ))
        }
        None => return Err(argument_state_error(context, "a query specification argument is required")),
    };
    query.and_where(predicate);
    Ok((query, pageable))
}

fn delete_model(context: &MethodInvocationContext) -> DataResult<QueryModel> {
    if context.arguments().len() > 1 {
        return Err(argument_state_error(context, "delete specification methods take a single argument"));
    }
    let entity = context.method().entity().clone();
    let root = Root::new(entity.clone());
    let cb = CriteriaBuilder;
    let mut delete = CriteriaDelete::new(entity);

    let predicate = match context.argument(0) {
        Some(Argument::PredicateSpecification(spec)) => spec.as_ref().and_then(|s| s.to_predicate(&root, &cb)),
        Some(Argument::DeleteSpecification(spec)) => spec.as_ref().and_then(|s| s.to_predicate(&root, &mut delete, &cb)),
        Some(other) => {
            return Err(argument_state_error(
                context,
                &format!("first argument must be a delete specification, not a {}", other.kind_name()),
            ))
        }
        None => return Err(argument_state_error(context, "a delete specification argument is required")),
    };
    delete.where_(predicate);
    Ok(delete.to_model())
}

fn update_model(context: &MethodInvocationContext) -> DataResult<QueryModel> {
    if context.arguments().len() > 1 {
        return Err(argument_state_error(context, "update specification methods take a single argument"));
    }
    let entity = context.method().entity().clone();
    let root = Root::new(entity.clone());
    let cb = CriteriaBuilder;
    let mut update = CriteriaUpdate::new(entity);

    let predicate = match context.argument(0) {
        Some(Argument::UpdateSpecification(Some(spec))) => spec.to_predicate(&root, &mut update, &cb),
        Some(Argument::UpdateSpecification(None)) => {
            log::error!("{}: an update specification must assign at least one property", context.method());
            return Err(DataError::new(
                &format!("{}: an update specification must assign at least one property", context.method()),
                ErrorKind::IllegalArgument,
            ));
        }
        Some(other) => {
            return Err(argument_state_error(
                context,
                &format!("first argument must be an update specification, not a {}", other.kind_name()),
            ))
        }
        None => return Err(argument_state_error(context, "an update specification argument is required")),
    };
    update.where_(predicate);
    Ok(update.to_model())
}

/// Renders `model` and binds the constants it produced.
fn prepare(
    query_builder: &dyn QueryBuilder,
    context: &MethodInvocationContext,
    model: QueryModel,
    result_type: ResultType,
    operation_type: OperationType,
    pageable: Pageable,
) -> DataResult<PreparedQuery> {
    let method = context.method();
    let (query, bindings) = query_builder.build_query(&model)?.into_parts();
    let mut values = IndexMap::new();
    for binding in &bindings {
        match binding.constant_value() {
            Some(value) => {
                values.insert(binding.name().to_string(), value.clone());
            }
            None => {
                return Err(argument_state_error(
                    context,
                    &format!("criteria parameter :{} has no value", binding.name()),
                ))
            }
        }
    }
    let stored = StoredQuery::new(method.name(), method.entity().clone(), &query, result_type)
        .with_operation_type(operation_type)
        .with_bindings(bindings)
        .with_model(Arc::new(model));
    Ok(PreparedQuery::new(Arc::new(stored), values, pageable, context.context().clone()))
}

/// Content query with ordering applied, plus the matching count query when
/// the request is paged.
fn page_queries(
    query_builder: &dyn QueryBuilder,
    context: &MethodInvocationContext,
) -> DataResult<(PreparedQuery, Option<PreparedQuery>)> {
    let (mut criteria, pageable) = criteria_query(context)?;
    let sort = criteria.sort().clone().merge(pageable.sort());
    criteria.order_by(sort.orders().to_vec());
    let model = criteria.to_model();
    let result_type = context.method().result_type()?;

    let count = if pageable.is_unpaged() {
        None
    } else {
        Some(prepare(
            query_builder,
            context,
            model.to_count(),
            ResultType::Value(ValueType::I64),
            OperationType::Count,
            Pageable::unpaged(),
        )?)
    };
    let content = prepare(query_builder, context, model, result_type, OperationType::Query, pageable)?;
    Ok((content, count))
}

fn select_query(query_builder: &dyn QueryBuilder, context: &MethodInvocationContext) -> DataResult<PreparedQuery> {
    page_queries(query_builder, context).map(|(content, _)| content)
}

fn count_query(query_builder: &dyn QueryBuilder, context: &MethodInvocationContext) -> DataResult<PreparedQuery> {
    let (mut criteria, _) = criteria_query(context)?;
    criteria.select_count();
    prepare(
        query_builder,
        context,
        criteria.to_model(),
        ResultType::Value(ValueType::I64),
        OperationType::Count,
        Pageable::unpaged(),
    )
}

fn exists_query(query_builder: &dyn QueryBuilder, context: &MethodInvocationContext) -> DataResult<PreparedQuery> {
    let (mut criteria, _) = criteria_query(context)?;
    criteria.select_exists();
    prepare(
        query_builder,
        context,
        criteria.to_model(),
        ResultType::Value(ValueType::Bool),
        OperationType::Exists,
        Pageable::unpaged(),
    )
}

fn delete_query(query_builder: &dyn QueryBuilder, context: &MethodInvocationContext) -> DataResult<PreparedQuery> {
    let model = delete_model(context)?;
    prepare(query_builder, context, model, ResultType::Entity, OperationType::Delete, Pageable::unpaged())
}

fn update_query(query_builder: &dyn QueryBuilder, context: &MethodInvocationContext) -> DataResult<PreparedQuery> {
    let model = update_model(context)?;
    prepare(query_builder, context, model, ResultType::Entity, OperationType::Update, Pageable::unpaged())
}

/// Declares a specification interceptor; these need no query support since
/// every call builds its own query.
macro_rules! specification_interceptor {
    ($(#[$meta:meta])* $name:ident, $operations:ident) => {
        $(#[$meta])*
        pub struct $name {
            operations: Arc<dyn $operations>,
        }

        impl $name {
            pub fn new(operations: Arc<dyn $operations>) -> Self {
                $name { operations }
            }
        }
    };
}

specification_interceptor!(FindOneSpecificationInterceptor, RepositoryOperations);

impl DataInterceptor for FindOneSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindOneSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = select_query(self.operations.query_builder(), context)?;
        let value = self.operations.find_one(&query)?;
        single_result(self.operations.conversion_service(), context, value)
    }
}

specification_interceptor!(FindAllSpecificationInterceptor, RepositoryOperations);

impl DataInterceptor for FindAllSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindAllSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = select_query(self.operations.query_builder(), context)?;
        let values = self.operations.find_all(&query)?;
        convert_all(self.operations.conversion_service(), context, values).map(MethodResult::List)
    }
}

specification_interceptor!(
    /// Unpaged requests run the content query alone; paged requests add a
    /// count query over the same restriction.
    FindPageSpecificationInterceptor,
    RepositoryOperations
);

impl DataInterceptor for FindPageSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindPageSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let (content_query, count_query) = page_queries(self.operations.query_builder(), context)?;
        let content = convert_all(
            self.operations.conversion_service(),
            context,
            self.operations.find_all(&content_query)?,
        )?;
        let total = match count_query {
            Some(count_query) => count_of(self.operations.find_one(&count_query)?)?,
            None => content.len() as u64,
        };
        Ok(MethodResult::Page(Page::new(content, content_query.pageable().clone(), total)))
    }
}

specification_interceptor!(CountSpecificationInterceptor, RepositoryOperations);

impl DataInterceptor for CountSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::CountSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = count_query(self.operations.query_builder(), context)?;
        let count = count_of(self.operations.find_one(&query)?)?;
        count_result(self.operations.conversion_service(), context, count)
    }
}

specification_interceptor!(ExistsSpecificationInterceptor, RepositoryOperations);

impl DataInterceptor for ExistsSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::ExistsSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = exists_query(self.operations.query_builder(), context)?;
        Ok(MethodResult::Value(Value::Bool(self.operations.exists(&query)?)))
    }
}

specification_interceptor!(DeleteAllSpecificationInterceptor, RepositoryOperations);

impl DataInterceptor for DeleteAllSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::DeleteAllSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = delete_query(self.operations.query_builder(), context)?;
        let deleted = self.operations.execute_delete(&query)?;
        count_result(self.operations.conversion_service(), context, deleted.unwrap_or(0))
    }
}

specification_interceptor!(UpdateAllSpecificationInterceptor, RepositoryOperations);

impl DataInterceptor for UpdateAllSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::UpdateAllSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = update_query(self.operations.query_builder(), context)?;
        let updated = self.operations.execute_update(&query)?;
        count_result(self.operations.conversion_service(), context, updated.unwrap_or(0))
    }
}

specification_interceptor!(FindOneReactiveSpecificationInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for FindOneReactiveSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindOneReactiveSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = select_query(self.operations.query_builder(), context)?;
        Ok(publisher(
            self.operations.find_one(query),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

specification_interceptor!(FindAllReactiveSpecificationInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for FindAllReactiveSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindAllReactiveSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = select_query(self.operations.query_builder(), context)?;
        Ok(publisher(
            self.operations.find_all(query),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

specification_interceptor!(FindPageReactiveSpecificationInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for FindPageReactiveSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::FindPageReactiveSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let (content_query, count_query) = page_queries(self.operations.query_builder(), context)?;
        let pageable = content_query.pageable().clone();
        let conversion_service = self.operations.conversion_service().clone();
        let result_type = context.method().result_type()?;
        let content = self.operations.find_all(content_query);
        let counts = count_query.map(|query| self.operations.find_one(query));

        let page = async move {
            let content = content
                .and_then(|value| future::ready(convert_to(&conversion_service, result_type, value)))
                .try_collect::<Vec<_>>()
                .await?;
            let total = match counts {
                Some(mut counts) => count_of(counts.try_next().await?)?,
                None => content.len() as u64,
            };
            Ok(MethodResult::Page(Page::new(content, pageable, total)))
        };
        Ok(MethodResult::Publisher(stream::once(page.boxed()).boxed()))
    }
}

specification_interceptor!(CountReactiveSpecificationInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for CountReactiveSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::CountReactiveSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = count_query(self.operations.query_builder(), context)?;
        let mut rows = self.operations.find_one(query);
        let counts = stream::once(async move { count_of(rows.try_next().await?) }.boxed()).boxed();
        Ok(count_publisher(
            counts,
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

specification_interceptor!(ExistsReactiveSpecificationInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for ExistsReactiveSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::ExistsReactiveSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = exists_query(self.operations.query_builder(), context)?;
        Ok(MethodResult::Publisher(
            self.operations
                .exists(query)
                .map_ok(|exists| MethodResult::Value(Value::Bool(exists)))
                .boxed(),
        ))
    }
}

specification_interceptor!(DeleteAllReactiveSpecificationInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for DeleteAllReactiveSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::DeleteAllReactiveSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = delete_query(self.operations.query_builder(), context)?;
        Ok(count_publisher(
            self.operations.execute_delete(query),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}

specification_interceptor!(UpdateAllReactiveSpecificationInterceptor, ReactiveRepositoryOperations);

impl DataInterceptor for UpdateAllReactiveSpecificationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::UpdateAllReactiveSpecification
    }

    fn intercept(&self, _bean: &RepositoryBean, context: &MethodInvocationContext) -> DataResult<MethodResult> {
        let query = update_query(self.operations.query_builder(), context)?;
        Ok(count_publisher(
            self.operations.execute_update(query),
            self.operations.conversion_service().clone(),
            context.method().result_type()?,
        ))
    }
}
