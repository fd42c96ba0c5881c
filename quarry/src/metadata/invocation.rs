use crate::common::{PropagatedContext, Value};
use crate::criteria::{DeleteSpecification, PredicateSpecification, QuerySpecification, UpdateSpecification};
use crate::metadata::ExecutableMethod;
use crate::model::{Pageable, Sort};

/// One runtime argument of a repository call.
///
/// Specification arguments are optional: `None` stands for a caller passing no
/// criteria at all.
#[derive(Debug, Clone)]
pub enum Argument {
    Value(Value),
    Pageable(Pageable),
    Sort(Sort),
    PredicateSpecification(Option<PredicateSpecification>),
    QuerySpecification(Option<QuerySpecification>),
    UpdateSpecification(Option<UpdateSpecification>),
    DeleteSpecification(Option<DeleteSpecification>),
}

impl Argument {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_pageable(&self) -> Option<&Pageable> {
        match self {
            Argument::Pageable(pageable) => Some(pageable),
            _ => None,
        }
    }

    pub fn as_sort(&self) -> Option<&Sort> {
        match self {
            Argument::Sort(sort) => Some(sort),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Argument::Value(_) => "value",
            Argument::Pageable(_) => "pageable",
            Argument::Sort(_) => "sort",
            Argument::PredicateSpecification(_) => "predicate specification",
            Argument::QuerySpecification(_) => "query specification",
            Argument::UpdateSpecification(_) => "update specification",
            Argument::DeleteSpecification(_) => "delete specification",
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<Pageable> for Argument {
    fn from(pageable: Pageable) -> Self {
        Argument::Pageable(pageable)
    }
}

impl From<Sort> for Argument {
    fn from(sort: Sort) -> Self {
        Argument::Sort(sort)
    }
}

impl From<PredicateSpecification> for Argument {
    fn from(spec: PredicateSpecification) -> Self {
        Argument::PredicateSpecification(Some(spec))
    }
}

impl From<QuerySpecification> for Argument {
    fn from(spec: QuerySpecification) -> Self {
        Argument::QuerySpecification(Some(spec))
    }
}

impl From<UpdateSpecification> for Argument {
    fn from(spec: UpdateSpecification) -> Self {
        Argument::UpdateSpecification(Some(spec))
    }
}

impl From<DeleteSpecification> for Argument {
    fn from(spec: DeleteSpecification) -> Self {
        Argument::DeleteSpecification(Some(spec))
    }
}

/// A single call of a repository method.
///
/// Captures the [PropagatedContext] current on the calling thread when it is
/// created; the advice re-installs it wherever the call continues.
#[derive(Debug, Clone)]
pub struct MethodInvocationContext {
    method: ExecutableMethod,
    arguments: Vec<Argument>,
    context: PropagatedContext,
}

impl MethodInvocationContext {
    pub fn new(method: ExecutableMethod, arguments: Vec<Argument>) -> Self {
        MethodInvocationContext {
            method,
            arguments,
            context: PropagatedContext::current(),
        }
    }

    pub fn with_context(mut self, context: PropagatedContext) -> Self {
        self.context = context;
        self
    }

    pub fn method(&self) -> &ExecutableMethod {
        &self.method
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.arguments.get(index)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.argument(index).and_then(Argument::as_value)
    }

    pub fn context(&self) -> &PropagatedContext {
        &self.context
    }

    /// The first [Pageable] argument, else an unpaged request carrying the
    /// first [Sort] argument, else unpaged.
    pub fn pageable(&self) -> Pageable {
        if let Some(pageable) = self.arguments.iter().find_map(Argument::as_pageable) {
            return pageable.clone();
        }
        match self.arguments.iter().find_map(Argument::as_sort) {
            Some(sort) => Pageable::unpaged_sorted(sort.clone()),
            None => Pageable::unpaged(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TransactionStatus;
    use crate::criteria::JpqlQueryBuilder;
    use crate::model::{Order, PersistentEntity};
    use crate::val;

    fn method() -> ExecutableMethod {
        ExecutableMethod::builder("PersonRepository", "findAll", PersistentEntity::new("Person", "id"))
            .build(&JpqlQueryBuilder)
            .unwrap()
    }

    #[test]
    fn pageable_prefers_explicit_pageable() {
        let paged = Pageable::from(2, 10).unwrap();
        let context = MethodInvocationContext::new(
            method(),
            vec![Argument::Sort(Sort::of(Order::asc("name"))), paged.clone().into()],
        );
        assert_eq!(context.pageable(), paged);
    }

    #[test]
    fn sort_argument_gives_sorted_unpaged_request() {
        let context = MethodInvocationContext::new(method(), vec![val!("London").into(), Sort::of(Order::desc("age")).into()]);
        let pageable = context.pageable();
        assert!(pageable.is_unpaged());
        assert_eq!(pageable.sort().orders()[0].property(), "age");
        assert_eq!(context.value(0), Some(&val!("London")));
        assert!(context.value(1).is_none());
    }

    #[test]
    fn captures_current_context() {
        let current = PropagatedContext::empty().plus(TransactionStatus::new(3, "tx", true));
        let context = {
            let _scope = current.scope();
            MethodInvocationContext::new(method(), vec![])
        };
        assert_eq!(context.context().transaction().map(|t| t.id), Some(3));
        assert!(MethodInvocationContext::new(method(), vec![]).context().is_empty());
    }
}
