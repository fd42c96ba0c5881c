//! User-supplied criteria for dynamic queries.
//!
//! A specification is a closure invoked once per repository call with the
//! entity [Root], the criteria object under construction and a
//! [CriteriaBuilder]. It returns the restriction to apply, or `None` for no
//! restriction at all: a `None` predicate leaves the `WHERE` clause out.
//!
//! ```rust,ignore
//! let adults = PredicateSpecification::new(|root, cb| {
//!     Some(cb.greater_than_or_equal(root.get("age"), 18))
//! });
//! let named = PredicateSpecification::new(|root, cb| Some(cb.is_not_null(root.get("name"))));
//! let spec = adults.and(named);
//! ```

use crate::criteria::{
    and_optional, or_optional, CriteriaBuilder, CriteriaDelete, CriteriaQuery, CriteriaUpdate,
    Predicate, Root,
};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type PredicateFn = dyn Fn(&Root, &CriteriaBuilder) -> Option<Predicate> + Send + Sync;
type QueryFn = dyn Fn(&Root, &mut CriteriaQuery, &CriteriaBuilder) -> Option<Predicate> + Send + Sync;
type UpdateFn = dyn Fn(&Root, &mut CriteriaUpdate, &CriteriaBuilder) -> Option<Predicate> + Send + Sync;
type DeleteFn = dyn Fn(&Root, &mut CriteriaDelete, &CriteriaBuilder) -> Option<Predicate> + Send + Sync;

/// A restriction that depends only on the root and the builder.
#[derive(Clone)]
pub struct PredicateSpecification {
    f: Arc<PredicateFn>,
}

impl PredicateSpecification {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Root, &CriteriaBuilder) -> Option<Predicate> + Send + Sync + 'static,
    {
        PredicateSpecification { f: Arc::new(f) }
    }

    /// Matches every row.
    pub fn all() -> Self {
        PredicateSpecification::new(|_, _| None)
    }

    pub fn to_predicate(&self, root: &Root, cb: &CriteriaBuilder) -> Option<Predicate> {
        (self.f)(root, cb)
    }

    pub fn and(self, other: PredicateSpecification) -> Self {
        PredicateSpecification::new(move |root, cb| {
            and_optional(self.to_predicate(root, cb), other.to_predicate(root, cb))
        })
    }

    pub fn or(self, other: PredicateSpecification) -> Self {
        PredicateSpecification::new(move |root, cb| {
            or_optional(self.to_predicate(root, cb), other.to_predicate(root, cb))
        })
    }

    /// Negation. Negating "no restriction" stays "no restriction".
    pub fn not(self) -> Self {
        PredicateSpecification::new(move |root, cb| self.to_predicate(root, cb).map(Predicate::not))
    }
}

impl Debug for PredicateSpecification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PredicateSpecification")
    }
}

/// A restriction that may also shape the select query (ordering, distinct).
#[derive(Clone)]
pub struct QuerySpecification {
    f: Arc<QueryFn>,
}

impl QuerySpecification {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Root, &mut CriteriaQuery, &CriteriaBuilder) -> Option<Predicate> + Send + Sync + 'static,
    {
        QuerySpecification { f: Arc::new(f) }
    }

    pub fn to_predicate(&self, root: &Root, query: &mut CriteriaQuery, cb: &CriteriaBuilder) -> Option<Predicate> {
        (self.f)(root, query, cb)
    }

    pub fn and(self, other: QuerySpecification) -> Self {
        QuerySpecification::new(move |root, query, cb| {
            let left = self.to_predicate(root, query, cb);
            let right = other.to_predicate(root, query, cb);
            and_optional(left, right)
        })
    }

    pub fn or(self, other: QuerySpecification) -> Self {
        QuerySpecification::new(move |root, query, cb| {
            let left = self.to_predicate(root, query, cb);
            let right = other.to_predicate(root, query, cb);
            or_optional(left, right)
        })
    }
}

impl From<PredicateSpecification> for QuerySpecification {
    fn from(spec: PredicateSpecification) -> Self {
        QuerySpecification::new(move |root, _, cb| spec.to_predicate(root, cb))
    }
}

impl Debug for QuerySpecification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "QuerySpecification")
    }
}

/// Assignments plus restriction of a bulk update.
#[derive(Clone)]
pub struct UpdateSpecification {
    f: Arc<UpdateFn>,
}

impl UpdateSpecification {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Root, &mut CriteriaUpdate, &CriteriaBuilder) -> Option<Predicate> + Send + Sync + 'static,
    {
        UpdateSpecification { f: Arc::new(f) }
    }

    pub fn to_predicate(&self, root: &Root, update: &mut CriteriaUpdate, cb: &CriteriaBuilder) -> Option<Predicate> {
        (self.f)(root, update, cb)
    }
}

impl Debug for UpdateSpecification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UpdateSpecification")
    }
}

/// Restriction of a bulk delete.
#[derive(Clone)]
pub struct DeleteSpecification {
    f: Arc<DeleteFn>,
}

impl DeleteSpecification {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Root, &mut CriteriaDelete, &CriteriaBuilder) -> Option<Predicate> + Send + Sync + 'static,
    {
        DeleteSpecification { f: Arc::new(f) }
    }

    pub fn to_predicate(&self, root: &Root, delete: &mut CriteriaDelete, cb: &CriteriaBuilder) -> Option<Predicate> {
        (self.f)(root, delete, cb)
    }
}

impl From<PredicateSpecification> for DeleteSpecification {
    fn from(spec: PredicateSpecification) -> Self {
        DeleteSpecification::new(move |root, _, cb| spec.to_predicate(root, cb))
    }
}

impl Debug for DeleteSpecification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeleteSpecification")
    }
}
