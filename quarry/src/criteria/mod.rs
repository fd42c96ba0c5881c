//! Criteria API for dynamic queries.
//!
//! Specifications build [Predicate]s against a [Root] with a
//! [CriteriaBuilder]; the result is captured as a [QueryModel] that a
//! [QueryBuilder] renders and a backend executes.

mod builder;
mod expression;
mod model;
mod query;
mod query_builder;
mod specification;

pub use builder::*;
pub use expression::*;
pub use model::*;
pub use query::*;
pub use query_builder::*;
pub use specification::*;
