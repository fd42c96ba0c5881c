//! Interception of repository method calls.
//!
//! [DataIntroductionAdvice] is the entry point of every call. It asks the
//! [DataInterceptorResolver] for the interceptor the method's metadata names,
//! creating it on first use, runs it and adapts its [MethodResult] to the
//! method's declared return shape.
//!
//! The built-in interceptors come in four families:
//!
//! - blocking interceptors executing against [crate::operations::RepositoryOperations]
//! - specification interceptors building their query from a criteria argument
//! - async interceptors producing a [CompletionStage]
//! - reactive interceptors producing a [Publisher]

/// Declares an interceptor holding a backend capability set and the query
/// support it resolves its queries with.
macro_rules! operations_interceptor {
    ($(#[$meta:meta])* $name:ident, $operations:ident) => {
        $(#[$meta])*
        pub struct $name {
            operations: std::sync::Arc<dyn $operations>,
            support: $crate::intercept::QuerySupport,
        }

        impl $name {
            pub fn new(operations: std::sync::Arc<dyn $operations>) -> Self {
                $name::with_support(operations, $crate::intercept::QuerySupport::new())
            }

            pub fn with_support(
                operations: std::sync::Arc<dyn $operations>,
                support: $crate::intercept::QuerySupport,
            ) -> Self {
                $name { operations, support }
            }

            pub fn operations(&self) -> &std::sync::Arc<dyn $operations> {
                &self.operations
            }

            pub fn query_support(&self) -> &$crate::intercept::QuerySupport {
                &self.support
            }
        }
    };
}

mod advice;
mod asynchronous;
mod blocking;
mod interceptor;
mod key;
mod reactive;
mod registry;
mod resolver;
mod result;
mod specification;
pub(crate) mod support;

pub use advice::*;
pub use asynchronous::*;
pub use blocking::*;
pub use interceptor::*;
pub use key::*;
pub use reactive::*;
pub use registry::*;
pub use resolver::*;
pub use result::*;
pub use specification::*;
pub use support::QuerySupport;
