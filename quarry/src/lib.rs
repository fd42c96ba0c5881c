#![allow(clippy::type_complexity)]
//! # Quarry - repository query derivation and interception
//!
//! Quarry turns a repository method's generated metadata and its runtime
//! arguments into an executed query. Every call goes through the same path:
//!
//! 1. [intercept::DataIntroductionAdvice] inspects the method's declared return
//!    shape (plain value, publisher, completion stage).
//! 2. [intercept::DataInterceptorResolver] finds, or builds once, the
//!    interceptor that the metadata names for this repository method.
//! 3. The interceptor resolves the stored query through the [query] resolvers,
//!    binds the arguments and runs it against the datasource's
//!    [operations::RepositoryOperations].
//! 4. The result is converted to the declared result type and adapted back to
//!    the declared shape.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quarry::runtime::Quarry;
//! use quarry::memory::InMemoryRepositoryOperations;
//! use quarry::operations::Backend;
//!
//! let quarry = Quarry::builder()
//!     .datasource("default", Backend::Blocking(Arc::new(InMemoryRepositoryOperations::new())))
//!     .build()?;
//! let bean = quarry.repository("PersonRepository");
//! let result = quarry.intercept(&bean, context)?;
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - values, documents, conversion, context propagation, executors
//! - [`config`] - runtime configuration
//! - [`criteria`] - criteria API, specifications and query rendering
//! - [`errors`] - error types and result definitions
//! - [`intercept`] - interceptors, their resolver and the introduction advice
//! - [`memory`] - in-memory reference backend
//! - [`metadata`] - method metadata and invocation contexts
//! - [`model`] - queries, pagination and entity descriptors
//! - [`operations`] - blocking, async and reactive backend capability sets
//! - [`query`] - stored, prepared and paged query resolvers
//! - [`runtime`] - the assembled runtime facade

use std::thread::available_parallelism;

pub mod common;
pub mod config;
pub mod criteria;
pub mod errors;
pub mod intercept;
pub mod memory;
pub mod metadata;
pub mod model;
pub mod operations;
pub mod query;
pub mod runtime;

/// Returns the number of CPUs available to the process, or 1 when it cannot
/// be determined.
pub fn get_cpu_count() -> usize {
    available_parallelism()
        .map(|p| p.get())
        .unwrap_or_else(|err| {
            log::warn!("Failed to detect available parallelism: {}. Defaulting to single thread.", err);
            1
        })
}

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_count_is_positive() {
        assert!(get_cpu_count() > 0);
    }
}
