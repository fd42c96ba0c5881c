//! Shared building blocks: values and documents, conversion, context
//! propagation and the blocking task executor.

mod context;
mod conversion;
mod convertible;
mod document;
mod executor;
mod value;

pub use context::*;
pub use conversion::*;
pub use convertible::*;
pub use document::*;
pub use executor::*;
pub use value::*;
