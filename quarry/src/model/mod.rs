//! Query, pagination and entity model shared by resolvers, interceptors and
//! backends.

mod entity;
mod operation;
mod page;
mod pageable;
mod query;
mod sort;

pub use entity::*;
pub use operation::*;
pub use page::*;
pub use pageable::*;
pub use query::*;
pub use sort::*;
