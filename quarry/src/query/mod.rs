//! Resolution of stored, prepared and paged queries from method metadata.

mod resolver;

pub use resolver::*;
