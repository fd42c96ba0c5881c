//! Backend capability sets and the adapters that present a blocking backend
//! asynchronously or reactively.

mod asynchronous;
mod backend;
mod reactive;
mod repository;

pub use asynchronous::*;
pub use backend::*;
pub use reactive::*;
pub use repository::*;
