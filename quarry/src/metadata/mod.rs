//! Repository method metadata and invocation contexts.
//!
//! An [ExecutableMethod] carries what a build-time processor knows about a
//! repository method; a [MethodInvocationContext] pairs it with the arguments
//! of one call.

mod annotation;
mod invocation;
mod method;

pub use annotation::*;
pub use invocation::*;
pub use method::*;
