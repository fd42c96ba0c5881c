//! Explicit context propagation across thread and task boundaries.
//!
//! A [PropagatedContext] is an immutable bag of typed elements (most notably the
//! caller's [TransactionStatus]). It travels inside every invocation context and
//! prepared query, and it is re-installed as the *current* context:
//!
//! - for the duration of a synchronous interceptor call ([PropagatedContext::scope]),
//! - on every poll of a future or stream returned to an async caller
//!   ([PropagatedContext::propagate]),
//! - on the executor thread that runs a blocking backend call on behalf of an
//!   async caller.
//!
//! Code that needs the ambient state (a transaction manager, a backend) reads it
//! with [PropagatedContext::current].

use futures::Stream;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

thread_local! {
    static CURRENT: RefCell<PropagatedContext> = RefCell::new(PropagatedContext::empty());
}

/// State of the transaction a repository call participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    pub id: u64,
    pub name: String,
    pub read_only: bool,
}

impl TransactionStatus {
    pub fn new(id: u64, name: &str, read_only: bool) -> Self {
        TransactionStatus {
            id,
            name: name.to_string(),
            read_only,
        }
    }
}

#[derive(Clone, Default)]
pub struct PropagatedContext {
    elements: im::HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl PropagatedContext {
    pub fn empty() -> Self {
        PropagatedContext {
            elements: im::HashMap::new(),
        }
    }

    /// Returns a copy of the context currently installed on this thread.
    pub fn current() -> PropagatedContext {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Returns a new context with `element` added, replacing any element of the
    /// same type.
    pub fn plus<T: Any + Send + Sync>(&self, element: T) -> PropagatedContext {
        PropagatedContext {
            elements: self.elements.update(TypeId::of::<T>(), Arc::new(element)),
        }
    }

    pub fn minus<T: Any + Send + Sync>(&self) -> PropagatedContext {
        PropagatedContext {
            elements: self.elements.without(&TypeId::of::<T>()),
        }
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.elements
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|element| element.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.elements.contains_key(&TypeId::of::<T>())
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn transaction(&self) -> Option<Arc<TransactionStatus>> {
        self.get::<TransactionStatus>()
    }

    /// Installs this context as the current one until the returned guard drops.
    pub fn scope(&self) -> ContextScope {
        let previous = CURRENT.with(|current| current.replace(self.clone()));
        ContextScope {
            previous: Some(previous),
            _not_send: PhantomData,
        }
    }

    /// Wraps `future` so that every poll runs with this context installed.
    pub fn propagate<F: Future>(self, future: F) -> WithContext<F> {
        WithContext {
            context: self,
            inner: Box::pin(future),
        }
    }

    /// Wraps `stream` so that every poll runs with this context installed.
    pub fn propagate_stream<S: Stream>(self, stream: S) -> WithContext<S> {
        WithContext {
            context: self,
            inner: Box::pin(stream),
        }
    }
}

impl Debug for PropagatedContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagatedContext")
            .field("elements", &self.elements.len())
            .field("transaction", &self.transaction())
            .finish()
    }
}

/// Guard restoring the previously installed context on drop.
#[must_use = "the context is uninstalled as soon as the scope is dropped"]
pub struct ContextScope {
    previous: Option<PropagatedContext>,
    // the guard restores a thread-local, it must stay on the thread that created it
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT.with(|current| {
                current.replace(previous);
            });
        }
    }
}

/// A future or stream carrying the context captured when it was created.
pub struct WithContext<F: ?Sized> {
    context: PropagatedContext,
    inner: Pin<Box<F>>,
}

impl<F: ?Sized> WithContext<F> {
    pub fn context(&self) -> &PropagatedContext {
        &self.context
    }
}

impl<F: Future + ?Sized> Future for WithContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _scope = this.context.scope();
        this.inner.as_mut().poll(cx)
    }
}

impl<S: Stream + ?Sized> Stream for WithContext<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let _scope = this.context.scope();
        this.inner.as_mut().poll_next(cx)
    }
}
