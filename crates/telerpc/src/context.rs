//! # Request Context
//!
//! Ambient, per-call storage for request-scoped data (cookies, session,
//! caller identity) that invoked functions read without it being passed as
//! an argument.
//!
//! The slot is a tokio task-local scoped onto the future of one call, so it
//! follows that call across every `.await` and is invisible to any other
//! call interleaved on the same thread. Leaving a scope restores whatever
//! was ambient before it.
//!
//! `tokio::spawn`ed tasks start without a context; wrap the spawned future
//! in [`propagate`] to carry it over.

use std::future::Future;
use std::sync::Arc;

use anymap::any::Any;

use crate::error::Error;
use crate::error::Result;

tokio::task_local! {
    static CONTEXT: Context;
}

type DataMap = anymap::Map<dyn Any + Send + Sync>;

/// Caller-supplied data for one dispatch.
///
/// A typed map holding at most one value per type. Cloning is cheap and
/// clones share the same data.
#[derive(Clone)]
pub struct Context {
    data: Arc<DataMap>,
}

impl Context {
    /// A context with no data.
    pub fn empty() -> Self {
        ContextBuilder::new().build()
    }

    /// A context holding a single value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        ContextBuilder::new().insert(value).build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.data.get::<T>()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.data.contains::<T>()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether both handles share the same data.
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("entries", &self.data.len()).finish()
    }
}

/// Staging area for the values a [`Context`] will carry.
pub struct ContextBuilder {
    data: DataMap,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self { data: anymap::Map::new() }
    }

    /// Stores `value`, replacing any earlier value of the same type.
    pub fn insert<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.data.insert(value);
        self
    }

    pub fn build(self) -> Context {
        Context { data: Arc::new(self.data) }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `body` with `context` ambient for its whole extent.
pub async fn with_context<F: Future>(context: Context, body: F) -> F::Output {
    CONTEXT.scope(context, body).await
}

/// Runs the closure `f` with `context` ambient.
pub fn with_context_sync<R>(context: Context, f: impl FnOnce() -> R) -> R {
    CONTEXT.sync_scope(context, f)
}

/// The ambient context.
///
/// # Errors
/// `Error::ContextUnavailable` outside any `with_context` scope.
pub fn get_context() -> Result<Context> {
    get_context_or_none().ok_or(Error::ContextUnavailable)
}

/// The ambient context, or `None` outside any scope.
pub fn get_context_or_none() -> Option<Context> {
    CONTEXT.try_with(Context::clone).ok()
}

/// Captures the current context (if any) so `fut` runs under it, wherever
/// it is later polled.
pub fn propagate<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    let captured = get_context_or_none();
    async move {
        match captured {
            Some(context) => CONTEXT.scope(context, fut).await,
            None => fut.await,
        }
    }
}
