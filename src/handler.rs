//! Asynchronous functions that handle requests.

use crate::bounded::BoxFuture;
use crate::{Context, Result};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// An asynchronous request handler.
///
/// Middleware and endpoints are both handlers: middleware usually passes
/// control down the chain with [`Context::next`], endpoints usually don't.
///
/// This trait is implemented for functions such as:
///
/// ```rust,ignore
/// async fn hello(c: &mut Context) -> fennec::Result {
///     c.send_string("Hello");
///     Ok(())
/// }
/// ```
///
/// Handlers with state implement the trait directly, with
/// [`async_trait`](crate::async_trait).
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handle the request.
    async fn call(&self, c: &mut Context) -> Result;
}

/// A function that can be used as a [`Handler`].
///
/// The future returned by an `async fn` taking a reference can't be named
/// in a higher-ranked bound, so this trait names it for each lifetime.
pub trait HandlerFn<'a>: Send + Sync + 'static {
    /// The future returned by the function.
    type Future: Future<Output = Result> + Send + 'a;

    /// Call the function.
    fn call(&self, c: &'a mut Context) -> Self::Future;
}

impl<'a, F, O> HandlerFn<'a> for F
where
    F: Fn(&'a mut Context) -> O + Send + Sync + 'static,
    O: Future<Output = Result> + Send + 'a,
{
    type Future = O;

    fn call(&self, c: &'a mut Context) -> Self::Future {
        self(c)
    }
}

impl<F> Handler for F
where
    F: for<'a> HandlerFn<'a>,
{
    fn call<'a, 'b, 'o>(&'a self, c: &'b mut Context) -> BoxFuture<'o, Result>
    where
        'a: 'o,
        'b: 'o,
    {
        Box::pin(<F as HandlerFn<'b>>::call(self, c))
    }
}

/// Create a handler from a closure returning a boxed future.
///
/// Closures can't be generic over the lifetime of their argument unless
/// their signature is fixed up front, which is what this function does.
///
/// ```rust,ignore
/// let hits = Arc::new(AtomicUsize::new(0));
/// app.get("/", handler_fn(move |c| {
///     let hits = hits.clone();
///     Box::pin(async move {
///         hits.fetch_add(1, Ordering::Relaxed);
///         c.next().await
///     })
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result> + Send + Sync + 'static,
{
    f
}

/// Create a handler from an async closure-like expression.
///
/// The body cannot capture its environment; use [`handler_fn`] for that.
#[macro_export]
macro_rules! handler {
    (async |$c:ident| $body:expr) => {{
        async fn handler($c: &mut $crate::Context) -> $crate::Result {
            $body
        }

        handler
    }};
}

/// A reference counted, type-erased handler.
pub type SharedHandler = Arc<dyn Handler>;

/// An ordered list of handlers, see [`handlers!`](crate::handlers).
#[derive(Clone, Default)]
pub struct Handlers(Vec<SharedHandler>);

impl Handlers {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the list.
    pub fn push(mut self, handler: impl Handler) -> Self {
        self.0.push(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers").field("len", &self.0.len()).finish()
    }
}

/// Create a [`Handlers`] list.
///
/// ```rust,ignore
/// app.get("/admin", handlers![auth, audit, dashboard]);
/// ```
#[macro_export]
macro_rules! handlers {
    ($($handler:expr),* $(,)?) => {
        $crate::Handlers::new()$(.push($handler))*
    };
}

/// Types that can be registered as the handlers of a route.
pub trait IntoHandlers {
    fn into_handlers(self) -> Vec<SharedHandler>;
}

impl<H> IntoHandlers for H
where
    H: Handler,
{
    fn into_handlers(self) -> Vec<SharedHandler> {
        vec![Arc::new(self)]
    }
}

impl IntoHandlers for Handlers {
    fn into_handlers(self) -> Vec<SharedHandler> {
        self.0
    }
}
