use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::request::{Context, Request};
use crate::response::Response;
use crate::runtime::{Dependency, Injected};

/// Method invoked on class-style views when no `attr` is declared.
pub const DEFAULT_ATTR: &str = "call";

/// Everything a handler receives for one request.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub request: Arc<Request>,
    pub context: Arc<Context>,
    /// Method selected on a class-style view.
    pub attr: Option<Arc<str>>,
    pub deps: Injected,
}

/// Handler output: a finished response, or a value for the view's renderer.
#[derive(Debug, Clone)]
pub enum Reply {
    Response(Response),
    Value(Value),
}

impl From<Response> for Reply {
    fn from(res: Response) -> Self {
        Reply::Response(res)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Value(Value::String(text.to_string()))
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Value(Value::String(text))
    }
}

/// Non-success HTTP outcomes a handler can raise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpSignal {
    #[error("404 Not Found")]
    NotFound,

    #[error("403 Forbidden")]
    Forbidden,

    #[error("401 Unauthorized")]
    Unauthorized,

    #[error("302 Found: {location}")]
    Redirect { location: String },

    /// Any other 4xx.
    #[error("client error {0}")]
    Client(u16),

    /// Any other 3xx without a location.
    #[error("redirection {0}")]
    Redirection(u16),
}

impl HttpSignal {
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            HttpSignal::NotFound => 404,
            HttpSignal::Forbidden => 403,
            HttpSignal::Unauthorized => 401,
            HttpSignal::Redirect { .. } => 302,
            HttpSignal::Client(code) | HttpSignal::Redirection(code) => *code,
        }
    }

    /// Status-only response; redirects carry `Location`.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            HttpSignal::Redirect { location } => Response::redirect(302, &location),
            other => Response::status_only(other.status()),
        }
    }
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Signal(#[from] HttpSignal),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type HandlerResult = Result<Reply, HandlerError>;

/// A view callable.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    /// Dependencies to resolve before [`call`](Self::call).
    fn dependencies(&self) -> &[Dependency] {
        &[]
    }

    /// Methods a class-style view exposes; `None` for plain functions.
    fn methods(&self) -> Option<&[&'static str]> {
        None
    }

    async fn call(&self, invocation: Invocation) -> HandlerResult;
}

/// A closure handler built with [`handler_fn`].
pub struct FnHandler<F> {
    name: String,
    deps: Vec<Dependency>,
    func: F,
}

/// Wrap an async closure as a [`Handler`].
///
/// ```rust,ignore
/// let users = handler_fn("users", |_call| async { Ok(Reply::from(json!({}))) })
///     .into_handler();
/// ```
pub fn handler_fn<F, Fut>(name: impl Into<String>, func: F) -> FnHandler<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler {
        name: name.into(),
        deps: Vec::new(),
        func,
    }
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    #[must_use]
    pub fn requires(mut self, dependency: Dependency) -> Self {
        self.deps.push(dependency);
        self
    }

    #[must_use]
    pub fn into_handler(self) -> Arc<dyn Handler> {
        Arc::new(self)
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }

    async fn call(&self, invocation: Invocation) -> HandlerResult {
        (self.func)(invocation).await
    }
}

/// A view constructed per request from `(request, context)` whose methods are
/// selected by the binding's `attr`.
#[async_trait]
pub trait ClassView: Send + Sync + Sized + 'static {
    /// Methods [`dispatch`](Self::dispatch) understands.
    const METHODS: &'static [&'static str];

    fn construct(request: Arc<Request>, context: Arc<Context>) -> Self;

    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    async fn dispatch(&self, method: &str, deps: &Injected) -> HandlerResult;
}

/// [`Handler`] adapter for a [`ClassView`].
pub struct ClassHandler<V> {
    name: String,
    deps: Vec<Dependency>,
    _view: PhantomData<fn() -> V>,
}

impl<V: ClassView> ClassHandler<V> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deps: V::dependencies(),
            _view: PhantomData,
        }
    }
}

#[async_trait]
impl<V: ClassView> Handler for ClassHandler<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }

    fn methods(&self) -> Option<&[&'static str]> {
        Some(V::METHODS)
    }

    async fn call(&self, invocation: Invocation) -> HandlerResult {
        let method = invocation
            .attr
            .as_deref()
            .unwrap_or(DEFAULT_ATTR)
            .to_string();
        let view = V::construct(invocation.request, invocation.context);
        view.dispatch(&method, &invocation.deps).await
    }
}

/// Wraps a handler in another; the first decorator listed on a view is outermost.
pub type Decorator = Arc<dyn Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync>;

struct Around<F> {
    label: String,
    inner: Arc<dyn Handler>,
    wrap: F,
}

#[async_trait]
impl<F, Fut> Handler for Around<F>
where
    F: Fn(Arc<dyn Handler>, Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.label
    }

    fn dependencies(&self) -> &[Dependency] {
        self.inner.dependencies()
    }

    fn methods(&self) -> Option<&[&'static str]> {
        self.inner.methods()
    }

    async fn call(&self, invocation: Invocation) -> HandlerResult {
        (self.wrap)(Arc::clone(&self.inner), invocation).await
    }
}

/// Build a [`Decorator`] from an async function receiving the wrapped handler.
///
/// The decorated handler keeps the inner handler's dependencies and methods.
pub fn around<F, Fut>(label: &str, wrap: F) -> Decorator
where
    F: Fn(Arc<dyn Handler>, Invocation) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let label = label.to_string();
    Arc::new(move |inner: Arc<dyn Handler>| {
        Arc::new(Around {
            label: format!("{}({})", label, inner.name()),
            inner,
            wrap: wrap.clone(),
        }) as Arc<dyn Handler>
    })
}
