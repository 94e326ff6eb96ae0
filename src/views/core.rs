use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::handler::{ClassHandler, ClassView, Decorator, Handler, DEFAULT_ATTR};
use super::predicates::{BoundPredicate, PredicateList};
use crate::config::Settings;
use crate::error::ConfigurationError;
use crate::render::{Renderer, RendererRegistry};
use crate::request::Request;
use crate::runtime::Runtime;

/// Renderer used when a view names none.
pub const DEFAULT_RENDERER: &str = "string";

/// Method admitted when a view names none.
pub const DEFAULT_REQUEST_METHOD: &str = "GET";

/// A view declaration before it is bound to a route.
#[derive(Clone)]
pub struct ViewDecl {
    route_name: Option<String>,
    handler: Arc<dyn Handler>,
    attr: Option<String>,
    renderer: Option<String>,
    decorators: Vec<Decorator>,
    predicates: Vec<(String, Value)>,
}

impl ViewDecl {
    #[must_use]
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            route_name: None,
            handler,
            attr: None,
            renderer: None,
            decorators: Vec::new(),
            predicates: Vec::new(),
        }
    }

    /// Declaration for a class-style view; `attr` defaults to `call`.
    #[must_use]
    pub fn class<V: ClassView>(name: &str) -> Self {
        Self::new(Arc::new(ClassHandler::<V>::new(name)))
    }

    #[must_use]
    pub fn route(mut self, route_name: &str) -> Self {
        self.route_name = Some(route_name.to_string());
        self
    }

    #[must_use]
    pub fn attr(mut self, attr: &str) -> Self {
        self.attr = Some(attr.to_string());
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: &str) -> Self {
        self.renderer = Some(renderer.to_string());
        self
    }

    #[must_use]
    pub fn request_method(self, method: &str) -> Self {
        self.predicate("request_method", Value::String(method.to_string()))
    }

    #[must_use]
    pub fn request_methods(self, methods: &[&str]) -> Self {
        let methods = methods.iter().map(|m| Value::String((*m).to_string())).collect();
        self.predicate("request_method", Value::Array(methods))
    }

    /// Add a decorator. Decorators wrap in listing order, first outermost.
    #[must_use]
    pub fn decorator(mut self, decorator: Decorator) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Add a named predicate value, e.g. `("permission", "users:view")`.
    #[must_use]
    pub fn predicate(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.predicates.push((name.to_string(), value.into()));
        self
    }

    /// Fill unset fields from shared defaults.
    #[must_use]
    pub fn defaults(mut self, defaults: &ViewDefaults) -> Self {
        if self.route_name.is_none() {
            self.route_name.clone_from(&defaults.route_name);
        }
        if self.renderer.is_none() {
            self.renderer.clone_from(&defaults.renderer);
        }
        if self.attr.is_none() {
            self.attr.clone_from(&defaults.attr);
        }
        for (name, value) in &defaults.predicates {
            if !self.predicates.iter().any(|(n, _)| n == name) {
                self.predicates.push((name.clone(), value.clone()));
            }
        }
        let mut decorators = defaults.decorators.clone();
        decorators.append(&mut self.decorators);
        self.decorators = decorators;
        self
    }

    #[must_use]
    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for ViewDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDecl")
            .field("route_name", &self.route_name)
            .field("handler", &self.handler.name())
            .field("attr", &self.attr)
            .field("renderer", &self.renderer)
            .field("predicates", &self.predicates)
            .finish_non_exhaustive()
    }
}

/// Values shared by several view declarations.
#[derive(Clone, Default)]
pub struct ViewDefaults {
    pub route_name: Option<String>,
    pub renderer: Option<String>,
    pub attr: Option<String>,
    pub predicates: Vec<(String, Value)>,
    pub decorators: Vec<Decorator>,
}

impl ViewDefaults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route(mut self, route_name: &str) -> Self {
        self.route_name = Some(route_name.to_string());
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: &str) -> Self {
        self.renderer = Some(renderer.to_string());
        self
    }

    #[must_use]
    pub fn predicate(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.predicates.push((name.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn decorator(mut self, decorator: Decorator) -> Self {
        self.decorators.push(decorator);
        self
    }
}

/// Outcome of a binding's predicate chain for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected,
    /// A failing predicate asked for this status instead of falling through.
    Raise(u16),
}

/// A handler attached to a route with its predicate chain and renderer.
#[derive(Clone)]
pub struct ViewBinding {
    route_name: String,
    handler: Arc<dyn Handler>,
    attr: Option<Arc<str>>,
    renderer_name: String,
    renderer: Arc<dyn Renderer>,
    predicates: Vec<BoundPredicate>,
}

impl ViewBinding {
    #[must_use]
    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    #[must_use]
    pub fn attr(&self) -> Option<&Arc<str>> {
        self.attr.as_ref()
    }

    #[must_use]
    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    #[must_use]
    pub fn renderer_name(&self) -> &str {
        &self.renderer_name
    }

    #[must_use]
    pub fn predicates(&self) -> &[BoundPredicate] {
        &self.predicates
    }

    /// Evaluate the chain in order, stopping at the first failure.
    pub async fn admits(&self, runtime: &Runtime, request: &Request) -> Admission {
        for bound in &self.predicates {
            if !bound.predicate.evaluate(runtime, request).await {
                debug!(
                    route = %self.route_name,
                    handler = %self.handler.name(),
                    predicate = %bound.predicate.text(),
                    "Predicate rejected request"
                );
                return match bound.raises {
                    Some(status) => Admission::Raise(status),
                    None => Admission::Rejected,
                };
            }
        }
        Admission::Admitted
    }
}

impl fmt::Debug for ViewBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewBinding")
            .field("route_name", &self.route_name)
            .field("handler", &self.handler.name())
            .field("attr", &self.attr)
            .field("renderer", &self.renderer_name)
            .field("predicates", &self.predicates)
            .finish()
    }
}

/// Turn a declaration into a binding.
///
/// The method predicate defaults to `GET`, the renderer to `string`, and
/// class-style views select `call` unless an `attr` is given.
pub fn add_view(
    decl: ViewDecl,
    predicates: &PredicateList,
    renderers: &RendererRegistry,
    settings: &mut Settings,
) -> Result<ViewBinding, ConfigurationError> {
    let ViewDecl {
        route_name,
        handler,
        attr,
        renderer,
        decorators,
        predicates: mut values,
    } = decl;

    let route_name = route_name.ok_or_else(|| ConfigurationError::MissingRouteName {
        handler: handler.name().to_string(),
    })?;

    if !values.iter().any(|(name, _)| name == "request_method") {
        values.insert(
            0,
            (
                "request_method".to_string(),
                Value::String(DEFAULT_REQUEST_METHOD.to_string()),
            ),
        );
    }
    let chain = predicates.make(&values, settings)?;

    let renderer_name = renderer.unwrap_or_else(|| DEFAULT_RENDERER.to_string());
    let renderer = renderers.get_renderer(&renderer_name)?;

    let attr = match (attr, handler.methods()) {
        (Some(attr), _) => Some(Arc::from(attr.as_str())),
        (None, Some(_)) => Some(Arc::from(DEFAULT_ATTR)),
        (None, None) => None,
    };

    let handler = decorators
        .iter()
        .rev()
        .fold(handler, |inner, decorate| decorate(inner));

    debug!(
        route = %route_name,
        handler = %handler.name(),
        renderer = %renderer_name,
        predicates = chain.len(),
        "View configured"
    );

    Ok(ViewBinding {
        route_name,
        handler,
        attr,
        renderer_name,
        renderer,
        predicates: chain,
    })
}
