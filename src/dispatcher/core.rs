use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use http::Method;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::transport::{Receive, ReceiveEvent, ResponseSink, Scope, SendEvent, TransportError};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::pattern::Rule;
use crate::request::{parse_query, Context, ContextValue, Request, DEFAULT_MAX_QUERY_FIELDS};
use crate::response::Response;
use crate::routes::Route;
use crate::runtime::Runtime;
use crate::sum::SumError;
use crate::views::{Admission, HandlerError, Invocation, Reply, ViewBinding};

/// Where a request is in its lifecycle; logged at every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Unmatched,
    Matched,
    PredicateEvaluating,
    Invoking,
    Rendering,
    Responded,
    NotFound,
    Failed,
}

impl DispatchState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchState::Unmatched => "unmatched",
            DispatchState::Matched => "matched",
            DispatchState::PredicateEvaluating => "predicate_evaluating",
            DispatchState::Invoking => "invoking",
            DispatchState::Rendering => "rendering",
            DispatchState::Responded => "responded",
            DispatchState::NotFound => "not_found",
            DispatchState::Failed => "failed",
        }
    }
}

/// Per-request state machine over a frozen registry.
///
/// Every request-time failure ends in a response: unmatched paths and exhausted
/// bindings give 404, errors and panics anywhere past routing give a bare 500.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    runtime: Runtime,
    query_max_fields: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            query_max_fields: DEFAULT_MAX_QUERY_FIELDS,
        }
    }

    #[must_use]
    pub fn with_query_max_fields(mut self, limit: usize) -> Self {
        self.query_max_fields = limit;
        self
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Serve one connection-level request: read the body, dispatch, then send
    /// `Start` followed by a single final `Body`.
    pub async fn handle<R, S>(
        &self,
        scope: Scope,
        receive: &mut R,
        send: &mut S,
    ) -> Result<(), TransportError>
    where
        R: Receive + ?Sized,
        S: ResponseSink + ?Sized,
    {
        let mut body = Vec::new();
        loop {
            match receive.receive().await? {
                ReceiveEvent::Body {
                    body: chunk,
                    more_body,
                } => {
                    body.extend_from_slice(&chunk);
                    if !more_body {
                        break;
                    }
                }
                ReceiveEvent::Disconnect => {
                    debug!(path = %scope.path, "Client disconnected before the body was read");
                    return Err(TransportError::Disconnected);
                }
            }
        }

        let response = match self.build_request(scope, body) {
            Ok(request) => self.dispatch(request).await,
            Err(response) => response,
        };

        send.send(SendEvent::Start {
            status: response.status,
            headers: response.headers,
        })
        .await?;
        send.send(SendEvent::Body {
            body: response.body,
            more_body: false,
        })
        .await
    }

    /// Turn a transport scope into a [`Request`], or the 400 to send instead.
    pub fn build_request(&self, scope: Scope, body: Vec<u8>) -> Result<Request, Response> {
        let method = Method::from_bytes(scope.method.as_bytes()).map_err(|_| {
            warn!(method = %scope.method, "Invalid request method");
            Response::text(400, "Invalid request method")
        })?;
        let query = parse_query(&scope.query_string, self.query_max_fields).map_err(|e| {
            warn!(error = %e, path = %scope.path, "Rejected query string");
            Response::text(400, e.to_string())
        })?;

        let mut request = Request::new(method, scope.path);
        for (name, value) in scope.headers {
            request = request.with_header(&name, value);
        }
        request.request_id = RequestId::from_header_or_new(request.get_header(REQUEST_ID_HEADER));
        request.query = query;
        request.body = body;
        Ok(request)
    }

    /// Route, gate, inject, invoke and render one request.
    pub async fn dispatch(&self, request: Request) -> Response {
        let span = info_span!(
            "request",
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path,
        );
        let is_head = request.method == Method::HEAD;
        let mut response = self.dispatch_inner(request).instrument(span).await;
        if is_head {
            response.body.clear();
        }
        response
    }

    async fn dispatch_inner(&self, mut request: Request) -> Response {
        let start = Instant::now();
        trace_state(DispatchState::Unmatched);

        let Some(route_match) = self.runtime.registry().router().route(&request.path) else {
            trace_state(DispatchState::NotFound);
            return Response::not_found();
        };
        trace_state(DispatchState::Matched);

        request.url_params = route_match.params;
        let request = Arc::new(request);
        let route = route_match.route;

        // Panics past routing end as a bare 500.
        let outcome = AssertUnwindSafe(self.call_matched(&route, &request))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(panic) => {
                // H3: Panic caught
                error!(
                    route = %route.name(),
                    panic_message = %panic_message(panic.as_ref()),
                    "Request panicked - CRITICAL"
                );
                trace_state(DispatchState::Failed);
                return Response::internal_error();
            }
        };

        // H4: Handler execution complete
        info!(
            route = %route.name(),
            status = response.status,
            latency_us = start.elapsed().as_micros(),
            "Request complete"
        );
        response
    }

    /// Everything after routing: gate, inject, invoke and render.
    async fn call_matched(&self, route: &Route, request: &Arc<Request>) -> Response {
        let registry = self.runtime.registry();

        trace_state(DispatchState::PredicateEvaluating);
        let binding = match select_binding(&self.runtime, route, request).await {
            Ok(Some(binding)) => binding,
            Ok(None) => {
                warn!(
                    route = %route.name(),
                    bindings = route.views().len(),
                    "No view admitted the request"
                );
                trace_state(DispatchState::NotFound);
                return Response::not_found();
            }
            Err(status) => {
                info!(route = %route.name(), status, "Predicate raised");
                trace_state(DispatchState::Responded);
                return Response::status_only(status);
            }
        };

        let context = match build_context(route, request) {
            Ok(context) => context,
            Err(e) => {
                warn!(route = %route.name(), error = %e, "URL parameter rejected");
                trace_state(DispatchState::Failed);
                return Response::status_only(400);
            }
        };

        let handler = Arc::clone(binding.handler());
        let deps = match registry
            .dependencies()
            .resolve(&self.runtime, request, handler.dependencies())
            .await
        {
            Ok(deps) => deps,
            Err(e) => {
                error!(handler_name = %handler.name(), error = %e, "Dependency resolution failed");
                trace_state(DispatchState::Failed);
                return Response::internal_error();
            }
        };

        // H2: Handler execution start
        trace_state(DispatchState::Invoking);
        info!(
            handler_name = %handler.name(),
            attr = ?binding.attr(),
            injected = ?deps,
            "Handler execution start"
        );
        let invocation = Invocation {
            request: Arc::clone(request),
            context: Arc::new(context),
            attr: binding.attr().cloned(),
            deps,
        };

        let response = match handler.call(invocation).await {
            Ok(Reply::Response(response)) => response,
            Ok(Reply::Value(value)) => {
                trace_state(DispatchState::Rendering);
                match binding.renderer().render(request, value) {
                    Ok(response) => response,
                    Err(e) => {
                        error!(
                            handler_name = %handler.name(),
                            renderer = %binding.renderer_name(),
                            error = %e,
                            "Renderer failed"
                        );
                        trace_state(DispatchState::Failed);
                        return Response::internal_error();
                    }
                }
            }
            Err(HandlerError::Signal(signal)) => {
                debug!(handler_name = %handler.name(), status = signal.status(), "Handler signalled");
                signal.into_response()
            }
            Err(HandlerError::Internal(e)) => {
                error!(handler_name = %handler.name(), error = ?e, "Handler failed");
                trace_state(DispatchState::Failed);
                return Response::internal_error();
            }
        };
        trace_state(DispatchState::Responded);
        response
    }
}

fn trace_state(state: DispatchState) {
    debug!(state = state.as_str(), "Dispatch state");
}

/// First binding whose whole chain passes, or the status a predicate raised.
async fn select_binding<'r>(
    runtime: &Runtime,
    route: &'r Route,
    request: &Request,
) -> Result<Option<&'r ViewBinding>, u16> {
    for binding in route.views() {
        match binding.admits(runtime, request).await {
            Admission::Admitted => {
                debug!(
                    route = %route.name(),
                    handler_name = %binding.handler().name(),
                    "View admitted the request"
                );
                return Ok(Some(binding));
            }
            Admission::Rejected => {}
            Admission::Raise(status) => return Err(status),
        }
    }
    Ok(None)
}

/// Resolve sum-type-ruled parameters to variants; everything else stays text.
fn build_context(route: &Route, request: &Request) -> Result<Context, SumError> {
    let mut context = Context::new();
    for (name, value) in &request.url_params {
        let resolved = match route.pattern().rule(name) {
            Some(Rule::SumType(sum)) => ContextValue::Variant(sum.match_segment(value)?.clone()),
            _ => ContextValue::Raw(value.clone()),
        };
        context.insert(Arc::clone(name), resolved);
    }
    Ok(context)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
