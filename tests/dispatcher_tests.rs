//! Tests for the request dispatcher
//!
//! # Test Coverage
//!
//! - First-match routing in registration order
//! - View selection by predicate chain, 404 when every binding rejects
//! - Sum-type URL segments (unknown literals never match)
//! - Handler signals, internal errors and panics (handler, predicate, resolver, renderer)
//! - Dependency injection under concurrent requests; pending resolvers awaited together
//! - The transport adapter: event order, disconnects, malformed requests

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::join_all;
use http::Method;
use serde_json::{json, Map, Value};
use tokio::sync::Barrier;
use tokio::time::timeout;

use common::{dispatcher_with, send, text_handler};
use solorouter::dispatcher::{
    BodyReceive, BufferedSink, Receive, ReceiveEvent, SendEvent, TransportError,
};
use solorouter::config::Settings;
use solorouter::render::{RenderError, Renderer};
use solorouter::runtime::{
    DepValue, Dependency, DependencyError, Identity, Resolved, Session, SessionStore, USER_ID_KEY,
};
use solorouter::sum::SumType;
use solorouter::views::{handler_fn, HandlerError, HttpSignal, Predicate, Reply};
use solorouter::{ConfigurationError, Request, Response, Runtime, Scope, ViewDecl};

fn get(path: &str) -> Request {
    Request::new(Method::GET, path)
}

#[tokio::test]
async fn test_first_registered_route_wins() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("any", "/{name}")?;
        config.add_route("fixed", "/fixed")?;
        config.add_view(ViewDecl::new(text_handler("any", "any")).route("any"))?;
        config.add_view(ViewDecl::new(text_handler("fixed", "fixed")).route("fixed"))
    });

    let response = dispatcher.dispatch(get("/fixed")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "any");
}

#[tokio::test]
async fn test_views_compete_by_predicates() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("item", "/items/{id:\\d+}")?;
        config.add_view(
            ViewDecl::new(text_handler("create", "created"))
                .route("item")
                .request_method("POST"),
        )?;
        config.add_view(ViewDecl::new(text_handler("show", "shown")).route("item"))
    });

    let shown = dispatcher.dispatch(get("/items/7")).await;
    assert_eq!(shown.body_text(), "shown");
    assert_eq!(shown.content_type(), Some("text/plain; charset=utf-8"));

    let created = dispatcher
        .dispatch(Request::new(Method::POST, "/items/7"))
        .await;
    assert_eq!(created.body_text(), "created");

    // every binding rejects
    let put = dispatcher
        .dispatch(Request::new(Method::PUT, "/items/7"))
        .await;
    assert_eq!(put.status, 404);

    // the rule rejects before any view is consulted
    assert_eq!(dispatcher.dispatch(get("/items/seven")).await.status, 404);
    assert_eq!(dispatcher.dispatch(get("/nowhere")).await.status, 404);
}

#[tokio::test]
async fn test_head_is_served_by_get_views_without_body() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("home", "/")?;
        config.add_view(ViewDecl::new(text_handler("home", "welcome")).route("home"))
    });

    let response = dispatcher.dispatch(Request::new(Method::HEAD, "/")).await;
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_sum_type_segment() {
    let dispatcher = dispatcher_with(|config| {
        config.add_sum_type(
            SumType::builder("tests.Provider")
                .variant("GITHUB", "github")
                .variant("FACEBOOK", "facebook")
                .build()?,
        )?;
        config.add_route("login", "/login/{provider:<tests.Provider>}")?;
        let handler = handler_fn("login", |call| async move {
            let variant = call
                .context
                .get_variant("provider")
                .ok_or_else(|| anyhow!("provider missing"))?;
            Ok::<_, HandlerError>(Reply::from(json!({
                "variant": variant.name(),
                "raw": call.request.get_url_param("provider"),
            })))
        })
        .into_handler();
        config.add_view(ViewDecl::new(handler).route("login").renderer("json"))
    });

    let response = dispatcher.dispatch(get("/login/github")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("application/json"));
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body, json!({"variant": "GITHUB", "raw": "github"}));

    assert_eq!(dispatcher.dispatch(get("/login/twitter")).await.status, 404);
    assert_eq!(dispatcher.dispatch(get("/login/GITHUB")).await.status, 404);
}

#[tokio::test]
async fn test_handler_signals() {
    let dispatcher = dispatcher_with(|config| {
        let cases: [(&str, HttpSignal); 4] = [
            ("forbidden", HttpSignal::Forbidden),
            ("unauthorized", HttpSignal::Unauthorized),
            ("conflict", HttpSignal::Client(409)),
            (
                "moved",
                HttpSignal::Redirect {
                    location: "/elsewhere".to_string(),
                },
            ),
        ];
        for (name, signal) in cases {
            config.add_route(name, &format!("/{name}"))?;
            let handler = handler_fn(name, move |_call| {
                let signal = signal.clone();
                async move { Err::<Reply, _>(HandlerError::from(signal)) }
            })
            .into_handler();
            config.add_view(ViewDecl::new(handler).route(name))?;
        }
        Ok(())
    });

    assert_eq!(dispatcher.dispatch(get("/forbidden")).await.status, 403);
    assert_eq!(dispatcher.dispatch(get("/unauthorized")).await.status, 401);
    assert_eq!(dispatcher.dispatch(get("/conflict")).await.status, 409);

    let moved = dispatcher.dispatch(get("/moved")).await;
    assert_eq!(moved.status, 302);
    assert_eq!(moved.get_header("location"), Some("/elsewhere"));
}

#[tokio::test]
async fn test_failures_become_bare_500() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("broken", "/broken")?;
        config.add_route("panics", "/panics")?;
        config.add_view(
            ViewDecl::new(
                handler_fn("broken", |_call| async {
                    Err::<Reply, _>(HandlerError::from(anyhow!("database password is hunter2")))
                })
                .into_handler(),
            )
            .route("broken"),
        )?;
        config.add_view(
            ViewDecl::new(
                handler_fn("panics", |_call| async {
                    if true {
                        panic!("handler exploded");
                    }
                    Ok::<_, HandlerError>(Reply::from("unreachable"))
                })
                .into_handler(),
            )
            .route("panics"),
        )
    });

    let broken = dispatcher.dispatch(get("/broken")).await;
    assert_eq!(broken.status, 500);
    assert!(!broken.body_text().contains("hunter2"));

    let panicked = dispatcher.dispatch(get("/panics")).await;
    assert_eq!(panicked.status, 500);

    // the dispatcher keeps serving after a panic
    assert_eq!(dispatcher.dispatch(get("/panics")).await.status, 500);
}

#[tokio::test]
async fn test_predicate_raises_status() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("private", "/private")?;
        config.add_view(
            ViewDecl::new(text_handler("private", "secret"))
                .route("private")
                .predicate("authenticated", json!({"value": true, "raises": 401})),
        )
    });

    let response = dispatcher.dispatch(get("/private")).await;
    assert_eq!(response.status, 401);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_dependencies_are_isolated_per_request() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("whoami", "/whoami")?;
        let handler = handler_fn("whoami", |call| async move {
            let session = call
                .deps
                .get::<Session>("session")
                .ok_or_else(|| anyhow!("no session"))?;
            let identity = call
                .deps
                .get::<Identity>("identity")
                .ok_or_else(|| anyhow!("no identity"))?;
            Ok::<_, HandlerError>(Reply::from(json!({
                "session": session.user_id(),
                "identity": identity.user_id,
                "request_id": call.request.request_id.to_string(),
            })))
        })
        .requires(Dependency::of::<Session>("session"))
        .requires(Dependency::of::<Identity>("identity"))
        .into_handler();
        config.add_view(ViewDecl::new(handler).route("whoami").renderer("json"))
    });

    let store = Arc::clone(dispatcher.runtime().session_store());
    let mut requests = Vec::new();
    for n in 0..32 {
        let mut data = Map::new();
        data.insert(USER_ID_KEY.to_string(), json!(format!("user-{n}")));
        let id = store
            .save_session(&Session::with_id(format!("sid-{n}"), data))
            .await
            .unwrap();
        let request = get("/whoami").with_header("cookie", format!("{}={id}", store.cookie_name()));
        requests.push((n, request.request_id.to_string(), request));
    }

    let responses = join_all(requests.into_iter().map(|(n, request_id, request)| {
        let dispatcher = dispatcher.clone();
        async move { (n, request_id, dispatcher.dispatch(request).await) }
    }))
    .await;

    for (n, request_id, response) in responses {
        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        let user = format!("user-{n}");
        assert_eq!(body["session"], json!(user));
        assert_eq!(body["identity"], json!(user));
        assert_eq!(body["request_id"], json!(request_id));
    }
}

#[tokio::test]
async fn test_handle_sends_start_then_final_body() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("echo", "/echo")?;
        let handler = handler_fn("echo", |call| async move {
            Ok::<_, HandlerError>(Reply::from(
                String::from_utf8_lossy(&call.request.body).into_owned(),
            ))
        })
        .into_handler();
        config.add_view(
            ViewDecl::new(handler)
                .route("echo")
                .request_method("POST"),
        )
    });

    let mut receive = BodyReceive::chunked(vec![b"hel".to_vec(), b"lo".to_vec()]);
    let mut sink = BufferedSink::new();
    dispatcher
        .handle(Scope::new("POST", "/echo"), &mut receive, &mut sink)
        .await
        .unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], SendEvent::Start { status: 200, .. }));
    assert_eq!(
        events[1],
        SendEvent::Body {
            body: b"hello".to_vec(),
            more_body: false,
        }
    );
}

struct HangUp;

#[async_trait]
impl Receive for HangUp {
    async fn receive(&mut self) -> Result<ReceiveEvent, TransportError> {
        Ok(ReceiveEvent::Disconnect)
    }
}

#[tokio::test]
async fn test_disconnect_sends_nothing() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("home", "/")?;
        config.add_view(ViewDecl::new(text_handler("home", "hi")).route("home"))
    });

    let mut sink = BufferedSink::new();
    let result = dispatcher
        .handle(Scope::new("GET", "/"), &mut HangUp, &mut sink)
        .await;
    assert_eq!(result, Err(TransportError::Disconnected));
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_malformed_requests_get_400() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("home", "/")?;
        config.add_view(ViewDecl::new(text_handler("home", "hi")).route("home"))
    })
    .with_query_max_fields(2);

    let bad_method = send(&dispatcher, Scope::new("G E T", "/"), b"").await;
    assert_eq!(bad_method.status, 400);

    let flooded = send(&dispatcher, Scope::new("GET", "/?a=1&b=2&c=3"), b"").await;
    assert_eq!(flooded.status, 400);

    let fine = send(&dispatcher, Scope::new("GET", "/?a=1&b=2"), b"").await;
    assert_eq!(fine.status, 200);
    assert_eq!(fine.body_text(), "hi");
}

#[tokio::test]
async fn test_request_id_is_taken_from_header() {
    let dispatcher = dispatcher_with(|config| {
        config.add_route("rid", "/rid")?;
        let handler = handler_fn("rid", |call| async move {
            Ok::<_, HandlerError>(Reply::from(call.request.request_id.to_string()))
        })
        .into_handler();
        config.add_view(ViewDecl::new(handler).route("rid"))
    });

    let rid = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let response = send(
        &dispatcher,
        Scope::new("GET", "/rid").with_header("X-Request-Id", rid),
        b"",
    )
    .await;
    assert_eq!(response.body_text(), rid);
}

/// Predicate that panics whenever it is consulted.
struct Explodes;

#[async_trait]
impl Predicate for Explodes {
    fn name(&self) -> &str {
        "explodes"
    }

    fn text(&self) -> String {
        "explodes = true".to_string()
    }

    async fn evaluate(&self, _runtime: &Runtime, _request: &Request) -> bool {
        panic!("predicate exploded");
    }
}

/// Renderer that panics on every value.
struct Boom;

impl Renderer for Boom {
    fn name(&self) -> &str {
        "boom"
    }

    fn render(&self, _request: &Request, _value: Value) -> Result<Response, RenderError> {
        panic!("renderer exploded");
    }
}

/// Dependency type whose resolver panics.
struct Fuse;

#[tokio::test]
async fn test_panics_past_routing_become_bare_500() {
    let dispatcher = dispatcher_with(|config| {
        config.add_view_predicate(
            "explodes",
            Arc::new(
                |_: &Value, _: &mut Settings| -> Result<Arc<dyn Predicate>, ConfigurationError> {
                    Ok(Arc::new(Explodes))
                },
            ),
            None,
            None,
        );
        config.add_renderer(
            ".boom",
            Arc::new(|_: &str| Arc::new(Boom) as Arc<dyn Renderer>),
        );
        config.add_dependency::<Fuse, _>(|_, _| panic!("resolver exploded"));

        config.add_route("predicate", "/predicate")?;
        config.add_route("resolver", "/resolver")?;
        config.add_route("renderer", "/renderer")?;
        config.add_route("fine", "/fine")?;
        config.add_view(
            ViewDecl::new(text_handler("predicate", "unreachable"))
                .route("predicate")
                .predicate("explodes", true),
        )?;
        config.add_view(
            ViewDecl::new(
                handler_fn("resolver", |_call| async {
                    Ok::<_, HandlerError>(Reply::from("unreachable"))
                })
                .requires(Dependency::of::<Fuse>("fuse"))
                .into_handler(),
            )
            .route("resolver"),
        )?;
        config.add_view(
            ViewDecl::new(text_handler("renderer", "value"))
                .route("renderer")
                .renderer("page.boom"),
        )?;
        config.add_view(ViewDecl::new(text_handler("fine", "fine")).route("fine"))
    });

    for path in ["/predicate", "/resolver", "/renderer"] {
        let response = dispatcher.dispatch(get(path)).await;
        assert_eq!(response.status, 500, "{path}");
        assert_eq!(response.body_text(), "HTTP 500: Internal Server Error");
        assert!(!response.body_text().contains("exploded"));

        // the transport still gets a complete response
        let sent = send(&dispatcher, Scope::new("GET", path), b"").await;
        assert_eq!(sent.status, 500, "{path}");
    }

    assert_eq!(dispatcher.dispatch(get("/fine")).await.body_text(), "fine");
}

struct Left;
struct Right;

#[tokio::test]
async fn test_pending_dependencies_are_awaited_together() {
    // each resolver only finishes once the other one has started
    let barrier = Arc::new(Barrier::new(2));
    let dispatcher = dispatcher_with(|config| {
        let left = Arc::clone(&barrier);
        config.add_dependency::<Left, _>(move |_, _| {
            let barrier = Arc::clone(&left);
            Ok(Resolved::Pending(Box::pin(async move {
                barrier.wait().await;
                Ok::<_, DependencyError>(Arc::new(Left) as DepValue)
            })))
        });
        let right = Arc::clone(&barrier);
        config.add_dependency::<Right, _>(move |_, _| {
            let barrier = Arc::clone(&right);
            Ok(Resolved::Pending(Box::pin(async move {
                barrier.wait().await;
                Ok::<_, DependencyError>(Arc::new(Right) as DepValue)
            })))
        });

        config.add_route("pair", "/pair")?;
        let handler = handler_fn("pair", |call| async move {
            let names: Vec<&str> = call.deps.names().collect();
            Ok::<_, HandlerError>(Reply::from(json!(names)))
        })
        .requires(Dependency::of::<Right>("right"))
        .requires(Dependency::of::<Left>("left"))
        .into_handler();
        config.add_view(ViewDecl::new(handler).route("pair").renderer("json"))
    });

    let response = timeout(Duration::from_secs(5), dispatcher.dispatch(get("/pair")))
        .await
        .expect("pending dependencies were awaited one after another");
    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body, json!(["right", "left"]));
}
