//! # solorouter
//!
//! **solorouter** is a route compilation and request dispatch engine. Applications are
//! assembled from packages that declare typed URL patterns, competing views guarded by async
//! predicates, and closed sum types whose variants double as URL segment rules and dispatch
//! keys.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`pattern`]** - Route pattern mini-language: `/login/{provider:<pkg.AuthProvider>}`
//! - **[`sum`]** - Closed variant types, exhaustive inline matching and contract bindings
//! - **[`routes`]** - Namespaced route registry
//! - **[`views`]** - View bindings, handlers, decorators and predicates
//! - **[`render`]** - `json`, `jsonapi` and `string` renderers
//! - **[`configurator`]** - Two-phase configuration (include, scan) frozen into a [`Registry`]
//! - **[`router`]** - Runtime path matching over the frozen route table
//! - **[`runtime`]** - Sessions, identity and dependency injection
//! - **[`dispatcher`]** - Per-request state machine and transport adapter
//! - **[`config`]** - YAML application config and [`bootstrap`](config::bootstrap)
//! - **[`logging`]** - Structured `tracing` setup
//!
//! ## Request lifecycle
//!
//! ```text
//! path ──► Router ──► ViewBinding predicates ──► Context ──► DependencyTable ──► Handler ──► Renderer
//!            │              │ (first passing wins)                                   │
//!            └─ 404         └─ 404 / raises                                          └─ 500 on error or panic
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use solorouter::{apps, config, Dispatcher, Runtime};
//!
//! let config = config::AppConfig::load("config/solo.yaml".as_ref())?;
//! let registry = config::bootstrap(&config, &apps::builtin_packages())?;
//! let dispatcher = Dispatcher::new(Runtime::new(Arc::new(registry)));
//! let response = dispatcher
//!     .dispatch(solorouter::Request::new(http::Method::GET, "/hello/"))
//!     .await;
//! assert_eq!(response.body_text(), "Hello World!");
//! ```

pub mod apps;
pub mod cli;
pub mod config;
pub mod configurator;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod pattern;
pub mod render;
pub mod request;
pub mod response;
pub mod router;
pub mod routes;
pub mod runtime;
pub mod sum;
pub mod views;

pub use configurator::{Configurator, Declaration, Directive, Package, Registry};
pub use dispatcher::{Dispatcher, Scope};
pub use error::{ConfigurationError, PatternError, UrlError};
pub use ids::RequestId;
pub use request::{Context, ContextValue, Request};
pub use response::Response;
pub use runtime::Runtime;
pub use sum::{SumError, SumType, Variant};
pub use views::{handler_fn, HandlerError, HttpSignal, Invocation, Reply, ViewDecl};
