//! # Router Module
//!
//! Path matching over the frozen route table.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Expanding every compiled route pattern into an anchored runtime regex
//! - Matching request paths in route registration order
//! - Extracting and percent-decoding placeholder values
//! - Reverse routing (`url_for`) by namespace and route name
//!
//! ## Architecture
//!
//! 1. **Compilation**: at [`Configurator::build`](crate::configurator::Configurator::build)
//!    each route's pattern is rendered with
//!    [`render_runtime_pattern`](crate::pattern::render_runtime_pattern): `{id}` becomes
//!    `(?P<id>[^/]+)`, `{provider:<...AuthProvider>}` becomes `(?P<provider>(?:github|facebook))`.
//!
//! 2. **Matching**: for each request the router tests the path against the compiled
//!    patterns in order; the first match wins and carries its route and parameters.
//!
//! Choosing among the views bound to the matched route is the dispatcher's job.
//!
//! ## Example
//!
//! ```rust,ignore
//! let m = registry.router().route("/login/github").expect("route");
//! assert_eq!(m.route.name(), "login");
//! assert_eq!(m.get_param("provider"), Some("github"));
//! assert!(registry.router().route("/login/twitter").is_none());
//! ```

mod core;

pub use core::{RouteMatch, Router};
