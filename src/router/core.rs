//! Router core - request path to route resolution.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{ConfigurationError, UrlError};
use crate::pattern::render_runtime_pattern;
use crate::request::ParamVec;
use crate::routes::Route;

/// Result of successfully matching a request path to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route (Arc to avoid cloning its bindings per request)
    pub route: Arc<Route>,
    /// Placeholder values, taken from the percent-decoded path, in pattern order
    pub params: ParamVec,
}

impl RouteMatch {
    /// Get a URL parameter by name ("last write wins").
    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

struct CompiledRoute {
    regex: Regex,
    names: Vec<Arc<str>>,
    route: Arc<Route>,
}

/// Matches request paths against every route in registration order.
///
/// Each route's pattern is expanded once into an anchored regex; a
/// `<SumType>` rule becomes the alternation of its values, so a path with an
/// unknown variant value never reaches a view.
#[derive(Clone)]
pub struct Router {
    routes: Arc<[CompiledRoute]>,
    index: HashMap<(Arc<str>, Arc<str>), usize>,
}

impl Router {
    /// Compile the runtime regex of every route.
    pub fn new(routes: Vec<Route>) -> Result<Self, ConfigurationError> {
        let mut compiled = Vec::with_capacity(routes.len());
        let mut index = HashMap::with_capacity(routes.len());

        for route in routes {
            let source = render_runtime_pattern(route.pattern());
            let regex = Regex::new(&source).map_err(|e| ConfigurationError::InvalidRule {
                segment: route.name().to_string(),
                rule: source.clone(),
                reason: e.to_string(),
            })?;
            let names = route.pattern().placeholders().map(Arc::from).collect();
            index.insert(
                (Arc::from(route.namespace()), Arc::from(route.name())),
                compiled.len(),
            );
            compiled.push(CompiledRoute {
                regex,
                names,
                route: Arc::new(route),
            });
        }

        // RT5: Routing table loaded
        let routes_summary: Vec<String> = compiled
            .iter()
            .take(10)
            .map(|r| format!("{}:{} {}", r.route.namespace(), r.route.name(), r.route.pattern().pattern()))
            .collect();
        info!(
            routes_count = compiled.len(),
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );

        Ok(Self {
            routes: compiled.into(),
            index,
        })
    }

    /// Match a request path to the first route whose pattern accepts it.
    ///
    /// The path is percent-decoded once before matching, so rules see the same
    /// text that [`url_for`](Self::url_for) validated before encoding.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// if let Some(m) = router.route("/login/github") {
    ///     assert_eq!(m.get_param("provider"), Some("github"));
    /// }
    /// ```
    #[must_use]
    pub fn route(&self, path: &str) -> Option<RouteMatch> {
        // RT1: Route match attempt
        debug!(path = %path, "Route match attempt");
        let match_start = Instant::now();
        let decoded = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));

        let found = self.routes.iter().find_map(|compiled| {
            compiled
                .regex
                .captures(&decoded)
                .map(|caps| (compiled, caps))
        });
        let match_duration = match_start.elapsed();

        let Some((compiled, caps)) = found else {
            // RT4: No route found (404)
            warn!(
                path = %path,
                duration_us = match_duration.as_micros(),
                "No route matched"
            );
            return None;
        };

        let params: ParamVec = compiled
            .names
            .iter()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (Arc::clone(name), m.as_str().to_string()))
            })
            .collect();

        // RT3: Route matched
        if match_duration > Duration::from_millis(1) {
            warn!(
                path = %path,
                route = %compiled.route.name(),
                namespace = %compiled.route.namespace(),
                params = ?params,
                duration_us = match_duration.as_micros(),
                "Slow route matching detected"
            );
        } else {
            info!(
                path = %path,
                route = %compiled.route.name(),
                namespace = %compiled.route.namespace(),
                params = ?params,
                duration_us = match_duration.as_micros(),
                "Route matched"
            );
        }

        Some(RouteMatch {
            route: Arc::clone(&compiled.route),
            params,
        })
    }

    /// Routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter().map(|r| &r.route)
    }

    #[must_use]
    pub fn find(&self, namespace: &str, name: &str) -> Option<&Arc<Route>> {
        let key: (Arc<str>, Arc<str>) = (Arc::from(namespace), Arc::from(name));
        self.index.get(&key).map(|&idx| &self.routes[idx].route)
    }

    /// Build the path of a named route.
    pub fn url_for(
        &self,
        namespace: &str,
        name: &str,
        params: &[(&str, &str)],
    ) -> Result<String, UrlError> {
        let route = self
            .find(namespace, name)
            .ok_or_else(|| UrlError::UnknownRoute {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        route.pattern().expand(params)
    }

    /// Human-readable route table, one line per view.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("[routes] count={}", self.routes.len())];
        for compiled in self.routes.iter() {
            let route = &compiled.route;
            for view in route.views() {
                let predicates: Vec<String> =
                    view.predicates().iter().map(|p| p.predicate.text()).collect();
                lines.push(format!(
                    "[route] {}:{} {} -> {}{} renderer={} [{}]",
                    route.namespace(),
                    route.name(),
                    route.pattern().pattern(),
                    view.handler().name(),
                    view.attr().map(|a| format!(".{a}")).unwrap_or_default(),
                    view.renderer_name(),
                    predicates.join("; ")
                ));
            }
        }
        lines.join("\n")
    }

    /// Print the route table to stdout.
    pub fn dump_routes(&self) {
        println!("{}", self.describe());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| r.route.pattern().pattern()))
            .finish()
    }
}
