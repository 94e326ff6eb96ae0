//! # Route Registry
//!
//! Routes are named per namespace and compiled under the active route prefix at the moment
//! they are added. Both values are switched by
//! [`Configurator::include`](crate::configurator::Configurator::include) while a package's
//! `includeme` runs, so a package registers `"/users"` and the application decides where it
//! lives.
//!
//! Views attach to routes by name within the active namespace. Once a namespace has been
//! scanned, [`RouteTable::check_routes_consistency`] rejects any route left without a view.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::ConfigurationError;
use crate::pattern::{compile, CompiledPattern};
use crate::sum::SumTypeRegistry;
use crate::views::ViewBinding;

/// Namespace active before any package is included.
pub const DEFAULT_NAMESPACE: &str = "solo";

/// A named, compiled route and the views bound to it.
#[derive(Debug, Clone)]
pub struct Route {
    namespace: Arc<str>,
    name: Arc<str>,
    pattern: CompiledPattern,
    views: Vec<ViewBinding>,
}

impl Route {
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Bindings in registration order.
    #[must_use]
    pub fn views(&self) -> &[ViewBinding] {
        &self.views
    }
}

/// Routes of every namespace in registration order.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
    index: HashMap<(Arc<str>, Arc<str>), usize>,
    namespace: String,
    route_prefix: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            index: HashMap::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            route_prefix: String::new(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    /// Switch the active namespace, returning the previous one.
    pub fn change_namespace(&mut self, namespace: &str) -> String {
        std::mem::replace(&mut self.namespace, namespace.to_string())
    }

    /// Switch the active route prefix, returning the previous one.
    pub fn change_route_prefix(&mut self, prefix: &str) -> String {
        std::mem::replace(&mut self.route_prefix, prefix.to_string())
    }

    /// Compile `pattern` under the active prefix and register it as `name`.
    pub fn add_route(
        &mut self,
        name: &str,
        pattern: &str,
        sums: &SumTypeRegistry,
    ) -> Result<&Route, ConfigurationError> {
        let key: (Arc<str>, Arc<str>) = (Arc::from(self.namespace.as_str()), Arc::from(name));
        if self.index.contains_key(&key) {
            return Err(ConfigurationError::DuplicateRoute {
                namespace: self.namespace.clone(),
                name: name.to_string(),
            });
        }

        let compiled = compile(pattern, &self.route_prefix, sums)?;
        debug!(
            namespace = %self.namespace,
            route = %name,
            pattern = %compiled.pattern(),
            "Route added"
        );

        let idx = self.routes.len();
        self.routes.push(Route {
            namespace: Arc::clone(&key.0),
            name: Arc::clone(&key.1),
            pattern: compiled,
            views: Vec::new(),
        });
        self.index.insert(key, idx);
        Ok(&self.routes[idx])
    }

    /// Append a binding to its route in the active namespace.
    pub fn attach_view(&mut self, binding: ViewBinding) -> Result<(), ConfigurationError> {
        let idx = self
            .position(&self.namespace, binding.route_name())
            .ok_or_else(|| ConfigurationError::UnknownRoute {
                namespace: self.namespace.clone(),
                route: binding.route_name().to_string(),
            })?;
        self.routes[idx].views.push(binding);
        Ok(())
    }

    fn position(&self, namespace: &str, name: &str) -> Option<usize> {
        let key: (Arc<str>, Arc<str>) = (Arc::from(namespace), Arc::from(name));
        self.index.get(&key).copied()
    }

    #[must_use]
    pub fn get(&self, namespace: &str, name: &str) -> Option<&Route> {
        self.position(namespace, name).map(|idx| &self.routes[idx])
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.routes.iter().map(Route::namespace).collect()
    }

    /// Every route of `namespace` has at least one view, and every view's
    /// `attr` names a method its handler exposes.
    pub fn check_routes_consistency(&self, namespace: &str) -> Result<(), ConfigurationError> {
        for route in self.routes.iter().filter(|r| r.namespace() == namespace) {
            if route.views.is_empty() {
                return Err(ConfigurationError::RouteWithoutView {
                    namespace: namespace.to_string(),
                    name: route.name().to_string(),
                });
            }
            for view in &route.views {
                let Some(attr) = view.attr() else {
                    continue;
                };
                let exposed = view
                    .handler()
                    .methods()
                    .is_some_and(|methods| methods.contains(&attr.as_ref()));
                if !exposed {
                    return Err(ConfigurationError::UnknownViewMethod {
                        route: route.name().to_string(),
                        handler: view.handler().name().to_string(),
                        attr: attr.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn into_routes(self) -> Vec<Route> {
        self.routes
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_route_is_rejected_per_namespace() {
        let sums = SumTypeRegistry::new();
        let mut table = RouteTable::new();
        table.add_route("home", "/", &sums).unwrap();
        let err = table.add_route("home", "/other", &sums).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateRoute { .. }));

        table.change_namespace("other");
        assert!(table.add_route("home", "/", &sums).is_ok());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_prefix_applies_at_add_time() {
        let sums = SumTypeRegistry::new();
        let mut table = RouteTable::new();
        let old = table.change_route_prefix("/api/");
        assert_eq!(old, "");
        table.add_route("users", "/users", &sums).unwrap();
        table.change_route_prefix(&old);
        table.add_route("root", "", &sums).unwrap();

        assert_eq!(table.get("solo", "users").unwrap().pattern().pattern(), "/api/users");
        assert_eq!(table.get("solo", "root").unwrap().pattern().pattern(), "/");
    }

    #[test]
    fn test_route_without_view() {
        let sums = SumTypeRegistry::new();
        let mut table = RouteTable::new();
        table.add_route("lonely", "/lonely", &sums).unwrap();
        let err = table.check_routes_consistency("solo").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Route name \"lonely\" is not associated with a view callable."
        );
        assert!(table.check_routes_consistency("elsewhere").is_ok());
    }
}
