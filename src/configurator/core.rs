use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::package::{Declaration, Directive, Package};
use super::registry::Registry;
use crate::config::Settings;
use crate::error::{ConfigurationError, UrlError};
use crate::pattern::join_prefix;
use crate::render::{RendererFactory, RendererRegistry};
use crate::request::Request;
use crate::router::Router;
use crate::routes::RouteTable;
use crate::runtime::{DependencyError, DependencyTable, Resolved, Runtime};
use crate::sum::{ContractBinding, SumType, SumTypeRegistry};
use crate::views::{add_view, PredicateFactory, PredicateList, ViewDecl};

/// Mutable configuration state, consumed by [`build`](Self::build).
pub struct Configurator {
    routes: RouteTable,
    sums: SumTypeRegistry,
    predicates: PredicateList,
    renderers: RendererRegistry,
    dependencies: DependencyTable,
    directives: HashMap<String, Directive>,
    settings: Settings,
    scanned: HashSet<String>,
}

impl Default for Configurator {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(Settings::new())
    }

    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            routes: RouteTable::new(),
            sums: SumTypeRegistry::new(),
            predicates: PredicateList::with_builtins(),
            renderers: RendererRegistry::with_builtins(),
            dependencies: DependencyTable::with_builtins(),
            directives: HashMap::new(),
            settings,
            scanned: HashSet::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn sums(&self) -> &SumTypeRegistry {
        &self.sums
    }

    #[must_use]
    pub fn predicates(&self) -> &PredicateList {
        &self.predicates
    }

    /// Register a route under the active namespace and prefix.
    pub fn add_route(&mut self, name: &str, pattern: &str) -> Result<(), ConfigurationError> {
        self.routes.add_route(name, pattern, &self.sums).map(|_| ())
    }

    pub fn change_namespace(&mut self, namespace: &str) -> String {
        self.routes.change_namespace(namespace)
    }

    pub fn change_route_prefix(&mut self, prefix: &str) -> String {
        self.routes.change_route_prefix(prefix)
    }

    pub fn add_sum_type(&mut self, sum: Arc<SumType>) -> Result<(), ConfigurationError> {
        self.sums.declare(sum)
    }

    pub fn bind_contract(&mut self, binding: ContractBinding) -> Result<(), ConfigurationError> {
        self.sums.bind(binding)
    }

    /// Bind a view to its route in the active namespace.
    pub fn add_view(&mut self, decl: ViewDecl) -> Result<(), ConfigurationError> {
        let binding = add_view(decl, &self.predicates, &self.renderers, &mut self.settings)?;
        self.routes.attach_view(binding)
    }

    pub fn add_view_predicate(
        &mut self,
        name: &str,
        factory: PredicateFactory,
        weighs_more_than: Option<&str>,
        weighs_less_than: Option<&str>,
    ) {
        debug!(predicate = %name, ?weighs_more_than, ?weighs_less_than, "View predicate added");
        self.predicates
            .add(name, factory, weighs_more_than, weighs_less_than);
    }

    pub fn add_renderer(&mut self, name: &str, factory: RendererFactory) {
        self.renderers.add_renderer(name, factory);
    }

    /// Register the resolver for dependencies of type `T`.
    pub fn add_dependency<T, F>(&mut self, resolver: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Runtime, &Arc<Request>) -> Result<Resolved, DependencyError> + Send + Sync + 'static,
    {
        self.dependencies.register::<T, F>(resolver);
    }

    pub fn add_directive(&mut self, name: &str, directive: Directive) {
        debug!(directive = %name, "Directive added");
        self.directives.insert(name.to_string(), directive);
    }

    /// Run a named directive with its setup arguments.
    pub fn invoke_directive(&mut self, name: &str, args: &Value) -> Result<(), ConfigurationError> {
        let directive = self
            .directives
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| ConfigurationError::UnknownDirective(name.to_string()))?;
        debug!(directive = %name, "Invoking directive");
        directive(self, args)
    }

    /// Run a package's `includeme` inside its namespace and under `route_prefix`.
    ///
    /// An empty prefix keeps the active one; a nested prefix is joined onto it.
    /// Namespace and prefix are restored whatever the outcome.
    pub fn include(
        &mut self,
        package: &dyn Package,
        route_prefix: &str,
    ) -> Result<(), ConfigurationError> {
        let prefix = match (self.routes.route_prefix(), route_prefix) {
            (current, "") => current.to_string(),
            ("", given) => given.to_string(),
            (current, given) => join_prefix(current, given),
        };
        let old_namespace = self.routes.change_namespace(package.name());
        let old_prefix = self.routes.change_route_prefix(&prefix);
        debug!(package = %package.name(), route_prefix = %prefix, "Including package");

        let result = self.include_inner(package);

        self.routes.change_route_prefix(&old_prefix);
        self.routes.change_namespace(&old_namespace);
        result
    }

    fn include_inner(&mut self, package: &dyn Package) -> Result<(), ConfigurationError> {
        for sum in package.sum_types()? {
            self.sums.declare(sum)?;
        }
        package.includeme(self)
    }

    /// Apply a package's declarations, then check its routes.
    ///
    /// Views are applied on the first scan only; contract bindings every time,
    /// which is harmless since re-binding the same implementation is a no-op.
    pub fn scan(&mut self, package: &dyn Package) -> Result<(), ConfigurationError> {
        let first_scan = self.scanned.insert(package.name().to_string());
        let old_namespace = self.routes.change_namespace(package.name());

        let result = self.scan_inner(package, first_scan);

        self.routes.change_namespace(&old_namespace);
        result?;
        self.routes.check_routes_consistency(package.name())
    }

    fn scan_inner(
        &mut self,
        package: &dyn Package,
        first_scan: bool,
    ) -> Result<(), ConfigurationError> {
        let mut views = 0usize;
        let mut bindings = 0usize;
        for declaration in package.declarations()? {
            match declaration {
                Declaration::View(decl) if first_scan => {
                    self.add_view(decl)?;
                    views += 1;
                }
                Declaration::View(_) => {}
                Declaration::Bind(binding) => {
                    self.sums.bind(binding)?;
                    bindings += 1;
                }
            }
        }
        debug!(package = %package.name(), views, bindings, first_scan, "Package scanned");
        Ok(())
    }

    pub fn check_sum_types_consistency(&self) -> Result<(), ConfigurationError> {
        self.sums.check_consistency()
    }

    /// Path of a route registered so far.
    pub fn url_for(
        &self,
        namespace: &str,
        name: &str,
        params: &[(&str, &str)],
    ) -> Result<String, UrlError> {
        self.routes
            .get(namespace, name)
            .ok_or_else(|| UrlError::UnknownRoute {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?
            .pattern()
            .expand(params)
    }

    /// Check everything once and freeze the result.
    pub fn build(self) -> Result<Registry, ConfigurationError> {
        self.sums.check_consistency()?;
        for namespace in self.routes.namespaces() {
            self.routes.check_routes_consistency(namespace)?;
        }
        for route in self.routes.routes() {
            for view in route.views() {
                let handler = view.handler();
                self.dependencies
                    .validate(handler.name(), handler.dependencies())?;
            }
        }

        let router = Router::new(self.routes.into_routes())?;
        info!(
            routes = router.len(),
            sum_types = self.sums.types().len(),
            renderers = ?self.renderers.names(),
            "Configuration frozen"
        );

        Ok(Registry {
            router,
            sums: self.sums,
            renderers: self.renderers,
            dependencies: self.dependencies,
            settings: self.settings,
        })
    }
}
