use std::fmt;

use serde_json::Value;

use crate::config::Settings;
use crate::error::UrlError;
use crate::render::RendererRegistry;
use crate::router::Router;
use crate::runtime::{DependencyTable, DEFAULT_SESSION_COOKIE};
use crate::sum::SumTypeRegistry;

/// Everything the dispatcher reads, frozen by [`Configurator::build`](super::Configurator::build).
pub struct Registry {
    pub(super) router: Router,
    pub(super) sums: SumTypeRegistry,
    pub(super) renderers: RendererRegistry,
    pub(super) dependencies: DependencyTable,
    pub(super) settings: Settings,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn sums(&self) -> &SumTypeRegistry {
        &self.sums
    }

    #[must_use]
    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    #[must_use]
    pub fn dependencies(&self) -> &DependencyTable {
        &self.dependencies
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A nested setting, e.g. `setting(&["session", "cookie_name"])`.
    #[must_use]
    pub fn setting(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.settings.get(*first)?, |value, key| value.get(key))
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> String {
        self.setting(&["session", "cookie_name"])
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SESSION_COOKIE)
            .to_string()
    }

    /// Public base URI without a trailing slash.
    #[must_use]
    pub fn public_uri(&self) -> &str {
        self.setting(&["server", "public_uri"])
            .and_then(Value::as_str)
            .map_or("", |uri| uri.trim_end_matches('/'))
    }

    pub fn url_for(
        &self,
        namespace: &str,
        name: &str,
        params: &[(&str, &str)],
    ) -> Result<String, UrlError> {
        self.router.url_for(namespace, name, params)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("router", &self.router)
            .field("sums", &self.sums.types().len())
            .field("renderers", &self.renderers)
            .finish_non_exhaustive()
    }
}
