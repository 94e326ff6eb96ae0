//! # Application configuration
//!
//! YAML configuration describing the server, session cookie and the application packages to
//! mount, plus [`bootstrap`], which turns it into a frozen [`Registry`].
//!
//! ```yaml
//! debug: true
//! server:
//!   public_uri: https://example.com
//!   host: 0.0.0.0
//!   port: 8000
//! session:
//!   cookie_name: SOLO_SESSION
//! apps:
//!   - name: solo.apps.hello
//!     url_prefix: /hello
//!   - name: solo.apps.accounts
//!     url_prefix: /
//!     setup:
//!       - enable_provider:
//!           name: github
//!           client_id: abc
//!           client_secret: xyz
//!           scope: [user:email]
//! ```
//!
//! ## Environment Variables
//!
//! - `SOLO_CONFIG` - path of the YAML file (default `config/solo.yaml`)
//! - `SOLO_QUERY_MAX_FIELDS` - maximum number of query string fields per request (default 256)

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::configurator::{Configurator, Package, Registry};
use crate::error::ConfigurationError;
use crate::request::DEFAULT_MAX_QUERY_FIELDS;
use crate::runtime::DEFAULT_SESSION_COOKIE;

/// Free-form application settings shared through the registry.
pub type Settings = Map<String, Value>;

pub const DEFAULT_CONFIG_PATH: &str = "config/solo.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub public_uri: String,
    pub host: String,
    pub port: u16,
    pub keep_alive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_uri: "http://127.0.0.1:8000".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            keep_alive: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_httponly: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            cookie_secure: false,
            cookie_httponly: true,
        }
    }
}

/// One setup step: a single-entry map of directive name to its arguments.
pub type SetupStep = BTreeMap<String, Value>;

/// An application package to mount.
#[derive(Debug, Clone, Deserialize)]
pub struct AppEntry {
    pub name: String,
    #[serde(default)]
    pub url_prefix: String,
    #[serde(default)]
    pub setup: Vec<SetupStep>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub debug: bool,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub apps: Vec<AppEntry>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(text).context("failed to parse YAML")?;
        debug!(
            apps = ?config.apps.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            debug = config.debug,
            "Configuration parsed"
        );
        Ok(config)
    }

    /// Initial registry settings derived from this configuration.
    #[must_use]
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert("debug".to_string(), json!(self.debug));
        settings.insert(
            "server".to_string(),
            json!({
                "public_uri": self.server.public_uri,
                "host": self.server.host,
                "port": self.server.port,
                "keep_alive": self.server.keep_alive,
            }),
        );
        settings.insert(
            "session".to_string(),
            json!({
                "cookie_name": self.session.cookie_name,
                "cookie_secure": self.session.cookie_secure,
                "cookie_httponly": self.session.cookie_httponly,
            }),
        );
        settings
    }
}

/// Process-level knobs read from the environment.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub config_path: PathBuf,
    pub query_max_fields: usize,
}

impl RuntimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let config_path = env::var("SOLO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let query_max_fields = env::var("SOLO_QUERY_MAX_FIELDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &usize| *v > 0)
            .unwrap_or(DEFAULT_MAX_QUERY_FIELDS);
        Self {
            config_path,
            query_max_fields,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            query_max_fields: DEFAULT_MAX_QUERY_FIELDS,
        }
    }
}

/// Mount every configured app and freeze the result.
///
/// Per app, in configuration order: include it under its URL prefix, scan its
/// declarations, then run its setup directives. Sum type contracts are checked
/// once at the end, so bindings may come from any app.
pub fn bootstrap(
    config: &AppConfig,
    packages: &[Arc<dyn Package>],
) -> Result<Registry, ConfigurationError> {
    let mut configurator = Configurator::with_settings(config.settings());

    for app in &config.apps {
        debug!(app = %app.name, url_prefix = %app.url_prefix, "Setting up application");
        let package = packages
            .iter()
            .find(|p| p.name() == app.name)
            .ok_or_else(|| ConfigurationError::UnknownPackage(app.name.clone()))?;

        configurator.include(package.as_ref(), &app.url_prefix)?;
        configurator.scan(package.as_ref())?;
        for step in &app.setup {
            for (directive, args) in step {
                configurator.invoke_directive(directive, args)?;
            }
        }
    }

    let registry = configurator.build()?;
    info!(
        apps = config.apps.len(),
        routes = registry.router().len(),
        "Application registry built"
    );
    Ok(registry)
}
