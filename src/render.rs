//! # Renderers
//!
//! Turn a handler's plain return value into a [`Response`]. Three renderers ship by default:
//!
//! | Name | Content type | Body |
//! |---|---|---|
//! | `string` | `text/plain; charset=utf-8` | the string, or the JSON text of any other value |
//! | `json` | `application/json` | the serialized value |
//! | `jsonapi` | `application/vnd.api+json` | `{"data": value, "jsonapi": {"version": "1.0"}}` |
//!
//! Renderer names containing a `.` are looked up by their extension, so a view declared
//! with `renderer = "templates/page.html"` resolves through the factory registered as `.html`.
//! The factory receives the full name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use crate::error::ConfigurationError;
use crate::request::Request;
use crate::response::{Response, APPLICATION_JSON, TEXT_PLAIN};

pub const JSONAPI_CONTENT_TYPE: &str = "application/vnd.api+json";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("renderer {renderer} failed: {reason}")]
    Failed { renderer: String, reason: String },
}

pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, request: &Request, value: Value) -> Result<Response, RenderError>;
}

pub type RendererFactory = Arc<dyn Fn(&str) -> Arc<dyn Renderer> + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn name(&self) -> &str {
        "json"
    }

    fn render(&self, _request: &Request, value: Value) -> Result<Response, RenderError> {
        let body = serde_json::to_vec(&value)?;
        let mut res = Response::new(200, Default::default(), body);
        res.set_header("content-type", APPLICATION_JSON.to_string());
        Ok(res)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonApiRenderer;

impl Renderer for JsonApiRenderer {
    fn name(&self) -> &str {
        "jsonapi"
    }

    fn render(&self, _request: &Request, value: Value) -> Result<Response, RenderError> {
        let document = json!({
            "data": value,
            "jsonapi": { "version": "1.0" },
        });
        let body = serde_json::to_vec(&document)?;
        let mut res = Response::new(200, Default::default(), body);
        res.set_header("content-type", JSONAPI_CONTENT_TYPE.to_string());
        Ok(res)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StringRenderer;

impl Renderer for StringRenderer {
    fn name(&self) -> &str {
        "string"
    }

    fn render(&self, _request: &Request, value: Value) -> Result<Response, RenderError> {
        let text = match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        let mut res = Response::new(200, Default::default(), text.into_bytes());
        res.set_header("content-type", TEXT_PLAIN.to_string());
        Ok(res)
    }
}

/// Renderer factories by name or extension.
#[derive(Clone)]
pub struct RendererRegistry {
    factories: HashMap<String, RendererFactory>,
}

impl RendererRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with `json`, `jsonapi` and `string`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.add_renderer("json", Arc::new(|_: &str| Arc::new(JsonRenderer) as Arc<dyn Renderer>));
        registry.add_renderer(
            "jsonapi",
            Arc::new(|_: &str| Arc::new(JsonApiRenderer) as Arc<dyn Renderer>),
        );
        registry.add_renderer(
            "string",
            Arc::new(|_: &str| Arc::new(StringRenderer) as Arc<dyn Renderer>),
        );
        registry
    }

    /// Register a factory under a plain name (`json`) or an extension (`.html`).
    pub fn add_renderer(&mut self, name: impl Into<String>, factory: RendererFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn get_renderer(&self, name: &str) -> Result<Arc<dyn Renderer>, ConfigurationError> {
        let key = match name.rfind('.') {
            Some(idx) => &name[idx..],
            None => name,
        };
        self.factories
            .get(key)
            .map(|factory| factory(name))
            .ok_or_else(|| ConfigurationError::UnknownRenderer(name.to_string()))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
