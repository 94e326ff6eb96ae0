use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::ConfigurationError;
use crate::request::Request;
use crate::runtime::Runtime;

/// Settings key collecting every permission named by a `permission` predicate.
pub const PERMISSIONS_SETTING: &str = "permissions";

/// Async boolean gate on a view binding.
#[async_trait]
pub trait Predicate: Send + Sync {
    /// Kind name, e.g. `request_method`.
    fn name(&self) -> &str;

    /// Human-readable form used in logs and route dumps.
    fn text(&self) -> String;

    async fn evaluate(&self, runtime: &Runtime, request: &Request) -> bool;
}

/// Builds a predicate from its declared value. May record into settings.
pub type PredicateFactory = Arc<
    dyn Fn(&Value, &mut Settings) -> Result<Arc<dyn Predicate>, ConfigurationError> + Send + Sync,
>;

/// A predicate with an optional status to raise when it fails.
#[derive(Clone)]
pub struct BoundPredicate {
    pub predicate: Arc<dyn Predicate>,
    pub raises: Option<u16>,
}

impl fmt::Debug for BoundPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundPredicate")
            .field("predicate", &self.predicate.text())
            .field("raises", &self.raises)
            .finish()
    }
}

#[derive(Clone)]
struct PredicateKind {
    name: String,
    factory: PredicateFactory,
    weighs_more_than: Option<String>,
    weighs_less_than: Option<String>,
}

/// Registered predicate kinds in declaration order.
///
/// Evaluation follows declaration order. The `weighs_*` hints are kept for
/// inspection and never reorder the chain.
#[derive(Clone, Default)]
pub struct PredicateList {
    kinds: Vec<PredicateKind>,
}

impl PredicateList {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// `request_method`, then `permission`, then `authenticated`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut list = Self::empty();
        list.add(
            "request_method",
            Arc::new(|value: &Value, _: &mut Settings| {
                Ok(Arc::new(RequestMethodPredicate::from_value(value)?) as Arc<dyn Predicate>)
            }),
            None,
            None,
        );
        list.add(
            "permission",
            Arc::new(|value: &Value, settings: &mut Settings| {
                Ok(Arc::new(PermissionPredicate::from_value(value, settings)?) as Arc<dyn Predicate>)
            }),
            Some("request_method"),
            None,
        );
        list.add(
            "authenticated",
            Arc::new(|value: &Value, _: &mut Settings| {
                let expected = value.as_bool().ok_or_else(|| {
                    ConfigurationError::InvalidPredicateValue {
                        name: "authenticated".to_string(),
                        reason: format!("expected a boolean, got {value}"),
                    }
                })?;
                Ok(Arc::new(AuthenticatedPredicate { expected }) as Arc<dyn Predicate>)
            }),
            None,
            Some("permission"),
        );
        list
    }

    /// Register a predicate kind; re-adding a name replaces it in place.
    pub fn add(
        &mut self,
        name: &str,
        factory: PredicateFactory,
        weighs_more_than: Option<&str>,
        weighs_less_than: Option<&str>,
    ) {
        let kind = PredicateKind {
            name: name.to_string(),
            factory,
            weighs_more_than: weighs_more_than.map(str::to_string),
            weighs_less_than: weighs_less_than.map(str::to_string),
        };
        match self.kinds.iter_mut().find(|k| k.name == name) {
            Some(existing) => *existing = kind,
            None => self.kinds.push(kind),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.iter().any(|k| k.name == name)
    }

    /// Kind names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(|k| k.name.as_str())
    }

    /// The `(weighs_more_than, weighs_less_than)` hints of a kind.
    #[must_use]
    pub fn weights(&self, name: &str) -> Option<(Option<&str>, Option<&str>)> {
        self.kinds.iter().find(|k| k.name == name).map(|k| {
            (
                k.weighs_more_than.as_deref(),
                k.weighs_less_than.as_deref(),
            )
        })
    }

    /// Build the chain for one view. Output follows kind order, not `values` order.
    pub fn make(
        &self,
        values: &[(String, Value)],
        settings: &mut Settings,
    ) -> Result<Vec<BoundPredicate>, ConfigurationError> {
        if let Some((unknown, _)) = values.iter().find(|(name, _)| !self.contains(name)) {
            return Err(ConfigurationError::UnknownPredicate(unknown.clone()));
        }

        let mut chain = Vec::with_capacity(values.len());
        for kind in &self.kinds {
            for (_, raw) in values.iter().filter(|(name, _)| *name == kind.name) {
                let (value, raises) = split_raises(&kind.name, raw)?;
                let predicate = (kind.factory)(value, settings)?;
                chain.push(BoundPredicate { predicate, raises });
            }
        }
        Ok(chain)
    }
}

impl fmt::Debug for PredicateList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Unwrap `{"value": v, "raises": status}`.
fn split_raises<'a>(
    name: &str,
    raw: &'a Value,
) -> Result<(&'a Value, Option<u16>), ConfigurationError> {
    let Some(obj) = raw.as_object() else {
        return Ok((raw, None));
    };
    let (Some(value), Some(raises)) = (obj.get("value"), obj.get("raises")) else {
        return Ok((raw, None));
    };
    let status = raises
        .as_u64()
        .and_then(|s| u16::try_from(s).ok())
        .filter(|s| (300..600).contains(s))
        .ok_or_else(|| ConfigurationError::InvalidPredicateValue {
            name: name.to_string(),
            reason: format!("raises must be an HTTP status code, got {raises}"),
        })?;
    Ok((value, Some(status)))
}

/// Admits requests whose method is in the configured set. `GET` implies `HEAD`.
#[derive(Debug, Clone)]
pub struct RequestMethodPredicate {
    methods: BTreeSet<String>,
}

impl RequestMethodPredicate {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut methods: BTreeSet<String> = methods
            .into_iter()
            .map(|m| m.as_ref().to_ascii_uppercase())
            .collect();
        if methods.contains("GET") {
            methods.insert("HEAD".to_string());
        }
        Self { methods }
    }

    fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidPredicateValue {
            name: "request_method".to_string(),
            reason: format!("expected a method or a list of methods, got {value}"),
        };
        match value {
            Value::String(m) => Ok(Self::new([m])),
            Value::Array(items) => {
                let methods = items
                    .iter()
                    .map(|v| v.as_str().ok_or_else(invalid))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(methods))
            }
            _ => Err(invalid()),
        }
    }

    #[must_use]
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }
}

#[async_trait]
impl Predicate for RequestMethodPredicate {
    fn name(&self) -> &str {
        "request_method"
    }

    fn text(&self) -> String {
        let methods: Vec<&str> = self.methods().collect();
        format!("request_method = {}", methods.join(","))
    }

    async fn evaluate(&self, _runtime: &Runtime, request: &Request) -> bool {
        self.methods.contains(request.method.as_str())
    }
}

/// Admits requests whose identity holds the permission.
#[derive(Debug, Clone)]
pub struct PermissionPredicate {
    permission: String,
}

impl PermissionPredicate {
    fn from_value(value: &Value, settings: &mut Settings) -> Result<Self, ConfigurationError> {
        let permission = value
            .as_str()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigurationError::InvalidPredicateValue {
                name: "permission".to_string(),
                reason: format!("expected a permission name, got {value}"),
            })?
            .to_string();

        let known = settings
            .entry(PERMISSIONS_SETTING)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = known {
            let entry = Value::String(permission.clone());
            if !list.contains(&entry) {
                list.push(entry);
            }
        }
        Ok(Self { permission })
    }
}

#[async_trait]
impl Predicate for PermissionPredicate {
    fn name(&self) -> &str {
        "permission"
    }

    fn text(&self) -> String {
        format!("permission = {}", self.permission)
    }

    async fn evaluate(&self, runtime: &Runtime, request: &Request) -> bool {
        match runtime.identity().identify(request).await {
            Ok(identity) => identity.has_permission(&self.permission),
            Err(e) => {
                warn!(error = %e, permission = %self.permission, "Identity lookup failed");
                false
            }
        }
    }
}

/// Admits requests whose authentication state equals `expected`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedPredicate {
    expected: bool,
}

#[async_trait]
impl Predicate for AuthenticatedPredicate {
    fn name(&self) -> &str {
        "authenticated"
    }

    fn text(&self) -> String {
        format!("authenticated = {}", self.expected)
    }

    async fn evaluate(&self, runtime: &Runtime, request: &Request) -> bool {
        let authenticated = match runtime.identity().identify(request).await {
            Ok(identity) => identity.is_authenticated(),
            Err(e) => {
                warn!(error = %e, "Identity lookup failed");
                false
            }
        };
        debug!(authenticated, expected = self.expected, "Authentication check");
        authenticated == self.expected
    }
}
