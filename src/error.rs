//! Configuration-time error types.
//!
//! Everything in here is raised while packages are included and scanned, or when
//! [`Configurator::build`](crate::configurator::Configurator::build) freezes the
//! registries. None of these errors can occur once a [`Registry`](crate::Registry)
//! exists; request-time failures are contained by the dispatcher.
//!
//! - [`ConfigurationError`] - fatal startup problems (duplicate routes, unbound contract terms, ...)
//! - [`PatternError`] - malformed route patterns, carrying the offending fragment
//! - [`UrlError`] - reverse routing (`url_for`) failures

use thiserror::Error;

/// A route pattern that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// A `{` was never closed.
    #[error("Unexpected end of a route definition: {fragment}")]
    UnexpectedEnd { fragment: String },

    /// A `}` appeared outside of any placeholder.
    #[error("Unbalanced '}}' in route definition: {fragment}")]
    UnbalancedClose { fragment: String },

    /// A placeholder name is not an identifier.
    #[error("Invalid segment name {name:?} in route definition: {fragment}")]
    InvalidName { name: String, fragment: String },

    /// Two placeholders share a name.
    #[error("Segment name {name:?} is used more than once in: {pattern}")]
    DuplicateName { name: String, pattern: String },
}

/// Fatal configuration problem detected before serving.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Invalid rule {rule:?} for segment {segment:?}: {reason}")]
    InvalidRule {
        segment: String,
        rule: String,
        reason: String,
    },

    #[error("Unable to resolve sum type {path:?} referenced by segment {segment:?}")]
    UnresolvedSumType { path: String, segment: String },

    #[error("Sum type {path:?} has no literal variants and cannot constrain a URL segment")]
    SumTypeNotRoutable { path: String },

    #[error("Route named \"{name}\" is already registered in namespace \"{namespace}\"")]
    DuplicateRoute { namespace: String, name: String },

    #[error("Route name \"{name}\" is not associated with a view callable.")]
    RouteWithoutView { namespace: String, name: String },

    #[error("View {handler:?} does not name a route")]
    MissingRouteName { handler: String },

    #[error("View for route \"{route}\" refers to unknown route in namespace \"{namespace}\"")]
    UnknownRoute { namespace: String, route: String },

    #[error("View {handler:?} on route \"{route}\" names method {attr:?} which the view does not expose")]
    UnknownViewMethod {
        route: String,
        handler: String,
        attr: String,
    },

    #[error("No such renderer factory {0}")]
    UnknownRenderer(String),

    #[error("Unknown view predicate {0:?}")]
    UnknownPredicate(String),

    #[error("Invalid value for view predicate {name:?}: {reason}")]
    InvalidPredicateValue { name: String, reason: String },

    #[error("Unknown configuration directive {0:?}")]
    UnknownDirective(String),

    #[error("Invalid arguments for directive {directive:?}: {reason}")]
    InvalidDirectiveArguments { directive: String, reason: String },

    #[error("Unknown application package {0:?}")]
    UnknownPackage(String),

    #[error("Handler {handler:?} requires dependency {name:?} of unregistered type {type_name}")]
    UnknownDependency {
        handler: String,
        name: String,
        type_name: &'static str,
    },

    #[error("Invalid sum type {path:?}: {reason}")]
    InvalidSumType { path: String, reason: String },

    #[error("Sum type {0:?} is already declared")]
    DuplicateSumType(String),

    #[error("Unknown sum type {0:?}")]
    UnknownSumType(String),

    #[error("Sum type {sum_type:?} has no variant {variant:?}")]
    UnknownVariant { sum_type: String, variant: String },

    #[error("Sum type {sum_type:?} declares no contract term {term:?}")]
    UnknownContractTerm { sum_type: String, term: String },

    #[error(
        "Variant {sum_type}.{variant} is already bound to {existing:?} for contract term \
         {term:?}, refusing to rebind it to {offered:?}"
    )]
    ConflictingBinding {
        sum_type: String,
        variant: String,
        term: String,
        existing: String,
        offered: String,
    },

    #[error("Variant {sum_type}.{variant} does not implement contract term {term:?}")]
    UnboundContractTerm {
        sum_type: String,
        variant: String,
        term: String,
    },
}

/// Reverse routing failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("No route named {name:?} in namespace {namespace:?}")]
    UnknownRoute { namespace: String, name: String },

    #[error("Missing value for segment {0:?}")]
    MissingParam(String),

    #[error("Value {value:?} does not satisfy the rule of segment {segment:?}")]
    RuleViolation { segment: String, value: String },
}
