//! # Views and Predicates
//!
//! A route may carry several competing views. Each [`ViewBinding`] pairs a [`Handler`] with an
//! ordered chain of async [`Predicate`]s and a renderer; at request time the first binding whose
//! whole chain passes wins.
//!
//! ## Handlers
//!
//! Two shapes are supported:
//!
//! - **Function handlers** built with [`handler_fn`], receiving an [`Invocation`]
//! - **Class-style views** implementing [`ClassView`], constructed per request from
//!   `(request, context)` with one of their [`ClassView::METHODS`] selected by the binding's
//!   `attr` (default `call`)
//!
//! Handlers return a [`Reply`]: either a finished response or a plain value for the renderer.
//! Non-success outcomes are raised as [`HttpSignal`]s.
//!
//! ## Predicates
//!
//! Predicate kinds live in a [`PredicateList`]. The built-in kinds, in evaluation order:
//!
//! | Kind | Value | Admits when |
//! |---|---|---|
//! | `request_method` | `"GET"` or `["GET", "POST"]` | the method is listed (`GET` implies `HEAD`) |
//! | `permission` | `"users:view"` | the identity holds the permission |
//! | `authenticated` | `true` / `false` | the identity's login state matches |
//!
//! A value written as `{"value": v, "raises": 403}` turns a failing predicate into an immediate
//! 403 rather than a fall-through to the next binding.
//!
//! ## Example
//!
//! ```rust,ignore
//! let decl = ViewDecl::new(users_handler)
//!     .route("users")
//!     .renderer("json")
//!     .predicate("permission", "users:view");
//! let binding = add_view(decl, &PredicateList::with_builtins(), &renderers, &mut settings)?;
//! ```

mod core;
mod handler;
mod predicates;

pub use core::{
    add_view, Admission, ViewBinding, ViewDecl, ViewDefaults, DEFAULT_RENDERER,
    DEFAULT_REQUEST_METHOD,
};
pub use handler::{
    around, handler_fn, ClassHandler, ClassView, Decorator, FnHandler, Handler, HandlerError,
    HandlerResult, HttpSignal, Invocation, Reply, DEFAULT_ATTR,
};
pub use predicates::{
    AuthenticatedPredicate, BoundPredicate, PermissionPredicate, Predicate, PredicateFactory,
    PredicateList, RequestMethodPredicate, PERMISSIONS_SETTING,
};
