//! # Dispatcher Module
//!
//! Per-request dispatch over the frozen [`Registry`](crate::Registry).
//!
//! ## Overview
//!
//! The dispatcher is the request-time half of the crate. For every request it:
//! - Matches the path against the route table (no match: `404 Not Found`)
//! - Walks the route's view bindings in registration order and picks the first one whose
//!   predicate chain passes (none: 404; a predicate declared with `raises`: that status)
//! - Resolves sum-type-ruled URL parameters into variants for the handler's [`Context`](crate::request::Context)
//! - Resolves the handler's dependencies, awaiting pending ones concurrently
//! - Invokes the handler and renders its reply
//!
//! ## Request Flow
//!
//! ```text
//! Unmatched -> Matched -> PredicateEvaluating -> Invoking -> Rendering -> Responded
//!     |                         |                    |
//!     +-> NotFound (404)        +-> NotFound (404)   +-> Failed (500)
//! ```
//!
//! ## Error Handling
//!
//! Request-time failures never escape [`Dispatcher::dispatch`]:
//! - Handler signals map to their status with an empty body (redirects add `Location`)
//! - Handler errors, renderer errors and panics return `HTTP 500: Internal Server Error`
//!   and are logged with `tracing::error!`
//!
//! ## Transport
//!
//! [`Dispatcher::handle`] adapts a server connection: it reads body events from a
//! [`Receive`], then sends one [`SendEvent::Start`] and one final [`SendEvent::Body`] to a
//! [`ResponseSink`].
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(Runtime::new(Arc::new(registry)));
//! let mut sink = BufferedSink::new();
//! dispatcher
//!     .handle(Scope::new("GET", "/hello/"), &mut BodyReceive::empty(), &mut sink)
//!     .await?;
//! ```

mod core;
mod transport;

pub use core::{DispatchState, Dispatcher};
pub use transport::{
    BodyReceive, BufferedSink, Receive, ReceiveEvent, ResponseSink, Scope, SendEvent,
    TransportError,
};
