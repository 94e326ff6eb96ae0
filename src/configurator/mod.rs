//! # Configurator
//!
//! Two-phase application configuration.
//!
//! ## Overview
//!
//! Application code is organised in [`Package`]s. Configuring one takes two steps:
//!
//! 1. **Include**: [`Configurator::include`] switches to the package's namespace and the
//!    requested route prefix, declares the package's sum types and runs its `includeme` hook,
//!    which adds routes, predicate kinds and directives.
//! 2. **Scan**: [`Configurator::scan`] applies the package's [`Declaration`]s (views and
//!    contract bindings) and checks that every route of the namespace has a view.
//!
//! Setup steps from the application config then run named [`Directive`]s.
//! [`Configurator::build`] checks that every sum type contract is fully bound, validates every
//! handler's dependencies and returns the immutable [`Registry`] used at request time.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut config = Configurator::new();
//! config.include(&HelloApp, "/hello")?;
//! config.scan(&HelloApp)?;
//! let registry = config.build()?;
//! assert_eq!(registry.url_for("solo.apps.hello", "solo.hello", &[])?, "/hello/");
//! ```

mod core;
mod package;
mod registry;

pub use core::Configurator;
pub use package::{Declaration, Directive, Package};
pub use registry::Registry;
