//! Bundled application packages.

pub mod accounts;
pub mod hello;

use std::sync::Arc;

use crate::configurator::Package;

pub use accounts::AccountsApp;
pub use hello::HelloApp;

/// Every bundled package, for [`bootstrap`](crate::config::bootstrap).
#[must_use]
pub fn builtin_packages() -> Vec<Arc<dyn Package>> {
    vec![Arc::new(HelloApp), Arc::new(AccountsApp)]
}
