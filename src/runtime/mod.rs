//! # Runtime
//!
//! The per-process collaborators a request can reach: the frozen [`Registry`], the session
//! store, the identity resolver and an optional SQL engine. A [`Runtime`] is cheap to clone
//! and is what predicates and dependency resolvers receive.
//!
//! ## Dependency injection
//!
//! Handlers declare typed [`Dependency`] values. At dispatch time each one is looked up in the
//! registry's [`DependencyTable`]; resolvers answer either [`Resolved::Ready`] or
//! [`Resolved::Pending`]. Pending values are awaited concurrently and merged back in
//! declaration order, so handlers always see the same [`Injected`] layout.
//!
//! ```rust,ignore
//! let hello = handler_fn("whoami", |call: Invocation| async move {
//!     let session = call.deps.get::<Session>("session").cloned().unwrap_or_default();
//!     Ok(Reply::from(json!({ "user": session.user_id() })))
//! })
//! .requires(Dependency::of::<Session>("session"));
//! ```

mod dependencies;
mod session;

use std::fmt;
use std::sync::Arc;

use crate::configurator::Registry;

pub use dependencies::{
    DepValue, Dependency, DependencyError, DependencyTable, Injected, Resolved, Resolver,
    SessionStoreHandle, SqlEngineHandle,
};
pub use session::{
    Identity, IdentityResolver, MemorySessionStore, Session, SessionIdentity, SessionStore,
    DEFAULT_SESSION_COOKIE, PERMISSIONS_KEY, USER_ID_KEY,
};

/// SQL engine collaborator. Only its identity matters to the router.
pub trait SqlEngine: Send + Sync {
    fn dialect(&self) -> &str;
}

/// Shared collaborators for request handling.
#[derive(Clone)]
pub struct Runtime {
    registry: Arc<Registry>,
    session_store: Arc<dyn SessionStore>,
    identity: Arc<dyn IdentityResolver>,
    sql_engine: Option<Arc<dyn SqlEngine>>,
}

impl Runtime {
    /// Runtime with an in-memory session store using the configured cookie name.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        let store: Arc<dyn SessionStore> =
            Arc::new(MemorySessionStore::new(registry.session_cookie_name()));
        Self {
            identity: Arc::new(SessionIdentity::new(Arc::clone(&store))),
            session_store: store,
            sql_engine: None,
            registry,
        }
    }

    /// Replace the session store; identity is then read from the new store.
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.identity = Arc::new(SessionIdentity::new(Arc::clone(&store)));
        self.session_store = store;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_sql_engine(mut self, engine: Arc<dyn SqlEngine>) -> Self {
        self.sql_engine = Some(engine);
        self
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.session_store
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityResolver> {
        &self.identity
    }

    #[must_use]
    pub fn sql_engine(&self) -> Option<&Arc<dyn SqlEngine>> {
        self.sql_engine.as_ref()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("session_cookie", &self.session_store.cookie_name())
            .field("sql_engine", &self.sql_engine.as_ref().map(|e| e.dialect()))
            .finish_non_exhaustive()
    }
}
