use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use thiserror::Error;
use tracing::debug;

use super::session::{Identity, Session, SessionStore};
use super::{Runtime, SqlEngine};
use crate::configurator::Registry;
use crate::error::ConfigurationError;
use crate::request::Request;

/// Type-erased injected value.
pub type DepValue = Arc<dyn Any + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    #[error("dependency {0} is not available in this runtime")]
    Unavailable(&'static str),

    #[error("no resolver registered for {0}")]
    Unregistered(&'static str),

    #[error("session store failure: {0}")]
    Session(String),

    #[error("identity resolution failed: {0}")]
    Identity(String),
}

/// A typed, named argument a handler asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl Dependency {
    #[must_use]
    pub fn of<T: Any + Send + Sync>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Outcome of one resolver call: a value now, or a future to await.
pub enum Resolved {
    Ready(DepValue),
    Pending(BoxFuture<'static, Result<DepValue, DependencyError>>),
}

pub type Resolver =
    Arc<dyn Fn(&Runtime, &Arc<Request>) -> Result<Resolved, DependencyError> + Send + Sync>;

/// Shared handle to the SQL engine collaborator.
#[derive(Clone)]
pub struct SqlEngineHandle(pub Arc<dyn SqlEngine>);

impl fmt::Debug for SqlEngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SqlEngineHandle")
            .field(&self.0.dialect())
            .finish()
    }
}

/// Shared handle to the session store.
#[derive(Clone)]
pub struct SessionStoreHandle(pub Arc<dyn SessionStore>);

/// Maps dependency types to resolvers.
#[derive(Clone, Default)]
pub struct DependencyTable {
    resolvers: HashMap<TypeId, (&'static str, Resolver)>,
}

impl DependencyTable {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table with the runtime-provided types: [`Registry`], [`SqlEngineHandle`],
    /// [`SessionStoreHandle`], [`Session`] and [`Identity`].
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut table = Self::empty();
        table.register::<Registry, _>(|runtime, _| {
            let registry: DepValue = Arc::clone(runtime.registry()) as DepValue;
            Ok(Resolved::Ready(registry))
        });
        table.register::<SqlEngineHandle, _>(|runtime, _| {
            let engine = runtime
                .sql_engine()
                .ok_or(DependencyError::Unavailable("sql engine"))?;
            Ok(Resolved::Ready(Arc::new(SqlEngineHandle(Arc::clone(engine)))))
        });
        table.register::<SessionStoreHandle, _>(|runtime, _| {
            Ok(Resolved::Ready(Arc::new(SessionStoreHandle(Arc::clone(
                runtime.session_store(),
            )))))
        });
        table.register::<Session, _>(|runtime, request| {
            let store = Arc::clone(runtime.session_store());
            let request = Arc::clone(request);
            Ok(Resolved::Pending(Box::pin(async move {
                let session = store.load_session(&request).await?;
                Ok(Arc::new(session) as DepValue)
            })))
        });
        table.register::<Identity, _>(|runtime, request| {
            let resolver = Arc::clone(runtime.identity());
            let request = Arc::clone(request);
            Ok(Resolved::Pending(Box::pin(async move {
                let identity = resolver.identify(&request).await?;
                Ok(Arc::new(identity) as DepValue)
            })))
        });
        table
    }

    /// Register (or replace) the resolver for `T`.
    pub fn register<T, F>(&mut self, resolver: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Runtime, &Arc<Request>) -> Result<Resolved, DependencyError> + Send + Sync + 'static,
    {
        self.resolvers.insert(
            TypeId::of::<T>(),
            (std::any::type_name::<T>(), Arc::new(resolver)),
        );
    }

    #[must_use]
    pub fn contains(&self, dependency: &Dependency) -> bool {
        self.resolvers.contains_key(&dependency.type_id)
    }

    /// Every declared dependency of `handler` must have a resolver.
    pub fn validate(&self, handler: &str, deps: &[Dependency]) -> Result<(), ConfigurationError> {
        match deps.iter().find(|d| !self.contains(d)) {
            Some(missing) => Err(ConfigurationError::UnknownDependency {
                handler: handler.to_string(),
                name: missing.name.to_string(),
                type_name: missing.type_name,
            }),
            None => Ok(()),
        }
    }

    /// Resolve `deps` for one request.
    ///
    /// Ready values are taken as they are; pending ones are awaited concurrently and
    /// merged back in declaration order.
    pub async fn resolve(
        &self,
        runtime: &Runtime,
        request: &Arc<Request>,
        deps: &[Dependency],
    ) -> Result<Injected, DependencyError> {
        let mut slots: Vec<Option<DepValue>> = Vec::with_capacity(deps.len());
        let mut pending = Vec::new();

        for (idx, dep) in deps.iter().enumerate() {
            let (_, resolver) = self
                .resolvers
                .get(&dep.type_id)
                .ok_or(DependencyError::Unregistered(dep.type_name))?;
            match resolver(runtime, request)? {
                Resolved::Ready(value) => slots.push(Some(value)),
                Resolved::Pending(fut) => {
                    slots.push(None);
                    pending.push(async move { fut.await.map(|value| (idx, value)) });
                }
            }
        }

        if !pending.is_empty() {
            debug!(
                ready = deps.len() - pending.len(),
                pending = pending.len(),
                "Awaiting pending dependencies"
            );
            for (idx, value) in try_join_all(pending).await? {
                slots[idx] = Some(value);
            }
        }

        let values = deps
            .iter()
            .zip(slots)
            .filter_map(|(dep, slot)| slot.map(|value| (dep.name, value)))
            .collect();
        Ok(Injected { values })
    }
}

impl fmt::Debug for DependencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.resolvers.values().map(|(name, _)| name))
            .finish()
    }
}

/// Dependencies resolved for one invocation, by name.
#[derive(Clone, Default)]
pub struct Injected {
    values: Vec<(&'static str, DepValue)>,
}

impl Injected {
    #[must_use]
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v.downcast_ref::<T>())
    }

    #[must_use]
    pub fn get_arc<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| Arc::clone(v).downcast::<T>().ok())
    }

    /// Names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(n, _)| *n)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
