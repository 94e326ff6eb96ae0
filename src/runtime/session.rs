use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::DependencyError;
use crate::request::Request;

/// Cookie carrying the session id when nothing else is configured.
pub const DEFAULT_SESSION_COOKIE: &str = "SOLO_SESSION";

/// Session key holding the authenticated user's id.
pub const USER_ID_KEY: &str = "user_id";

/// Session key holding the user's granted permissions.
pub const PERMISSIONS_KEY: &str = "permissions";

/// Key/value session state attached to a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    id: Option<String>,
    data: Map<String, Value>,
}

impl Session {
    /// Fresh session that has not been stored yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            data,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.data.get(USER_ID_KEY).and_then(Value::as_str)
    }
}

/// Storage backend for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Name of the cookie carrying the session id.
    fn cookie_name(&self) -> &str;

    /// Load the session referenced by the request, or a new empty one.
    async fn load_session(&self, request: &Request) -> Result<Session, DependencyError>;

    /// Persist `session`, returning its id.
    async fn save_session(&self, session: &Session) -> Result<String, DependencyError>;
}

/// Sessions kept by [`MemorySessionStore`] unless configured otherwise.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct StoredSession {
    data: Map<String, Value>,
    touched: u64,
}

/// Process-local session store keyed by a ULID session id.
///
/// Meant for development and tests: nothing is persisted, and once `max_sessions`
/// is reached the least recently used session is evicted to make room.
pub struct MemorySessionStore {
    cookie_name: String,
    max_sessions: usize,
    clock: AtomicU64,
    sessions: DashMap<String, StoredSession>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            clock: AtomicU64::new(0),
            sessions: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().touched)
            .map(|entry| entry.key().clone());
        if let Some(id) = oldest {
            self.sessions.remove(&id);
            debug!(session_id = %id, max_sessions = self.max_sessions, "Session evicted");
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_COOKIE)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    async fn load_session(&self, request: &Request) -> Result<Session, DependencyError> {
        let Some(id) = request.get_cookie(&self.cookie_name) else {
            return Ok(Session::new());
        };
        match self.sessions.get_mut(id) {
            Some(mut stored) => {
                stored.touched = self.tick();
                Ok(Session::with_id(id, stored.data.clone()))
            }
            None => {
                debug!(session_id = %id, "Unknown session id, starting a new session");
                Ok(Session::new())
            }
        }
    }

    async fn save_session(&self, session: &Session) -> Result<String, DependencyError> {
        let id = session
            .id()
            .map_or_else(|| ulid::Ulid::new().to_string(), str::to_string);
        if !self.sessions.contains_key(&id) && self.sessions.len() >= self.max_sessions {
            self.evict_least_recent();
        }
        self.sessions.insert(
            id.clone(),
            StoredSession {
                data: session.data().clone(),
                touched: self.tick(),
            },
        );
        Ok(id)
    }
}

/// Who is making a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub permissions: BTreeSet<String>,
}

impl Identity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Resolves the [`Identity`] behind a request.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn identify(&self, request: &Request) -> Result<Identity, DependencyError>;
}

/// Identity read from the session: `user_id` and a `permissions` array.
pub struct SessionIdentity {
    store: Arc<dyn SessionStore>,
}

impl SessionIdentity {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityResolver for SessionIdentity {
    async fn identify(&self, request: &Request) -> Result<Identity, DependencyError> {
        let session = self.store.load_session(request).await?;
        let Some(user_id) = session.user_id() else {
            return Ok(Identity::anonymous());
        };
        let permissions = session
            .get(PERMISSIONS_KEY)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Identity {
            user_id: Some(user_id.to_string()),
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySessionStore::default();
        let mut session = store
            .load_session(&Request::new(Method::GET, "/"))
            .await
            .unwrap();
        assert!(session.is_new());
        session.insert(USER_ID_KEY, json!("42"));
        let id = store.save_session(&session).await.unwrap();

        let request = Request::new(Method::GET, "/")
            .with_header("cookie", format!("{DEFAULT_SESSION_COOKIE}={id}"));
        let loaded = store.load_session(&request).await.unwrap();
        assert_eq!(loaded.id(), Some(id.as_str()));
        assert_eq!(loaded.user_id(), Some("42"));
    }

    #[tokio::test]
    async fn test_memory_store_evicts_least_recent_session() {
        let store = MemorySessionStore::default().with_max_sessions(2);
        let first = store.save_session(&Session::new()).await.unwrap();
        let second = store.save_session(&Session::new()).await.unwrap();

        // touching the first session makes the second one the oldest
        let cookie = |id: &str| {
            Request::new(Method::GET, "/").with_header("cookie", format!("{DEFAULT_SESSION_COOKIE}={id}"))
        };
        assert!(!store.load_session(&cookie(&first)).await.unwrap().is_new());

        let third = store.save_session(&Session::new()).await.unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.load_session(&cookie(&second)).await.unwrap().is_new());
        assert!(!store.load_session(&cookie(&first)).await.unwrap().is_new());
        assert!(!store.load_session(&cookie(&third)).await.unwrap().is_new());

        // saving an existing session never evicts
        let again = Session::with_id(first.clone(), Map::new());
        store.save_session(&again).await.unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.load_session(&cookie(&third)).await.unwrap().is_new());
    }

    #[tokio::test]
    async fn test_session_identity() {
        let store = Arc::new(MemorySessionStore::default());
        let mut session = Session::new();
        session.insert(USER_ID_KEY, json!("u1"));
        session.insert(PERMISSIONS_KEY, json!(["users:view"]));
        let id = store.save_session(&session).await.unwrap();

        let resolver = SessionIdentity::new(store);
        let anonymous = resolver
            .identify(&Request::new(Method::GET, "/"))
            .await
            .unwrap();
        assert!(!anonymous.is_authenticated());

        let request = Request::new(Method::GET, "/")
            .with_header("cookie", format!("{DEFAULT_SESSION_COOKIE}={id}"));
        let identity = resolver.identify(&request).await.unwrap();
        assert!(identity.is_authenticated());
        assert!(identity.has_permission("users:view"));
        assert!(!identity.has_permission("users:edit"));
    }
}
