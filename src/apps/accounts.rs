//! `solo.apps.accounts`: OAuth2 login entry points and user resources.
//!
//! Providers are the variants of the `AuthProvider` sum type. Each variant binds the
//! `auth_provider_impl` contract term to an [`OAuth2Provider`]; a provider only answers
//! once the `enable_provider` directive has stored its client credentials.
//!
//! | Route | Pattern | Gate |
//! |---|---|---|
//! | `login` | `/login/{provider:<solo.apps.accounts.AuthProvider>}` | `POST` |
//! | `login_callback` | `/login/{provider:<...>}/callback` | `GET` |
//! | `users` | `/users` | `permission = users:view` |
//! | `users_me` | `/users/me` | `authenticated`, 403 otherwise |

use std::sync::Arc;

use anyhow::anyhow;
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use url::Url;

use crate::configurator::{Configurator, Declaration, Package, Registry};
use crate::error::ConfigurationError;
use crate::response::Response;
use crate::runtime::{Dependency, Identity, Session, SessionStoreHandle};
use crate::sum::{ContractBinding, Implementation, SumType, Variant};
use crate::views::{handler_fn, HandlerResult, HttpSignal, Invocation, Reply, ViewDecl};

pub const PACKAGE: &str = "solo.apps.accounts";
pub const AUTH_PROVIDER: &str = "solo.apps.accounts.AuthProvider";
pub const AUTH_PROVIDER_IMPL: &str = "auth_provider_impl";

pub const LOGIN_ROUTE: &str = "login";
pub const CALLBACK_ROUTE: &str = "login_callback";
pub const USERS_ROUTE: &str = "users";
pub const USERS_ME_ROUTE: &str = "users_me";

/// Session key holding the CSRF state of a pending login.
pub const OAUTH_STATE_KEY: &str = "oauth.state";

/// Session key holding the authorization code returned by the provider.
pub const OAUTH_CODE_KEY: &str = "oauth.code";

static AUTH_PROVIDER_TYPE: OnceCell<Arc<SumType>> = OnceCell::new();

/// The `AuthProvider` sum type: `GITHUB = "github"`, `FACEBOOK = "facebook"`.
pub fn auth_provider() -> Result<Arc<SumType>, ConfigurationError> {
    AUTH_PROVIDER_TYPE
        .get_or_try_init(|| {
            SumType::builder(AUTH_PROVIDER)
                .variant("GITHUB", "github")
                .variant("FACEBOOK", "facebook")
                .contract([AUTH_PROVIDER_IMPL])
                .build()
        })
        .map(Arc::clone)
}

/// Endpoints of an OAuth2 authorization-code provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Provider {
    pub name: &'static str,
    pub authorize_url: &'static str,
    pub access_token_url: &'static str,
}

impl OAuth2Provider {
    #[must_use]
    pub fn github() -> Self {
        Self {
            name: "github",
            authorize_url: "https://github.com/login/oauth/authorize",
            access_token_url: "https://github.com/login/oauth/access_token",
        }
    }

    #[must_use]
    pub fn facebook() -> Self {
        Self {
            name: "facebook",
            authorize_url: "https://www.facebook.com/dialog/oauth",
            access_token_url: "https://graph.facebook.com/oauth/access_token",
        }
    }

    /// The provider URL the user agent is redirected to.
    pub fn authorization_redirect(
        &self,
        credentials: &ProviderCredentials,
        state: &str,
    ) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            self.authorize_url,
            &[
                ("scope", credentials.scope.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("redirect_uri", credentials.redirect_uri.as_str()),
                ("state", state),
            ],
        )
    }
}

/// Client credentials stored by `enable_provider`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub scope: String,
    pub redirect_uri: String,
}

impl ProviderCredentials {
    fn from_settings(value: &Value) -> Option<Self> {
        Some(Self {
            client_id: value.get("client_id")?.as_str()?.to_string(),
            scope: value.get("scope")?.as_str()?.to_string(),
            redirect_uri: value.get("redirect_uri")?.as_str()?.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccountsApp;

impl Package for AccountsApp {
    fn name(&self) -> &str {
        PACKAGE
    }

    fn sum_types(&self) -> Result<Vec<Arc<SumType>>, ConfigurationError> {
        Ok(vec![auth_provider()?])
    }

    fn includeme(&self, config: &mut Configurator) -> Result<(), ConfigurationError> {
        let provider = format!("{{provider:<{AUTH_PROVIDER}>}}");
        config.add_route(LOGIN_ROUTE, &format!("/login/{provider}"))?;
        config.add_route(CALLBACK_ROUTE, &format!("/login/{provider}/callback"))?;
        config.add_route(USERS_ROUTE, "/users")?;
        config.add_route(USERS_ME_ROUTE, "/users/me")?;
        config.add_directive("enable_provider", Arc::new(enable_provider));
        Ok(())
    }

    fn declarations(&self) -> Result<Vec<Declaration>, ConfigurationError> {
        let login = handler_fn("accounts.login", login)
            .requires(Dependency::of::<Registry>("registry"))
            .requires(Dependency::of::<Session>("session"))
            .requires(Dependency::of::<SessionStoreHandle>("session_store"))
            .into_handler();
        let callback = handler_fn("accounts.login_callback", login_callback)
            .requires(Dependency::of::<Session>("session"))
            .requires(Dependency::of::<SessionStoreHandle>("session_store"))
            .into_handler();
        let users = handler_fn("accounts.users", users).into_handler();
        let me = handler_fn("accounts.users_me", users_me)
            .requires(Dependency::of::<Identity>("identity"))
            .into_handler();

        Ok(vec![
            ViewDecl::new(login)
                .route(LOGIN_ROUTE)
                .request_method("POST")
                .into(),
            ViewDecl::new(callback).route(CALLBACK_ROUTE).into(),
            ViewDecl::new(users)
                .route(USERS_ROUTE)
                .renderer("json")
                .predicate("permission", "users:view")
                .into(),
            ViewDecl::new(me)
                .route(USERS_ME_ROUTE)
                .renderer("json")
                .predicate("authenticated", json!({"value": true, "raises": 403}))
                .into(),
            ContractBinding::new(
                AUTH_PROVIDER,
                "GITHUB",
                AUTH_PROVIDER_IMPL,
                Implementation::new("solo.apps.accounts.providers.github", OAuth2Provider::github()),
            )
            .into(),
            ContractBinding::new(
                AUTH_PROVIDER,
                "FACEBOOK",
                AUTH_PROVIDER_IMPL,
                Implementation::new(
                    "solo.apps.accounts.providers.facebook",
                    OAuth2Provider::facebook(),
                ),
            )
            .into(),
        ])
    }
}

fn invalid_args(reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidDirectiveArguments {
        directive: "enable_provider".to_string(),
        reason: reason.into(),
    }
}

/// `enable_provider: {name, client_id, client_secret, scope}`.
///
/// Stores the credentials under `settings["solo.apps.accounts"][<provider value>]`
/// with the absolute callback URL as `redirect_uri`.
fn enable_provider(config: &mut Configurator, args: &Value) -> Result<(), ConfigurationError> {
    let field = |key: &str| -> Result<String, ConfigurationError> {
        args.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| invalid_args(format!("missing string field {key:?}")))
    };
    let name = field("name")?;
    let client_id = field("client_id")?;
    let client_secret = field("client_secret")?;
    let scope = match args.get("scope") {
        Some(Value::String(scope)) => scope.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        None => String::new(),
        Some(other) => return Err(invalid_args(format!("invalid scope {other}"))),
    };

    let providers = auth_provider()?;
    let variant = providers
        .match_value(name.as_str())
        .map_err(|e| invalid_args(e.to_string()))?;
    let value = variant
        .value()
        .map(|v| v.canonical_text())
        .ok_or_else(|| invalid_args(format!("{variant} has no literal value")))?;

    let path = config
        .url_for(PACKAGE, CALLBACK_ROUTE, &[("provider", value.as_str())])
        .map_err(|e| invalid_args(e.to_string()))?;
    let public_uri = config
        .settings()
        .get("server")
        .and_then(|server| server.get("public_uri"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim_end_matches('/')
        .to_string();
    let redirect_uri = format!("{public_uri}{path}");

    let section = config
        .settings_mut()
        .entry(PACKAGE)
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(section) = section else {
        return Err(invalid_args(format!("setting {PACKAGE:?} is not a mapping")));
    };
    section.insert(
        value.clone(),
        json!({
            "client_id": client_id,
            "client_secret": client_secret,
            "scope": scope,
            "redirect_uri": redirect_uri,
        }),
    );
    info!(provider = %value, redirect_uri = %redirect_uri, "Auth provider enabled");
    Ok(())
}

fn provider_variant(call: &Invocation) -> Result<&Variant, HttpSignal> {
    call.context
        .get_variant("provider")
        .ok_or(HttpSignal::NotFound)
}

fn session_cookie(store: &SessionStoreHandle, id: &str) -> String {
    format!("{}={id}; Path=/; HttpOnly", store.0.cookie_name())
}

async fn login(call: Invocation) -> HandlerResult {
    let variant = provider_variant(&call)?;
    let registry = call
        .deps
        .get_arc::<Registry>("registry")
        .ok_or_else(|| anyhow!("registry was not injected"))?;
    let store = call
        .deps
        .get::<SessionStoreHandle>("session_store")
        .ok_or_else(|| anyhow!("session store was not injected"))?;
    let mut session = call.deps.get::<Session>("session").cloned().unwrap_or_default();

    let provider = registry
        .sums()
        .implementation_as::<OAuth2Provider>(variant, AUTH_PROVIDER_IMPL)
        .ok_or_else(|| anyhow!("{variant} has no {AUTH_PROVIDER_IMPL} binding"))?;
    let Some(credentials) = registry
        .setting(&[PACKAGE, provider.name])
        .and_then(ProviderCredentials::from_settings)
    else {
        warn!(provider = %provider.name, "Login attempted with a provider that is not enabled");
        return Err(HttpSignal::NotFound.into());
    };

    let state = ulid::Ulid::new().to_string();
    session.insert(OAUTH_STATE_KEY, Value::String(state.clone()));
    let session_id = store.0.save_session(&session).await.map_err(anyhow::Error::from)?;

    let location = provider
        .authorization_redirect(&credentials, &state)
        .map_err(anyhow::Error::from)?;
    let mut response = Response::redirect(302, location.as_str());
    response.set_header("set-cookie", session_cookie(store, &session_id));
    Ok(Reply::Response(response))
}

async fn login_callback(call: Invocation) -> HandlerResult {
    let variant = provider_variant(&call)?;
    let store = call
        .deps
        .get::<SessionStoreHandle>("session_store")
        .ok_or_else(|| anyhow!("session store was not injected"))?;
    let mut session = call.deps.get::<Session>("session").cloned().unwrap_or_default();

    let expected = session.get(OAUTH_STATE_KEY).and_then(Value::as_str);
    let offered = call.request.get_query_param("state");
    if expected.is_none() || expected != offered {
        warn!(provider = %variant, "OAuth state mismatch");
        return Err(HttpSignal::Client(400).into());
    }
    let Some(code) = call.request.get_query_param("code") else {
        return Err(HttpSignal::Forbidden.into());
    };

    session.remove(OAUTH_STATE_KEY);
    session.insert(OAUTH_CODE_KEY, json!({ "provider": variant.name(), "code": code }));
    let session_id = store.0.save_session(&session).await.map_err(anyhow::Error::from)?;

    let mut response = Response::redirect(302, "/");
    response.set_header("set-cookie", session_cookie(store, &session_id));
    Ok(Reply::Response(response))
}

async fn users(_call: Invocation) -> HandlerResult {
    Ok(Reply::from(json!({})))
}

async fn users_me(call: Invocation) -> HandlerResult {
    let identity = call
        .deps
        .get::<Identity>("identity")
        .ok_or_else(|| anyhow!("identity was not injected"))?;
    let Some(user_id) = identity.user_id.as_deref() else {
        return Err(HttpSignal::Forbidden.into());
    };
    Ok(Reply::from(json!({
        "id": user_id,
        "type": "users",
        "attributes": {
            "permissions": identity.permissions,
        },
    })))
}
