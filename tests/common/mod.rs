//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Once};

use solorouter::config::{bootstrap, AppConfig};
use solorouter::configurator::Configurator;
use solorouter::dispatcher::{BodyReceive, BufferedSink};
use solorouter::error::ConfigurationError;
use solorouter::views::{handler_fn, Handler, HandlerError, Reply};
use solorouter::{apps, Dispatcher, Registry, Response, Runtime, Scope};

static TRACING_INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A handler replying with fixed text.
pub fn text_handler(name: &'static str, text: &'static str) -> Arc<dyn Handler> {
    handler_fn(name, move |_call| async move {
        Ok::<_, HandlerError>(Reply::from(text))
    })
    .into_handler()
}

/// Build a dispatcher over routes registered directly on a configurator.
pub fn dispatcher_with<F>(setup: F) -> Dispatcher
where
    F: FnOnce(&mut Configurator) -> Result<(), ConfigurationError>,
{
    init_tracing();
    let mut config = Configurator::new();
    setup(&mut config).expect("configuration");
    let registry = config.build().expect("build");
    Dispatcher::new(Runtime::new(Arc::new(registry)))
}

/// Registry for the bundled apps described by `yaml`.
pub fn registry_from_yaml(yaml: &str) -> Registry {
    init_tracing();
    let config = AppConfig::from_yaml(yaml).expect("parse config");
    bootstrap(&config, &apps::builtin_packages()).expect("bootstrap")
}

/// Write `yaml` to a temporary file that lives as long as the handle.
pub fn temp_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("solo_test_")
        .suffix(".yaml")
        .tempfile()
        .expect("tempfile");
    file.write_all(yaml.as_bytes()).expect("write config");
    file
}

/// Drive one request through the transport adapter.
pub async fn send(dispatcher: &Dispatcher, scope: Scope, body: &[u8]) -> Response {
    let mut receive = BodyReceive::new(body.to_vec());
    let mut sink = BufferedSink::new();
    dispatcher
        .handle(scope, &mut receive, &mut sink)
        .await
        .expect("transport");
    sink.into_response().expect("response started")
}

/// The `name=value` part of a `set-cookie` header.
pub fn cookie_pair(response: &Response) -> String {
    response
        .get_header("set-cookie")
        .and_then(|c| c.split(';').next())
        .expect("set-cookie header")
        .to_string()
}

pub const APPS_YAML: &str = r#"
server:
  public_uri: https://solo.example/
session:
  cookie_name: SID
apps:
  - name: solo.apps.hello
    url_prefix: /hello
  - name: solo.apps.accounts
    url_prefix: /
    setup:
      - enable_provider:
          name: github
          client_id: gh-client
          client_secret: gh-secret
          scope: [user, "user:email"]
"#;
