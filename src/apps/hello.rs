//! `solo.apps.hello`: a single class-style view answering `Hello World!`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::configurator::{Configurator, Declaration, Package};
use crate::error::ConfigurationError;
use crate::request::{Context, Request};
use crate::runtime::Injected;
use crate::views::{ClassView, HandlerResult, HttpSignal, Reply, ViewDecl, ViewDefaults};

pub const PACKAGE: &str = "solo.apps.hello";
pub const HELLO_ROUTE: &str = "solo.hello";

#[derive(Debug, Clone, Copy, Default)]
pub struct HelloApp;

impl Package for HelloApp {
    fn name(&self) -> &str {
        PACKAGE
    }

    fn includeme(&self, config: &mut Configurator) -> Result<(), ConfigurationError> {
        config.add_route(HELLO_ROUTE, "/")
    }

    fn declarations(&self) -> Result<Vec<Declaration>, ConfigurationError> {
        let defaults = ViewDefaults::new().route(HELLO_ROUTE);
        Ok(vec![ViewDecl::class::<HelloWorld>("HelloWorld")
            .attr("get")
            .defaults(&defaults)
            .into()])
    }
}

pub struct HelloWorld {
    request: Arc<Request>,
}

#[async_trait]
impl ClassView for HelloWorld {
    const METHODS: &'static [&'static str] = &["get"];

    fn construct(request: Arc<Request>, _context: Arc<Context>) -> Self {
        Self { request }
    }

    async fn dispatch(&self, method: &str, _deps: &Injected) -> HandlerResult {
        match method {
            "get" => {
                tracing::debug!(request_id = %self.request.request_id, "Greeting");
                Ok(Reply::from("Hello World!"))
            }
            _ => Err(HttpSignal::NotFound.into()),
        }
    }
}
