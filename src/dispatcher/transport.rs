use std::collections::VecDeque;

use async_trait::async_trait;
use thiserror::Error;

use crate::request::HeaderVec;
use crate::response::Response;

/// Connection-level request description handed over by a server.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub method: String,
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query_string: String,
    pub headers: Vec<(String, String)>,
}

impl Scope {
    #[must_use]
    pub fn new(method: &str, path: &str) -> Self {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query_string: query.to_string(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("client disconnected")]
    Disconnected,

    #[error("transport failure: {0}")]
    Io(String),
}

/// Inbound request events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    Body { body: Vec<u8>, more_body: bool },
    Disconnect,
}

/// Outbound response events: one `Start`, then `Body` until `more_body` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEvent {
    Start { status: u16, headers: HeaderVec },
    Body { body: Vec<u8>, more_body: bool },
}

#[async_trait]
pub trait Receive: Send {
    async fn receive(&mut self) -> Result<ReceiveEvent, TransportError>;
}

#[async_trait]
pub trait ResponseSink: Send {
    async fn send(&mut self, event: SendEvent) -> Result<(), TransportError>;
}

/// Serves a fixed body as a sequence of chunks.
#[derive(Debug, Default)]
pub struct BodyReceive {
    chunks: VecDeque<Vec<u8>>,
}

impl BodyReceive {
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self::chunked(vec![body.into()])
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chunked(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }
}

#[async_trait]
impl Receive for BodyReceive {
    async fn receive(&mut self) -> Result<ReceiveEvent, TransportError> {
        let body = self.chunks.pop_front().unwrap_or_default();
        Ok(ReceiveEvent::Body {
            body,
            more_body: !self.chunks.is_empty(),
        })
    }
}

/// Collects sent events in memory.
#[derive(Debug, Default)]
pub struct BufferedSink {
    events: Vec<SendEvent>,
}

impl BufferedSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[SendEvent] {
        &self.events
    }

    /// Reassemble the response, if a `Start` event was sent.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        let mut response: Option<Response> = None;
        for event in self.events {
            match event {
                SendEvent::Start { status, headers } => {
                    response = Some(Response::new(status, headers, Vec::new()));
                }
                SendEvent::Body { body, .. } => {
                    if let Some(res) = response.as_mut() {
                        res.body.extend_from_slice(&body);
                    }
                }
            }
        }
        response
    }
}

#[async_trait]
impl ResponseSink for BufferedSink {
    async fn send(&mut self, event: SendEvent) -> Result<(), TransportError> {
        self.events.push(event);
        Ok(())
    }
}
