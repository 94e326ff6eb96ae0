use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;

use crate::request::HeaderVec;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";

/// A fully built HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response with no body and no content type.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Vec::new())
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let mut res = Self::new(status, HeaderVec::new(), body.into().into_bytes());
        res.set_header("content-type", TEXT_PLAIN.to_string());
        res
    }

    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut res = Self::new(status, HeaderVec::new(), body.to_string().into_bytes());
        res.set_header("content-type", APPLICATION_JSON.to_string());
        res
    }

    /// `404 Not Found` as returned for unmatched paths.
    #[must_use]
    pub fn not_found() -> Self {
        Self::text(404, "404 Not Found")
    }

    /// Generic 500, never carrying internal detail.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::text(500, "HTTP 500: Internal Server Error")
    }

    /// Status-only response for handler signals.
    #[must_use]
    pub fn status_only(status: u16) -> Self {
        let mut res = Self::empty(status);
        res.set_header("content-type", TEXT_PLAIN.to_string());
        res
    }

    #[must_use]
    pub fn redirect(status: u16, location: &str) -> Self {
        let mut res = Self::status_only(status);
        res.set_header("location", location.to_string());
        res
    }

    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive).
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }

    /// Body as UTF-8 text, lossy.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut res = Response::text(200, "ok");
        res.set_header("Content-Type", "application/json".to_string());
        assert_eq!(res.headers.len(), 1);
        assert_eq!(res.content_type(), Some("application/json"));
    }

    #[test]
    fn test_canned_responses() {
        let nf = Response::not_found();
        assert_eq!(nf.status, 404);
        assert_eq!(nf.body_text(), "404 Not Found");

        let err = Response::internal_error();
        assert_eq!(err.status, 500);
        assert_eq!(err.body_text(), "HTTP 500: Internal Server Error");

        let redirect = Response::redirect(302, "https://example.com/");
        assert!(redirect.body.is_empty());
        assert_eq!(redirect.get_header("Location"), Some("https://example.com/"));
    }
}
