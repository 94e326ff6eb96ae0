//! Per-request values handed to predicates and handlers.
//!
//! A [`Request`] is built once by the dispatcher and shared by `Arc`; nothing mutates it
//! after routing. The [`Context`] holds the matched URL parameters after rule resolution,
//! so a `{provider:<...AuthProvider>}` segment shows up as a [`Variant`] rather than text.

use std::collections::BTreeMap;
use std::sync::Arc;

use http::Method;
use smallvec::SmallVec;
use thiserror::Error;

use crate::ids::RequestId;
use crate::sum::Variant;

/// Parameters kept inline before spilling to the heap.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Headers and cookies kept inline before spilling to the heap.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Default cap on the number of query fields accepted per request.
pub const DEFAULT_MAX_QUERY_FIELDS: usize = 256;

/// Name/value pairs with `Arc<str>` names shared with the route table.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Header or cookie pairs; names are lowercased for headers.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Multi-valued query parameters, blank values kept.
pub type QueryParams = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Max number of fields exceeded ({limit})")]
    TooManyFields { limit: usize },
}

/// Parse a raw query string, keeping blank values and rejecting more than `max_fields` fields.
pub fn parse_query(query: &str, max_fields: usize) -> Result<QueryParams, QueryError> {
    let mut params = QueryParams::new();
    for (count, (k, v)) in url::form_urlencoded::parse(query.as_bytes()).enumerate() {
        if count >= max_fields {
            return Err(QueryError::TooManyFields { limit: max_fields });
        }
        params.entry(k.into_owned()).or_default().push(v.into_owned());
    }
    Ok(params)
}

/// Split a `Cookie` header into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> HeaderVec {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=').unwrap_or((pair.trim(), ""));
            if name.is_empty() {
                return None;
            }
            Some((Arc::from(name.trim()), value.trim().to_string()))
        })
        .collect()
}

/// An incoming request after routing.
#[derive(Debug, Clone)]
pub struct Request {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    /// Raw matched URL parameters, percent-decoded.
    pub url_params: ParamVec,
    pub query: QueryParams,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub body: Vec<u8>,
}

impl Request {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            url_params: ParamVec::new(),
            query: QueryParams::new(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header; a `cookie` header is also parsed into [`cookies`](Self::cookies).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if name == "cookie" {
            self.cookies.extend(parse_cookies(&value));
        }
        self.headers.push((Arc::from(name.as_str()), value));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_url_param(&self, name: &str) -> Option<&str> {
        self.url_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// A resolved URL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Raw(String),
    Variant(Variant),
}

/// URL parameters after rule resolution, in pattern order.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: SmallVec<[(Arc<str>, ContextValue); MAX_INLINE_PARAMS]>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: Arc<str>, value: ContextValue) {
        self.values.push((name, value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.values
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// The parameter as raw text, if it was not resolved to a variant.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ContextValue::Raw(s) => Some(s),
            ContextValue::Variant(_) => None,
        }
    }

    #[must_use]
    pub fn get_variant(&self, name: &str) -> Option<&Variant> {
        match self.get(name)? {
            ContextValue::Variant(v) => Some(v),
            ContextValue::Raw(_) => None,
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_keeps_blanks_and_repeats() {
        let q = parse_query("a=1&a=2&b=&c", DEFAULT_MAX_QUERY_FIELDS).unwrap();
        assert_eq!(q["a"], vec!["1", "2"]);
        assert_eq!(q["b"], vec![""]);
        assert_eq!(q["c"], vec![""]);
    }

    #[test]
    fn test_parse_query_decodes() {
        let q = parse_query("name=J%C3%BCrgen+X", 4).unwrap();
        assert_eq!(q["name"], vec!["Jürgen X"]);
    }

    #[test]
    fn test_parse_query_field_limit() {
        assert!(parse_query("a=1&b=2", 2).is_ok());
        assert_eq!(
            parse_query("a=1&b=2&c=3", 2),
            Err(QueryError::TooManyFields { limit: 2 })
        );
    }

    #[test]
    fn test_cookie_header_populates_cookies() {
        let req = Request::new(Method::GET, "/")
            .with_header("Cookie", "session=abc; theme=dark");
        assert_eq!(req.get_cookie("session"), Some("abc"));
        assert_eq!(req.get_cookie("theme"), Some("dark"));
        assert_eq!(req.get_header("COOKIE"), Some("session=abc; theme=dark"));
    }
}
