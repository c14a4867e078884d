//! Incoming HTTP request type.

use std::borrow::Cow;
use std::collections::HashMap;

use http::request::Parts;

/// An incoming HTTP request: method, URI, headers and route parameters.
pub struct Request {
    parts: Parts,
    params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(parts: Parts, params: HashMap<String, String>) -> Self {
        Self { parts, params }
    }

    pub fn method(&self) -> &http::Method { &self.parts.method }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &http::HeaderMap { &self.parts.headers }

    /// Case-insensitive header lookup.
    ///
    /// Bytes that are not UTF-8 are replaced with U+FFFD.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.parts
            .headers
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
    }

    /// Returns a named path parameter exactly as it appeared on the wire,
    /// still percent-encoded.
    ///
    /// For a route `/say/{command}`, `req.param("command")` on
    /// `/say/hello%20world` returns `Some("hello%20world")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
