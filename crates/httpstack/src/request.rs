// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP request value object.
//!
//! Adapters (the HTTP server, the `render` command, tests) build a
//! [`Request`] and hand it to [`Router::dispatch`](crate::Router::dispatch).

use std::collections::HashMap;

/// An incoming request as seen by route handlers.
///
/// All maps are plain owned `HashMap`s; header names keep whatever case the
/// adapter supplied and [`header`](Self::header) compares them without case.
///
/// # Example
///
/// ```rust
/// use httpstack::Request;
///
/// let request = Request::new("get", "/blog/hello")
///     .with_query([("page".into(), "1".into())].into());
/// assert_eq!(request.method, "GET");
/// assert_eq!(request.query_param("page"), Some("1"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// Upper-cased method; route tables are keyed by it.
    pub method: String,
    /// Path without the query string, matched against route patterns.
    pub path: String,
    /// Header name to value.
    pub headers: HashMap<String, String>,
    /// Raw body, when the adapter read one.
    pub body: Option<Vec<u8>>,
    /// Decoded query string.
    pub query: HashMap<String, String>,
    /// Cookie name to value.
    pub cookies: HashMap<String, String>,
}

impl Request {
    /// A request with no headers, body, query or cookies.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            query: HashMap::new(),
            cookies: HashMap::new(),
        }
    }

    /// Replaces the headers.
    pub fn with_headers(self, headers: HashMap<String, String>) -> Self {
        Self { headers, ..self }
    }

    /// Sets the body.
    pub fn with_body(self, body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            ..self
        }
    }

    /// Replaces the query parameters.
    pub fn with_query(self, query: HashMap<String, String>) -> Self {
        Self { query, ..self }
    }

    /// Replaces the cookies.
    pub fn with_cookies(self, cookies: HashMap<String, String>) -> Self {
        Self { cookies, ..self }
    }

    /// Header value by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v.as_str()))
    }

    /// One query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// One cookie.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// The body as UTF-8 text.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// The body decoded as JSON; `None` when absent or invalid.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(self.body_str()?).ok()
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new("GET", "/")
    }
}
