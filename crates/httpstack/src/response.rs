// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP response value object.
//!
//! Handlers fill a [`Response`] in place during dispatch. Once [`Response::send`]
//! has been called the response is frozen: later mutations are ignored and
//! logged, and further `send` calls are no-ops.

use std::collections::HashMap;

/// A mutable HTTP response built up by route handlers.
///
/// # Example
///
/// ```rust
/// use httpstack::Response;
///
/// let mut res = Response::new();
/// res.set_content_type("text/html");
/// res.set_body("<h1>Hello</h1>");
/// assert!(res.send());
/// assert!(!res.send());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: String,
    sent: bool,
}

impl Response {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: String::new(),
            sent: false,
        }
    }

    fn frozen(&self, what: &str) -> bool {
        if self.sent {
            tracing::warn!("Ignoring {} on a response that was already sent", what);
        }
        self.sent
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: u16) -> &mut Self {
        if !self.frozen("set_status") {
            self.status = status;
        }
        self
    }

    /// Sets a header, replacing any previous value.
    ///
    /// Header names are case-insensitive and stored lower-cased.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        if !self.frozen("set_header") {
            self.headers
                .insert(name.as_ref().to_ascii_lowercase(), value.into());
        }
        self
    }

    /// Sets the `Content-Type` header.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.set_header("Content-Type", content_type)
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: impl Into<String>) -> &mut Self {
        if !self.frozen("set_body") {
            self.body = body.into();
        }
        self
    }

    /// Turns the response into a redirect (HTTP 302 by default).
    pub fn redirect(&mut self, location: impl Into<String>) -> &mut Self {
        self.redirect_with_status(302, location)
    }

    /// Turns the response into a redirect with a specific status code.
    pub fn redirect_with_status(&mut self, status: u16, location: impl Into<String>) -> &mut Self {
        self.set_status(status);
        self.set_header("Location", location);
        self
    }

    /// Marks the response as sent.
    ///
    /// Returns true the first time, false on every later call.
    pub fn send(&mut self) -> bool {
        if self.sent {
            return false;
        }
        self.sent = true;
        true
    }

    /// Whether [`send`](Self::send) has been called.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All headers, keyed by lower-cased name.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Returns the body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns true if this is a success response (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if this is a redirect response (3xx).
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Returns true if this is an error response (4xx or 5xx).
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
