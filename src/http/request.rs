// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::{collections::headers::Headers, http::Method};

//==============================================================================
// Constants & Structures
//==============================================================================

/// A parsed HTTP request. The target always begins with `/`; the body is
/// empty unless the method carries a payload or the request announced one
/// through `Content-Length` or `Content-Type`.
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    headers: Headers,
    body: Vec<u8>,
}

/// Builder for [Request].
pub struct RequestBuilder {
    method: Method,
    target: String,
    headers: Headers,
    body: Vec<u8>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [Request].
impl Request {
    /// Returns the method of the target request.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the target path of the target request.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Looks up a header value, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Returns the headers of the target request.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body of the target request.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Associate functions for [RequestBuilder].
impl RequestBuilder {
    /// Creates a builder for a request with the given method and target.
    pub fn new<S: Into<String>>(method: Method, target: S) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.insert(key, value);
        self
    }

    /// Replaces all headers.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the body.
    pub fn body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the request.
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            target: self.target,
            headers: self.headers,
            body: self.body,
        }
    }
}
