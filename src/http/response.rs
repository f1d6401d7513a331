// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::{collections::headers::Headers, http::StatusCode};

//==============================================================================
// Constants & Structures
//==============================================================================

/// An HTTP response produced by a request handler. Handlers choose the
/// status, headers, and body; the serializer owns `Connection` and
/// `Content-Length`, overwriting any handler-supplied values for those two.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Option<Vec<u8>>,
}

/// Builder for [Response].
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Option<Vec<u8>>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [Response].
impl Response {
    /// Creates a builder for a response with the given status.
    pub fn builder(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder {
            status,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Returns the status of the target response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers of the target response.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a mutable view of the headers of the target response.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the body of the target response, if one was set.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Associate functions for [ResponseBuilder].
impl ResponseBuilder {
    /// Adds a header.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.insert(key, value);
        self
    }

    /// Sets the `Content-Type` header.
    pub fn content_type<S: Into<String>>(self, value: S) -> Self {
        self.header("Content-Type", value)
    }

    /// Sets the body.
    pub fn body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builds the response.
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}
