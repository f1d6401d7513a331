// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Redstart is an embeddable HTTP/1.1 server library. Applications register
//! request handlers against route patterns, bind a TCP endpoint, and run the
//! server; the library parses requests, dispatches them to the matching
//! handler, and writes back responses. Serving is driven by a cooperative
//! task scheduler and an epoll-based readiness reactor; every connection is
//! answered once and closed.

#[macro_use]
extern crate log;

pub mod collections;
pub mod fail;
pub mod http;
pub mod io;
pub mod router;
pub mod runtime;
pub mod server;

pub use crate::{
    collections::headers::Headers,
    fail::Fail,
    http::{
        content_type,
        request::{Request, RequestBuilder},
        response::{Response, ResponseBuilder},
        Method, StatusCode,
    },
    router::PathParameters,
    server::Server,
};
