// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use redstart::{content_type, Method, PathParameters, Request, Response, Server, StatusCode};

use std::{
    io::{Read, Write},
    net::TcpStream,
    thread,
    time::Duration,
};

//==============================================================================
// Helpers
//==============================================================================

/// Configures a server, binds it to a loopback port, and serves it on a
/// background thread. Binding (and thus listening) completes before this
/// returns, so connections made afterwards are queued even while the
/// acceptor task is still starting.
fn spawn_server<F>(port: u16, configure: F)
where
    F: FnOnce(&mut Server),
{
    let mut server = Server::new();
    configure(&mut server);
    server.bind("127.0.0.1", port).unwrap();
    thread::spawn(move || server.serve().unwrap());
}

/// Sends raw request bytes and returns the raw response. The server closes
/// the connection after one response, so reading to the end terminates.
fn roundtrip(port: u16, request: &[u8]) -> String {
    let mut stream = connect(port);
    stream.write_all(request).unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8(response).unwrap()
}

fn connect(port: u16) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)) {
            return stream;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("could not connect to 127.0.0.1:{}", port);
}

/// Splits a raw response into its head and body.
fn split_response(response: &str) -> (&str, &str) {
    let position = response
        .find("\r\n\r\n")
        .expect("response has no blank line");
    (&response[..position], &response[position + 4..])
}

fn hello() -> Response {
    Response::builder(StatusCode::Ok)
        .content_type(content_type::PLAINTEXT)
        .body("Hello world!")
        .build()
}

fn echo(request: &Request) -> Response {
    let mut builder = Response::builder(StatusCode::Ok).body(request.body().to_vec());
    if let Some(content_type) = request.header("Content-Type") {
        builder = builder.content_type(content_type);
    }
    builder.build()
}

fn show_parameters(parameters: &PathParameters) -> Response {
    let joined: Vec<&str> = parameters.iter().collect();
    Response::builder(StatusCode::Ok)
        .content_type(content_type::PLAINTEXT)
        .body(joined.join(":"))
        .build()
}

fn tag_literal() -> Response {
    Response::builder(StatusCode::Ok).body("literal").build()
}

fn teapot() -> Response {
    Response::builder(StatusCode::ImATeapot).build()
}

//==============================================================================
// Scenarios
//==============================================================================

/// Registers `GET /hello` and checks the status line, body, content length,
/// and the single `Connection: Close`.
#[test]
fn hello_world() {
    let port = 18081;
    spawn_server(port, |server| {
        server.route(Method::Get, "/hello", hello).unwrap();
    });

    let response = roundtrip(port, b"GET /hello HTTP/1.1\r\n\r\n");
    let (head, body) = split_response(&response);

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, "Hello world!");
    assert!(head.contains("\r\nContent-Length: 12"));
    assert_eq!(response.matches("Connection: Close").count(), 1);
}

/// POSTs a body and gets it echoed back with its content type.
#[test]
fn echo_post() {
    let port = 18082;
    spawn_server(port, |server| {
        server.route(Method::Post, "/echo", echo).unwrap();
    });

    let response = roundtrip(
        port,
        b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\nContent-Type: text/plain\r\n\r\nhello",
    );
    let (head, body) = split_response(&response);

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, "hello");
    assert!(head.contains("Content-Type: text/plain"));
    assert!(head.contains("Content-Length: 5"));
}

/// Captured parameters arrive in traversal order.
#[test]
fn path_parameters() {
    let port = 18083;
    spawn_server(port, |server| {
        server
            .route(Method::Get, "/:name/*action", show_parameters)
            .unwrap();
    });

    let response = roundtrip(port, b"GET /alice/greet HTTP/1.1\r\n\r\n");
    let (_, body) = split_response(&response);

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, "alice:greet");
}

/// A literal route wins over a parameter route for the exact target; every
/// other target still reaches the parameter route.
#[test]
fn literal_wins() {
    let port = 18084;
    spawn_server(port, |server| {
        server.route(Method::Get, "/foo/bar", tag_literal).unwrap();
        server
            .route(Method::Get, "/:x/:y", show_parameters)
            .unwrap();
    });

    let response = roundtrip(port, b"GET /foo/bar HTTP/1.1\r\n\r\n");
    let (_, body) = split_response(&response);
    assert_eq!(body, "literal");

    let response = roundtrip(port, b"GET /foo/baz HTTP/1.1\r\n\r\n");
    let (_, body) = split_response(&response);
    assert_eq!(body, "foo:baz");
}

/// The lookup unwinds out of the literal branch when it dead-ends, and the
/// parameter branch sees a clean capture list.
#[test]
fn parameter_rollback() {
    let port = 18085;
    spawn_server(port, |server| {
        server.route(Method::Get, "/foo/bar", tag_literal).unwrap();
        server
            .route(Method::Get, "/:x/", show_parameters)
            .unwrap();
    });

    let response = roundtrip(port, b"GET /foo/ HTTP/1.1\r\n\r\n");
    let (_, body) = split_response(&response);
    assert_eq!(body, "foo:");
}

/// An unknown target gets the fallback: `404`, no body, no content length,
/// still exactly one `Connection: Close`.
#[test]
fn not_found() {
    let port = 18086;
    spawn_server(port, |server| {
        server.route(Method::Get, "/hello", hello).unwrap();
    });

    let response = roundtrip(port, b"GET /missing HTTP/1.1\r\n\r\n");
    let (head, body) = split_response(&response);

    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(body.is_empty());
    assert!(!head.contains("Content-Length"));
    assert_eq!(response.matches("Connection: Close").count(), 1);
}

/// The fallback handler is replaceable.
#[test]
fn custom_not_found() {
    let port = 18087;
    spawn_server(port, |server| {
        server.set_not_found_handler(teapot);
    });

    let response = roundtrip(port, b"GET /anything HTTP/1.1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 418 I'm a Teapot\r\n"));
}

/// A malformed request gets no response at all: the connection just closes.
#[test]
fn bad_request_closes_silently() {
    let port = 18088;
    spawn_server(port, |server| {
        server.route(Method::Get, "/hello", hello).unwrap();
    });

    let response = roundtrip(port, b"BREW /hello HTTP/1.1\r\n\r\n");
    assert!(response.is_empty());
}

/// One server answers many sequential connections, each closed after its
/// response.
#[test]
fn sequential_connections() {
    let port = 18089;
    spawn_server(port, |server| {
        server.route(Method::Get, "/hello", hello).unwrap();
    });

    for _ in 0..16 {
        let response = roundtrip(port, b"GET /hello HTTP/1.1\r\n\r\n");
        let (_, body) = split_response(&response);
        assert_eq!(body, "Hello world!");
    }
}

/// Registration-time failures: duplicate `(method, target)` rejected,
/// second method on the same target fine, malformed targets rejected.
#[test]
fn registration_failures() {
    let mut server = Server::new();

    server.route(Method::Get, "/x", hello).unwrap();
    assert!(server.route(Method::Get, "/x", hello).is_err());
    server.route(Method::Post, "/x", echo).unwrap();

    assert!(server.route(Method::Get, "/a?b", hello).is_err());
    assert!(server.route(Method::Get, "/**name", hello).is_err());
}

/// Serving without binding fails.
#[test]
fn serve_requires_bind() {
    let server = Server::new();
    assert!(server.serve().is_err());
}
