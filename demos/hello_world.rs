// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use redstart::{content_type, Method, Request, Response, Server, StatusCode};

fn hello(request: &Request) -> Response {
    let name = request.header("name").unwrap_or("anonymous");
    Response::builder(StatusCode::Ok)
        .content_type(content_type::PLAINTEXT)
        .body(format!("Hello, {}!", name))
        .build()
}

fn main() {
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")
        .unwrap()
        .start()
        .unwrap();

    let mut server = Server::new();
    server.route(Method::Get, "/hello", hello).unwrap();
    server.bind("127.0.0.1", 8080).unwrap();
    server.print_route_tree();

    if let Err(e) = server.serve() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
